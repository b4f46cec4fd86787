// End-to-end dispatch tests over live sockets: accept, parse, resolve,
// respond, and keep independent connections isolated from one another.
use std::{net::SocketAddr, sync::Arc, time::Duration};

use gantry::{
    adapters::EchoForwarder,
    config,
    core::RouteResolver,
    server::ConnectionServer,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

const CONFIG: &str = "\
[order-service]
HOST=127.0.0.1
PORT=5002
DEFAULT-EXPOSURE=PUBLIC
DEFAULT-AUTH=false

[order-service.routes]
EXPOSURE=PRIVATE
AUTH=true
PATH=/orders/:id
METHOD=GET
";

async fn start_gateway(config_text: &str) -> SocketAddr {
    let store = Arc::new(config::parse_str(config_text).expect("config parses"));
    let resolver = Arc::new(RouteResolver::new(store));
    let server = Arc::new(ConnectionServer::new(resolver, Arc::new(EchoForwarder)));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(server.run(listener));
    addr
}

async fn send_and_read(addr: SocketAddr, request: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream.write_all(request.as_bytes()).await.expect("write");
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.expect("read");
    String::from_utf8(response).expect("utf-8 response")
}

#[tokio::test(flavor = "multi_thread")]
async fn routes_a_request_to_its_resolved_target() {
    let addr = start_gateway(CONFIG).await;

    let response = send_and_read(addr, "GET /order-service/orders/42 HTTP/1.1\r\n\r\n").await;

    assert!(response.starts_with("HTTP/1.1 200 OK"));
    assert!(response.contains("http://127.0.0.1:5002/orders/42"));
    assert!(response.contains("exposure=PRIVATE"));
    assert!(response.contains("auth=true"));
}

#[tokio::test(flavor = "multi_thread")]
async fn unmatched_method_reports_service_defaults() {
    let addr = start_gateway(CONFIG).await;

    let response = send_and_read(addr, "POST /order-service/orders/42 HTTP/1.1\r\n\r\n").await;

    assert!(response.starts_with("HTTP/1.1 200 OK"));
    assert!(response.contains("exposure=PUBLIC"));
    assert!(response.contains("auth=false"));
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_service_maps_to_not_found() {
    let addr = start_gateway(CONFIG).await;

    let response = send_and_read(addr, "GET /ghost-service/x HTTP/1.1\r\n\r\n").await;

    assert!(response.starts_with("HTTP/1.1 404 Not Found"));
    assert!(response.contains("ghost-service"));
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_request_line_maps_to_bad_request() {
    let addr = start_gateway(CONFIG).await;

    let response = send_and_read(addr, "GET /missing-version\r\n").await;

    assert!(response.starts_with("HTTP/1.1 400 Bad Request"));
}

#[tokio::test(flavor = "multi_thread")]
async fn oversized_request_line_is_rejected_not_truncated() {
    let addr = start_gateway(CONFIG).await;

    // Exactly one buffer's worth with no line terminator: the server rejects
    // instead of truncating, and has consumed every byte we sent.
    let request = "a".repeat(1024);
    let response = send_and_read(addr, &request).await;

    assert!(response.starts_with("HTTP/1.1 431"));
}

#[tokio::test(flavor = "multi_thread")]
async fn silent_peer_close_does_not_disturb_other_connections() {
    let addr = start_gateway(CONFIG).await;

    // Connection A: accepted, never sends a byte, then goes away.
    let idle = TcpStream::connect(addr).await.expect("connect idle");

    // Connection B: a full exchange while A sits idle.
    let response = send_and_read(addr, "GET /order-service/orders/7 HTTP/1.1\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 200 OK"));

    drop(idle);

    // And the server still serves after A closed without data.
    let response = send_and_read(addr, "GET /order-service/orders/8 HTTP/1.1\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 200 OK"));
}

#[tokio::test(flavor = "multi_thread")]
async fn keep_alive_serves_successive_exchanges() {
    let config = format!("KEEP-ALIVE=true\nIDLE-TIMEOUT=5s\n\n{CONFIG}");
    let addr = start_gateway(&config).await;

    let mut stream = TcpStream::connect(addr).await.expect("connect");

    for id in ["1", "2"] {
        let request = format!("GET /order-service/orders/{id} HTTP/1.1\r\n");
        stream.write_all(request.as_bytes()).await.expect("write");

        let mut collected = String::new();
        let marker = format!("/orders/{id}");
        let mut chunk = [0u8; 1024];
        while !collected.contains(&marker) {
            let n = stream.read(&mut chunk).await.expect("read");
            assert!(n > 0, "connection closed before response arrived");
            collected.push_str(&String::from_utf8_lossy(&chunk[..n]));
        }
        assert!(collected.contains("Connection: keep-alive"));
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn keep_alive_exchange_starts_from_a_clean_buffer() {
    let config = format!("KEEP-ALIVE=true\n\n{CONFIG}");
    let addr = start_gateway(&config).await;

    let mut stream = TcpStream::connect(addr).await.expect("connect");

    // Two request lines in a single write: the gateway answers the first and
    // drops the trailing bytes, so the second line never gets a response.
    let pipelined =
        "GET /order-service/orders/1 HTTP/1.1\r\nGET /order-service/orders/2 HTTP/1.1\r\n";
    stream.write_all(pipelined.as_bytes()).await.expect("write");
    stream.shutdown().await.expect("shutdown write half");

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.expect("read");
    let response = String::from_utf8(response).expect("utf-8 response");

    assert_eq!(response.matches("HTTP/1.1 200 OK").count(), 1);
    assert!(response.contains("/orders/1"));
    assert!(!response.contains("/orders/2"));
}

#[tokio::test(flavor = "multi_thread")]
async fn idle_timeout_evicts_silent_clients() {
    let config = format!("IDLE-TIMEOUT=200ms\n\n{CONFIG}");
    let addr = start_gateway(&config).await;

    let mut stream = TcpStream::connect(addr).await.expect("connect");
    tokio::time::sleep(Duration::from_millis(500)).await;

    // The server should have closed its end; reads observe EOF.
    let mut buf = Vec::new();
    let n = stream.read_to_end(&mut buf).await.expect("read");
    assert_eq!(n, 0);
}
