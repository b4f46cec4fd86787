//! The connection dispatcher: a single-threaded, non-blocking reactor.
//!
//! All concurrency is I/O multiplexing. The server is meant to run on a
//! current-thread tokio runtime: the runtime's I/O driver (epoll/kqueue) is
//! the readiness-notification facility, every accepted connection becomes a
//! task on that same thread, and the only suspension points are readiness
//! awaits (accept, read, write, timeout). Nothing in the loop body blocks,
//! so one slow client never stalls the others.
//!
//! The connection model is non-persistent by default: one request line in,
//! one response out, close. The `KEEP-ALIVE` gateway setting turns on
//! successive exchanges per connection; `IDLE-TIMEOUT` evicts clients that
//! go silent between reads. Per-connection failures only ever close that
//! one connection.
use std::{
    io,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use bytes::BytesMut;
use eyre::{Result, WrapErr};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    time::timeout,
};
use tracing::Instrument;

use crate::{
    config::Exposure,
    core::{RequestContext, ResolveError, RouteResolver},
    ports::Forwarder,
    server::parser::{self, RequestLineError},
};

/// Upper bound for the buffered request line. A line that does not fit is
/// rejected explicitly instead of being truncated.
pub const MAX_REQUEST_LINE_BYTES: usize = 1024;

/// Accepts client connections and drives each one through parse → resolve →
/// forward → respond.
pub struct ConnectionServer {
    resolver: Arc<RouteResolver>,
    forwarder: Arc<dyn Forwarder>,
    keep_alive: bool,
    idle_timeout: Option<Duration>,
}

impl ConnectionServer {
    /// Build a server from a resolver and a forwarder; connection behavior
    /// (keep-alive, idle eviction) comes from the store's gateway settings.
    pub fn new(resolver: Arc<RouteResolver>, forwarder: Arc<dyn Forwarder>) -> Self {
        let gateway = &resolver.store().gateway;
        let keep_alive = gateway.keep_alive;
        let idle_timeout = gateway.idle_timeout;
        Self {
            resolver,
            forwarder,
            keep_alive,
            idle_timeout,
        }
    }

    /// Run the accept loop on an already-bound listener.
    ///
    /// Binding is the caller's job so that setup failures stay fatal at
    /// startup (and so tests can bind an ephemeral port). Accept failures
    /// here are transient: they drop one connection and the loop continues.
    pub async fn run(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        let local_addr = listener
            .local_addr()
            .wrap_err("failed to read listener address")?;
        tracing::info!(
            address = %local_addr,
            keep_alive = self.keep_alive,
            idle_timeout = ?self.idle_timeout,
            "gateway listening"
        );

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let server = Arc::clone(&self);
                    let span = tracing::info_span!("connection", peer = %peer);
                    tokio::spawn(
                        async move {
                            if let Err(err) = server.handle_connection(stream, peer).await {
                                tracing::debug!(error = %err, "connection ended with error");
                            }
                        }
                        .instrument(span),
                    );
                }
                Err(err) => {
                    tracing::warn!(error = %err, "accept failed; continuing");
                }
            }
        }
    }

    /// Serve one connection: one exchange, or several under keep-alive.
    async fn handle_connection(&self, mut stream: TcpStream, peer: SocketAddr) -> io::Result<()> {
        loop {
            let mut buf = BytesMut::with_capacity(MAX_REQUEST_LINE_BYTES);

            let line_end = loop {
                if let Some(end) = find_line_end(&buf) {
                    break Some(end);
                }
                if buf.len() >= MAX_REQUEST_LINE_BYTES {
                    break None;
                }
                let read = match self.idle_timeout {
                    Some(limit) => match timeout(limit, stream.read_buf(&mut buf)).await {
                        Ok(result) => result?,
                        Err(_elapsed) => {
                            tracing::debug!("idle timeout; evicting connection");
                            return Ok(());
                        }
                    },
                    None => stream.read_buf(&mut buf).await?,
                };
                if read == 0 {
                    if !buf.is_empty() {
                        tracing::debug!("peer closed mid request line");
                    }
                    return Ok(());
                }
            };

            let Some(line_end) = line_end else {
                let err = RequestLineError::TooLong {
                    limit: MAX_REQUEST_LINE_BYTES,
                };
                tracing::debug!(%err, "rejecting oversized request line");
                return respond(
                    &mut stream,
                    431,
                    "Request Header Fields Too Large",
                    err.to_string().as_bytes(),
                    true,
                )
                .await;
            };

            let line = match std::str::from_utf8(&buf[..line_end]) {
                Ok(line) => line,
                Err(_) => {
                    return respond(&mut stream, 400, "Bad Request", b"invalid utf-8", true).await;
                }
            };

            let request_line = match parser::parse_request_line(line) {
                Ok(request_line) => request_line,
                Err(err) => {
                    tracing::debug!(%err, "rejecting request");
                    return respond(&mut stream, 400, "Bad Request", err.to_string().as_bytes(), true)
                        .await;
                }
            };

            let (service_name, path) = match parser::split_service_path(&request_line.target) {
                Ok(split) => split,
                Err(err) => {
                    tracing::debug!(%err, "rejecting request");
                    return respond(&mut stream, 400, "Bad Request", err.to_string().as_bytes(), true)
                        .await;
                }
            };

            let mut ctx = RequestContext::new(service_name, request_line.method, path);

            let resolved = match self.resolver.resolve(&ctx.service_name, &ctx.method, &ctx.path) {
                Ok(resolved) => resolved,
                Err(err @ ResolveError::ServiceNotFound(_)) => {
                    tracing::warn!(%err, "resolution failed");
                    return respond(&mut stream, 404, "Not Found", err.to_string().as_bytes(), true)
                        .await;
                }
            };

            // The dispatcher owns the peer address, so the origin check
            // lives here rather than in the forwarder.
            if !origin_trusted(resolved.exposure, peer.ip()) {
                tracing::warn!(exposure = %resolved.exposure, "rejecting untrusted origin");
                return respond(
                    &mut stream,
                    403,
                    "Forbidden",
                    b"protected route: untrusted origin",
                    true,
                )
                .await;
            }

            ctx.annotate(resolved);

            match self.forwarder.forward(&ctx).await {
                Ok(response) => {
                    let close = !self.keep_alive;
                    respond(&mut stream, response.status, response.reason, &response.body, close)
                        .await?;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "forwarding failed");
                    return respond(&mut stream, 502, "Bad Gateway", err.to_string().as_bytes(), true)
                        .await;
                }
            }

            if !self.keep_alive {
                return Ok(());
            }
            // Keep-alive: anything buffered past the request line would be
            // headers/body for the external parser collaborator; this
            // dispatcher starts the next exchange from a clean buffer.
        }
    }
}

/// Whether a peer at `origin` may use a route with the given exposure.
/// `Protected` routes only accept loopback peers; everything else is an
/// untrusted network origin. Other exposure levels place no restriction on
/// the origin (`Private` is the auth collaborator's concern, not ours).
fn origin_trusted(exposure: Exposure, origin: IpAddr) -> bool {
    match exposure {
        Exposure::Protected => origin.is_loopback(),
        Exposure::Public | Exposure::Private => true,
    }
}

/// End of the first line (exclusive of the terminator), if one is buffered.
/// Accepts both `\r\n` and bare `\n`.
fn find_line_end(buf: &[u8]) -> Option<usize> {
    let newline = buf.iter().position(|&b| b == b'\n')?;
    if newline > 0 && buf[newline - 1] == b'\r' {
        Some(newline - 1)
    } else {
        Some(newline)
    }
}

/// Write a minimal HTTP/1.1 response. Only the framing the gateway itself
/// needs; upstream responses pass through the forwarder untouched.
async fn respond(
    stream: &mut TcpStream,
    status: u16,
    reason: &str,
    body: &[u8],
    close: bool,
) -> io::Result<()> {
    let connection = if close { "close" } else { "keep-alive" };
    let head = format!(
        "HTTP/1.1 {status} {reason}\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         Content-Length: {}\r\n\
         Connection: {connection}\r\n\r\n",
        body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(body).await?;
    stream.flush().await
}
