//! Gantry - a declarative API gateway.
//!
//! Gantry sits in front of a set of independently deployed microservices and
//! gives them one entry point with config-driven routing and access policy.
//! Two subsystems carry the design weight:
//!
//! * the **route resolution engine** ([`core::resolver`]) maps an incoming
//!   `(service, method, path)` triple to a forwarding target and an
//!   effective policy (exposure level, auth requirement), with dynamic
//!   `:`-variable path segments and first-match-wins scanning in declared
//!   order;
//! * the **connection dispatcher** ([`server::reactor`]) is a single-threaded,
//!   non-blocking reactor that multiplexes many client sockets, reads and
//!   parses only the request line, and drives each request through the
//!   resolver to the forwarding seam.
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use gantry::{adapters::EchoForwarder, config, core::RouteResolver, server::ConnectionServer};
//!
//! # fn main() -> eyre::Result<()> {
//! let store = Arc::new(config::load("config.txt")?);
//! let resolver = Arc::new(RouteResolver::new(store));
//! let server = Arc::new(ConnectionServer::new(resolver, Arc::new(EchoForwarder)));
//! // Bind a tokio TcpListener and call `server.run(listener)` on a
//! // current-thread runtime (see the binary crate).
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! Business logic lives in `core` over the immutable `config` store;
//! `ports` declares the seams to external collaborators (the upstream
//! forwarder) and `adapters` ships stand-in implementations. The `server`
//! module owns all socket I/O.
//!
//! # Error Handling
//! Domain errors are explicit `thiserror` enums; the binary wraps them with
//! `eyre` context. Setup failures are fatal, per-connection failures are
//! isolated to their connection.
pub mod adapters;
pub mod config;
pub mod core;
pub mod ports;
pub mod server;
pub mod tracing_setup;

pub use crate::{
    adapters::EchoForwarder,
    config::{ConfigStore, Exposure},
    core::{RequestContext, ResolveError, ResolvedRoute, RouteResolver},
    ports::{Forwarder, UpstreamResponse},
    server::ConnectionServer,
};
