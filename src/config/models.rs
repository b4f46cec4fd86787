//! Configuration data structures for Gantry.
//!
//! These types are the in-memory form of the line-oriented gateway config
//! (see [`crate::config::loader`]). Everything here is built once at startup
//! and read-only afterwards, so the whole store can be shared across the
//! dispatcher via `Arc` without locking.
use std::{collections::HashMap, fmt, str::FromStr, time::Duration};

use thiserror::Error;

/// Access classification for a service or an individual route.
///
/// * `Public`: no restriction.
/// * `Private`: requires an authentication check (the check itself is the
///   auth collaborator's job; the flag travels with the resolved route).
/// * `Protected`: restricted to trusted network origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Exposure {
    #[default]
    Public,
    Private,
    Protected,
}

/// Error when an exposure token is not one of the recognized values.
#[derive(Error, Debug, Clone)]
#[error("unknown exposure level: {0:?} (expected PUBLIC, PRIVATE or PROTECTED)")]
pub struct ExposureParseError(pub String);

impl FromStr for Exposure {
    type Err = ExposureParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PUBLIC" => Ok(Exposure::Public),
            "PRIVATE" => Ok(Exposure::Private),
            "PROTECTED" => Ok(Exposure::Protected),
            other => Err(ExposureParseError(other.to_string())),
        }
    }
}

impl fmt::Display for Exposure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Exposure::Public => write!(f, "PUBLIC"),
            Exposure::Private => write!(f, "PRIVATE"),
            Exposure::Protected => write!(f, "PROTECTED"),
        }
    }
}

/// A per-route policy override inside a service.
///
/// `path_pattern` is an ordered sequence of `/`-separated segments; a segment
/// starting with `:` is a variable that matches any single request segment.
/// `method` is compared exactly and case-sensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteRule {
    pub path_pattern: String,
    pub method: String,
    pub exposure: Exposure,
    pub auth_required: bool,
}

impl RouteRule {
    /// The pattern segments, empty ones dropped (so `//a//b` and `/a/b`
    /// describe the same shape).
    pub fn pattern_segments(&self) -> impl Iterator<Item = &str> {
        self.path_pattern.split('/').filter(|s| !s.is_empty())
    }
}

/// One backend microservice behind the gateway.
///
/// Routes are kept in the order they were declared; the resolver scans them
/// front to back and takes the first structural match, so declaration order
/// is the tie-break between overlapping patterns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub default_exposure: Exposure,
    pub default_auth_required: bool,
    pub routes: Vec<RouteRule>,
}

impl ServiceConfig {
    /// Insert or replace a route keyed by `(path_pattern, method)`.
    ///
    /// A re-definition overwrites the earlier rule *in place*, keeping its
    /// original scan position, so later config lines cannot silently reorder
    /// the first-match scan.
    pub fn upsert_route(&mut self, rule: RouteRule) {
        match self
            .routes
            .iter_mut()
            .find(|r| r.path_pattern == rule.path_pattern && r.method == rule.method)
        {
            Some(existing) => *existing = rule,
            None => self.routes.push(rule),
        }
    }
}

/// Gateway-level settings, read from key/value lines that appear before the
/// first `[section]` header in the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    /// TCP port the gateway listens on (`GATEWAY_PORT`). Required to serve.
    pub port: Option<u16>,
    /// Bind host (`GATEWAY_HOST`).
    pub host: String,
    /// Serve successive requests on one connection (`KEEP-ALIVE`). The
    /// baseline is one exchange per connection.
    ///
    /// Each exchange starts from a fresh read buffer: bytes a client sends
    /// past the request line (headers, body, or a pipelined second line in
    /// the same write) are dropped, and the next exchange begins with the
    /// next write. Clients must wait for the response before sending the
    /// next request line.
    pub keep_alive: bool,
    /// Evict connections idle for this long between reads (`IDLE-TIMEOUT`,
    /// e.g. `30s`). Absent means no eviction.
    pub idle_timeout: Option<Duration>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            port: None,
            host: "0.0.0.0".to_string(),
            keep_alive: false,
            idle_timeout: None,
        }
    }
}

impl GatewaySettings {
    /// The `host:port` string to bind, if a port was configured.
    pub fn bind_addr(&self) -> Option<String> {
        self.port.map(|p| format!("{}:{}", self.host, p))
    }
}

/// Immutable collection of service definitions plus gateway settings.
///
/// Built once by the loader and never mutated afterwards; readers on the
/// dispatch path share it through `Arc` with no synchronization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigStore {
    pub gateway: GatewaySettings,
    services: HashMap<String, ServiceConfig>,
}

impl ConfigStore {
    pub fn new(gateway: GatewaySettings, services: HashMap<String, ServiceConfig>) -> Self {
        Self { gateway, services }
    }

    /// Look up a service by its unique name.
    pub fn service(&self, name: &str) -> Option<&ServiceConfig> {
        self.services.get(name)
    }

    pub fn services(&self) -> impl Iterator<Item = &ServiceConfig> {
        self.services.values()
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
