//! Route resolution: mapping `(service, method, path)` to a forwarding
//! target and an effective access policy.
//!
//! Resolution is a pure read over the immutable [`ConfigStore`]. Routes are
//! scanned in their declared order and the first structural match wins; a
//! request with no matching route is not an error, it falls back to the
//! service-level defaults. This layer does no I/O, which keeps it trivially
//! testable in isolation.
use std::sync::Arc;

use thiserror::Error;

use crate::config::models::{ConfigStore, Exposure, RouteRule, ServiceConfig};

/// Errors from route resolution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResolveError {
    /// The addressed service name is absent from the store.
    #[error("service not found: {0}")]
    ServiceNotFound(String),
}

/// Result type alias for resolution.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// The outcome of resolution: where to forward and under what policy.
///
/// `Eq` is derived deliberately: two resolutions of the same request against
/// the same store must compare identical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    /// `http://host:port` + the original, unmodified request path. Variable
    /// segments are matching-only; they are never rewritten into the
    /// forwarded path.
    pub target_url: String,
    pub exposure: Exposure,
    pub auth_required: bool,
}

/// Resolves requests against a shared, read-only configuration store.
pub struct RouteResolver {
    store: Arc<ConfigStore>,
}

impl RouteResolver {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Resolve a request to its forwarding target and effective policy.
    ///
    /// Scans the service's routes in declared order; the first route whose
    /// method matches exactly and whose pattern structurally matches the
    /// path supplies the policy. With no match the service defaults apply.
    pub fn resolve(&self, service_name: &str, method: &str, path: &str) -> ResolveResult<ResolvedRoute> {
        let service = self
            .store
            .service(service_name)
            .ok_or_else(|| ResolveError::ServiceNotFound(service_name.to_string()))?;

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        for route in &service.routes {
            if route.method != method {
                continue;
            }
            if !pattern_matches(route, &segments) {
                continue;
            }
            tracing::debug!(
                service = service_name,
                method,
                path,
                pattern = %route.path_pattern,
                exposure = %route.exposure,
                auth_required = route.auth_required,
                "route matched"
            );
            return Ok(ResolvedRoute {
                target_url: target_url(service, path),
                exposure: route.exposure,
                auth_required: route.auth_required,
            });
        }

        tracing::debug!(
            service = service_name,
            method,
            path,
            exposure = %service.default_exposure,
            auth_required = service.default_auth_required,
            "no route matched; using service defaults"
        );
        Ok(ResolvedRoute {
            target_url: target_url(service, path),
            exposure: service.default_exposure,
            auth_required: service.default_auth_required,
        })
    }
}

/// Structural match: equal segment counts, `:`-prefixed pattern segments
/// match any single request segment, literals compare exactly.
fn pattern_matches(route: &RouteRule, request_segments: &[&str]) -> bool {
    let pattern: Vec<&str> = route.pattern_segments().collect();
    if pattern.len() != request_segments.len() {
        return false;
    }
    pattern
        .iter()
        .zip(request_segments)
        .all(|(pat, req)| pat.starts_with(':') || pat == req)
}

fn target_url(service: &ServiceConfig, path: &str) -> String {
    format!("http://{}:{}{}", service.host, service.port, path)
}
