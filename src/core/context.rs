//! Per-request state carried through the dispatch pipeline.
use std::collections::HashMap;

use crate::core::resolver::ResolvedRoute;

/// One inbound request on its way from the dispatcher to the forwarder.
///
/// The dispatcher creates a context from the parsed request line, the
/// resolver annotates it exactly once with the routing outcome, and the
/// forwarder consumes it. Contexts are never shared between connections,
/// so they need no synchronization.
///
/// `headers` and `body` stay empty here: everything past the request line
/// belongs to the external header/body parser collaborator.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Backend service the request addresses (first path segment of the
    /// request target, e.g. `order-service` in `/order-service/orders/42`).
    pub service_name: String,
    /// HTTP method token, exactly as received.
    pub method: String,
    /// Service-relative path, raw and unmodified (e.g. `/orders/42`).
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    /// Routing outcome, written once by the resolver.
    pub resolution: Option<ResolvedRoute>,
}

impl RequestContext {
    pub fn new(service_name: String, method: String, path: String) -> Self {
        Self {
            service_name,
            method,
            path,
            ..Self::default()
        }
    }

    /// Record the routing outcome. Intended to be called exactly once.
    pub fn annotate(&mut self, resolution: ResolvedRoute) {
        debug_assert!(self.resolution.is_none(), "context annotated twice");
        self.resolution = Some(resolution);
    }

    /// The resolved forwarding target, if resolution has run.
    pub fn target_url(&self) -> Option<&str> {
        self.resolution.as_ref().map(|r| r.target_url.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Exposure;

    #[test]
    fn annotate_records_the_outcome() {
        let mut ctx = RequestContext::new(
            "order-service".to_string(),
            "GET".to_string(),
            "/orders/42".to_string(),
        );
        assert!(ctx.target_url().is_none());

        ctx.annotate(ResolvedRoute {
            target_url: "http://127.0.0.1:5002/orders/42".to_string(),
            exposure: Exposure::Private,
            auth_required: true,
        });

        assert_eq!(ctx.target_url(), Some("http://127.0.0.1:5002/orders/42"));
    }
}
