//! Stand-in forwarder adapter.
//!
//! The real upstream relay is an external collaborator; this adapter keeps
//! the gateway runnable end to end by answering the client with the routing
//! decision itself. Swap it for a real client implementation of the
//! [`Forwarder`] port to actually proxy bytes.
use async_trait::async_trait;

use crate::{
    core::RequestContext,
    ports::forwarder::{ForwardError, ForwardResult, Forwarder, UpstreamResponse},
};

/// Answers every resolved request with a plain-text summary of where it
/// would have been forwarded and under which policy.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoForwarder;

#[async_trait]
impl Forwarder for EchoForwarder {
    async fn forward(&self, ctx: &RequestContext) -> ForwardResult<UpstreamResponse> {
        let resolution = ctx.resolution.as_ref().ok_or(ForwardError::Unresolved)?;

        tracing::info!(
            service = %ctx.service_name,
            method = %ctx.method,
            path = %ctx.path,
            target = %resolution.target_url,
            exposure = %resolution.exposure,
            auth_required = resolution.auth_required,
            "forwarding resolved request"
        );

        let body = format!(
            "{} {} -> {} (exposure={}, auth={})\n",
            ctx.method,
            ctx.path,
            resolution.target_url,
            resolution.exposure,
            resolution.auth_required,
        );
        Ok(UpstreamResponse::ok(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::Exposure, core::ResolvedRoute};

    #[tokio::test]
    async fn echoes_the_routing_decision() {
        let mut ctx = RequestContext::new(
            "order-service".to_string(),
            "GET".to_string(),
            "/orders/42".to_string(),
        );
        ctx.annotate(ResolvedRoute {
            target_url: "http://127.0.0.1:5002/orders/42".to_string(),
            exposure: Exposure::Private,
            auth_required: true,
        });

        let response = EchoForwarder.forward(&ctx).await.unwrap();
        assert_eq!(response.status, 200);
        let body = String::from_utf8(response.body).unwrap();
        assert!(body.contains("http://127.0.0.1:5002/orders/42"));
        assert!(body.contains("exposure=PRIVATE"));
    }

    #[tokio::test]
    async fn unresolved_context_is_rejected() {
        let ctx = RequestContext::new("svc".to_string(), "GET".to_string(), "/x".to_string());
        let err = EchoForwarder.forward(&ctx).await.unwrap_err();
        assert!(matches!(err, ForwardError::Unresolved));
    }
}
