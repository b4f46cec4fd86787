//! Port for forwarding a resolved request to its upstream service.
use async_trait::async_trait;
use thiserror::Error;

use crate::core::RequestContext;

/// Custom error type for upstream forwarding operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ForwardError {
    /// Error when the upstream target cannot be reached
    #[error("upstream unreachable: {target}")]
    Unreachable { target: String },

    /// Error when the upstream did not answer in time
    #[error("upstream timed out after {0} seconds")]
    Timeout(u64),

    /// Error when the context was handed over without a resolution
    #[error("request context carries no resolved route")]
    Unresolved,
}

/// Result type alias for forwarding operations.
pub type ForwardResult<T> = Result<T, ForwardError>;

/// A response produced on behalf of the upstream, ready to be written back
/// to the client by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub reason: &'static str,
    pub body: Vec<u8>,
}

impl UpstreamResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            reason: "OK",
            body: body.into(),
        }
    }
}

/// Forwarder defines the port (interface) for relaying a resolved request
/// to its backend service and producing the client-facing response.
///
/// The byte-level relay itself is an external concern; the gateway core only
/// guarantees that the context arrives annotated with a [`ResolvedRoute`]
/// (target URL, exposure, auth flag) before this trait is invoked.
///
/// [`ResolvedRoute`]: crate::core::ResolvedRoute
#[async_trait]
pub trait Forwarder: Send + Sync + 'static {
    /// Forward a resolved request and return the response for the client.
    async fn forward(&self, ctx: &RequestContext) -> ForwardResult<UpstreamResponse>;
}
