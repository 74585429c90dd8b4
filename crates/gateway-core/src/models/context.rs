//! Transient per-request state threaded through one middleware chain.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Carries everything downstream middleware and the proxy executor need
/// about one in-flight request. Built once when the Router matches a
/// service and dropped when the response finishes.
#[derive(Clone)]
pub struct RequestContext {
    /// Name of the service this request was dispatched to.
    pub service_name: Arc<str>,

    /// Client identity for rate limiting: the API key if the auth
    /// middleware ran and accepted one, else the remote IP.
    pub client_id: String,

    /// Origin URL chosen by the Backend Selector for this request. `None`
    /// until the selector has run.
    pub selected_origin: Option<String>,

    /// Cancelled when the inbound client connection is dropped before the
    /// response finishes streaming.
    pub cancellation: CancellationToken,
}

impl RequestContext {
    pub fn new(service_name: Arc<str>, client_id: String) -> Self {
        Self {
            service_name,
            client_id,
            selected_origin: None,
            cancellation: CancellationToken::new(),
        }
    }
}
