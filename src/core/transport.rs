//! Transport abstraction for executing API calls.

use async_trait::async_trait;

use crate::core::error::TransportError;
use crate::core::task::SerializedRequest;
use crate::util::serde::ResponseBody;

/// Executes a request against the remote API.
///
/// Called synchronously from pipeline worker threads, never from the caller's
/// thread. Implementations embed their own timeout and report it as
/// [`TransportError::Retryable`].
pub trait Transport: Send + Sync {
    /// Send `request` using its method, path, body, target key and captured auth
    /// token, and return the response document.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] classified as retryable, permanent or auth refresh.
    fn execute(&self, request: &SerializedRequest) -> Result<ResponseBody, TransportError>;
}

/// Async flavour of [`Transport`] for hosts built on an async HTTP client.
///
/// Bridge it into the pipeline with `runtime::TokioTransport`.
#[async_trait]
pub trait AsyncTransport: Send + Sync + 'static {
    /// Send `request` and return the response document.
    ///
    /// # Errors
    ///
    /// Returns a classified [`TransportError`].
    async fn execute(&self, request: &SerializedRequest) -> Result<ResponseBody, TransportError>;
}

/// Map an HTTP status and response document onto the pipeline's outcome classes.
///
/// - 2xx: success (a missing body becomes `null`)
/// - 401: auth refresh, retried after credentials are renewed
/// - 408, 429 and 5xx: retryable
/// - any other status: permanent
///
/// # Errors
///
/// Returns the classified [`TransportError`] for every non-2xx status.
pub fn classify_response(status: u16, body: Option<ResponseBody>) -> Result<ResponseBody, TransportError> {
    match status {
        200..=299 => Ok(body.unwrap_or(ResponseBody::Null)),
        401 => Err(TransportError::AuthRefresh {
            reason: "credentials rejected".into(),
        }),
        408 | 429 | 500..=599 => Err(TransportError::Retryable {
            reason: format!("server returned {status}"),
            status: Some(status),
        }),
        _ => Err(TransportError::Permanent {
            status,
            reason: format!("server returned {status}"),
            body,
        }),
    }
}
