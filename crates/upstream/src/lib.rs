//! HTTP clients for the services the broker depends on.
//!
//! - [`allocator`] -- the fleet allocator REST endpoint ([`ClusterAllocator`]).
//! - [`characters`] -- the character service ([`HttpCharacterDirectory`]).

pub mod allocator;
pub mod characters;

pub use allocator::ClusterAllocator;
pub use characters::HttpCharacterDirectory;

/// Errors shared by the REST clients in this crate.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The upstream returned a non-2xx status code.
    #[error("Upstream API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

/// Return the response unchanged on success, or an [`UpstreamError::Api`]
/// carrying the status and body text on failure.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, UpstreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(UpstreamError::Api {
        status: status.as_u16(),
        body,
    })
}
