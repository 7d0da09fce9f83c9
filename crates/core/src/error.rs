//! Errors raised by the live paths of the pipeline services.
//!
//! These errors never cross the HTTP boundary: every live-path failure is absorbed by
//! the corresponding deterministic fallback. They exist so the services can log why a
//! fallback was taken.

/// Errors from calls to the hosted model or the extraction API.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// The outbound HTTP request failed (unreachable, timed out, non-2xx status).
    #[error("request to upstream service failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The upstream service answered but the payload could not be used.
    #[error("upstream service returned a malformed payload: {0}")]
    Payload(String),

    /// The OAuth token endpoint did not yield a usable access token.
    #[error("could not obtain an access token: {0}")]
    Auth(String),
}

pub type UpstreamResult<T> = std::result::Result<T, UpstreamError>;
