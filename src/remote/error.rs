//! Error types for the remote sender.

use thiserror::Error;

/// Errors that can occur sending a batch update to the remote endpoint.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RemoteError {
    /// The configured endpoint is not a usable URL. Configuration-time,
    /// surfaced synchronously at client construction.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// HTTP transport failed.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The response body could not be parsed.
    #[error("Failed to parse response: {0}")]
    Json(String),
}
