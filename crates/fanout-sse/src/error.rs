//! Error types for the SSE hub.

use thiserror::Error;

/// Errors that can occur while serving an SSE connection.
///
/// Routing misses (unknown or departed clients) are not errors; the hub
/// absorbs them and only logs.
#[derive(Debug, Error)]
pub enum SseError {
    /// The registration middleware did not store a client for this request.
    #[error("SSE client not found in request scope")]
    ClientNotFound,

    /// The client stored for this request was already taken by another extractor.
    #[error("SSE client already taken for this request")]
    ClientTaken,

    /// Writing an event to the transport failed.
    #[error("failed to write event: {0}")]
    Write(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
