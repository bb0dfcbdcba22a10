use thiserror::Error;

/// Failures while resolving a stream.
///
/// "No broadcast right now" is deliberately absent: it is reported as
/// [`crate::Resolution::NotLive`].
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid stream identifier: {0}")]
    InvalidIdentifier(String),
    #[error("failed to run resolver: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("network error: {0}")]
    Network(String),
    #[error("stream not found: {0}")]
    NotFound(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no playable media url in resolver output")]
    NoMediaUrl,
    #[error("other: {0}")]
    Other(String),
}
