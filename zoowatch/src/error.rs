//! Application-wide error types.

use stream_resolver::ResolveError;
use thiserror::Error;

use crate::detector::ModelError;
use crate::frames::FrameError;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Stream unavailable: {0}")]
    StreamUnavailable(#[source] ResolveError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Frame source error: {0}")]
    Frame(#[from] FrameError),

    #[error("Config file error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

impl From<ResolveError> for Error {
    fn from(err: ResolveError) -> Self {
        Self::StreamUnavailable(err)
    }
}
