//! Frame acquisition.
//!
//! A [`FrameOpener`] turns a resolved media URL into a [`FrameSource`], which
//! hands out decoded frames one at a time. A read that yields no frame
//! (`Ok(None)`) is a transient hiccup the caller retries; an `Err` means the
//! source is unusable.

mod ffmpeg;

pub use ffmpeg::{FfmpegConfig, FfmpegFrameSource, FfmpegOpener};

use async_trait::async_trait;
use bytes::Bytes;
use stream_resolver::MediaUrl;
use thiserror::Error;

/// One decoded frame, packed RGB24.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Decode sequence number within the source, starting at 0. Sources that
    /// skip stale frames leave gaps.
    pub index: u64,
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
}

impl Frame {
    pub fn new(index: u64, width: u32, height: u32, data: Bytes) -> Self {
        Self {
            index,
            width,
            height,
            data,
        }
    }

    /// Byte length of a packed RGB24 frame of the given size.
    pub fn rgb24_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }
}

/// Frame source failures that end monitoring.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("failed to start decoder {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("stream ended: decoder restarted {restarts} times without producing a frame ({last_error})")]
    StreamEnded { restarts: u32, last_error: String },

    #[error("invalid frame source configuration: {0}")]
    InvalidConfig(String),
}

/// An open handle on a decoded stream.
#[async_trait]
pub trait FrameSource: Send {
    /// Read the next frame. `Ok(None)` means "nothing right now, retry".
    async fn read_frame(&mut self) -> Result<Option<Frame>, FrameError>;

    /// Release the underlying handle. Idempotent.
    async fn close(&mut self);
}

/// Opens frame sources for resolved streams.
#[async_trait]
pub trait FrameOpener: Send + Sync {
    async fn open(&self, media: &MediaUrl) -> Result<Box<dyn FrameSource>, FrameError>;
}
