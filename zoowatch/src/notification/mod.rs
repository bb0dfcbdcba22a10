//! Alert delivery.
//!
//! An alert is one human-readable line sent to one destination. Channels:
//!
//! - console (`[ALERT] ...` on stdout)
//! - SMS through the Twilio REST API
//! - push notes through the Pushbullet API
//!
//! Channels never retry; the monitor logs a failed delivery and keeps watching.
//!
//! # Example
//!
//! ```ignore
//! use zoowatch::notification::{ChannelConfig, build_channel};
//!
//! let channel = build_channel(&ChannelConfig::Log)?;
//! channel.notify("hippopotamus detected").await?;
//! ```

pub mod channels;

pub use channels::{
    AlertChannel, ChannelConfig, ConsoleChannel, PushChannel, PushbulletConfig, SmsChannel,
    TwilioConfig, build_channel,
};

use thiserror::Error;

/// Failure to hand an alert to its transport.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("{channel} request failed: {message}")]
    Transport {
        channel: &'static str,
        message: String,
    },
    #[error("{channel} rejected the alert: {status} - {body}")]
    Rejected {
        channel: &'static str,
        status: u16,
        body: String,
    },
}

impl DeliveryError {
    pub fn transport(channel: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            channel,
            message: err.to_string(),
        }
    }
}
