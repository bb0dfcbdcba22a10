//! Alert channels.

mod console;
mod push;
mod sms;

pub use console::ConsoleChannel;
pub use push::{PushChannel, PushbulletConfig};
pub use sms::{SmsChannel, TwilioConfig};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::DeliveryError;
use crate::Result;

/// Trait for alert channels.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    /// Get the channel type name.
    fn channel_type(&self) -> &'static str;

    /// Deliver `message`. One outbound request per call for network channels.
    async fn notify(&self, message: &str) -> std::result::Result<(), DeliveryError>;
}

/// Channel configuration wrapper.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChannelConfig {
    /// Console log line.
    #[default]
    Log,
    /// Twilio SMS.
    Sms(TwilioConfig),
    /// Pushbullet note.
    Push(PushbulletConfig),
}

impl ChannelConfig {
    /// Get the channel type name.
    pub fn channel_type(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Sms(_) => "sms",
            Self::Push(_) => "push",
        }
    }

    /// Check that every credential the channel needs is present.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Log => Ok(()),
            Self::Sms(c) => c.validate(),
            Self::Push(c) => c.validate(),
        }
    }
}

/// Build the channel described by `config`.
pub fn build_channel(config: &ChannelConfig) -> Result<Arc<dyn AlertChannel>> {
    config.validate()?;
    let channel: Arc<dyn AlertChannel> = match config {
        ChannelConfig::Log => Arc::new(ConsoleChannel::new()),
        ChannelConfig::Sms(c) => Arc::new(SmsChannel::new(c.clone())),
        ChannelConfig::Push(c) => Arc::new(PushChannel::new(c.clone())),
    };
    Ok(channel)
}
