use async_trait::async_trait;

use super::AlertChannel;
use crate::notification::DeliveryError;

const ALERT_PREFIX: &str = "[ALERT]";

/// Prints alerts to stdout.
#[derive(Debug, Default, Clone)]
pub struct ConsoleChannel;

impl ConsoleChannel {
    pub fn new() -> Self {
        Self
    }

    fn format_line(message: &str) -> String {
        format!("{ALERT_PREFIX} {message}")
    }
}

#[async_trait]
impl AlertChannel for ConsoleChannel {
    fn channel_type(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, message: &str) -> Result<(), DeliveryError> {
        println!("{}", Self::format_line(message));
        Ok(())
    }
}
