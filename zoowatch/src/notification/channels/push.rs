//! Pushbullet push-note channel.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::AlertChannel;
use crate::Result;
use crate::notification::DeliveryError;
use crate::utils::http_client::{DEFAULT_REQUEST_TIMEOUT, build_alert_client};

const PUSHBULLET_PUSHES_URL: &str = "https://api.pushbullet.com/v2/pushes";

/// Pushbullet channel configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushbulletConfig {
    /// Access token from the Pushbullet account settings.
    #[serde(default)]
    pub api_key: String,
    /// Note title.
    #[serde(default = "default_title")]
    pub title: String,
}

fn default_title() -> String {
    "Zoowatch alert \u{1f99b}".to_string()
}

impl Default for PushbulletConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            title: default_title(),
        }
    }
}

impl PushbulletConfig {
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(crate::Error::config("Missing Pushbullet API key"));
        }
        Ok(())
    }
}

/// Pushbullet notification channel.
pub struct PushChannel {
    config: PushbulletConfig,
    client: Client,
}

impl PushChannel {
    pub fn new(config: PushbulletConfig) -> Self {
        Self {
            config,
            client: build_alert_client(DEFAULT_REQUEST_TIMEOUT),
        }
    }

    fn build_payload(&self, message: &str) -> serde_json::Value {
        json!({
            "type": "note",
            "title": self.config.title,
            "body": message,
        })
    }
}

#[async_trait]
impl AlertChannel for PushChannel {
    fn channel_type(&self) -> &'static str {
        "push"
    }

    async fn notify(&self, message: &str) -> std::result::Result<(), DeliveryError> {
        let response = self
            .client
            .post(PUSHBULLET_PUSHES_URL)
            .header("Access-Token", &self.config.api_key)
            .json(&self.build_payload(message))
            .send()
            .await
            .map_err(|e| DeliveryError::transport("pushbullet", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Pushbullet push failed: {} - {}", status, body);
            return Err(DeliveryError::Rejected {
                channel: "pushbullet",
                status: status.as_u16(),
                body,
            });
        }

        debug!("Push alert sent");
        Ok(())
    }
}
