//! Twilio SMS channel.
//!
//! Sends the alert text as an SMS through the Twilio Messages API
//! (`POST /2010-04-01/Accounts/<sid>/Messages.json`, form encoded, basic auth).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::AlertChannel;
use crate::Result;
use crate::notification::DeliveryError;
use crate::utils::http_client::{DEFAULT_REQUEST_TIMEOUT, build_alert_client};

const TWILIO_API_BASE: &str = "https://api.twilio.com";

/// Twilio's hard limit for a single message body.
const SMS_BODY_LIMIT: usize = 1600;

/// Twilio channel configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TwilioConfig {
    /// Account SID (`AC...`).
    #[serde(default)]
    pub account_sid: String,
    /// Auth token paired with the account SID.
    #[serde(default)]
    pub auth_token: String,
    /// Sending number in E.164 form.
    #[serde(default)]
    pub from_number: String,
    /// Receiving number in E.164 form.
    #[serde(default)]
    pub to_number: String,
}

impl TwilioConfig {
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("account_sid", &self.account_sid),
            ("auth_token", &self.auth_token),
            ("from_number", &self.from_number),
            ("to_number", &self.to_number),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(crate::Error::config(format!(
                "Missing required Twilio configuration: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Twilio SMS channel.
pub struct SmsChannel {
    config: TwilioConfig,
    client: Client,
}

impl SmsChannel {
    pub fn new(config: TwilioConfig) -> Self {
        Self {
            config,
            client: build_alert_client(DEFAULT_REQUEST_TIMEOUT),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{TWILIO_API_BASE}/2010-04-01/Accounts/{}/Messages.json",
            self.config.account_sid
        )
    }

    fn build_form(&self, message: &str) -> [(&'static str, String); 3] {
        let body: String = message.chars().take(SMS_BODY_LIMIT).collect();
        [
            ("To", self.config.to_number.clone()),
            ("From", self.config.from_number.clone()),
            ("Body", body),
        ]
    }
}

#[async_trait]
impl AlertChannel for SmsChannel {
    fn channel_type(&self) -> &'static str {
        "sms"
    }

    async fn notify(&self, message: &str) -> std::result::Result<(), DeliveryError> {
        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&self.build_form(message))
            .send()
            .await
            .map_err(|e| DeliveryError::transport("twilio", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Twilio message failed: {} - {}", status, body);
            return Err(DeliveryError::Rejected {
                channel: "twilio",
                status: status.as_u16(),
                body,
            });
        }

        debug!(to = %self.config.to_number, "SMS alert sent");
        Ok(())
    }
}
