//! WhatsApp Channel Implementation
//!
//! Uses the Twilio WhatsApp API for message delivery. Inbound messages
//! arrive on the webhook server (`server` module) as Twilio form posts.
//!
//! # Configuration
//!
//! Environment variables:
//! - `TWILIO_ACCOUNT_SID`: Twilio account SID
//! - `TWILIO_AUTH_TOKEN`: Twilio auth token
//! - `TWILIO_WHATSAPP_NUMBER`: Your Twilio WhatsApp number (e.g., +14155238886)
//!
//! # Webhook Setup
//!
//! Configure Twilio webhook to POST to: `https://your-domain.com/whatsapp/webhook`

use super::traits::*;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// WhatsApp message limit
const MAX_MESSAGE_LENGTH: usize = 4096;

/// WhatsApp channel configuration
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    /// Twilio Account SID
    pub account_sid: String,
    /// Twilio Auth Token
    pub auth_token: String,
    /// Twilio WhatsApp number (with country code)
    pub whatsapp_number: String,
    /// Maximum message length
    pub max_message_length: usize,
}

impl WhatsAppConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            account_sid: std::env::var("TWILIO_ACCOUNT_SID")
                .map_err(|_| anyhow::anyhow!("TWILIO_ACCOUNT_SID not set"))?,
            auth_token: std::env::var("TWILIO_AUTH_TOKEN")
                .map_err(|_| anyhow::anyhow!("TWILIO_AUTH_TOKEN not set"))?,
            whatsapp_number: std::env::var("TWILIO_WHATSAPP_NUMBER")
                .map_err(|_| anyhow::anyhow!("TWILIO_WHATSAPP_NUMBER not set"))?,
            max_message_length: MAX_MESSAGE_LENGTH,
        })
    }
}

/// WhatsApp channel implementation
pub struct WhatsAppChannel {
    config: WhatsAppConfig,
    client: reqwest::Client,
}

impl WhatsAppChannel {
    pub fn new(config: WhatsAppConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Create from environment
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(WhatsAppConfig::from_env()?))
    }

    /// Verify Twilio credentials with a cheap account lookup
    pub async fn verify(&self) -> Result<(), ChannelError> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}.json",
            self.config.account_sid
        );

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .send()
            .await
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;

        if response.status().is_success() {
            info!("WhatsApp channel connected via Twilio");
            Ok(())
        } else {
            Err(ChannelError::AuthenticationFailed(
                "Invalid Twilio credentials".to_string(),
            ))
        }
    }

    /// Parse incoming Twilio webhook request
    pub fn parse_webhook(&self, form_data: &TwilioWebhookData) -> InboundEvent {
        let sender_id = normalize_sender_id(&form_data.from);
        let is_from_self = sender_id == normalize_sender_id(&self.config.whatsapp_number);

        if form_data.num_media > 0 {
            debug!(
                "{} media item(s) from {}: {}",
                form_data.num_media,
                sender_id,
                form_data.media_url_0.as_deref().unwrap_or("-")
            );
        }

        InboundEvent {
            sender_id,
            sender_name: form_data.profile_name.clone(),
            text: form_data.body.trim().to_string(),
            is_from_self,
            has_media_placeholder: form_data.num_media > 0,
        }
    }

    /// Send one message via Twilio API
    async fn send_twilio_message(&self, to: &str, body: &str) -> Result<String, ChannelError> {
        if to.trim().is_empty() {
            return Err(ChannelError::InvalidRecipient(to.to_string()));
        }

        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.config.account_sid
        );

        let to_formatted = format!("whatsapp:{}", strip_channel_prefix(to));
        let from_formatted = format!("whatsapp:{}", strip_channel_prefix(&self.config.whatsapp_number));

        let form = [
            ("From", from_formatted.as_str()),
            ("To", to_formatted.as_str()),
            ("Body", body),
        ];

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;

        if response.status().is_success() {
            let result: TwilioMessageResponse = response
                .json()
                .await
                .map_err(|e| ChannelError::Internal(e.to_string()))?;
            Ok(result.sid)
        } else {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                Err(ChannelError::RateLimited(60))
            } else {
                Err(ChannelError::SendFailed(format!(
                    "Twilio error {}: {}",
                    status, error_text
                )))
            }
        }
    }

    /// Split long messages into chunks (UTF-8 safe)
    fn split_message(&self, content: &str) -> Vec<String> {
        let max_len = self.config.max_message_length;
        if content.chars().count() <= max_len {
            return vec![content.to_string()];
        }

        let mut chunks = Vec::new();
        let mut current = String::new();

        for line in content.lines() {
            if current.chars().count() + line.chars().count() + 1 > max_len {
                if !current.is_empty() {
                    chunks.push(std::mem::take(&mut current));
                }

                // Handle lines longer than max
                if line.chars().count() > max_len {
                    let chars: Vec<char> = line.chars().collect();
                    chunks.extend(chars.chunks(max_len).map(|c| c.iter().collect::<String>()));
                } else {
                    current = line.to_string();
                }
            } else {
                if !current.is_empty() {
                    current.push('\n');
                }
                current.push_str(line);
            }
        }

        if !current.is_empty() {
            chunks.push(current);
        }

        chunks
    }
}

#[async_trait]
impl Transport for WhatsAppChannel {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn send(&self, recipient: &str, text: &str) -> Result<String, ChannelError> {
        let chunks = self.split_message(text);
        let mut last_id = String::new();

        for (i, chunk) in chunks.iter().enumerate() {
            last_id = self.send_twilio_message(recipient, chunk).await?;

            // Small delay between chunks to maintain order
            if i < chunks.len() - 1 {
                tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            }
        }

        debug!("Sent {} chunk(s) to {}", chunks.len(), recipient);
        Ok(last_id)
    }
}

fn strip_channel_prefix(id: &str) -> &str {
    id.trim().trim_start_matches("whatsapp:")
}

/// Twilio webhook incoming data
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TwilioWebhookData {
    pub message_sid: String,
    pub account_sid: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub num_media: u32,
    pub media_url_0: Option<String>,
    pub profile_name: Option<String>,
}

/// Twilio API response
#[derive(Debug, Deserialize)]
struct TwilioMessageResponse {
    sid: String,
}
