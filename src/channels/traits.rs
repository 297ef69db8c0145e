//! Channel Trait Definitions
//!
//! What the router needs from a messaging transport: inbound events in,
//! plain-text sends out.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Error types for channel operations
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Rate limited: retry after {0} seconds")]
    RateLimited(u64),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// One inbound chat message, transport-neutral
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Sender identifier, normalized with `normalize_sender_id`
    pub sender_id: String,

    /// Sender display name, when the platform supplies one
    pub sender_name: Option<String>,

    /// Message text (may be empty for media)
    pub text: String,

    /// Echo of our own outbound message
    pub is_from_self: bool,

    /// Attachment without text (image, audio, sticker...)
    pub has_media_placeholder: bool,
}

impl InboundEvent {
    /// Create a simple text message
    pub fn text(sender_id: &str, text: &str) -> Self {
        Self {
            sender_id: sender_id.to_string(),
            sender_name: None,
            text: text.to_string(),
            is_from_self: false,
            has_media_placeholder: false,
        }
    }

    /// Create a media-only message
    pub fn media(sender_id: &str) -> Self {
        Self {
            has_media_placeholder: true,
            ..Self::text(sender_id, "")
        }
    }

    /// Echoes and events with neither text nor media are dropped
    pub fn should_ignore(&self) -> bool {
        self.is_from_self || (self.text.trim().is_empty() && !self.has_media_placeholder)
    }
}

/// One canonical form for WhatsApp identities: `whatsapp:` prefixes and the
/// `@s.whatsapp.net` JID suffix are dropped, bare digits become `+<digits>`.
/// Anything else (e.g. the console sender) passes through trimmed.
pub fn normalize_sender_id(id: &str) -> String {
    let id = id.trim();
    let id = id.strip_prefix("whatsapp:").unwrap_or(id);
    let id = id.strip_suffix("@s.whatsapp.net").unwrap_or(id);

    if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
        format!("+{}", id)
    } else {
        id.to_string()
    }
}

/// Outbound side of a messaging channel
#[async_trait]
pub trait Transport: Send + Sync {
    /// Channel name identifier
    fn name(&self) -> &str;

    /// Send plain text; returns the platform message id
    async fn send(&self, recipient: &str, text: &str) -> Result<String, ChannelError>;
}
