//! Messaging Channels
//!
//! Transports the router can talk through:
//! - WhatsApp (Twilio webhook + REST)
//! - Console (stdin/stdout, local testing)
//!
//! Each channel implements the `Transport` trait for outbound text; inbound
//! traffic is normalized into `InboundEvent` before reaching the router.

pub mod console;
pub mod traits;
pub mod whatsapp;

pub use console::ConsoleChannel;
pub use traits::{normalize_sender_id, ChannelError, InboundEvent, Transport};
pub use whatsapp::{TwilioWebhookData, WhatsAppChannel, WhatsAppConfig};

/// Supported channel types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelType {
    WhatsApp,
    Console,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WhatsApp => "whatsapp",
            Self::Console => "console",
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
