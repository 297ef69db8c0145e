//! Console Channel
//!
//! Local REPL transport: each stdin line is one inbound message from a fixed
//! sender, replies go to stdout. Useful for trying the assistant without a
//! WhatsApp account.

use super::traits::*;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::info;

use crate::router::MessageRouter;

/// Writes replies to stdout
pub struct ConsoleChannel {
    stdout: Mutex<tokio::io::Stdout>,
}

impl ConsoleChannel {
    pub fn new() -> Self {
        Self {
            stdout: Mutex::new(tokio::io::stdout()),
        }
    }
}

impl Default for ConsoleChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ConsoleChannel {
    fn name(&self) -> &str {
        "console"
    }

    async fn send(&self, recipient: &str, text: &str) -> Result<String, ChannelError> {
        let line = format!("→ {}: {}\n", recipient, text);
        let mut stdout = self.stdout.lock().await;
        stdout
            .write_all(line.as_bytes())
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
        stdout
            .flush()
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))?;
        Ok(String::new())
    }
}

/// Turn one console line into an event. `/media` simulates an attachment.
pub fn parse_line(sender_id: &str, line: &str) -> InboundEvent {
    let line = line.trim();
    if line.eq_ignore_ascii_case("/media") {
        InboundEvent::media(sender_id)
    } else {
        InboundEvent::text(sender_id, line)
    }
}

/// Read stdin until EOF, handling each line in order
pub async fn run(router: Arc<MessageRouter>, sender_id: &str) -> Result<()> {
    info!("Console mode: chatting as {} (Ctrl-D to quit)", sender_id);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let event = parse_line(sender_id, &line);
        router.handle(event).await;
    }

    info!("Console input closed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        let event = parse_line("+1555", "  hello  ");
        assert_eq!(event.sender_id, "+1555");
        assert_eq!(event.text, "hello");
        assert!(!event.has_media_placeholder);

        let media = parse_line("+1555", "/MEDIA");
        assert!(media.has_media_placeholder);
        assert!(media.text.is_empty());

        assert!(parse_line("+1555", "   ").should_ignore());
    }
}
