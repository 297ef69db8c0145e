//! Message Router
//!
//! Decides, for each inbound message, between a command, a template and a
//! model reply, and keeps the store in step:
//!
//! 1. Drop echoes and empty events
//! 2. Persist the inbound turn
//! 3. Extract name/company (first write wins)
//! 4. Commands
//! 5. Mode branch: away → busy, work → shortcuts, assistant → classifiers then AI
//! 6. Persist the reply, then send it
//! 7. Urgent messages from contacts are forwarded to the owner
//!
//! Failures after step 2 become the apology reply; nothing here takes the
//! process down.

use anyhow::Result;
use rand::Rng;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::assistant::{ReplyGenerator, ReplyRequest, HISTORY_TURNS};
use crate::channels::{normalize_sender_id, InboundEvent, Transport};
use crate::classify;
use crate::commands::{self, Command, CommandContext};
use crate::config::Config;
use crate::extract::extract;
use crate::persona::Persona;
use crate::store::{short_id, Role, Store, StoredMessage};
use crate::templates;
use crate::text::truncate_chars;

/// Stored body for attachment-only messages
pub const MEDIA_PLACEHOLDER: &str = "[media]";

/// Owner messages shorter than this get no AI follow-up in work mode
pub const WORK_FOLLOWUP_MIN_CHARS: usize = 20;

/// Process-wide behavior switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum OperatingMode {
    /// Templates and AI replies
    #[default]
    Assistant = 0,
    /// Keyword shortcuts only
    Work = 1,
    /// Busy template only
    Away = 2,
}

impl From<u8> for OperatingMode {
    fn from(v: u8) -> Self {
        match v {
            1 => OperatingMode::Work,
            2 => OperatingMode::Away,
            _ => OperatingMode::Assistant,
        }
    }
}

impl OperatingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperatingMode::Assistant => "assistant",
            OperatingMode::Work => "work",
            OperatingMode::Away => "away",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "assistant" => Some(OperatingMode::Assistant),
            "work" => Some(OperatingMode::Work),
            "away" => Some(OperatingMode::Away),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic holder for the operating mode; not persisted
#[derive(Debug, Default)]
pub struct ModeCell(AtomicU8);

impl ModeCell {
    pub fn new(mode: OperatingMode) -> Self {
        Self(AtomicU8::new(mode as u8))
    }

    pub fn get(&self) -> OperatingMode {
        OperatingMode::from(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, mode: OperatingMode) {
        self.0.store(mode as u8, Ordering::SeqCst);
    }
}

/// Router settings
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Owner identifier; empty disables owner commands and notifications
    pub owner_id: String,
    pub command_prefix: char,
    /// Humanization delay bounds in milliseconds
    pub reply_delay_ms: (u64, u64),
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            owner_id: String::new(),
            command_prefix: '!',
            reply_delay_ms: (1200, 2800),
        }
    }
}

impl RouterConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            owner_id: config.owner_id.clone(),
            command_prefix: config.command_prefix,
            reply_delay_ms: config.reply_delay_ms,
        }
    }
}

/// Per-message orchestrator
pub struct MessageRouter {
    store: Arc<Store>,
    generator: Arc<dyn ReplyGenerator>,
    transport: Arc<dyn Transport>,
    persona: Persona,
    config: RouterConfig,
    mode: ModeCell,
}

impl MessageRouter {
    pub fn new(
        store: Arc<Store>,
        generator: Arc<dyn ReplyGenerator>,
        transport: Arc<dyn Transport>,
        persona: Persona,
        config: RouterConfig,
    ) -> Arc<Self> {
        let config = RouterConfig {
            owner_id: normalize_sender_id(&config.owner_id),
            ..config
        };
        Arc::new(Self {
            store,
            generator,
            transport,
            persona,
            config,
            mode: ModeCell::default(),
        })
    }

    pub fn mode(&self) -> OperatingMode {
        self.mode.get()
    }

    pub fn is_owner(&self, sender: &str) -> bool {
        !self.config.owner_id.is_empty() && normalize_sender_id(sender) == self.config.owner_id
    }

    /// Handle one inbound event; returns the reply that was sent, if any
    pub async fn handle(self: &Arc<Self>, event: InboundEvent) -> Option<String> {
        if event.should_ignore() {
            debug!("Ignoring event from {}", short_id(&event.sender_id));
            return None;
        }

        let sender = event.sender_id.as_str();
        let text = event.text.trim();
        let body = if text.is_empty() { MEDIA_PLACEHOLDER } else { text };

        info!(
            "Message from {}: {}",
            short_id(sender),
            truncate_chars(body, 60)
        );

        let reply = match self.store.append_message(sender, Role::User, body) {
            Ok(_) => match self.route(&event).await {
                Ok(reply) => reply,
                Err(e) => {
                    error!("Routing failed for {}: {:#}", short_id(sender), e);
                    templates::apology(&self.persona)
                }
            },
            Err(e) => {
                error!("Failed to persist inbound message from {}: {}", short_id(sender), e);
                templates::apology(&self.persona)
            }
        };

        self.deliver(sender, &reply).await;

        if classify::is_urgent(text) && !self.is_owner(sender) {
            self.notify_owner(sender, text).await;
        }

        Some(reply)
    }

    async fn route(self: &Arc<Self>, event: &InboundEvent) -> Result<String> {
        let sender = event.sender_id.as_str();
        let text = event.text.trim();

        self.remember(event)?;

        if classify::is_command(text, self.config.command_prefix) {
            if let Some(command) = Command::parse(text, self.config.command_prefix) {
                return self.run_command(sender, &command);
            }
        }

        let mode = self.mode.get();

        if text.is_empty() {
            return Ok(match mode {
                OperatingMode::Away => templates::busy(&self.persona),
                _ => templates::media_received(&self.persona),
            });
        }

        match mode {
            OperatingMode::Away => Ok(templates::busy(&self.persona)),
            OperatingMode::Work => self.work_reply(sender, text),
            OperatingMode::Assistant => self.assistant_reply(sender, text).await,
        }
    }

    /// Extracted identity plus platform profile data
    fn remember(&self, event: &InboundEvent) -> Result<()> {
        let sender = event.sender_id.as_str();
        let extracted = extract(&event.text);

        if !extracted.is_empty() {
            debug!("Extracted from {}: {:?}", short_id(sender), extracted);
            self.store
                .record_identity(sender, extracted.name.as_deref(), extracted.company.as_deref())?;
            if let Some(name) = &extracted.name {
                self.store.set_fact(sender, "name", name)?;
            }
            if let Some(company) = &extracted.company {
                self.store.set_fact(sender, "company", company)?;
            }
        }

        if let Some(profile) = event.sender_name.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let mut partial = Map::new();
            partial.insert("profile_name".to_string(), Value::String(profile.to_string()));
            self.store.merge_context(sender, partial)?;
        }

        Ok(())
    }

    fn run_command(&self, sender: &str, command: &Command) -> Result<String> {
        info!("Command from {}: {:?}", short_id(sender), command);
        let ctx = CommandContext {
            persona: &self.persona,
            store: &self.store,
            mode: &self.mode,
            prefix: self.config.command_prefix,
            is_owner: self.is_owner(sender),
            cache: self.generator.cache_stats(),
        };
        commands::execute(command, &ctx)
    }

    fn work_reply(self: &Arc<Self>, sender: &str, text: &str) -> Result<String> {
        let reply = match classify::work_shortcut(text) {
            Some(shortcut) => templates::work_shortcut(&self.persona, shortcut),
            None => templates::focus_mode(&self.persona),
        };

        if self.is_owner(sender) && text.chars().count() >= WORK_FOLLOWUP_MIN_CHARS {
            // Snapshot before the focus reply lands in history
            let history = self.prior_turns(sender, HISTORY_TURNS)?;
            let router = Arc::clone(self);
            let sender = sender.to_string();
            let text = text.to_string();
            tokio::spawn(async move {
                match router.generate_with_history(&sender, &text, &history).await {
                    Ok(followup) => router.deliver(&sender, &followup).await,
                    Err(e) => warn!("Work-mode follow-up failed: {:#}", e),
                }
            });
        }

        Ok(reply)
    }

    async fn assistant_reply(&self, sender: &str, text: &str) -> Result<String> {
        let history = self.prior_turns(sender, HISTORY_TURNS)?;

        if let Some(intent) = classify::classify(text, history.len()) {
            debug!("Template reply for {}: {:?}", short_id(sender), intent);
            let contact = self.store.get_or_create_contact(sender)?;
            return Ok(templates::render(
                intent,
                contact.display_name.as_deref(),
                &self.persona,
            ));
        }

        let reply = self.generate_with_history(sender, text, &history).await?;
        self.humanize_delay().await;
        Ok(reply)
    }

    async fn generate_with_history(
        &self,
        sender: &str,
        text: &str,
        history: &[StoredMessage],
    ) -> Result<String> {
        let context = self.store.get_or_create_contact(sender)?.context_record();
        let request = ReplyRequest {
            contact: sender,
            message: text,
            history,
            context: &context,
        };
        Ok(self.generator.generate(request).await)
    }

    /// Last `limit` turns before the message being handled
    fn prior_turns(&self, sender: &str, limit: usize) -> Result<Vec<StoredMessage>> {
        let mut history = self.store.recent_messages(sender, limit + 1)?;
        if matches!(history.last(), Some(last) if last.role == Role::User) {
            history.pop();
        }
        Ok(history)
    }

    async fn humanize_delay(&self) {
        let (min, max) = self.config.reply_delay_ms;
        let ms = if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        };
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    /// Persist first so history matches what was generated, then send
    async fn deliver(&self, recipient: &str, reply: &str) {
        if let Err(e) = self.store.append_message(recipient, Role::Assistant, reply) {
            error!("Failed to persist reply to {}: {}", short_id(recipient), e);
        }

        match self.transport.send(recipient, reply).await {
            Ok(_) => info!(
                "Reply to {} via {}: {}",
                short_id(recipient),
                self.transport.name(),
                truncate_chars(reply, 60)
            ),
            Err(e) => error!("Failed to send reply to {}: {}", short_id(recipient), e),
        }
    }

    async fn notify_owner(&self, sender: &str, text: &str) {
        if self.config.owner_id.is_empty() {
            debug!("Urgent message but no owner configured");
            return;
        }

        let notice = templates::urgent_notification(&self.persona, sender, text);
        match self.transport.send(&self.config.owner_id, &notice).await {
            Ok(_) => info!("Owner notified of urgent message from {}", short_id(sender)),
            Err(e) => warn!("Failed to notify owner: {}", e),
        }
    }
}
