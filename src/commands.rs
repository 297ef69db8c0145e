//! Command Surface
//!
//! Text starting with the configured prefix (`!` by default). Parsing is
//! case-insensitive and whitespace-trimmed. Owner-only commands answer
//! non-owners with the access-denied template and change nothing.
//!
//! | Command | Access |
//! |---|---|
//! | `info`, `services`, `contact`, `help` | public |
//! | `mode work\|away\|assistant`, `status`, `stats` | owner |

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::fmt::Write;
use tracing::info;

use crate::cache::CacheStats;
use crate::persona::Persona;
use crate::router::{ModeCell, OperatingMode};
use crate::store::{short_id, Store, StoreStats};
use crate::templates;

/// Contacts listed by `stats`
pub const STATS_RECENT_CONTACTS: usize = 5;

/// Services shown in the `info` summary
const INFO_SERVICES: usize = 3;

/// Who may run a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Owner,
}

/// Parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Info,
    Services,
    Contact,
    Help,
    SetMode(OperatingMode),
    Status,
    Stats,
    Unknown(String),
}

impl Command {
    /// Parse prefixed text; `None` when the text is not a command at all
    pub fn parse(text: &str, prefix: char) -> Option<Self> {
        let body = text.trim().strip_prefix(prefix)?;
        let normalized = body.trim().to_lowercase();
        let mut parts = normalized.split_whitespace();

        let command = match (parts.next(), parts.next(), parts.next()) {
            (Some("info"), None, _) => Self::Info,
            (Some("services"), None, _) => Self::Services,
            (Some("contact"), None, _) => Self::Contact,
            (Some("help"), None, _) => Self::Help,
            (Some("status"), None, _) => Self::Status,
            (Some("stats"), None, _) => Self::Stats,
            (Some("mode"), Some(mode), None) => match OperatingMode::parse(mode) {
                Some(mode) => Self::SetMode(mode),
                None => Self::Unknown(normalized.clone()),
            },
            _ => Self::Unknown(normalized.clone()),
        };

        Some(command)
    }

    pub fn access(&self) -> Access {
        match self {
            Self::SetMode(_) | Self::Status | Self::Stats => Access::Owner,
            Self::Info | Self::Services | Self::Contact | Self::Help | Self::Unknown(_) => {
                Access::Public
            }
        }
    }
}

/// Everything a command may read or change
pub struct CommandContext<'a> {
    pub persona: &'a Persona,
    pub store: &'a Store,
    pub mode: &'a ModeCell,
    pub prefix: char,
    pub is_owner: bool,
    /// Reply cache counters; `None` when caching is off
    pub cache: Option<CacheStats>,
}

/// Run a command and produce its reply
pub fn execute(command: &Command, ctx: &CommandContext<'_>) -> Result<String> {
    if command.access() == Access::Owner && !ctx.is_owner {
        return Ok(templates::access_denied(ctx.persona));
    }

    let persona = ctx.persona;
    let reply = match command {
        Command::Info => format!(
            "{} *{}*\n{}\n{}\n\nSite: {}\nEmail: {}\nServices: {}",
            persona.tag,
            persona.name,
            persona.role,
            persona.tagline,
            persona.site,
            persona.email,
            persona.services_summary(INFO_SERVICES)
        ),

        Command::Services => {
            let mut msg = format!("{} Services:\n", persona.tag);
            for (i, service) in persona.services.iter().enumerate() {
                let _ = writeln!(msg, "{}. {}", i + 1, service);
            }
            let _ = write!(msg, "\nProjects and quotes: {}", persona.email);
            msg
        }

        Command::Contact => format!(
            "{} Contact:\nEmail: {}\nSite: {}\nGitHub: {}\nLocation: {}",
            persona.tag, persona.email, persona.site, persona.github, persona.location
        ),

        Command::Help => help_text(persona, ctx.prefix, ctx.is_owner),

        Command::SetMode(mode) => {
            ctx.mode.set(*mode);
            info!("Operating mode set to {}", mode);
            format!("{} Mode set to {}.", persona.tag, mode)
        }

        Command::Status => format!(
            "{} Status\nMode: {}\n{}\n{}",
            persona.tag,
            ctx.mode.get(),
            format_stats(&ctx.store.aggregate_stats()),
            format_cache(ctx.cache.as_ref())
        ),

        Command::Stats => {
            let mut msg = format!(
                "{} Stats\n{}\n{}\n\nRecent contacts:",
                persona.tag,
                format_stats(&ctx.store.aggregate_stats()),
                format_cache(ctx.cache.as_ref())
            );
            let recent = ctx.store.recent_contacts(STATS_RECENT_CONTACTS)?;
            if recent.is_empty() {
                msg.push_str("\n(none)");
            }
            for contact in recent {
                let label = contact
                    .display_name
                    .unwrap_or_else(|| short_id(&contact.identifier).to_string());
                let _ = write!(msg, "\n- {} ({} msgs)", label, contact.message_count);
            }
            msg
        }

        Command::Unknown(_) => templates::unknown_command(persona, ctx.prefix),
    };

    Ok(reply)
}

fn help_text(persona: &Persona, prefix: char, is_owner: bool) -> String {
    let mut msg = format!(
        "{} Commands:\n\
        {p}info - About {}\n\
        {p}services - Services offered\n\
        {p}contact - Contact channels\n\
        {p}help - This list",
        persona.tag,
        persona.name,
        p = prefix
    );

    if is_owner {
        let _ = write!(
            msg,
            "\n\nOwner commands (available to you):\n\
            {p}mode work|away|assistant - Change operating mode\n\
            {p}status - Mode and totals\n\
            {p}stats - Totals and recent contacts",
            p = prefix
        );
    }

    msg
}

fn format_stats(stats: &StoreStats) -> String {
    format!(
        "Contacts: {}\nMessages: {} ({} today)\nFirst message: {}\nLast message: {}",
        stats.distinct_contacts,
        stats.total_messages,
        stats.messages_today,
        format_time(stats.first_message_at),
        format_time(stats.last_message_at)
    )
}

fn format_cache(stats: Option<&CacheStats>) -> String {
    match stats {
        Some(stats) => stats.to_string(),
        None => "Cache: off".to_string(),
    }
}

fn format_time(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}
