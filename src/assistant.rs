//! Assistant
//!
//! Builds the persona prompt, asks the provider for one completion and
//! cleans the answer up for WhatsApp. Provider failures never escape: every
//! path ends in a tagged reply string.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, error};

use crate::cache::{CacheStats, ReplyCache};
use crate::error::ProviderError;
use crate::llm::{ChatMessage, CompletionProvider, SamplingParams};
use crate::persona::Persona;
use crate::store::{ContactContext, StoredMessage};
use crate::templates;
use crate::text::{collapse_whitespace, truncate_chars};

/// History turns sent as chat messages
pub const HISTORY_TURNS: usize = 8;

/// History turns quoted inside the system prompt
pub const PROMPT_HISTORY_TURNS: usize = 3;

/// Hard cut for outbound replies
pub const MAX_REPLY_CHARS: usize = 750;

/// More emoji than this and all of them are stripped
pub const MAX_EMOJI: usize = 2;

// Filler interjection right after the tag
static LEADING_FILLER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:hmm+|um+|well|so|look)\b\s*,?\s*").unwrap());

/// Everything the assistant needs for one answer
#[derive(Debug, Clone, Copy)]
pub struct ReplyRequest<'a> {
    pub contact: &'a str,
    pub message: &'a str,
    /// Prior turns, oldest first, excluding `message`
    pub history: &'a [StoredMessage],
    pub context: &'a ContactContext,
}

/// Produces a free-form reply; never fails
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, request: ReplyRequest<'_>) -> String;

    /// Reply cache counters, when the generator caches
    fn cache_stats(&self) -> Option<CacheStats> {
        None
    }
}

/// LLM-backed reply generator
pub struct Assistant {
    provider: Arc<dyn CompletionProvider>,
    persona: Persona,
    cache: ReplyCache,
    params: SamplingParams,
}

impl Assistant {
    pub fn new(provider: Arc<dyn CompletionProvider>, persona: Persona, cache: ReplyCache) -> Self {
        Self {
            provider,
            persona,
            cache,
            params: SamplingParams::default(),
        }
    }

    /// Persona prompt with the contact line and the last few turns
    pub fn system_prompt(&self, context: &ContactContext, history: &[StoredMessage]) -> String {
        let p = &self.persona;

        let context_line = if context.is_empty() {
            "New contact.".to_string()
        } else {
            let mut line = format!(
                "Name: {}. Company: {}.",
                context.name.as_deref().unwrap_or("unknown"),
                context.company.as_deref().unwrap_or("unknown")
            );
            if !context.extra.is_empty() {
                let extra = context
                    .extra
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v))
                    .collect::<Vec<_>>()
                    .join(", ");
                line.push_str(&format!(" Other: {}.", extra));
            }
            line
        };

        let history_lines = if history.is_empty() {
            "First interaction.".to_string()
        } else {
            last_turns(history, PROMPT_HISTORY_TURNS)
                .iter()
                .map(|m| format!("{}: {}", m.role, m.body))
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            r#"You are the personal and professional AI assistant of {name} on WhatsApp.

IDENTITY:
- Name: {name}
- Role: {role}
- Tagline: "{tagline}"
- Services: {services}
- Technologies: {technologies}
- Site: {site}
- GitHub: {github}
- Email: {email}
- Location: {location}

PERSONALITY: professional but approachable, technical and precise, concise, proactive.

RULES:
- Always start the reply with {tag}
- 3 to 5 lines at most, with a clear next step
- At most 1 emoji, only for technical or positive points
- Never confirm meetings or commitments on {name}'s behalf
- Never share sensitive data

CONTACT: {context}
RECENT HISTORY:
{history}"#,
            name = p.name,
            role = p.role,
            tagline = p.tagline,
            services = p.services.join(", "),
            technologies = p.technologies.join(", "),
            site = p.site,
            github = p.github,
            email = p.email,
            location = p.location,
            tag = p.tag,
            context = context_line,
            history = history_lines,
        )
    }

    /// System prompt, last turns, then the user message
    pub fn build_messages(
        &self,
        message: &str,
        history: &[StoredMessage],
        context: &ContactContext,
    ) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::new("system", &self.system_prompt(context, history))];
        messages.extend(
            last_turns(history, HISTORY_TURNS)
                .iter()
                .map(|m| ChatMessage::new(m.role.as_str(), &m.body)),
        );
        messages.push(ChatMessage::new("user", message));
        messages
    }

    /// One answer for `request`; fallbacks on empty output or provider error
    pub async fn query(&self, request: ReplyRequest<'_>) -> String {
        let key = ReplyCache::compute_key(request.contact, request.message);
        if let Some(cached) = self.cache.get(&key).await {
            return cached;
        }

        let messages = self.build_messages(request.message, request.history, request.context);

        match self.provider.complete(&messages, &self.params).await {
            Ok(Some(raw)) if !raw.trim().is_empty() => {
                let reply = sanitize_reply(&raw, &self.persona.tag);
                if reply == self.persona.tag {
                    return templates::clarify(&self.persona);
                }
                self.cache.set(&key, &reply).await;
                reply
            }
            Ok(_) => {
                debug!("Provider returned empty content");
                templates::clarify(&self.persona)
            }
            Err(e) => {
                error!("Provider error: {}", e);
                match e {
                    ProviderError::Authentication(_) => templates::auth_fallback(&self.persona),
                    _ => templates::provider_fallback(&self.persona),
                }
            }
        }
    }
}

#[async_trait]
impl ReplyGenerator for Assistant {
    async fn generate(&self, request: ReplyRequest<'_>) -> String {
        self.query(request).await
    }

    fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.is_enabled().then(|| self.cache.stats())
    }
}

fn last_turns(history: &[StoredMessage], n: usize) -> &[StoredMessage] {
    &history[history.len().saturating_sub(n)..]
}

/// Tag prefix, filler removal, whitespace collapse, hard length cut, emoji cap
pub fn sanitize_reply(raw: &str, tag: &str) -> String {
    let raw = raw.trim();
    let body = match raw.get(..tag.len()) {
        Some(head) if head.eq_ignore_ascii_case(tag) => &raw[tag.len()..],
        _ => raw,
    };
    let body = LEADING_FILLER.replace(body.trim_start(), "");

    let reply = collapse_whitespace(&format!("{} {}", tag, body));
    let reply = truncate_chars(reply.trim(), MAX_REPLY_CHARS).to_string();

    if count_emoji(&reply) > MAX_EMOJI {
        let stripped: String = reply
            .chars()
            .filter(|c| !is_emoji(*c) && !is_emoji_joiner(*c))
            .collect();
        return collapse_whitespace(stripped.trim());
    }
    reply
}

pub fn count_emoji(text: &str) -> usize {
    text.chars().filter(|c| is_emoji(*c)).count()
}

// Variation selector-16 and zero-width joiner; invisible once the emoji is gone
fn is_emoji_joiner(c: char) -> bool {
    matches!(c, '\u{FE0F}' | '\u{200D}')
}

fn is_emoji(c: char) -> bool {
    matches!(
        c as u32,
        0x1F600..=0x1F64F // emoticons
            | 0x1F300..=0x1F5FF // symbols & pictographs
            | 0x1F680..=0x1F6FF // transport & map
            | 0x1F900..=0x1F9FF // supplemental symbols
            | 0x2600..=0x26FF // misc symbols
            | 0x2700..=0x27BF // dingbats
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Role;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TAG: &str = "[Assistant]";

    /// Scripted provider that records what it was sent
    struct ScriptedProvider {
        reply: Result<Option<String>, fn() -> ProviderError>,
        calls: AtomicUsize,
        last_messages: Mutex<Vec<ChatMessage>>,
    }

    impl ScriptedProvider {
        fn ok(text: &str) -> Self {
            Self {
                reply: Ok(Some(text.to_string())),
                calls: AtomicUsize::new(0),
                last_messages: Mutex::new(Vec::new()),
            }
        }

        fn failing(err: fn() -> ProviderError) -> Self {
            Self {
                reply: Err(err),
                calls: AtomicUsize::new(0),
                last_messages: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        async fn complete(
            &self,
            messages: &[ChatMessage],
            _params: &SamplingParams,
        ) -> Result<Option<String>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_messages.lock() = messages.to_vec();
            match &self.reply {
                Ok(reply) => Ok(reply.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    fn turn(role: Role, body: &str, ts: i64) -> StoredMessage {
        StoredMessage {
            role,
            body: body.to_string(),
            timestamp: ts,
        }
    }

    fn assistant(provider: Arc<ScriptedProvider>, cache: ReplyCache) -> Assistant {
        Assistant::new(provider, Persona::default(), cache)
    }

    #[test]
    fn test_sanitize_adds_tag_and_collapses() {
        assert_eq!(sanitize_reply("Sure,   I can   help.", TAG), "[Assistant] Sure, I can help.");
        assert_eq!(sanitize_reply("[assistant] Done", TAG), "[Assistant] Done");
        assert_eq!(sanitize_reply("[Assistant] Hmm, let me see", TAG), "[Assistant] let me see");
        assert_eq!(sanitize_reply("Well sure", TAG), "[Assistant] sure");
    }

    #[test]
    fn test_sanitize_hard_cut() {
        let reply = sanitize_reply(&"word ".repeat(400), TAG);
        assert_eq!(reply.chars().count(), MAX_REPLY_CHARS);
    }

    #[test]
    fn test_emoji_all_or_nothing() {
        let many = sanitize_reply("Great 🎯 work 📊 on 🚀 this ✅", TAG);
        assert_eq!(count_emoji(&many), 0);
        assert_eq!(many, "[Assistant] Great work on this");

        let one = sanitize_reply("Perfect! 🎯", TAG);
        assert_eq!(one, "[Assistant] Perfect! 🎯");

        let two = sanitize_reply("🎯 and 📊", TAG);
        assert_eq!(count_emoji(&two), 2);
    }

    #[test]
    fn test_emoji_strip_leaves_no_selectors() {
        let reply = sanitize_reply("Done ✅\u{FE0F} ok ❤\u{FE0F} yes 👍🏽 🎉", TAG);
        assert_eq!(reply, "[Assistant] Done ok yes");

        let family = sanitize_reply("Team 👨\u{200D}👩\u{200D}👧 ready 🚀 go 🎉", TAG);
        assert_eq!(family, "[Assistant] Team ready go");
        assert!(!family.contains('\u{200D}'));
    }

    #[test]
    fn test_prompt_mentions_context() {
        let a = assistant(Arc::new(ScriptedProvider::ok("x")), ReplyCache::disabled());

        let empty = a.system_prompt(&ContactContext::default(), &[]);
        assert!(empty.contains("New contact."));
        assert!(empty.contains("First interaction."));

        let context = ContactContext {
            name: Some("Maria".into()),
            ..Default::default()
        };
        let history = vec![turn(Role::User, "hello", 1), turn(Role::Assistant, "hi Maria", 2)];
        let prompt = a.system_prompt(&context, &history);
        assert!(prompt.contains("Name: Maria. Company: unknown."));
        assert!(prompt.contains("user: hello\nassistant: hi Maria"));
    }

    #[test]
    fn test_messages_keep_last_turns() {
        let a = assistant(Arc::new(ScriptedProvider::ok("x")), ReplyCache::disabled());
        let history: Vec<StoredMessage> = (0..12)
            .map(|i| turn(if i % 2 == 0 { Role::User } else { Role::Assistant }, &format!("m{}", i), i))
            .collect();

        let messages = a.build_messages("now", &history, &ContactContext::default());
        assert_eq!(messages.len(), 1 + HISTORY_TURNS + 1);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].content, "m4");
        assert_eq!(messages[HISTORY_TURNS].content, "m11");
        assert_eq!(messages.last().unwrap(), &ChatMessage::new("user", "now"));
    }

    #[tokio::test]
    async fn test_query_success_and_cache() {
        let provider = Arc::new(ScriptedProvider::ok("We build dashboards."));
        let a = assistant(provider.clone(), ReplyCache::new(60, true));
        let context = ContactContext::default();
        let request = ReplyRequest {
            contact: "111",
            message: "what do you build?",
            history: &[],
            context: &context,
        };

        assert_eq!(a.query(request).await, "[Assistant] We build dashboards.");
        assert_eq!(a.query(request).await, "[Assistant] We build dashboards.");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        let stats = a.cache_stats().unwrap();
        assert_eq!((stats.hits, stats.misses), (1, 1));

        let uncached = assistant(provider, ReplyCache::disabled());
        assert!(uncached.cache_stats().is_none());
    }

    #[tokio::test]
    async fn test_query_empty_content() {
        let provider = Arc::new(ScriptedProvider::ok("   "));
        let a = assistant(provider, ReplyCache::disabled());
        let context = ContactContext::default();
        let reply = a
            .query(ReplyRequest {
                contact: "111",
                message: "?",
                history: &[],
                context: &context,
            })
            .await;
        assert_eq!(reply, templates::clarify(&Persona::default()));
    }

    #[tokio::test]
    async fn test_query_provider_errors() {
        let context = ContactContext::default();
        let request = ReplyRequest {
            contact: "111",
            message: "hello there",
            history: &[],
            context: &context,
        };
        let persona = Persona::default();

        let auth = assistant(
            Arc::new(ScriptedProvider::failing(|| ProviderError::Authentication("bad key".into()))),
            ReplyCache::disabled(),
        );
        let reply = auth.query(request).await;
        assert_eq!(reply, templates::auth_fallback(&persona));
        assert!(reply.contains(&persona.email));

        let timeout = assistant(
            Arc::new(ScriptedProvider::failing(|| ProviderError::Timeout)),
            ReplyCache::disabled(),
        );
        assert_eq!(timeout.query(request).await, templates::provider_fallback(&persona));
    }
}
