//! Configuration management

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::channels::normalize_sender_id;
use crate::persona::Persona;

const DEFAULT_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Bot configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// LLM provider API key (required)
    pub api_key: String,

    /// OpenAI-compatible chat completions endpoint
    pub api_url: String,

    /// Model identifier sent to the provider
    pub model: String,

    /// Provider request timeout
    pub request_timeout: Duration,

    /// Extra attempts on retryable provider errors
    pub max_retries: u32,

    /// Owner identifier (admin commands, urgent notifications)
    pub owner_id: String,

    /// SQLite database path
    pub db_path: PathBuf,

    /// Messages kept per contact
    pub history_window: usize,

    /// Stored message bodies are cut to this many characters
    pub max_body_chars: usize,

    /// Enable reply caching
    pub cache_enabled: bool,

    /// Reply cache TTL in seconds
    pub cache_ttl_secs: u64,

    /// Humanization delay bounds in milliseconds
    pub reply_delay_ms: (u64, u64),

    /// Command prefix character
    pub command_prefix: char,

    /// Webhook server port
    pub port: u16,

    /// Persona the assistant speaks for
    pub persona: Persona,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GROQ_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("GROQ_API_KEY not set"))?;

        let api_url = std::env::var("WHATSBOT_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let model = std::env::var("WHATSBOT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let request_timeout = Duration::from_secs(env_parse("WHATSBOT_REQUEST_TIMEOUT", 20));
        let max_retries = env_parse("WHATSBOT_MAX_RETRIES", 1);

        let raw_owner = std::env::var("OWNER_NUMBER").unwrap_or_default();
        let owner_id = if is_valid_owner_id(&raw_owner) {
            normalize_sender_id(&raw_owner)
        } else {
            warn!("OWNER_NUMBER missing or malformed ({:?}) - owner commands unavailable", raw_owner);
            warn!("Set OWNER_NUMBER=+5511999999999 (or 5511999999999@s.whatsapp.net) in .env");
            String::new()
        };

        let db_path = std::env::var("WHATSBOT_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::data_local_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("whatsbot")
                    .join("assistant.db")
            });

        let history_window = env_parse("WHATSBOT_HISTORY_WINDOW", 20usize).max(1);
        let max_body_chars = env_parse("WHATSBOT_MAX_BODY_CHARS", 1000usize).max(1);

        let cache_enabled = std::env::var("WHATSBOT_CACHE_ENABLED")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(true);
        let cache_ttl_secs = env_parse("WHATSBOT_CACHE_TTL", 300);

        let delay_min = env_parse("WHATSBOT_DELAY_MIN_MS", 1200u64);
        let delay_max = env_parse("WHATSBOT_DELAY_MAX_MS", 2800u64).max(delay_min);

        let command_prefix = std::env::var("WHATSBOT_COMMAND_PREFIX")
            .ok()
            .and_then(|p| p.trim().chars().next())
            .unwrap_or('!');

        let port = env_parse("WHATSBOT_PORT", 8080);

        let persona = match std::env::var("WHATSBOT_PERSONA") {
            Ok(path) => Persona::load(&PathBuf::from(path))?,
            Err(_) => Persona::default(),
        };

        Ok(Self {
            api_key,
            api_url,
            model,
            request_timeout,
            max_retries,
            owner_id,
            db_path,
            history_window,
            max_body_chars,
            cache_enabled,
            cache_ttl_secs,
            reply_delay_ms: (delay_min, delay_max),
            command_prefix,
            port,
            persona,
        })
    }
}

/// WhatsApp JID (`<digits>@s.whatsapp.net`) or E.164 phone (`+<digits>`),
/// optionally with the Twilio `whatsapp:` prefix
pub fn is_valid_owner_id(id: &str) -> bool {
    let id = id.trim();
    let id = id.strip_prefix("whatsapp:").unwrap_or(id);
    let digits = if let Some(number) = id.strip_suffix("@s.whatsapp.net") {
        number
    } else if let Some(number) = id.strip_prefix('+') {
        number
    } else {
        return false;
    };
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_id_validation() {
        assert!(is_valid_owner_id("5531999990000@s.whatsapp.net"));
        assert!(is_valid_owner_id("+5531999990000"));
        assert!(!is_valid_owner_id(""));
        assert!(!is_valid_owner_id("@s.whatsapp.net"));
        assert!(!is_valid_owner_id("owner"));
        assert!(!is_valid_owner_id("55319abc@s.whatsapp.net"));
        assert!(is_valid_owner_id("whatsapp:+5531999990000"));
    }

    #[test]
    fn test_owner_forms_share_one_identity() {
        let forms = [
            "5531999990000@s.whatsapp.net",
            "+5531999990000",
            "whatsapp:+5531999990000",
        ];
        for form in forms {
            assert!(is_valid_owner_id(form));
            assert_eq!(normalize_sender_id(form), "+5531999990000");
        }
    }

    #[test]
    fn test_env_parse_falls_back() {
        std::env::set_var("WHATSBOT_TEST_ENV_PARSE", " 42 ");
        assert_eq!(env_parse("WHATSBOT_TEST_ENV_PARSE", 7u32), 42);

        std::env::set_var("WHATSBOT_TEST_ENV_PARSE", "many");
        assert_eq!(env_parse("WHATSBOT_TEST_ENV_PARSE", 7u32), 7);

        assert_eq!(env_parse("WHATSBOT_TEST_ENV_UNSET", 7u32), 7);
    }
}
