//! WhatsBot - Entry Point
//!
//! Modes:
//! - Default: Twilio WhatsApp webhook server
//! - --console / -c: chat from the terminal

use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use whatsbot::channels::{console, ChannelType, ConsoleChannel, Transport, WhatsAppChannel};
use whatsbot::{
    Assistant, ChatCompletionsClient, Config, MessageRouter, ReplyCache, RouterConfig, Store,
    WebhookServer,
};

const CONSOLE_SENDER: &str = "console";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Parse args
    let args: Vec<String> = std::env::args().collect();
    let console_mode = args.iter().any(|a| a == "--console" || a == "-c");
    let as_owner = args.iter().any(|a| a == "--as-owner");
    let help_mode = args.iter().any(|a| a == "--help" || a == "-h");

    if help_mode {
        println!("WhatsBot v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: whatsbot [OPTIONS]");
        println!();
        println!("Options:");
        println!("  --console, -c      Chat from the terminal instead of WhatsApp");
        println!("  --as-owner         Console mode: send as OWNER_NUMBER");
        println!("  --help, -h         Show this help");
        println!();
        println!("Default: Run the Twilio WhatsApp webhook server");
        println!();
        println!("Environment variables:");
        println!("  GROQ_API_KEY             LLM provider API key (required)");
        println!("  OWNER_NUMBER             Owner identifier for admin commands");
        println!("  WHATSBOT_DB_PATH         SQLite database path");
        println!("  WHATSBOT_PERSONA         Persona TOML file");
        println!("  WHATSBOT_PORT            Webhook port (default: 8080)");
        println!("  TWILIO_ACCOUNT_SID       Twilio account (webhook mode)");
        println!("  TWILIO_AUTH_TOKEN        Twilio token (webhook mode)");
        println!("  TWILIO_WHATSAPP_NUMBER   Twilio WhatsApp sender (webhook mode)");
        return Ok(());
    }

    // Setup logging based on mode
    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    if console_mode {
        // Console mode - stdout carries replies, logs go to stderr
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else if std::env::var("WHATSBOT_LOG_JSON").map(|v| v == "1").unwrap_or(false) {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_ansi(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_ansi(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    info!("WhatsBot v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let store = match Store::open_with_config(
        &config.db_path,
        config.history_window,
        config.max_body_chars,
    ) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Cannot open database {:?}: {}", config.db_path, e);
            std::process::exit(1);
        }
    };
    info!("Database: {:?} (window {})", config.db_path, store.window());

    let provider = Arc::new(ChatCompletionsClient::from_config(&config)?);
    info!("Model: {}", provider.model());

    let cache = ReplyCache::new(config.cache_ttl_secs, config.cache_enabled);
    let assistant = Arc::new(Assistant::new(provider, config.persona.clone(), cache));
    info!("Assistant for {} ready", config.persona.name);

    if console_mode {
        let transport: Arc<dyn Transport> = Arc::new(ConsoleChannel::new());
        let router = MessageRouter::new(
            store,
            assistant,
            transport,
            config.persona.clone(),
            RouterConfig::from_config(&config),
        );

        let sender = if as_owner && !config.owner_id.is_empty() {
            config.owner_id.clone()
        } else {
            if as_owner {
                warn!("--as-owner ignored: OWNER_NUMBER not set");
            }
            CONSOLE_SENDER.to_string()
        };

        info!("Channel: {}", ChannelType::Console);
        console::run(router, &sender).await?;
    } else {
        let channel = Arc::new(WhatsAppChannel::from_env()?);
        if let Err(e) = channel.verify().await {
            warn!("Twilio verification failed: {}", e);
        }

        let transport: Arc<dyn Transport> = channel.clone();
        let router = MessageRouter::new(
            store,
            assistant,
            transport,
            config.persona.clone(),
            RouterConfig::from_config(&config),
        );

        info!("Channel: {}", ChannelType::WhatsApp);
        WebhookServer::new(config.port, router, channel).run().await?;
    }

    Ok(())
}
