//! WhatsBot
//!
//! Personal WhatsApp assistant: template replies for the easy cases, owner
//! commands, and LLM answers backed by a small SQLite memory.
//!
//! # Features
//!
//! - **Intent Classifiers**: greeting, farewell and networking tables with explicit priority
//! - **Context Extraction**: names and companies from self-introductions (first write wins)
//! - **Sliding Window Memory**: last N messages per contact, pruned atomically on insert
//! - **LLM Replies**: OpenAI-compatible chat completions (Groq), sanitized and cached
//! - **Operating Modes**: assistant / work / away, switched by owner commands
//! - **Transports**: Twilio WhatsApp webhook or local console
//!
//! # Architecture
//!
//! ```text
//! Twilio ──► Webhook (axum) ──► MessageRouter ──► Transport.send
//!                                    │
//!                                    ├── Store (SQLite: contacts, messages, facts)
//!                                    ├── Extractor (name / company)
//!                                    ├── Commands (!info, !mode, !stats ...)
//!                                    ├── Classifiers ──► Templates
//!                                    └── Assistant ──► Cache (Moka) ──► LLM provider
//! ```

pub mod assistant;
pub mod cache;
pub mod channels;
pub mod classify;
pub mod commands;
pub mod config;
pub mod error;
pub mod extract;
pub mod llm;
pub mod persona;
pub mod router;
pub mod server;
pub mod store;
pub mod templates;
pub mod text;

pub use assistant::{Assistant, ReplyGenerator, ReplyRequest};
pub use cache::{CacheStats, ReplyCache};
pub use channels::{ConsoleChannel, InboundEvent, Transport, WhatsAppChannel};
pub use classify::{classify, Intent};
pub use commands::Command;
pub use config::Config;
pub use error::{ProviderError, StoreError};
pub use extract::{extract, Extracted};
pub use llm::{ChatCompletionsClient, ChatMessage, CompletionProvider, SamplingParams};
pub use persona::Persona;
pub use router::{MessageRouter, ModeCell, OperatingMode, RouterConfig};
pub use server::WebhookServer;
pub use store::{Contact, ContactContext, Role, Store, StoreStats, StoredMessage};
