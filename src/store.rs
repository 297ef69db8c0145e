//! Contact Store
//!
//! SQLite persistence for contacts, the per-contact message window and
//! long-term facts.
//!
//! One connection behind a mutex is shared by every message task. Inserting
//! a message and pruning the window run in a single transaction, so no reader
//! ever sees more than `window` rows for a contact.

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::text::truncate_chars;

/// Default messages kept per contact (rolling window)
pub const DEFAULT_WINDOW: usize = 20;

/// Default stored body length in characters
pub const DEFAULT_MAX_BODY_CHARS: usize = 1000;

pub type StoreResult<T> = Result<T, StoreError>;

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "assistant" => Role::Assistant,
            "system" => Role::System,
            _ => Role::User,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A conversation partner
#[derive(Debug, Clone)]
pub struct Contact {
    pub identifier: String,
    pub display_name: Option<String>,
    pub company: Option<String>,
    /// Unix millis
    pub last_interaction: i64,
    /// Free-form extracted facts
    pub context: Map<String, Value>,
    /// Unix millis
    pub created_at: i64,
}

impl Contact {
    /// Merged view handed to the assistant
    pub fn context_record(&self) -> ContactContext {
        let mut extra = self.context.clone();
        let context_name = extra.remove("name").and_then(non_empty_string);
        let context_company = extra.remove("company").and_then(non_empty_string);

        ContactContext {
            name: self.display_name.clone().or(context_name),
            company: self.company.clone().or(context_company),
            extra,
        }
    }
}

/// What the bot knows about a contact
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContactContext {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.company.is_none() && self.extra.is_empty()
    }
}

/// A single persisted turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub role: Role,
    pub body: String,
    /// Unix millis
    pub timestamp: i64,
}

/// Aggregate numbers for the owner's status/stats commands
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    pub distinct_contacts: usize,
    pub total_messages: usize,
    pub messages_today: usize,
    pub first_message_at: Option<DateTime<Utc>>,
    pub last_message_at: Option<DateTime<Utc>>,
}

/// Contact row for the stats listing
#[derive(Debug, Clone)]
pub struct ContactActivity {
    pub identifier: String,
    pub display_name: Option<String>,
    pub message_count: usize,
    pub last_interaction: i64,
}

/// Contact store with SQLite backend
pub struct Store {
    conn: Mutex<Connection>,
    window: usize,
    max_body_chars: usize,
}

impl Store {
    /// Open or create the database with default limits
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::open_with_config(path, DEFAULT_WINDOW, DEFAULT_MAX_BODY_CHARS)
    }

    /// Open with custom window size and body limit
    pub fn open_with_config(path: &Path, window: usize, max_body_chars: usize) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Unavailable(format!("{}: {}", parent.display(), e)))?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {}", path.display(), e)))?;
        let store = Self {
            conn: Mutex::new(conn),
            window: window.max(1),
            max_body_chars: max_body_chars.max(1),
        };
        store
            .init_schema()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        info!(
            "Contact store opened: {} (window={}, max_body={})",
            path.display(),
            store.window,
            store.max_body_chars
        );
        Ok(store)
    }

    /// Messages kept per contact
    pub fn window(&self) -> usize {
        self.window
    }

    fn init_schema(&self) -> rusqlite::Result<()> {
        self.conn.lock().execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS contacts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                identifier TEXT NOT NULL UNIQUE,
                name TEXT,
                company TEXT,
                last_interaction INTEGER NOT NULL,
                context TEXT NOT NULL DEFAULT '{}',
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                contact_id INTEGER NOT NULL REFERENCES contacts(id),
                role TEXT NOT NULL CHECK(role IN ('user', 'assistant', 'system')),
                body TEXT NOT NULL,
                timestamp INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS facts (
                contact TEXT NOT NULL,
                name TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (contact, name)
            );

            CREATE INDEX IF NOT EXISTS idx_messages_contact_ts
                ON messages(contact_id, timestamp DESC);
            CREATE INDEX IF NOT EXISTS idx_messages_ts ON messages(timestamp);
            "#,
        )
    }

    /// Insert if missing, bump last interaction either way; returns row id
    fn touch_contact(conn: &Connection, identifier: &str, now: i64) -> rusqlite::Result<i64> {
        conn.execute(
            r#"
            INSERT INTO contacts (identifier, last_interaction, created_at)
            VALUES (?1, ?2, ?2)
            ON CONFLICT(identifier) DO UPDATE SET
                last_interaction = excluded.last_interaction
            "#,
            params![identifier, now],
        )?;
        conn.query_row(
            "SELECT id FROM contacts WHERE identifier = ?1",
            params![identifier],
            |row| row.get(0),
        )
    }

    /// Insert if missing without touching last interaction
    fn ensure_contact(conn: &Connection, identifier: &str, now: i64) -> rusqlite::Result<()> {
        conn.execute(
            "INSERT OR IGNORE INTO contacts (identifier, last_interaction, created_at) VALUES (?1, ?2, ?2)",
            params![identifier, now],
        )?;
        Ok(())
    }

    fn load_contact(conn: &Connection, identifier: &str) -> rusqlite::Result<Option<Contact>> {
        conn.query_row(
            r#"
            SELECT identifier, name, company, last_interaction, context, created_at
            FROM contacts WHERE identifier = ?1
            "#,
            params![identifier],
            |row| {
                let raw_context: String = row.get(4)?;
                Ok(Contact {
                    identifier: row.get(0)?,
                    display_name: row.get::<_, Option<String>>(1)?.filter(|s| !s.is_empty()),
                    company: row.get::<_, Option<String>>(2)?.filter(|s| !s.is_empty()),
                    last_interaction: row.get(3)?,
                    context: parse_context(identifier, &raw_context),
                    created_at: row.get(5)?,
                })
            },
        )
        .optional()
    }

    /// Fetch a contact, creating it on first sight; always bumps last interaction
    pub fn get_or_create_contact(&self, identifier: &str) -> StoreResult<Contact> {
        let conn = self.conn.lock();
        Self::touch_contact(&conn, identifier, now_millis())?;
        Self::load_contact(&conn, identifier)?.ok_or(StoreError::OperationFailed(
            rusqlite::Error::QueryReturnedNoRows,
        ))
    }

    /// Fetch a contact without creating or touching it
    pub fn contact(&self, identifier: &str) -> StoreResult<Option<Contact>> {
        let conn = self.conn.lock();
        Ok(Self::load_contact(&conn, identifier)?)
    }

    /// Append a turn and prune the contact's window, atomically
    pub fn append_message(&self, identifier: &str, role: Role, body: &str) -> StoreResult<i64> {
        let body = truncate_chars(body, self.max_body_chars);
        let now = now_millis();

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let contact_id = Self::touch_contact(&tx, identifier, now)?;
        tx.execute(
            "INSERT INTO messages (contact_id, role, body, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![contact_id, role.as_str(), body, now],
        )?;
        let message_id = tx.last_insert_rowid();

        let pruned = tx.execute(
            r#"
            DELETE FROM messages
            WHERE contact_id = ?1 AND id NOT IN (
                SELECT id FROM messages
                WHERE contact_id = ?1
                ORDER BY timestamp DESC, id DESC
                LIMIT ?2
            )
            "#,
            params![contact_id, self.window as i64],
        )?;

        tx.commit()?;

        debug!(
            "Stored {} message for {} (pruned {})",
            role,
            short_id(identifier),
            pruned
        );
        Ok(message_id)
    }

    /// Most recent `limit` turns, oldest first
    pub fn recent_messages(&self, identifier: &str, limit: usize) -> StoreResult<Vec<StoredMessage>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT m.role, m.body, m.timestamp
            FROM messages m
            JOIN contacts c ON c.id = m.contact_id
            WHERE c.identifier = ?1
            ORDER BY m.timestamp DESC, m.id DESC
            LIMIT ?2
            "#,
        )?;

        let mut messages = stmt
            .query_map(params![identifier, limit as i64], |row| {
                let role: String = row.get(0)?;
                Ok(StoredMessage {
                    role: Role::parse(&role),
                    body: row.get(1)?,
                    timestamp: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        // Chronological order
        messages.reverse();
        Ok(messages)
    }

    /// Stored context mapping; empty on missing contact or any failure
    pub fn context(&self, identifier: &str) -> Map<String, Value> {
        let conn = self.conn.lock();
        let raw: rusqlite::Result<Option<String>> = conn
            .query_row(
                "SELECT context FROM contacts WHERE identifier = ?1",
                params![identifier],
                |row| row.get(0),
            )
            .optional();

        match raw {
            Ok(Some(raw)) => parse_context(identifier, &raw),
            Ok(None) => Map::new(),
            Err(e) => {
                warn!("Failed to read context for {}: {}", short_id(identifier), e);
                Map::new()
            }
        }
    }

    /// Shallow-merge `partial` over the stored context (new keys win)
    pub fn merge_context(&self, identifier: &str, partial: Map<String, Value>) -> StoreResult<()> {
        if partial.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        Self::ensure_contact(&tx, identifier, now_millis())?;

        let raw: String = tx.query_row(
            "SELECT context FROM contacts WHERE identifier = ?1",
            params![identifier],
            |row| row.get(0),
        )?;
        let mut context = parse_context(identifier, &raw);
        context.extend(partial);

        tx.execute(
            "UPDATE contacts SET context = ?2 WHERE identifier = ?1",
            params![identifier, serde_json::to_string(&context)?],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Set name/company only where still empty (first write wins)
    pub fn record_identity(
        &self,
        identifier: &str,
        name: Option<&str>,
        company: Option<&str>,
    ) -> StoreResult<()> {
        let name = name.map(str::trim).filter(|s| !s.is_empty());
        let company = company.map(str::trim).filter(|s| !s.is_empty());
        if name.is_none() && company.is_none() {
            return Ok(());
        }

        let conn = self.conn.lock();
        Self::ensure_contact(&conn, identifier, now_millis())?;
        conn.execute(
            r#"
            UPDATE contacts SET
                name = CASE WHEN name IS NULL OR name = '' THEN ?2 ELSE name END,
                company = CASE WHEN company IS NULL OR company = '' THEN ?3 ELSE company END
            WHERE identifier = ?1
            "#,
            params![identifier, name, company],
        )?;
        Ok(())
    }

    /// Upsert a long-term fact
    pub fn set_fact<T: Serialize>(&self, identifier: &str, key: &str, value: &T) -> StoreResult<()> {
        let value = serde_json::to_string(value)?;
        self.conn.lock().execute(
            r#"
            INSERT INTO facts (contact, name, value, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(contact, name) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![identifier, key, value, now_millis()],
        )?;
        Ok(())
    }

    /// Read a long-term fact
    pub fn get_fact<T: DeserializeOwned>(&self, identifier: &str, key: &str) -> StoreResult<Option<T>> {
        let raw: Option<String> = self
            .conn
            .lock()
            .query_row(
                "SELECT value FROM facts WHERE contact = ?1 AND name = ?2",
                params![identifier, key],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Aggregate counters; zeroed on empty database or failure
    pub fn aggregate_stats(&self) -> StoreStats {
        match self.try_aggregate_stats() {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Failed to compute store stats: {}", e);
                StoreStats::default()
            }
        }
    }

    fn try_aggregate_stats(&self) -> rusqlite::Result<StoreStats> {
        let conn = self.conn.lock();

        let distinct_contacts: i64 =
            conn.query_row("SELECT COUNT(*) FROM contacts", [], |row| row.get(0))?;

        let (total_messages, first, last): (i64, Option<i64>, Option<i64>) = conn.query_row(
            "SELECT COUNT(*), MIN(timestamp), MAX(timestamp) FROM messages",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        let messages_today: i64 = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE timestamp >= ?1",
            params![start_of_today_millis()],
            |row| row.get(0),
        )?;

        Ok(StoreStats {
            distinct_contacts: distinct_contacts as usize,
            total_messages: total_messages as usize,
            messages_today: messages_today as usize,
            first_message_at: first.and_then(|ts| Utc.timestamp_millis_opt(ts).single()),
            last_message_at: last.and_then(|ts| Utc.timestamp_millis_opt(ts).single()),
        })
    }

    /// Most recently active contacts with their stored message counts
    pub fn recent_contacts(&self, limit: usize) -> StoreResult<Vec<ContactActivity>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"
            SELECT c.identifier, c.name, c.last_interaction, COUNT(m.id)
            FROM contacts c
            LEFT JOIN messages m ON m.contact_id = c.id
            GROUP BY c.id
            ORDER BY c.last_interaction DESC, c.id DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(ContactActivity {
                    identifier: row.get(0)?,
                    display_name: row.get::<_, Option<String>>(1)?.filter(|s| !s.is_empty()),
                    last_interaction: row.get(2)?,
                    message_count: row.get::<_, i64>(3)? as usize,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }
}

fn parse_context(identifier: &str, raw: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            warn!("Malformed context for {}, treating as empty", short_id(identifier));
            Map::new()
        }
    }
}

fn non_empty_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        _ => None,
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn start_of_today_millis() -> i64 {
    Utc::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc().timestamp_millis())
        .unwrap_or(0)
}

/// Identifier prefix for logs
pub(crate) fn short_id(identifier: &str) -> &str {
    truncate_chars(identifier, 15)
}
