//! SQLite-backed store
//!
//! One row per conversation; position and data are stored as JSON text.

use super::{ConvKey, ConvRecord, ConversationStore, StoreError};
use crate::envelope::UserData;
use crate::states::ConvPosition;
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS conversations (
    chat_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL,
    position TEXT NOT NULL,
    data TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (chat_id, user_id)
);
";

/// Thread-safe SQLite handle
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))
    }

    fn load_sync(&self, key: &ConvKey) -> Result<ConvRecord, StoreError> {
        let conn = self.conn()?;
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT position, data FROM conversations WHERE chat_id = ?1 AND user_id = ?2",
                params![key.chat_id, key.user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((position, data)) = row else {
            return Ok(ConvRecord::default());
        };

        let corrupted = |source| StoreError::Corrupted { key: *key, source };
        let position: ConvPosition = serde_json::from_str(&position).map_err(corrupted)?;
        let data: UserData = serde_json::from_str(&data).map_err(corrupted)?;
        Ok(ConvRecord { position, data })
    }

    fn save_sync(&self, key: &ConvKey, record: &ConvRecord) -> Result<(), StoreError> {
        let conn = self.conn()?;

        if record.is_empty() {
            conn.execute(
                "DELETE FROM conversations WHERE chat_id = ?1 AND user_id = ?2",
                params![key.chat_id, key.user_id],
            )?;
            return Ok(());
        }

        let corrupted = |source| StoreError::Corrupted { key: *key, source };
        let position = serde_json::to_string(&record.position).map_err(corrupted)?;
        let data = serde_json::to_string(&record.data).map_err(corrupted)?;

        conn.execute(
            "INSERT INTO conversations (chat_id, user_id, position, data, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (chat_id, user_id) DO UPDATE SET
                position = excluded.position,
                data = excluded.data,
                updated_at = excluded.updated_at",
            params![key.chat_id, key.user_id, position, data, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Number of stored conversations
    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn load(&self, key: &ConvKey) -> Result<ConvRecord, StoreError> {
        self.load_sync(key)
    }

    async fn save(&self, key: &ConvKey, record: &ConvRecord) -> Result<(), StoreError> {
        self.save_sync(key, record)
    }
}
