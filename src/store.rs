//! Per-conversation storage
//!
//! A `ConversationStore` only knows how to load and save a whole record.
//! `ScopedStore` layers the transactional view on top: `begin` takes an
//! exclusive lock on one (chat, user) slice, the `Transaction` stages changes
//! in memory, and `commit` writes them in one `save`. Dropping or aborting a
//! transaction discards its changes; the lock is released either way.

mod memory;
mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use crate::envelope::UserData;
use crate::states::ConvPosition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lock table size above which idle entries are pruned on `begin`
const LOCK_TABLE_PRUNE_AT: usize = 1024;

/// Identifies one conversation: a user inside a chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConvKey {
    pub chat_id: i64,
    pub user_id: i64,
}

impl ConvKey {
    pub fn new(chat_id: i64, user_id: i64) -> Self {
        Self { chat_id, user_id }
    }
}

impl fmt::Display for ConvKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chat_id, self.user_id)
    }
}

/// Everything stored for one conversation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConvRecord {
    #[serde(default)]
    pub position: ConvPosition,
    #[serde(default)]
    pub data: UserData,
}

impl ConvRecord {
    pub fn is_empty(&self) -> bool {
        !self.position.in_conversation() && self.data.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Corrupted record for {key}: {source}")]
    Corrupted {
        key: ConvKey,
        #[source]
        source: serde_json::Error,
    },
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Backend holding conversation records
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Load the record for `key`; a missing record is an empty one
    async fn load(&self, key: &ConvKey) -> Result<ConvRecord, StoreError>;

    /// Replace the record for `key` in one atomic write
    async fn save(&self, key: &ConvKey, record: &ConvRecord) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: ConversationStore + ?Sized> ConversationStore for Arc<T> {
    async fn load(&self, key: &ConvKey) -> Result<ConvRecord, StoreError> {
        (**self).load(key).await
    }

    async fn save(&self, key: &ConvKey, record: &ConvRecord) -> Result<(), StoreError> {
        (**self).save(key, record).await
    }
}

/// Transactional, per-conversation exclusive access to a store
pub struct ScopedStore<S> {
    inner: S,
    locks: Mutex<HashMap<ConvKey, Arc<Mutex<()>>>>,
}

impl<S: ConversationStore> ScopedStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn lock_for(&self, key: ConvKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        if locks.len() >= LOCK_TABLE_PRUNE_AT {
            // Only the table itself holds idle locks
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        locks.entry(key).or_default().clone()
    }

    /// Open a transaction on one conversation.
    ///
    /// Waits until no other transaction for the same key is open.
    pub async fn begin(&self, key: ConvKey) -> Result<Transaction<'_, S>, StoreError> {
        let guard = self.lock_for(key).await.lock_owned().await;
        let record = self.inner.load(&key).await?;
        tracing::trace!(%key, "Transaction opened");
        Ok(Transaction {
            store: &self.inner,
            key,
            original: record.clone(),
            record,
            _guard: guard,
        })
    }

    /// Read a consistent copy of one conversation's record
    pub async fn snapshot(&self, key: ConvKey) -> Result<ConvRecord, StoreError> {
        let tx = self.begin(key).await?;
        let record = tx.record().clone();
        tx.abort();
        Ok(record)
    }
}

/// Exclusive read-modify-write session on one conversation
///
/// Changes live in memory until `commit`. The per-conversation lock is held
/// for the lifetime of this value.
pub struct Transaction<'a, S: ?Sized> {
    store: &'a S,
    key: ConvKey,
    original: ConvRecord,
    record: ConvRecord,
    _guard: OwnedMutexGuard<()>,
}

impl<S: ConversationStore + ?Sized> Transaction<'_, S> {
    pub fn key(&self) -> ConvKey {
        self.key
    }

    pub fn record(&self) -> &ConvRecord {
        &self.record
    }

    pub fn position(&self) -> &ConvPosition {
        &self.record.position
    }

    pub fn set_position(&mut self, position: ConvPosition) {
        self.record.position = position;
    }

    pub fn data(&self) -> &UserData {
        &self.record.data
    }

    pub fn data_mut(&mut self) -> &mut UserData {
        &mut self.record.data
    }

    /// Whether anything differs from what was loaded
    pub fn is_modified(&self) -> bool {
        self.record != self.original
    }

    /// Write staged changes and release the conversation
    pub async fn commit(self) -> Result<(), StoreError> {
        self.store.save(&self.key, &self.record).await?;
        tracing::trace!(key = %self.key, "Transaction committed");
        Ok(())
    }

    /// Discard staged changes and release the conversation
    pub fn abort(self) {
        tracing::trace!(key = %self.key, "Transaction aborted");
    }
}
