//! `NewData`: set, extend or delete items in conversation storage

use super::{value_to_list, EnvelopeError, OneOrMany};
use crate::router::RouterError;
use crate::store::{ConvKey, ConversationStore, ScopedStore, Transaction};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Per-conversation key-value data
pub type UserData = Map<String, Value>;

/// Data mutation for the current user and chat
///
/// Applied in a fixed order: `set`, then `extend`, then `delete`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewData {
    #[serde(default)]
    pub set: Map<String, Value>,
    #[serde(default)]
    pub extend: Map<String, Value>,
    #[serde(default)]
    pub delete: OneOrMany<String>,
}

impl NewData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite `key` with `value`
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(key.into(), value.into());
        self
    }

    /// Append `value` (or each element, if it is an array) to the list at `key`
    #[must_use]
    pub fn extend(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extend.insert(key.into(), value.into());
        self
    }

    /// Remove `key` if present
    #[must_use]
    pub fn delete(mut self, key: impl Into<String>) -> Self {
        let mut keys = std::mem::take(&mut self.delete).to_list();
        keys.push(key.into());
        self.delete = OneOrMany::Many(keys);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.extend.is_empty() && self.delete.is_empty()
    }

    /// Apply the mutation to an in-memory copy of the data.
    ///
    /// On error `data` may be partially modified; callers work on a
    /// transaction copy and discard it.
    pub fn apply_to(&self, data: &mut UserData) -> Result<(), EnvelopeError> {
        for (key, value) in &self.set {
            data.insert(key.clone(), value.clone());
        }

        for (key, value) in &self.extend {
            let slot = data
                .entry(key.clone())
                .or_insert_with(|| Value::Array(Vec::new()));
            let Value::Array(items) = slot else {
                return Err(EnvelopeError::ExtendNonSequence { key: key.clone() });
            };
            items.extend(value_to_list(value.clone()));
        }

        for key in self.delete.as_slice() {
            data.remove(key);
        }

        Ok(())
    }

    /// Stage the mutation on an open transaction. Nothing is visible until
    /// the caller commits.
    pub fn apply_in<S>(&self, tx: &mut Transaction<'_, S>) -> Result<(), EnvelopeError>
    where
        S: ConversationStore + ?Sized,
    {
        self.apply_to(tx.data_mut())?;

        let key = tx.key();
        tracing::debug!(
            chat_id = key.chat_id,
            user_id = key.user_id,
            set = self.set.len(),
            extend = self.extend.len(),
            delete = self.delete.as_slice().len(),
            "Staged NewData"
        );
        Ok(())
    }

    /// Apply the mutation to the stored data of one conversation.
    ///
    /// Runs inside a single store transaction: either every change becomes
    /// visible or none does.
    pub async fn apply<S>(&self, store: &ScopedStore<S>, key: ConvKey) -> Result<(), RouterError>
    where
        S: ConversationStore,
    {
        let mut tx = store.begin(key).await?;
        self.apply_in(&mut tx)?;
        tx.commit().await?;
        Ok(())
    }
}
