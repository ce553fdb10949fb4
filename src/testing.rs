//! Mock implementations for testing
//!
//! These mocks let the middlewares run without a bot API or a database.

use crate::quest::InlineKeyboard;
use crate::states::{ConvStatesGroup, StateRegistry};
use crate::store::{ConvKey, ConvRecord, ConversationStore, InMemoryStore, StoreError};
use crate::transport::{Transport, TransportError};
use async_trait::async_trait;
use std::sync::Mutex;

// ============================================================================
// Recording Transport
// ============================================================================

/// One delivered message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub chat_id: i64,
    pub text: String,
    pub keyboard: Option<InlineKeyboard>,
}

impl Sent {
    pub fn text(chat_id: i64, text: &str) -> Self {
        Self {
            chat_id,
            text: text.to_string(),
            keyboard: None,
        }
    }
}

/// Transport that records everything, optionally failing after N sends
#[derive(Debug, Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Sent>>,
    answered: Mutex<Vec<String>>,
    fail_after: Option<usize>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `count` messages, fail every later send
    pub fn failing_after(count: usize) -> Self {
        Self {
            fail_after: Some(count),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|s| s.text).collect()
    }

    pub fn answered(&self) -> Vec<String> {
        self.answered.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), TransportError> {
        let mut sent = self.sent.lock().unwrap();
        if self.fail_after.is_some_and(|limit| sent.len() >= limit) {
            return Err(TransportError::send(chat_id, "mock transport down"));
        }
        sent.push(Sent {
            chat_id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
        });
        Ok(())
    }

    async fn answer_callback_query(&self, query_id: &str) -> Result<(), TransportError> {
        self.answered.lock().unwrap().push(query_id.to_string());
        Ok(())
    }
}

// ============================================================================
// Failing Store
// ============================================================================

/// In-memory store with injectable failures
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: InMemoryStore,
    fail_loads: bool,
    fail_saves: bool,
}

impl FailingStore {
    pub fn failing_saves() -> Self {
        Self {
            fail_saves: true,
            ..Self::default()
        }
    }

    pub fn failing_loads() -> Self {
        Self {
            fail_loads: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl ConversationStore for FailingStore {
    async fn load(&self, key: &ConvKey) -> Result<ConvRecord, StoreError> {
        if self.fail_loads {
            return Err(StoreError::Unavailable("mock load failure".to_string()));
        }
        self.inner.load(key).await
    }

    async fn save(&self, key: &ConvKey, record: &ConvRecord) -> Result<(), StoreError> {
        if self.fail_saves {
            return Err(StoreError::Unavailable("mock save failure".to_string()));
        }
        self.inner.save(key, record).await
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// `menu` (one state) and `survey` (three states)
pub fn test_registry() -> StateRegistry {
    StateRegistry::new([
        ConvStatesGroup::new("menu").state("choose", "What would you like to do?"),
        ConvStatesGroup::new("survey")
            .state("q1", "Question 1?")
            .state("q2", "Question 2?")
            .state("q3", "Question 3?"),
    ])
    .expect("test registry is valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_transport_fails_after_limit() {
        let transport = RecordingTransport::failing_after(2);
        transport.send_message(1, "a", None).await.unwrap();
        transport.send_message(1, "b", None).await.unwrap();
        assert!(transport.send_message(1, "c", None).await.is_err());
        assert_eq!(transport.sent_texts(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_failing_store_modes() {
        let key = ConvKey::new(1, 1);
        assert!(FailingStore::failing_loads().load(&key).await.is_err());
        assert!(FailingStore::failing_saves().load(&key).await.is_ok());
        assert!(FailingStore::failing_saves()
            .save(&key, &ConvRecord::default())
            .await
            .is_err());
    }
}
