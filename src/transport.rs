//! Chat transport abstraction
//!
//! The post-processing layer never talks to a bot API directly. It needs two
//! operations: send a message to a chat and acknowledge a callback query.

use crate::quest::InlineKeyboard;
use crate::store::ConvKey;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Failed to send message to chat {chat_id}: {message}")]
    Send { chat_id: i64, message: String },
    #[error("Failed to answer callback query {query_id}: {message}")]
    Answer { query_id: String, message: String },
    #[error("Quest action failed: {0}")]
    Action(String),
}

impl TransportError {
    pub fn send(chat_id: i64, message: impl Into<String>) -> Self {
        Self::Send {
            chat_id,
            message: message.into(),
        }
    }

    pub fn answer(query_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Answer {
            query_id: query_id.into(),
            message: message.into(),
        }
    }

    pub fn action(message: impl Into<String>) -> Self {
        Self::Action(message.into())
    }
}

/// Outbound side of the bot
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `text` to `chat_id`, optionally with inline controls
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), TransportError>;

    /// Acknowledge an interactive callback with empty content
    async fn answer_callback_query(&self, query_id: &str) -> Result<(), TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<(), TransportError> {
        (**self).send_message(chat_id, text, keyboard).await
    }

    async fn answer_callback_query(&self, query_id: &str) -> Result<(), TransportError> {
        (**self).answer_callback_query(query_id).await
    }
}

/// A handled plain message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat_id: i64,
    /// Author of the message
    pub from_user_id: i64,
    pub text: Option<String>,
}

impl IncomingMessage {
    pub fn new(message_id: i64, chat_id: i64, from_user_id: i64, text: impl Into<String>) -> Self {
        Self {
            message_id,
            chat_id,
            from_user_id,
            text: Some(text.into()),
        }
    }

    pub fn conv_key(&self) -> ConvKey {
        ConvKey::new(self.chat_id, self.from_user_id)
    }
}

/// A press on an inline button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackQuery {
    pub id: String,
    /// User who pressed the button
    pub from_user_id: i64,
    pub data: Option<String>,
    /// Message the keyboard was attached to (authored by the bot)
    pub message: IncomingMessage,
}

impl CallbackQuery {
    /// The conversation is the pressing user's, in the message's chat.
    pub fn conv_key(&self) -> ConvKey {
        ConvKey::new(self.message.chat_id, self.from_user_id)
    }
}
