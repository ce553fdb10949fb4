//! Questions sent to the user on state entry, exit or recovery

use crate::envelope::OneOrMany;
use crate::store::ConvKey;
use crate::transport::{Transport, TransportError};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// One inline button
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineButton {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl InlineButton {
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: Some(data.into()),
            url: None,
        }
    }

    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            callback_data: None,
            url: Some(url.into()),
        }
    }
}

/// Interactive reply controls attached to a message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn row(mut self, buttons: impl IntoIterator<Item = InlineButton>) -> Self {
        self.rows.push(buttons.into_iter().collect());
        self
    }
}

/// Text with optional interactive controls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QuestText {
    pub text: String,
    #[serde(default)]
    pub keyboard: Option<InlineKeyboard>,
}

impl QuestText {
    pub fn new(text: impl Into<String>, keyboard: InlineKeyboard) -> Self {
        Self {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }
}

type QuestFn = dyn Fn(ConvKey) -> BoxFuture<'static, Result<(), TransportError>> + Send + Sync;

/// Arbitrary async action (send media, call an API, ...)
#[derive(Clone)]
pub struct QuestFunc(Arc<QuestFn>);

impl QuestFunc {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(ConvKey) -> BoxFuture<'static, Result<(), TransportError>> + Send + Sync + 'static,
    {
        Self(Arc::new(func))
    }

    pub async fn call(&self, key: ConvKey) -> Result<(), TransportError> {
        (self.0)(key).await
    }
}

impl fmt::Debug for QuestFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QuestFunc(..)")
    }
}

/// One unit of outbound content
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "QuestRepr")]
pub enum Quest {
    Text(String),
    Styled(QuestText),
    Action(QuestFunc),
}

/// Actions only exist in code; the wire form covers the two text variants
#[derive(Deserialize)]
#[serde(untagged)]
enum QuestRepr {
    Text(String),
    Styled(QuestText),
}

impl From<QuestRepr> for Quest {
    fn from(repr: QuestRepr) -> Self {
        match repr {
            QuestRepr::Text(text) => Quest::Text(text),
            QuestRepr::Styled(styled) => Quest::Styled(styled),
        }
    }
}

impl From<&str> for Quest {
    fn from(text: &str) -> Self {
        Quest::Text(text.to_string())
    }
}

impl From<String> for Quest {
    fn from(text: String) -> Self {
        Quest::Text(text)
    }
}

impl From<QuestText> for Quest {
    fn from(styled: QuestText) -> Self {
        Quest::Styled(styled)
    }
}

impl From<QuestFunc> for Quest {
    fn from(func: QuestFunc) -> Self {
        Quest::Action(func)
    }
}

/// A batch of questions, possibly empty
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Quests(Option<OneOrMany<Quest>>);

impl Quests {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn as_slice(&self) -> &[Quest] {
        match &self.0 {
            Some(quests) => quests.as_slice(),
            None => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    pub fn to_list(self) -> Vec<Quest> {
        self.0.map(OneOrMany::to_list).unwrap_or_default()
    }
}

impl From<Quest> for Quests {
    fn from(quest: Quest) -> Self {
        Self(Some(OneOrMany::One(quest)))
    }
}

impl From<Vec<Quest>> for Quests {
    fn from(quests: Vec<Quest>) -> Self {
        Self(Some(OneOrMany::Many(quests)))
    }
}

impl From<Option<Quest>> for Quests {
    fn from(quest: Option<Quest>) -> Self {
        Self(quest.map(OneOrMany::One))
    }
}

impl From<&str> for Quests {
    fn from(text: &str) -> Self {
        Quest::from(text).into()
    }
}

impl From<String> for Quests {
    fn from(text: String) -> Self {
        Quest::from(text).into()
    }
}

impl From<Vec<&str>> for Quests {
    fn from(texts: Vec<&str>) -> Self {
        texts.into_iter().map(Quest::from).collect::<Vec<_>>().into()
    }
}

impl From<QuestText> for Quests {
    fn from(styled: QuestText) -> Self {
        Quest::from(styled).into()
    }
}

impl From<QuestFunc> for Quests {
    fn from(func: QuestFunc) -> Self {
        Quest::from(func).into()
    }
}

async fn ask_quest<T>(transport: &T, key: ConvKey, quest: &Quest) -> Result<(), TransportError>
where
    T: Transport + ?Sized,
{
    match quest {
        Quest::Text(text) => transport.send_message(key.chat_id, text, None).await,
        Quest::Styled(styled) => {
            transport
                .send_message(key.chat_id, &styled.text, styled.keyboard.as_ref())
                .await
        }
        Quest::Action(func) => func.call(key).await,
    }
}

/// Deliver every quest of the batch to the conversation's chat, in order.
///
/// Each quest completes before the next starts. The first failure stops the
/// batch; quests already delivered stay delivered.
pub async fn ask_question<T>(
    transport: &T,
    key: ConvKey,
    question: &Quests,
) -> Result<(), TransportError>
where
    T: Transport + ?Sized,
{
    for (index, quest) in question.as_slice().iter().enumerate() {
        if let Err(e) = ask_quest(transport, key, quest).await {
            tracing::warn!(
                chat_id = key.chat_id,
                delivered = index,
                total = question.as_slice().len(),
                error = %e,
                "Question batch interrupted"
            );
            return Err(e);
        }
    }
    Ok(())
}
