//! Declarative values a handler returns to drive post-processing
//!
//! A handler never touches storage or conversation state directly. It returns
//! envelopes (`NewData`, `NewState`, `HandleException`) somewhere inside its
//! result tree and the post-processing middlewares act on them.

mod new_data;
mod new_state;

pub use new_data::{NewData, UserData};
pub use new_state::{NewState, StateTarget};

use crate::quest::Quests;
use crate::states::ConvState;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Errors caused by a malformed envelope or a definition it points at
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("Unrecognized conv_state target: {0:?}")]
    UnrecognizedTarget(String),
    #[error("Unknown state group: {0}")]
    UnknownGroup(String),
    #[error("Unknown state: {0}")]
    UnknownState(ConvState),
    #[error("Cannot extend `{key}`: stored value is not a sequence")]
    ExtendNonSequence { key: String },
}

/// A single value or a sequence of them
///
/// Mirrors the "one or many" shape handlers like to write: `delete: "a"` and
/// `delete: ["a", "b"]` are both valid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    /// Normalize into a `Vec`. A single value becomes a one-element list, a
    /// list is returned unchanged.
    pub fn to_list(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }

    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::One(item) => std::slice::from_ref(item),
            OneOrMany::Many(items) => items,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(items: Vec<T>) -> Self {
        OneOrMany::Many(items)
    }
}

impl From<&str> for OneOrMany<String> {
    fn from(item: &str) -> Self {
        OneOrMany::One(item.to_string())
    }
}

impl From<String> for OneOrMany<String> {
    fn from(item: String) -> Self {
        OneOrMany::One(item)
    }
}

impl From<Vec<&str>> for OneOrMany<String> {
    fn from(items: Vec<&str>) -> Self {
        OneOrMany::Many(items.into_iter().map(String::from).collect())
    }
}

/// Normalize a stored JSON value into a list of elements: arrays are
/// flattened one level, anything else is wrapped.
pub fn value_to_list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        other => vec![other],
    }
}

/// Request to answer with a recovery prompt instead of routing this round
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HandleException {
    #[serde(default)]
    pub on_exception: Quests,
}

impl HandleException {
    pub fn new(on_exception: impl Into<Quests>) -> Self {
        Self {
            on_exception: on_exception.into(),
        }
    }
}

/// Every envelope kind the middlewares understand
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "envelope", rename_all = "snake_case")]
pub enum Envelope {
    NewData(NewData),
    NewState(NewState),
    HandleException(HandleException),
}

/// What a handler hands back to the dispatcher
///
/// Sequences may nest arbitrarily. Plain JSON values are opaque leaves: a
/// JSON array is data, not a result sequence, and is never searched.
#[derive(Debug, Clone)]
pub enum HandlerResult {
    Envelope(Envelope),
    Value(Value),
    Seq(Vec<HandlerResult>),
}

impl HandlerResult {
    /// A result carrying nothing for the middlewares
    pub fn none() -> Self {
        HandlerResult::Value(Value::Null)
    }

    pub fn seq(items: impl IntoIterator<Item = impl Into<HandlerResult>>) -> Self {
        HandlerResult::Seq(items.into_iter().map(Into::into).collect())
    }
}

impl Default for HandlerResult {
    fn default() -> Self {
        Self::none()
    }
}

impl From<Envelope> for HandlerResult {
    fn from(envelope: Envelope) -> Self {
        HandlerResult::Envelope(envelope)
    }
}

impl From<NewData> for HandlerResult {
    fn from(data: NewData) -> Self {
        HandlerResult::Envelope(Envelope::NewData(data))
    }
}

impl From<NewState> for HandlerResult {
    fn from(state: NewState) -> Self {
        HandlerResult::Envelope(Envelope::NewState(state))
    }
}

impl From<HandleException> for HandlerResult {
    fn from(exception: HandleException) -> Self {
        HandlerResult::Envelope(Envelope::HandleException(exception))
    }
}

impl From<Value> for HandlerResult {
    fn from(value: Value) -> Self {
        HandlerResult::Value(value)
    }
}

impl From<Vec<HandlerResult>> for HandlerResult {
    fn from(items: Vec<HandlerResult>) -> Self {
        HandlerResult::Seq(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_list_wraps_single_value() {
        assert_eq!(OneOrMany::One(7).to_list(), vec![7]);
    }

    #[test]
    fn test_to_list_keeps_sequence() {
        let items = vec![1, 2, 3];
        assert_eq!(OneOrMany::Many(items.clone()).to_list(), items);
    }

    #[test]
    fn test_to_list_is_idempotent() {
        let once = OneOrMany::One("x").to_list();
        let twice = OneOrMany::Many(once.clone()).to_list();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_value_to_list() {
        assert_eq!(value_to_list(json!(2)), vec![json!(2)]);
        assert_eq!(value_to_list(json!([1, 2])), vec![json!(1), json!(2)]);
        // Nested arrays are flattened only one level
        assert_eq!(value_to_list(json!([[1], 2])), vec![json!([1]), json!(2)]);
    }

    #[test]
    fn test_one_or_many_deserializes_both_shapes() {
        let one: OneOrMany<String> = serde_json::from_value(json!("a")).unwrap();
        let many: OneOrMany<String> = serde_json::from_value(json!(["a", "b"])).unwrap();
        assert_eq!(one.as_slice(), ["a".to_string()]);
        assert_eq!(many.as_slice(), ["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_envelope_deserializes_tagged() {
        let envelope: Envelope = serde_json::from_value(json!({
            "envelope": "handle_exception",
            "on_exception": "Please send a number"
        }))
        .unwrap();

        match envelope {
            Envelope::HandleException(e) => {
                assert_eq!(e.on_exception.as_slice().len(), 1);
            }
            other => panic!("Expected HandleException, got {other:?}"),
        }
    }

    #[test]
    fn test_tagged_new_data_decodes() {
        let envelope: Envelope = serde_json::from_value(json!({
            "envelope": "new_data",
            "set": { "a": 1 },
            "delete": ["b", "c"]
        }))
        .unwrap();

        match envelope {
            Envelope::NewData(data) => {
                assert_eq!(data.set["a"], json!(1));
                assert_eq!(data.delete.as_slice().len(), 2);
            }
            other => panic!("Expected NewData, got {other:?}"),
        }
    }

    #[test]
    fn test_misspelled_envelope_fields_are_rejected() {
        let malformed = [
            json!({ "envelope": "new_data", "sett": { "a": 1 } }),
            json!({ "envelope": "handle_exception", "on_exceptoin": "Try again" }),
            json!({ "envelope": "new_state", "conv_state": "previous", "exit": "bye" }),
        ];

        for value in malformed {
            let result = serde_json::from_value::<Envelope>(value.clone());
            assert!(result.is_err(), "accepted malformed envelope {value}");
        }
    }
}
