//! `NewState`: explicit conversation state switch

use super::EnvelopeError;
use crate::quest::Quests;
use crate::states::{ConvPosition, ConvState, ConvStatesGroup, StateRegistry};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

const PREVIOUS: &str = "previous";

/// Where a `NewState` wants the conversation to go
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "RawTarget")]
pub enum StateTarget {
    /// A concrete state
    State(ConvState),
    /// The first state of the named group
    Group(String),
    /// Whatever state was active before the current group was entered
    #[default]
    Previous,
}

/// Wire shape accepted for `conv_state`
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTarget {
    Keyword(String),
    Object(TargetObject),
}

/// `{ "group": .. }` or `{ "group": .., "state": .. }`, nothing else
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TargetObject {
    group: String,
    #[serde(default)]
    state: Option<String>,
}

impl TryFrom<RawTarget> for StateTarget {
    type Error = EnvelopeError;

    fn try_from(raw: RawTarget) -> Result<Self, Self::Error> {
        match raw {
            RawTarget::Keyword(keyword) => keyword.parse(),
            RawTarget::Object(TargetObject {
                group,
                state: Some(state),
            }) => Ok(StateTarget::State(ConvState::new(group, state))),
            RawTarget::Object(TargetObject { group, state: None }) => Ok(StateTarget::Group(group)),
        }
    }
}

impl FromStr for StateTarget {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == PREVIOUS {
            Ok(StateTarget::Previous)
        } else {
            Err(EnvelopeError::UnrecognizedTarget(s.to_string()))
        }
    }
}

impl fmt::Display for StateTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateTarget::State(state) => write!(f, "{state}"),
            StateTarget::Group(group) => write!(f, "{group}:*"),
            StateTarget::Previous => f.write_str(PREVIOUS),
        }
    }
}

impl From<ConvState> for StateTarget {
    fn from(state: ConvState) -> Self {
        StateTarget::State(state)
    }
}

/// Set a specific state, the previous state, or the first state of a group
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewState {
    #[serde(default)]
    pub conv_state: StateTarget,
    /// Sent when the target resolves to no state and the conversation ends
    #[serde(default)]
    pub on_conv_exit: Quests,
}

impl NewState {
    pub fn new(conv_state: impl Into<StateTarget>) -> Self {
        Self {
            conv_state: conv_state.into(),
            on_conv_exit: Quests::none(),
        }
    }

    pub fn previous() -> Self {
        Self::new(StateTarget::Previous)
    }

    pub fn group(name: impl Into<String>) -> Self {
        Self::new(StateTarget::Group(name.into()))
    }

    pub fn state(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(ConvState::new(group, name))
    }

    #[must_use]
    pub fn on_exit(mut self, quests: impl Into<Quests>) -> Self {
        self.on_conv_exit = quests.into();
        self
    }

    /// Resolve the state to be set next.
    ///
    /// `Ok(None)` means there is nowhere to go back to and the conversation
    /// should end.
    pub fn get_next_state(
        &self,
        registry: &StateRegistry,
        position: &ConvPosition,
    ) -> Result<Option<ConvState>, EnvelopeError> {
        match &self.conv_state {
            StateTarget::State(state) => Ok(Some(state.clone())),
            StateTarget::Group(name) => {
                let first = registry
                    .group(name)
                    .and_then(ConvStatesGroup::first_state)
                    .ok_or_else(|| EnvelopeError::UnknownGroup(name.clone()))?;
                Ok(Some(first.clone()))
            }
            StateTarget::Previous => Ok(position.state_before_group_entry().cloned()),
        }
    }
}
