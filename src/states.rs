//! Conversation state definitions
//!
//! Groups are defined once at startup and never change afterwards. What does
//! change, per user and chat, is the `ConvPosition` stored alongside the
//! conversation data.

use crate::envelope::EnvelopeError;
use crate::quest::Quests;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// One state inside one group
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConvState {
    pub group: String,
    pub name: String,
}

impl ConvState {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ConvState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group, self.name)
    }
}

/// A state together with the question asked when the conversation enters it
#[derive(Debug, Clone)]
struct StateDef {
    state: ConvState,
    question: Quests,
}

/// Errors in group definitions, reported at startup
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("State group `{0}` has no states")]
    EmptyGroup(String),
    #[error("State group `{0}` is defined twice")]
    DuplicateGroup(String),
    #[error("State `{0}` is defined twice")]
    DuplicateState(ConvState),
}

/// Ordered sequence of states forming one conversation flow
#[derive(Debug, Clone)]
pub struct ConvStatesGroup {
    name: String,
    states: Vec<StateDef>,
}

impl ConvStatesGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            states: Vec::new(),
        }
    }

    /// Append a state asking `question` on entry
    #[must_use]
    pub fn state(mut self, name: impl Into<String>, question: impl Into<Quests>) -> Self {
        let state = ConvState::new(self.name.clone(), name);
        self.states.push(StateDef {
            state,
            question: question.into(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// First state of the group, `None` for a group with no states
    pub fn first_state(&self) -> Option<&ConvState> {
        self.states.first().map(|def| &def.state)
    }

    fn index_of(&self, state: &ConvState) -> Option<usize> {
        self.states.iter().position(|def| &def.state == state)
    }

    /// State following `current`, `None` at the end of the group
    pub fn state_after(&self, current: &ConvState) -> Option<&ConvState> {
        let index = self.index_of(current)?;
        self.states.get(index + 1).map(|def| &def.state)
    }

    fn validate(&self) -> Result<(), DefinitionError> {
        if self.states.is_empty() {
            return Err(DefinitionError::EmptyGroup(self.name.clone()));
        }
        for (i, def) in self.states.iter().enumerate() {
            if self.states[..i].iter().any(|prior| prior.state == def.state) {
                return Err(DefinitionError::DuplicateState(def.state.clone()));
            }
        }
        Ok(())
    }
}

/// All state groups known to the bot
#[derive(Debug, Clone, Default)]
pub struct StateRegistry {
    groups: HashMap<String, ConvStatesGroup>,
}

impl StateRegistry {
    pub fn new(groups: impl IntoIterator<Item = ConvStatesGroup>) -> Result<Self, DefinitionError> {
        let mut registry = Self::default();
        for group in groups {
            group.validate()?;
            if registry.groups.contains_key(group.name()) {
                return Err(DefinitionError::DuplicateGroup(group.name.clone()));
            }
            registry.groups.insert(group.name.clone(), group);
        }
        tracing::debug!(groups = registry.groups.len(), "State registry built");
        Ok(registry)
    }

    pub fn group(&self, name: &str) -> Option<&ConvStatesGroup> {
        self.groups.get(name)
    }

    fn def(&self, state: &ConvState) -> Result<&StateDef, EnvelopeError> {
        self.group(&state.group)
            .and_then(|group| group.index_of(state).map(|i| &group.states[i]))
            .ok_or_else(|| EnvelopeError::UnknownState(state.clone()))
    }

    /// Question asked when entering `state`
    pub fn question(&self, state: &ConvState) -> Result<&Quests, EnvelopeError> {
        self.def(state).map(|def| &def.question)
    }

    /// State following `current` within its group
    pub fn state_after(&self, current: &ConvState) -> Result<Option<&ConvState>, EnvelopeError> {
        let group = self
            .group(&current.group)
            .ok_or_else(|| EnvelopeError::UnknownState(current.clone()))?;
        if group.index_of(current).is_none() {
            return Err(EnvelopeError::UnknownState(current.clone()));
        }
        Ok(group.state_after(current))
    }
}

/// Where one conversation currently is
///
/// `entry_stack` holds, for each nested group, the state that was active when
/// the conversation entered it. Its top is what `NewState::previous()`
/// returns to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvPosition {
    pub current: Option<ConvState>,
    #[serde(default)]
    pub entry_stack: Vec<ConvState>,
}

impl ConvPosition {
    pub fn at(state: ConvState) -> Self {
        Self {
            current: Some(state),
            entry_stack: Vec::new(),
        }
    }

    pub fn in_conversation(&self) -> bool {
        self.current.is_some()
    }

    pub fn state_before_group_entry(&self) -> Option<&ConvState> {
        self.entry_stack.last()
    }

    /// Make `next` the current state, maintaining the group entry stack
    pub fn enter(&mut self, next: ConvState) {
        match self.current.take() {
            None => self.entry_stack.clear(),
            Some(current) if current.group == next.group => {}
            Some(current) => {
                // Returning into a group we came from unwinds to its entry
                if let Some(index) = self.entry_stack.iter().rposition(|s| s.group == next.group) {
                    self.entry_stack.truncate(index);
                } else {
                    self.entry_stack.push(current);
                }
            }
        }
        self.current = Some(next);
    }

    /// Leave the conversation entirely
    pub fn finish(&mut self) {
        self.current = None;
        self.entry_stack.clear();
    }
}
