//! Pure routing decision
//!
//! Given the stored position and a handler result, decide what happens next.
//! No I/O here; `SwitchConvState` executes the returned effects.

use super::effect::{Effect, RouteKind};
use crate::envelope::{EnvelopeError, HandleException, HandlerResult, NewState};
use crate::quest::{Quest, Quests};
use crate::scan::search_in_results;
use crate::states::{ConvPosition, ConvState, StateRegistry};

/// Result of a routing decision
#[derive(Debug)]
pub struct TransitionResult {
    pub kind: RouteKind,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(kind: RouteKind) -> Self {
        Self {
            kind,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    /// Add a question batch, skipping empty ones
    #[must_use]
    pub fn with_questions(self, questions: Quests) -> Self {
        if questions.is_empty() {
            self
        } else {
            self.with_effect(Effect::AskQuestions(questions))
        }
    }

    /// Position the conversation ends up in, if it changes
    pub fn new_position(&self) -> Option<ConvPosition> {
        self.effects.iter().find_map(|effect| match effect {
            Effect::PersistPosition(position) => Some(position.clone()),
            Effect::FinishConversation => Some(ConvPosition::default()),
            Effect::AskQuestions(_) => None,
        })
    }

    /// Every question that will be sent, flattened in order
    pub fn questions(&self) -> impl Iterator<Item = &Quest> {
        self.effects.iter().flat_map(|effect| match effect {
            Effect::AskQuestions(quests) => quests.as_slice(),
            _ => &[][..],
        })
    }
}

/// Decide the next conversation state.
///
/// Priority: `HandleException`, then `NewState`, then implicit advance within
/// the current group. Only the first matching rule acts.
pub fn transition(
    position: &ConvPosition,
    registry: &StateRegistry,
    results: &HandlerResult,
) -> Result<TransitionResult, EnvelopeError> {
    if let Some(exception) = search_in_results::<HandleException>(results) {
        return Ok(TransitionResult::new(RouteKind::Exception)
            .with_questions(exception.on_exception.clone()));
    }

    if let Some(new_state) = search_in_results::<NewState>(results) {
        return match new_state.get_next_state(registry, position)? {
            Some(next) => enter(position, registry, next, RouteKind::ExplicitEnter),
            None => Ok(finish(RouteKind::ExplicitExit, new_state.on_conv_exit.clone())),
        };
    }

    let Some(current) = &position.current else {
        return Ok(TransitionResult::new(RouteKind::Idle));
    };

    match registry.state_after(current)? {
        Some(next) => enter(position, registry, next.clone(), RouteKind::Advance),
        // No configurable exit message on group exhaustion
        None => Ok(finish(RouteKind::GroupExhausted, Quests::none())),
    }
}

fn enter(
    position: &ConvPosition,
    registry: &StateRegistry,
    next: ConvState,
    kind: RouteKind,
) -> Result<TransitionResult, EnvelopeError> {
    let question = registry.question(&next)?.clone();
    let mut new_position = position.clone();
    new_position.enter(next);

    Ok(TransitionResult::new(kind)
        .with_effect(Effect::PersistPosition(new_position))
        .with_questions(question))
}

fn finish(kind: RouteKind, on_exit: Quests) -> TransitionResult {
    TransitionResult::new(kind)
        .with_effect(Effect::FinishConversation)
        .with_questions(on_exit)
}
