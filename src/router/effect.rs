//! Effects produced by a routing decision

use crate::quest::Quests;
use crate::states::ConvPosition;

/// Effects to be executed after a routing decision, in order
#[derive(Debug, Clone)]
pub enum Effect {
    /// Store the new position
    PersistPosition(ConvPosition),

    /// End the conversation
    FinishConversation,

    /// Deliver a question batch
    AskQuestions(Quests),
}

impl Effect {
    pub fn is_state_change(&self) -> bool {
        matches!(self, Effect::PersistPosition(_) | Effect::FinishConversation)
    }
}

/// What kind of decision was taken, for logging and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// `HandleException` answered, position untouched
    Exception,
    /// `NewState` resolved to a state
    ExplicitEnter,
    /// `NewState` resolved to nothing; conversation ended
    ExplicitExit,
    /// Moved to the next state of the current group
    Advance,
    /// Last state of the group handled; conversation ended
    GroupExhausted,
    /// Not in a conversation and nothing requested
    Idle,
}

impl RouteKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RouteKind::Exception => "exception",
            RouteKind::ExplicitEnter => "explicit_enter",
            RouteKind::ExplicitExit => "explicit_exit",
            RouteKind::Advance => "advance",
            RouteKind::GroupExhausted => "group_exhausted",
            RouteKind::Idle => "idle",
        }
    }
}
