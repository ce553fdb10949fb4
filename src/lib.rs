//! convflow - conversation post-processing for chat bots
//!
//! Handlers return declarative envelopes (`NewData`, `NewState`,
//! `HandleException`) inside their results. `PostProcessor` scans those
//! results after each handler runs, updates the stored conversation data,
//! moves the conversation between states and asks the matching questions.

pub mod config;
pub mod envelope;
pub mod quest;
pub mod router;
pub mod scan;
pub mod states;
pub mod store;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{AppConfig, RouterConfig};
pub use envelope::{
    Envelope, EnvelopeError, HandleException, HandlerResult, NewData, NewState, OneOrMany,
    StateTarget, UserData,
};
pub use quest::{ask_question, InlineButton, InlineKeyboard, Quest, QuestFunc, QuestText, Quests};
pub use router::{PostMiddleware, PostProcessor, RouterError, SwitchConvState, UserDataUpdater};
pub use scan::search_in_results;
pub use states::{ConvPosition, ConvState, ConvStatesGroup, DefinitionError, StateRegistry};
pub use store::{
    ConvKey, ConvRecord, ConversationStore, InMemoryStore, ScopedStore, SqliteStore, StoreError,
    Transaction,
};
pub use transport::{CallbackQuery, IncomingMessage, Transport, TransportError};
