//! Post-processing of handler results
//!
//! The dispatcher calls `PostProcessor` once per handled message or callback
//! query. One round opens one transaction on the conversation, runs every
//! middleware against it, and commits only if all of them succeeded.

mod effect;
mod middleware;
mod transition;

#[cfg(test)]
mod proptests;

pub use effect::{Effect, RouteKind};
pub use middleware::{PostMiddleware, SwitchConvState, UserDataUpdater};
pub use transition::{transition, TransitionResult};

use crate::config::RouterConfig;
use crate::envelope::{EnvelopeError, HandlerResult};
use crate::states::StateRegistry;
use crate::store::{ConvKey, ConversationStore, ScopedStore, StoreError};
use crate::transport::{CallbackQuery, IncomingMessage, Transport, TransportError};
use std::sync::Arc;
use thiserror::Error;

/// Anything that can abort a post-processing round
#[derive(Debug, Error)]
pub enum RouterError {
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Hook run after every handler
pub struct PostProcessor<T: ?Sized, S> {
    transport: Arc<T>,
    store: ScopedStore<S>,
    middlewares: Vec<Box<dyn PostMiddleware<S>>>,
}

impl<T, S> PostProcessor<T, S>
where
    T: Transport + ?Sized + 'static,
    S: ConversationStore + 'static,
{
    /// Standard chain: `UserDataUpdater` then `SwitchConvState`
    pub fn new(
        transport: Arc<T>,
        store: S,
        registry: Arc<StateRegistry>,
        config: RouterConfig,
    ) -> Self {
        let switch = SwitchConvState::new(transport.clone(), registry, config);
        Self::with_middlewares(transport, store, vec![Box::new(UserDataUpdater), Box::new(switch)])
    }

    pub fn with_middlewares(
        transport: Arc<T>,
        store: S,
        middlewares: Vec<Box<dyn PostMiddleware<S>>>,
    ) -> Self {
        Self {
            transport,
            store: ScopedStore::new(store),
            middlewares,
        }
    }

    /// Append a middleware to the end of the chain
    #[must_use]
    pub fn middleware(mut self, middleware: impl PostMiddleware<S> + 'static) -> Self {
        self.middlewares.push(Box::new(middleware));
        self
    }

    pub fn store(&self) -> &ScopedStore<S> {
        &self.store
    }

    pub async fn on_message(
        &self,
        message: &IncomingMessage,
        results: &HandlerResult,
    ) -> Result<(), RouterError> {
        self.process(message.conv_key(), results).await
    }

    /// Acknowledge the query, then post-process it as a message from the
    /// pressing user
    pub async fn on_callback_query(
        &self,
        query: &CallbackQuery,
        results: &HandlerResult,
    ) -> Result<(), RouterError> {
        self.transport.answer_callback_query(&query.id).await?;
        self.process(query.conv_key(), results).await
    }

    async fn process(&self, key: ConvKey, results: &HandlerResult) -> Result<(), RouterError> {
        let mut tx = self.store.begin(key).await?;

        for middleware in &self.middlewares {
            if let Err(e) = middleware.on_post_process(&mut tx, results).await {
                tracing::warn!(
                    chat_id = key.chat_id,
                    user_id = key.user_id,
                    middleware = middleware.name(),
                    error = %e,
                    "Post-processing failed, changes discarded"
                );
                return Err(e);
            }
        }

        if !tx.is_modified() {
            tx.abort();
            return Ok(());
        }

        if let Err(e) = tx.commit().await {
            tracing::warn!(
                chat_id = key.chat_id,
                user_id = key.user_id,
                error = %e,
                "Commit failed, changes discarded"
            );
            return Err(e.into());
        }
        Ok(())
    }
}
