//! Post-processing middlewares
//!
//! Each middleware sees the handler result and the round's open transaction.
//! Changes are staged on the transaction; `PostProcessor` commits once every
//! middleware has succeeded.

use super::effect::Effect;
use super::transition::transition;
use super::RouterError;
use crate::config::RouterConfig;
use crate::envelope::{HandlerResult, NewData};
use crate::quest::ask_question;
use crate::scan::search_in_results;
use crate::states::{ConvPosition, StateRegistry};
use crate::store::{ConversationStore, Transaction};
use crate::transport::Transport;
use async_trait::async_trait;
use std::sync::Arc;

/// One step of the post-processing chain
#[async_trait]
pub trait PostMiddleware<S: ConversationStore>: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    async fn on_post_process(
        &self,
        tx: &mut Transaction<'_, S>,
        results: &HandlerResult,
    ) -> Result<(), RouterError>;
}

/// Applies the first `NewData` found in the result to the conversation data
#[derive(Debug, Default, Clone, Copy)]
pub struct UserDataUpdater;

#[async_trait]
impl<S: ConversationStore> PostMiddleware<S> for UserDataUpdater {
    fn name(&self) -> &'static str {
        "user_data_updater"
    }

    async fn on_post_process(
        &self,
        tx: &mut Transaction<'_, S>,
        results: &HandlerResult,
    ) -> Result<(), RouterError> {
        let Some(new_data) = search_in_results::<NewData>(results) else {
            return Ok(());
        };

        new_data.apply_in(tx)?;
        Ok(())
    }
}

/// Moves the conversation between states and asks the questions that go
/// with each move
pub struct SwitchConvState<T: ?Sized> {
    transport: Arc<T>,
    registry: Arc<StateRegistry>,
    config: RouterConfig,
}

impl<T: Transport + ?Sized> SwitchConvState<T> {
    pub fn new(transport: Arc<T>, registry: Arc<StateRegistry>, config: RouterConfig) -> Self {
        Self {
            transport,
            registry,
            config,
        }
    }
}

#[async_trait]
impl<T, S> PostMiddleware<S> for SwitchConvState<T>
where
    T: Transport + ?Sized,
    S: ConversationStore,
{
    fn name(&self) -> &'static str {
        "switch_conv_state"
    }

    async fn on_post_process(
        &self,
        tx: &mut Transaction<'_, S>,
        results: &HandlerResult,
    ) -> Result<(), RouterError> {
        let key = tx.key();
        let from = describe(tx.position());
        let result = transition(tx.position(), &self.registry, results)?;

        for effect in result.effects {
            match effect {
                Effect::PersistPosition(position) => tx.set_position(position),
                Effect::FinishConversation => {
                    tx.set_position(ConvPosition::default());
                    if self.config.clear_data_on_finish {
                        tx.data_mut().clear();
                    }
                }
                Effect::AskQuestions(question) => {
                    ask_question(self.transport.as_ref(), key, &question).await?;
                }
            }
        }

        tracing::info!(
            chat_id = key.chat_id,
            user_id = key.user_id,
            route = result.kind.as_str(),
            from = %from,
            state = %describe(tx.position()),
            "Conversation routed"
        );
        Ok(())
    }
}

fn describe(position: &ConvPosition) -> String {
    position
        .current
        .as_ref()
        .map_or_else(|| "-".to_string(), ToString::to_string)
}
