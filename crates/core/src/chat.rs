use crate::error::CoreError;
use crate::models::{
    Conversation, ConversationSummary, HistoryTurn, Identity, Turn, TurnOutcome,
};
use crate::policy::{self, Action};
use crate::rewriter::QueryRewriter;
use crate::traits::{CompletionModel, ConversationStore, KnowledgeEngine};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

/// How many past turns are loaded as rewriting context.
pub const HISTORY_WINDOW_TURNS: usize = 3;

#[derive(Debug, Clone)]
pub struct ChatOptions {
    /// Upper bound for one knowledge-engine query.
    pub engine_timeout: Duration,
    /// Upper bound for one rewrite completion.
    pub rewrite_timeout: Duration,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            engine_timeout: Duration::from_secs(120),
            rewrite_timeout: Duration::from_secs(30),
        }
    }
}

/// Top-level coordinator for one chat exchange: resolves the conversation,
/// rewrites the message against recent history, queries the engine off the
/// request task, and appends the completed turn.
///
/// Concurrent turns against the same conversation are not serialized; each
/// request reads its own history snapshot and appends its own turn.
pub struct ChatOrchestrator<S, E, M>
where
    S: ConversationStore,
    E: KnowledgeEngine + 'static,
    M: CompletionModel,
{
    store: S,
    engine: Arc<E>,
    rewriter: QueryRewriter<M>,
    options: ChatOptions,
}

impl<S, E, M> ChatOrchestrator<S, E, M>
where
    S: ConversationStore,
    E: KnowledgeEngine + 'static,
    M: CompletionModel,
{
    pub fn new(store: S, engine: Arc<E>, model: M) -> Self {
        Self::with_options(store, engine, model, ChatOptions::default())
    }

    pub fn with_options(store: S, engine: Arc<E>, model: M, options: ChatOptions) -> Self {
        Self {
            store,
            engine,
            rewriter: QueryRewriter::new(model),
            options,
        }
    }

    pub async fn handle_turn(
        &self,
        identity: &Identity,
        message: &str,
        conversation_id: Option<Uuid>,
    ) -> Result<TurnOutcome, CoreError> {
        policy::authorize(identity, Action::Chat)?;

        if message.trim().is_empty() {
            return Err(CoreError::Validation("message is empty".to_string()));
        }

        let conversation = self
            .resolve_conversation(identity, message, conversation_id)
            .await?;

        let recent = self
            .store
            .recent_turns(conversation.id, HISTORY_WINDOW_TURNS)
            .await?;
        let history: Vec<HistoryTurn> = recent
            .into_iter()
            .rev()
            .map(|turn| HistoryTurn {
                user_message: turn.user_message,
                ai_response: turn.ai_response,
            })
            .collect();

        let standalone = match tokio::time::timeout(
            self.options.rewrite_timeout,
            self.rewriter.rewrite(message, &history),
        )
        .await
        {
            Ok(Ok(standalone)) => standalone,
            Ok(Err(rewrite_error)) => {
                error!(%rewrite_error, conversation_id = %conversation.id, "query rewrite failed");
                return Err(rewrite_error);
            }
            Err(_) => {
                let rewrite_error = CoreError::Engine(format!(
                    "query rewrite timed out after {:?}",
                    self.options.rewrite_timeout
                ));
                error!(%rewrite_error, conversation_id = %conversation.id, "query rewrite failed");
                return Err(rewrite_error);
            }
        };

        let answer = self.query_engine(conversation.id, standalone).await?;

        // A turn is only written once the answer actually exists, and both
        // sides land in one atomic append.
        let turn = self
            .store
            .append_turn(conversation.id, message, &answer, Utc::now())
            .await?;
        info!(conversation_id = %conversation.id, turn_id = %turn.id, "turn appended");

        Ok(TurnOutcome {
            answer,
            conversation_id: conversation.id,
        })
    }

    /// The caller's conversations, newest first.
    pub async fn conversations(
        &self,
        identity: &Identity,
    ) -> Result<Vec<ConversationSummary>, CoreError> {
        policy::authorize(identity, Action::Chat)?;
        self.store.summaries_for_user(identity.user_id).await
    }

    /// Every turn of one owned conversation, oldest first.
    pub async fn history(
        &self,
        identity: &Identity,
        conversation_id: Uuid,
    ) -> Result<Vec<Turn>, CoreError> {
        policy::authorize(identity, Action::Chat)?;
        self.owned_conversation(identity, conversation_id).await?;
        self.store.conversation_turns(conversation_id).await
    }

    async fn resolve_conversation(
        &self,
        identity: &Identity,
        message: &str,
        conversation_id: Option<Uuid>,
    ) -> Result<Conversation, CoreError> {
        match conversation_id {
            Some(id) => self.owned_conversation(identity, id).await,
            None => {
                let title = Conversation::derive_title(message);
                self.store
                    .create_conversation(identity.user_id, &title)
                    .await
            }
        }
    }

    /// Loads a conversation, answering `NotFound` both when it is absent and
    /// when it belongs to someone else, so existence never leaks across
    /// owners.
    async fn owned_conversation(
        &self,
        identity: &Identity,
        conversation_id: Uuid,
    ) -> Result<Conversation, CoreError> {
        self.store
            .conversation(conversation_id)
            .await?
            .filter(|conversation| conversation.user_id == identity.user_id)
            .ok_or_else(|| CoreError::NotFound(format!("conversation not found: {conversation_id}")))
    }

    /// Engine queries ride a spawned task so an aborted caller never kills
    /// an in-flight engine call; the calling task itself waits under a
    /// deadline and turns its expiry into a retrieval failure.
    async fn query_engine(
        &self,
        conversation_id: Uuid,
        question: String,
    ) -> Result<String, CoreError> {
        let engine = Arc::clone(&self.engine);
        let worker = tokio::spawn(async move { engine.query(&question).await });

        match tokio::time::timeout(self.options.engine_timeout, worker).await {
            Ok(Ok(outcome)) => outcome.map_err(|engine_error| {
                error!(%engine_error, %conversation_id, "knowledge engine query failed");
                engine_error
            }),
            Ok(Err(join_error)) => {
                error!(%join_error, %conversation_id, "knowledge engine worker failed");
                Err(CoreError::Engine(format!(
                    "engine worker failed: {join_error}"
                )))
            }
            Err(_) => {
                error!(%conversation_id, "knowledge engine query timed out");
                Err(CoreError::Engine(format!(
                    "engine query timed out after {:?}",
                    self.options.engine_timeout
                )))
            }
        }
    }
}
