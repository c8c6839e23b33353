use crate::error::CoreError;
use crate::models::{Conversation, ConversationSummary, Document, Turn};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The opaque retrieval/answering capability. The engine keeps a single
/// shared mutable index; concurrent inserts and queries are safe only to
/// the extent the engine synchronizes internally, which is a dependency
/// requirement on the engine and not re-implemented here.
#[async_trait]
pub trait KnowledgeEngine: Send + Sync {
    async fn insert(&self, text: &str) -> Result<(), CoreError>;

    async fn query(&self, question: &str) -> Result<String, CoreError>;
}

/// A deterministic text-completion capability used for query rewriting.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CoreError>;
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn create_conversation(
        &self,
        user_id: Uuid,
        title: &str,
    ) -> Result<Conversation, CoreError>;

    async fn conversation(&self, id: Uuid) -> Result<Option<Conversation>, CoreError>;

    /// The last `limit` turns of a conversation, newest first.
    async fn recent_turns(
        &self,
        conversation_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Turn>, CoreError>;

    /// Append one complete exchange atomically; a turn is never visible
    /// with only one side filled in.
    async fn append_turn(
        &self,
        conversation_id: Uuid,
        user_message: &str,
        ai_response: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Turn, CoreError>;

    /// Every turn of a conversation, oldest first.
    async fn conversation_turns(&self, conversation_id: Uuid) -> Result<Vec<Turn>, CoreError>;

    /// A user's conversations, newest first, with message counts.
    async fn summaries_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ConversationSummary>, CoreError>;

    /// (conversation count, turn count) across all users.
    async fn totals(&self) -> Result<(u64, u64), CoreError>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_document(&self, document: &Document) -> Result<(), CoreError>;

    async fn document(&self, id: Uuid) -> Result<Option<Document>, CoreError>;

    /// All documents, newest first.
    async fn documents(&self) -> Result<Vec<Document>, CoreError>;

    async fn mark_processed(&self, id: Uuid) -> Result<(), CoreError>;

    async fn delete_document(&self, id: Uuid) -> Result<(), CoreError>;

    /// (document count, processed document count).
    async fn totals(&self) -> Result<(u64, u64), CoreError>;
}

/// Opaque byte storage for uploaded files. Keys are caller-chosen and
/// globally unique per upload.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), CoreError>;

    /// Fails with `StorageUnavailable` when the blob is missing or the
    /// backend is unreachable.
    async fn get(&self, key: &str) -> Result<Vec<u8>, CoreError>;

    async fn delete(&self, key: &str) -> Result<(), CoreError>;
}
