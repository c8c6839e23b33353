pub mod admin;
pub mod chat;
pub mod error;
pub mod ingest;
pub mod models;
pub mod normalizer;
pub mod policy;
pub mod rewriter;
pub mod stores;
pub mod traits;

pub use admin::system_stats;
pub use chat::{ChatOptions, ChatOrchestrator, HISTORY_WINDOW_TURNS};
pub use error::{CoreError, Result};
pub use ingest::{discover_corpus_files, IngestCoordinator, IngestOptions};
pub use models::{
    Conversation, ConversationSummary, Document, HistoryTurn, Identity, Role, SystemStats, Turn,
    TurnOutcome,
};
pub use normalizer::{extract_text, is_supported};
pub use policy::{authorize, Action};
pub use rewriter::{QueryRewriter, MAX_HISTORY_TURNS};
pub use stores::{HttpKnowledgeEngine, HttpObjectStore, OpenAiCompletionClient, SqliteStore};
pub use traits::{BlobStore, CompletionModel, ConversationStore, DocumentStore, KnowledgeEngine};
