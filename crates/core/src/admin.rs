use crate::error::CoreError;
use crate::models::{Identity, SystemStats};
use crate::policy::{self, Action};
use crate::traits::{ConversationStore, DocumentStore};

/// Corpus-wide counters for operators.
pub async fn system_stats(
    identity: &Identity,
    conversations: &impl ConversationStore,
    documents: &impl DocumentStore,
) -> Result<SystemStats, CoreError> {
    policy::authorize(identity, Action::ViewStats)?;

    let (conversation_count, turn_count) = conversations.totals().await?;
    let (document_count, processed_count) = documents.totals().await?;

    Ok(SystemStats {
        conversations: conversation_count,
        turns: turn_count,
        documents: document_count,
        processed_documents: processed_count,
    })
}

#[cfg(test)]
mod tests {
    use super::system_stats;
    use crate::error::CoreError;
    use crate::models::{Document, Identity, Role};
    use crate::stores::SqliteStore;
    use crate::traits::{ConversationStore, DocumentStore};
    use chrono::Utc;
    use uuid::Uuid;

    #[tokio::test]
    async fn stats_count_conversations_turns_and_documents() {
        let store = SqliteStore::in_memory().expect("open store");
        let user = Uuid::new_v4();

        let conversation = store
            .create_conversation(user, "stats")
            .await
            .expect("create conversation");
        store
            .append_turn(conversation.id, "q", "a", Utc::now())
            .await
            .expect("append turn");

        let document = Document {
            id: Uuid::new_v4(),
            filename: "report.pdf".to_string(),
            blob_key: "documents/report.pdf".to_string(),
            processed: false,
            uploaded_by: user,
            uploaded_at: Utc::now(),
            file_size: 1,
            content_type: "application/pdf".to_string(),
        };
        store.insert_document(&document).await.expect("insert");
        store
            .mark_processed(document.id)
            .await
            .expect("mark processed");

        let operator = Identity {
            user_id: user,
            role: Role::Admin,
        };
        let stats = system_stats(&operator, &store, &store)
            .await
            .expect("stats");

        assert_eq!(stats.conversations, 1);
        assert_eq!(stats.turns, 1);
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.processed_documents, 1);
    }

    #[tokio::test]
    async fn stats_are_admin_only() {
        let store = SqliteStore::in_memory().expect("open store");
        let viewer = Identity {
            user_id: Uuid::new_v4(),
            role: Role::Staff,
        };

        let result = system_stats(&viewer, &store, &store).await;
        assert!(matches!(result, Err(CoreError::Forbidden(_))));
    }
}
