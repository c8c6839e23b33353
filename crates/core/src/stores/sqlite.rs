use crate::error::CoreError;
use crate::models::{Conversation, ConversationSummary, Document, Turn};
use crate::traits::{ConversationStore, DocumentStore};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// SQLite-backed persistence for conversations, turns and document records.
///
/// The connection is wrapped in a Mutex since rusqlite's Connection is not
/// Sync; WAL mode keeps concurrent readers safe at the OS level.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|error| CoreError::Store(error.to_string()))?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;
        Self::migrate(&conn)?;
        info!("sqlite store opened at {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, used by tests.
    pub fn in_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::migrate(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn migrate(conn: &Connection) -> Result<(), CoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS conversations (
                 id TEXT PRIMARY KEY,
                 user_id TEXT NOT NULL,
                 title TEXT NOT NULL,
                 created_at TEXT NOT NULL
             );

             CREATE TABLE IF NOT EXISTS messages (
                 id TEXT PRIMARY KEY,
                 conversation_id TEXT NOT NULL
                     REFERENCES conversations(id) ON DELETE CASCADE,
                 user_message TEXT NOT NULL,
                 ai_response TEXT NOT NULL,
                 timestamp TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_messages_conversation
                 ON messages(conversation_id, timestamp);

             CREATE TABLE IF NOT EXISTS documents (
                 id TEXT PRIMARY KEY,
                 filename TEXT NOT NULL,
                 blob_key TEXT NOT NULL,
                 processed INTEGER NOT NULL DEFAULT 0,
                 uploaded_by TEXT NOT NULL,
                 uploaded_at TEXT NOT NULL,
                 file_size INTEGER NOT NULL,
                 content_type TEXT NOT NULL
             );",
        )?;
        Ok(())
    }

    fn with_conn<T>(
        &self,
        operation: impl FnOnce(&Connection) -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        let conn = self
            .conn
            .lock()
            .map_err(|error| CoreError::Store(format!("connection lock poisoned: {error}")))?;
        operation(&conn)
    }
}

fn encode_timestamp(stamp: DateTime<Utc>) -> String {
    stamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_uuid(value: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(value).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(error))
    })
}

fn parse_timestamp(value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|stamp| stamp.with_timezone(&Utc))
        .map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(error),
            )
        })
}

fn turn_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Turn> {
    let id: String = row.get(0)?;
    let conversation_id: String = row.get(1)?;
    let timestamp: String = row.get(4)?;

    Ok(Turn {
        id: parse_uuid(&id)?,
        conversation_id: parse_uuid(&conversation_id)?,
        user_message: row.get(2)?,
        ai_response: row.get(3)?,
        timestamp: parse_timestamp(&timestamp)?,
    })
}

fn document_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    let id: String = row.get(0)?;
    let uploaded_by: String = row.get(4)?;
    let uploaded_at: String = row.get(5)?;
    let file_size: i64 = row.get(6)?;

    Ok(Document {
        id: parse_uuid(&id)?,
        filename: row.get(1)?,
        blob_key: row.get(2)?,
        processed: row.get::<_, i64>(3)? != 0,
        uploaded_by: parse_uuid(&uploaded_by)?,
        uploaded_at: parse_timestamp(&uploaded_at)?,
        file_size: file_size as u64,
        content_type: row.get(7)?,
    })
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn create_conversation(
        &self,
        user_id: Uuid,
        title: &str,
    ) -> Result<Conversation, CoreError> {
        let conversation = Conversation {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            created_at: Utc::now(),
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO conversations (id, user_id, title, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    conversation.id.to_string(),
                    conversation.user_id.to_string(),
                    conversation.title,
                    encode_timestamp(conversation.created_at),
                ],
            )?;
            Ok(())
        })?;

        Ok(conversation)
    }

    async fn conversation(&self, id: Uuid) -> Result<Option<Conversation>, CoreError> {
        self.with_conn(|conn| {
            let mut statement = conn.prepare(
                "SELECT id, user_id, title, created_at FROM conversations WHERE id = ?1",
            )?;
            let mut rows = statement.query_map(params![id.to_string()], |row| {
                let id: String = row.get(0)?;
                let user_id: String = row.get(1)?;
                let created_at: String = row.get(3)?;
                Ok(Conversation {
                    id: parse_uuid(&id)?,
                    user_id: parse_uuid(&user_id)?,
                    title: row.get(2)?,
                    created_at: parse_timestamp(&created_at)?,
                })
            })?;

            rows.next().transpose().map_err(CoreError::from)
        })
    }

    async fn recent_turns(
        &self,
        conversation_id: Uuid,
        limit: usize,
    ) -> Result<Vec<Turn>, CoreError> {
        self.with_conn(|conn| {
            let mut statement = conn.prepare(
                "SELECT id, conversation_id, user_message, ai_response, timestamp
                 FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY timestamp DESC, rowid DESC
                 LIMIT ?2",
            )?;
            let rows = statement.query_map(
                params![conversation_id.to_string(), limit as i64],
                turn_from_row,
            )?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(CoreError::from)
        })
    }

    async fn append_turn(
        &self,
        conversation_id: Uuid,
        user_message: &str,
        ai_response: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Turn, CoreError> {
        let turn = Turn {
            id: Uuid::new_v4(),
            conversation_id,
            user_message: user_message.to_string(),
            ai_response: ai_response.to_string(),
            timestamp,
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, conversation_id, user_message, ai_response, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    turn.id.to_string(),
                    turn.conversation_id.to_string(),
                    turn.user_message,
                    turn.ai_response,
                    encode_timestamp(turn.timestamp),
                ],
            )?;
            Ok(())
        })?;

        Ok(turn)
    }

    async fn conversation_turns(&self, conversation_id: Uuid) -> Result<Vec<Turn>, CoreError> {
        self.with_conn(|conn| {
            let mut statement = conn.prepare(
                "SELECT id, conversation_id, user_message, ai_response, timestamp
                 FROM messages
                 WHERE conversation_id = ?1
                 ORDER BY timestamp ASC, rowid ASC",
            )?;
            let rows = statement.query_map(params![conversation_id.to_string()], turn_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(CoreError::from)
        })
    }

    async fn summaries_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<ConversationSummary>, CoreError> {
        self.with_conn(|conn| {
            let mut statement = conn.prepare(
                "SELECT c.id, c.title, c.created_at, COUNT(m.id)
                 FROM conversations c
                 LEFT JOIN messages m ON m.conversation_id = c.id
                 WHERE c.user_id = ?1
                 GROUP BY c.id
                 ORDER BY c.created_at DESC, c.rowid DESC",
            )?;
            let rows = statement.query_map(params![user_id.to_string()], |row| {
                let id: String = row.get(0)?;
                let created_at: String = row.get(2)?;
                let message_count: i64 = row.get(3)?;
                Ok(ConversationSummary {
                    id: parse_uuid(&id)?,
                    title: row.get(1)?,
                    created_at: parse_timestamp(&created_at)?,
                    message_count: message_count as u64,
                })
            })?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(CoreError::from)
        })
    }

    async fn totals(&self) -> Result<(u64, u64), CoreError> {
        self.with_conn(|conn| {
            let conversations: i64 =
                conn.query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))?;
            let turns: i64 =
                conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
            Ok((conversations as u64, turns as u64))
        })
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn insert_document(&self, document: &Document) -> Result<(), CoreError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO documents
                     (id, filename, blob_key, processed, uploaded_by, uploaded_at,
                      file_size, content_type)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    document.id.to_string(),
                    document.filename,
                    document.blob_key,
                    document.processed as i64,
                    document.uploaded_by.to_string(),
                    encode_timestamp(document.uploaded_at),
                    document.file_size as i64,
                    document.content_type,
                ],
            )?;
            Ok(())
        })
    }

    async fn document(&self, id: Uuid) -> Result<Option<Document>, CoreError> {
        self.with_conn(|conn| {
            let mut statement = conn.prepare(
                "SELECT id, filename, blob_key, processed, uploaded_by, uploaded_at,
                        file_size, content_type
                 FROM documents WHERE id = ?1",
            )?;
            let mut rows = statement.query_map(params![id.to_string()], document_from_row)?;
            rows.next().transpose().map_err(CoreError::from)
        })
    }

    async fn documents(&self) -> Result<Vec<Document>, CoreError> {
        self.with_conn(|conn| {
            let mut statement = conn.prepare(
                "SELECT id, filename, blob_key, processed, uploaded_by, uploaded_at,
                        file_size, content_type
                 FROM documents
                 ORDER BY uploaded_at DESC, rowid DESC",
            )?;
            let rows = statement.query_map([], document_from_row)?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(CoreError::from)
        })
    }

    async fn mark_processed(&self, id: Uuid) -> Result<(), CoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE documents SET processed = 1 WHERE id = ?1",
                params![id.to_string()],
            )?;
            if changed == 0 {
                return Err(CoreError::NotFound(format!("document not found: {id}")));
            }
            Ok(())
        })
    }

    async fn delete_document(&self, id: Uuid) -> Result<(), CoreError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "DELETE FROM documents WHERE id = ?1",
                params![id.to_string()],
            )?;
            if changed == 0 {
                return Err(CoreError::NotFound(format!("document not found: {id}")));
            }
            Ok(())
        })
    }

    async fn totals(&self) -> Result<(u64, u64), CoreError> {
        self.with_conn(|conn| {
            let documents: i64 =
                conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
            let processed: i64 = conn.query_row(
                "SELECT COUNT(*) FROM documents WHERE processed = 1",
                [],
                |row| row.get(0),
            )?;
            Ok((documents as u64, processed as u64))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteStore;
    use crate::models::Document;
    use crate::traits::{ConversationStore, DocumentStore};
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn document(uploaded_by: Uuid) -> Document {
        Document {
            id: Uuid::new_v4(),
            filename: "report.pdf".to_string(),
            blob_key: format!("documents/{}_report.pdf", Uuid::new_v4()),
            processed: false,
            uploaded_by,
            uploaded_at: Utc::now(),
            file_size: 1024,
            content_type: "application/pdf".to_string(),
        }
    }

    #[tokio::test]
    async fn turns_round_trip_and_keep_order() {
        let store = SqliteStore::in_memory().expect("open store");
        let user = Uuid::new_v4();
        let conversation = store
            .create_conversation(user, "test")
            .await
            .expect("create conversation");

        let base = Utc::now();
        for index in 0..5 {
            store
                .append_turn(
                    conversation.id,
                    &format!("q{index}"),
                    &format!("a{index}"),
                    base + Duration::milliseconds(index),
                )
                .await
                .expect("append turn");
        }

        let recent = store
            .recent_turns(conversation.id, 3)
            .await
            .expect("recent turns");
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].user_message, "q4");
        assert_eq!(recent[2].user_message, "q2");

        let all = store
            .conversation_turns(conversation.id)
            .await
            .expect("all turns");
        assert_eq!(all.len(), 5);
        assert_eq!(all[0].user_message, "q0");
        assert_eq!(all[4].ai_response, "a4");
    }

    #[tokio::test]
    async fn same_timestamp_turns_keep_insertion_order() {
        let store = SqliteStore::in_memory().expect("open store");
        let user = Uuid::new_v4();
        let conversation = store
            .create_conversation(user, "test")
            .await
            .expect("create conversation");

        let stamp = Utc::now();
        store
            .append_turn(conversation.id, "first", "one", stamp)
            .await
            .expect("append turn");
        store
            .append_turn(conversation.id, "second", "two", stamp)
            .await
            .expect("append turn");

        let all = store
            .conversation_turns(conversation.id)
            .await
            .expect("all turns");
        assert_eq!(all[0].user_message, "first");
        assert_eq!(all[1].user_message, "second");

        let recent = store
            .recent_turns(conversation.id, 1)
            .await
            .expect("recent turns");
        assert_eq!(recent[0].user_message, "second");
    }

    #[tokio::test]
    async fn summaries_are_newest_first_with_counts() {
        let store = SqliteStore::in_memory().expect("open store");
        let user = Uuid::new_v4();
        let other = Uuid::new_v4();

        let first = store
            .create_conversation(user, "first")
            .await
            .expect("create conversation");
        let second = store
            .create_conversation(user, "second")
            .await
            .expect("create conversation");
        store
            .create_conversation(other, "not mine")
            .await
            .expect("create conversation");

        store
            .append_turn(first.id, "q", "a", Utc::now())
            .await
            .expect("append turn");

        let summaries = store
            .summaries_for_user(user)
            .await
            .expect("summaries");
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].id, second.id);
        assert_eq!(summaries[0].message_count, 0);
        assert_eq!(summaries[1].id, first.id);
        assert_eq!(summaries[1].message_count, 1);
    }

    #[tokio::test]
    async fn documents_round_trip_and_mark_processed() {
        let store = SqliteStore::in_memory().expect("open store");
        let uploaded = document(Uuid::new_v4());
        store
            .insert_document(&uploaded)
            .await
            .expect("insert document");

        let loaded = store
            .document(uploaded.id)
            .await
            .expect("load document")
            .expect("document exists");
        assert_eq!(loaded.filename, uploaded.filename);
        assert_eq!(loaded.blob_key, uploaded.blob_key);
        assert!(!loaded.processed);

        store
            .mark_processed(uploaded.id)
            .await
            .expect("mark processed");
        let loaded = store
            .document(uploaded.id)
            .await
            .expect("load document")
            .expect("document exists");
        assert!(loaded.processed);

        let (total, processed) = DocumentStore::totals(&store).await.expect("totals");
        assert_eq!((total, processed), (1, 1));
    }

    #[tokio::test]
    async fn missing_document_is_none_and_delete_reports_not_found() {
        let store = SqliteStore::in_memory().expect("open store");
        let id = Uuid::new_v4();

        assert!(store.document(id).await.expect("load").is_none());
        assert!(store.delete_document(id).await.is_err());
    }

    #[tokio::test]
    async fn store_persists_across_connections() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("assistant.db");
        let user = Uuid::new_v4();

        {
            let store = SqliteStore::open(&path).expect("open store");
            store
                .create_conversation(user, "persisted")
                .await
                .expect("create conversation");
        }

        let store = SqliteStore::open(&path).expect("reopen store");
        let summaries = store
            .summaries_for_user(user)
            .await
            .expect("summaries");
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].title, "persisted");
    }
}
