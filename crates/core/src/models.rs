use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Display titles are derived from the first message of a conversation and
/// never exceed this many characters (plus the truncation marker).
pub const TITLE_MAX_CHARS: usize = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Title for a conversation opened by `message`: the first 50 characters,
    /// with `...` appended only when the message was actually cut.
    pub fn derive_title(message: &str) -> String {
        let mut title: String = message.chars().take(TITLE_MAX_CHARS).collect();
        if message.chars().count() > TITLE_MAX_CHARS {
            title.push_str("...");
        }
        title
    }
}

/// One persisted exchange: the raw user text and the produced answer,
/// written together as a single row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub user_message: String,
    pub ai_response: String,
    pub timestamp: DateTime<Utc>,
}

/// Transient rewriting context, never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryTurn {
    pub user_message: String,
    pub ai_response: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Admin,
    Staff,
    Member,
}

impl Role {
    /// Roles other than admin/staff collapse to Member, mirroring how the
    /// authentication layer treats every remaining role name.
    pub fn from_name(name: &str) -> Role {
        match name.to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "staff" => Role::Staff,
            _ => Role::Member,
        }
    }
}

/// Authenticated caller, supplied by the authentication collaborator and
/// trusted as-is; core logic never re-validates credentials.
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub answer: String,
    pub conversation_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub filename: String,
    pub blob_key: String,
    pub processed: bool,
    pub uploaded_by: Uuid,
    pub uploaded_at: DateTime<Utc>,
    pub file_size: u64,
    pub content_type: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub message_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemStats {
    pub conversations: u64,
    pub turns: u64,
    pub documents: u64,
    pub processed_documents: u64,
}

#[cfg(test)]
mod tests {
    use super::{Conversation, Role, TITLE_MAX_CHARS};

    #[test]
    fn long_message_title_is_cut_to_fifty_chars_plus_marker() {
        let message = "x".repeat(TITLE_MAX_CHARS + 1);
        let title = Conversation::derive_title(&message);

        assert_eq!(title.chars().count(), TITLE_MAX_CHARS + 3);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn exact_length_message_title_is_unmodified() {
        let message = "y".repeat(TITLE_MAX_CHARS);
        assert_eq!(Conversation::derive_title(&message), message);
    }

    #[test]
    fn short_message_title_is_the_message() {
        assert_eq!(Conversation::derive_title("hello"), "hello");
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let message = "ä".repeat(TITLE_MAX_CHARS);
        assert_eq!(Conversation::derive_title(&message), message);
    }

    #[test]
    fn unknown_role_names_become_member() {
        assert_eq!(Role::from_name("Admin"), Role::Admin);
        assert_eq!(Role::from_name("staff"), Role::Staff);
        assert_eq!(Role::from_name("viewer"), Role::Member);
    }
}
