//! Error types for the branching store.
//!
//! [`StoreError`] is returned by every store operation. Domain variants map
//! one-to-one onto the failure kinds callers are expected to handle
//! (not found, invalid parent, duplicate branch, ...); infrastructure
//! variants wrap `SQLite`, pool and JSON failures.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// JSON serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Which migration failed and why.
        message: String,
    },

    /// A stored row could not be decoded.
    #[error("corrupt row in {table}.{column}: {detail}")]
    CorruptRow {
        /// Table name.
        table: &'static str,
        /// Column name.
        column: &'static str,
        /// Decoder message.
        detail: String,
    },

    /// Requested conversation does not exist.
    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    /// Requested message does not exist.
    #[error("message not found: {0}")]
    MessageNotFound(String),

    /// Named branch has no nodes in the conversation.
    #[error("branch '{branch}' not found in conversation {conversation_id}")]
    BranchNotFound {
        /// Conversation searched.
        conversation_id: String,
        /// Requested branch name.
        branch: String,
    },

    /// Append targeted a conversation that does not exist.
    #[error("invalid conversation: {0}")]
    InvalidConversation(String),

    /// Parent is missing, belongs to another conversation, or sits on a
    /// branch the new node may not continue from.
    #[error("invalid parent {parent_id}: {reason}")]
    InvalidParent {
        /// Offending parent ID.
        parent_id: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Branch name is blank, padded, too long or contains control characters.
    #[error("invalid branch name: {0:?}")]
    InvalidBranchName(String),

    /// Branch name already used in the conversation.
    #[error("branch '{branch}' already exists in conversation {conversation_id}")]
    DuplicateBranchName {
        /// Conversation holding the existing branch.
        conversation_id: String,
        /// Duplicate name.
        branch: String,
    },

    /// Ancestry walk exceeded its bound or crossed a conversation boundary.
    #[error("corrupt ancestry at {message_id}: {detail}")]
    CorruptAncestry {
        /// Node where the walk was abandoned.
        message_id: String,
        /// What went wrong.
        detail: String,
    },
}

impl StoreError {
    /// Whether the error reports a missing conversation, message or branch.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ConversationNotFound(_) | Self::MessageNotFound(_) | Self::BranchNotFound { .. }
        )
    }

    /// Short classification string for logging and API mapping.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::ConversationNotFound(_) | Self::MessageNotFound(_) | Self::BranchNotFound { .. } => {
                "not_found"
            }
            Self::InvalidConversation(_) => "invalid_conversation",
            Self::InvalidParent { .. } => "invalid_parent",
            Self::InvalidBranchName(_) => "invalid_branch_name",
            Self::DuplicateBranchName { .. } => "duplicate_branch_name",
            Self::CorruptAncestry { .. } => "corrupt_ancestry",
            Self::CorruptRow { .. } => "corrupt_row",
            Self::Sqlite(_) | Self::Pool(_) | Self::Serde(_) | Self::Migration { .. } => "internal",
        }
    }
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;
