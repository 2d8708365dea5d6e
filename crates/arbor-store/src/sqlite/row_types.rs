//! Raw row shapes and their conversion into domain types.
//!
//! Repositories return these; [`crate::BranchStore`] converts them with
//! [`MessageRow::into_node`] / [`ConversationRow::into_conversation`], which
//! is where malformed stored values surface as [`StoreError::CorruptRow`].

use arbor_core::{Conversation, ConversationId, MessageId, MessageNode, Role};
use rusqlite::Row;

use crate::errors::{Result, StoreError};

/// Raw row from `messages`, joined with its conversation's active branch.
#[derive(Clone, Debug)]
pub struct MessageRow {
    /// Node ID.
    pub id: String,
    /// Owning conversation.
    pub conversation_id: String,
    /// Parent node ID.
    pub parent_id: Option<String>,
    /// Branch label.
    pub branch_name: Option<String>,
    /// `branch_name IS conversations.active_branch`, computed by the query.
    pub is_active: bool,
    /// Per-conversation sequence.
    pub sequence: i64,
    /// Role string.
    pub role: String,
    /// Turn text.
    pub content: String,
    /// Model tag.
    pub model: Option<String>,
    /// Provider tag.
    pub provider: Option<String>,
    /// Token count.
    pub token_count: Option<i64>,
    /// Attachments as a JSON string.
    pub attachments: String,
    /// Creation timestamp.
    pub created_at: String,
}

impl MessageRow {
    /// Column list matching [`MessageRow::from_row`]. Expects `messages m`
    /// joined to `conversations c`.
    pub const COLUMNS: &'static str = "m.id, m.conversation_id, m.parent_id, m.branch_name, \
         (m.branch_name IS c.active_branch) AS is_active, m.sequence, m.role, m.content, \
         m.model, m.provider, m.token_count, m.attachments, m.created_at";

    /// Map a row selected with [`MessageRow::COLUMNS`].
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            conversation_id: row.get(1)?,
            parent_id: row.get(2)?,
            branch_name: row.get(3)?,
            is_active: row.get(4)?,
            sequence: row.get(5)?,
            role: row.get(6)?,
            content: row.get(7)?,
            model: row.get(8)?,
            provider: row.get(9)?,
            token_count: row.get(10)?,
            attachments: row.get(11)?,
            created_at: row.get(12)?,
        })
    }

    /// Decode into the public node type.
    pub fn into_node(self) -> Result<MessageNode> {
        let role: Role = self.role.parse().map_err(|detail| StoreError::CorruptRow {
            table: "messages",
            column: "role",
            detail,
        })?;
        let attachments =
            serde_json::from_str(&self.attachments).map_err(|e| StoreError::CorruptRow {
                table: "messages",
                column: "attachments",
                detail: e.to_string(),
            })?;
        Ok(MessageNode {
            id: MessageId::from_raw(self.id),
            conversation_id: ConversationId::from_raw(self.conversation_id),
            parent_id: self.parent_id.map(MessageId::from_raw),
            branch_name: self.branch_name,
            is_active: self.is_active,
            sequence: self.sequence,
            role,
            content: self.content,
            model: self.model,
            provider: self.provider,
            token_count: self.token_count,
            attachments,
            created_at: self.created_at,
        })
    }
}

/// Decode a list of rows, failing on the first corrupt one.
pub fn into_nodes(rows: Vec<MessageRow>) -> Result<Vec<MessageNode>> {
    rows.into_iter().map(MessageRow::into_node).collect()
}

/// Raw row from `conversations`.
#[derive(Clone, Debug)]
pub struct ConversationRow {
    /// Conversation ID.
    pub id: String,
    /// Title.
    pub title: Option<String>,
    /// Active branch (`None` = main line).
    pub active_branch: Option<String>,
    /// Appended node count.
    pub message_count: i64,
    /// Token total.
    pub total_tokens: i64,
    /// Creation timestamp.
    pub created_at: String,
    /// Last mutation timestamp.
    pub updated_at: String,
}

impl ConversationRow {
    /// Column list matching [`ConversationRow::from_row`].
    pub const COLUMNS: &'static str =
        "id, title, active_branch, message_count, total_tokens, created_at, updated_at";

    /// Map a row selected with [`ConversationRow::COLUMNS`].
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            active_branch: row.get(2)?,
            message_count: row.get(3)?,
            total_tokens: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    /// Convert into the public aggregate.
    pub fn into_conversation(self) -> Conversation {
        Conversation {
            id: ConversationId::from_raw(self.id),
            title: self.title,
            active_branch: self.active_branch,
            message_count: self.message_count,
            total_tokens: self.total_tokens,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
