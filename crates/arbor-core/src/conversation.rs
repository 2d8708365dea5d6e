//! Conversation aggregate.

use serde::{Deserialize, Serialize};

use crate::branch::BranchRef;
use crate::ids::ConversationId;

/// Owner of a message tree, with its active branch and append counters.
///
/// `message_count` and `total_tokens` only grow: every append increments them
/// in the same transaction as the insert.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Conversation ID.
    pub id: ConversationId,
    /// Optional display title.
    pub title: Option<String>,
    /// Branch currently designated active (`None` = main line).
    pub active_branch: Option<String>,
    /// Number of nodes appended.
    pub message_count: i64,
    /// Sum of appended token counts.
    pub total_tokens: i64,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
    /// RFC 3339 timestamp of the last mutation.
    pub updated_at: String,
}

impl Conversation {
    /// Typed view of the active branch.
    pub fn active(&self) -> BranchRef {
        BranchRef::from_option(self.active_branch.clone())
    }
}
