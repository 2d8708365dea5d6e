//! Message nodes.
//!
//! A [`MessageNode`] is one stored conversation turn. Nodes are append-only:
//! everything except the derived `is_active` flag is fixed at creation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::branch::BranchRef;
use crate::ids::{ConversationId, MessageId};

/// Author of a turn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Human turn.
    #[default]
    User,
    /// Model turn.
    Assistant,
    /// System/instruction turn.
    System,
}

impl Role {
    /// Column representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A single stored turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageNode {
    /// Node ID.
    pub id: MessageId,
    /// Owning conversation.
    pub conversation_id: ConversationId,
    /// Node this one continues from; `None` for a root.
    pub parent_id: Option<MessageId>,
    /// Branch label; `None` is the main line.
    pub branch_name: Option<String>,
    /// Whether the node belongs to the conversation's active branch.
    pub is_active: bool,
    /// Per-conversation append counter (1-based, strictly increasing).
    pub sequence: i64,
    /// Author.
    pub role: Role,
    /// Turn text.
    pub content: String,
    /// Model tag, stored opaquely.
    pub model: Option<String>,
    /// Provider tag, stored opaquely.
    pub provider: Option<String>,
    /// Token count contributed to the conversation total.
    pub token_count: Option<i64>,
    /// Attachment metadata (JSON array), stored opaquely.
    pub attachments: Value,
    /// RFC 3339 creation timestamp.
    pub created_at: String,
}

impl MessageNode {
    /// Typed view of `branch_name`.
    pub fn branch(&self) -> BranchRef {
        BranchRef::from_option(self.branch_name.clone())
    }

    /// Whether the node starts a chain.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Content of a turn to append. The engine assigns ID, sequence and timestamp.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewMessage {
    /// Author.
    pub role: Role,
    /// Turn text.
    pub content: String,
    /// Model tag.
    pub model: Option<String>,
    /// Provider tag.
    pub provider: Option<String>,
    /// Token count; added to the conversation's `total_tokens`.
    pub token_count: Option<i64>,
    /// Attachment metadata; `Null` is stored as an empty array.
    pub attachments: Value,
}

impl NewMessage {
    /// A user turn with the given text.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            ..Default::default()
        }
    }

    /// An assistant turn with the given text.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            ..Default::default()
        }
    }

    /// Set the token count.
    #[must_use]
    pub fn with_tokens(mut self, tokens: i64) -> Self {
        self.token_count = Some(tokens);
        self
    }

    /// Set model and provider tags.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>, provider: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self.provider = Some(provider.into());
        self
    }
}
