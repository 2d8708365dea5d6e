//! Branch addressing.
//!
//! A conversation's nodes are partitioned by `branch_name`: `None` is the
//! original unlabeled main line, `Some(name)` a named fork. Store APIs take
//! the nullable `Option<&str>` form; [`BranchRef`] names a branch in log
//! output and on [`MessageNode::branch`](crate::MessageNode::branch).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::MessageId;

/// Longest accepted branch name, in characters.
pub const MAX_BRANCH_NAME_LEN: usize = 128;

/// Either the unlabeled main line or a named branch.
#[derive(Clone, Debug, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum BranchRef {
    /// The conversation's original line (`branch_name = NULL`).
    #[default]
    Main,
    /// A named fork.
    Named(String),
}

impl BranchRef {
    /// Shorthand for [`BranchRef::Named`].
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Build from a nullable column value.
    pub fn from_option(name: Option<String>) -> Self {
        name.map_or(Self::Main, Self::Named)
    }

    /// Whether `name` is acceptable as a branch name: non-blank, no
    /// surrounding whitespace, at most [`MAX_BRANCH_NAME_LEN`] characters.
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty()
            && name.trim() == name
            && name.chars().count() <= MAX_BRANCH_NAME_LEN
            && !name.chars().any(char::is_control)
    }
}

impl From<Option<String>> for BranchRef {
    fn from(value: Option<String>) -> Self {
        Self::from_option(value)
    }
}

impl From<BranchRef> for Option<String> {
    fn from(value: BranchRef) -> Self {
        match value {
            BranchRef::Main => None,
            BranchRef::Named(name) => Some(name),
        }
    }
}

impl fmt::Display for BranchRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => f.write_str("(main)"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

/// Per-branch overview for a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchSummary {
    /// Branch name.
    pub name: String,
    /// Number of nodes carrying this name.
    pub message_count: i64,
    /// Parent of the branch's first node, i.e. the node it was forked from.
    /// `None` for an independently-rooted branch.
    pub fork_origin: Option<MessageId>,
    /// Timestamp of the first node.
    pub created_at: String,
    /// Timestamp of the most recent node.
    pub last_activity_at: String,
    /// Whether this is the conversation's active branch.
    pub is_active: bool,
}
