//! # arbor-core
//!
//! Shared vocabulary for the Arbor conversation branching engine.
//!
//! - **Branded IDs**: [`ConversationId`] and [`MessageId`] newtypes over time-ordered UUID v7 strings
//! - **Branches**: [`BranchRef`] addressing either the unlabeled main line or a named fork
//! - **Messages**: [`MessageNode`] (one stored turn), [`NewMessage`] (turn content to append), [`Role`]
//! - **Conversations**: [`Conversation`] aggregate with its active branch and counters

#![deny(unsafe_code)]

pub mod branch;
pub mod conversation;
pub mod ids;
pub mod message;

pub use branch::{BranchRef, BranchSummary, MAX_BRANCH_NAME_LEN};
pub use conversation::Conversation;
pub use ids::{ConversationId, MessageId};
pub use message::{MessageNode, NewMessage, Role};
