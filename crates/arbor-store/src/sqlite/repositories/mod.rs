//! Stateless repositories over the `SQLite` schema.
//!
//! Each repository is a unit struct whose methods take `&Connection`, so they
//! compose inside a caller-owned transaction.

pub mod branch;
pub mod conversation;
pub mod message;

pub use branch::BranchRepo;
pub use conversation::ConversationRepo;
pub use message::{ListOptions, MessageInsert, MessageRepo};
