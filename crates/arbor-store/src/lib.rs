//! # arbor-store
//!
//! Persistent conversation branching engine backed by `SQLite`.
//!
//! Conversations own an append-only tree of message nodes. Each node carries
//! an optional branch label (`None` = the main line) and a parent link; the
//! conversation records which branch is active. Node activity is derived from
//! that single pointer at read time, so switching branches is one row update.
//!
//! ## Architecture
//!
//! - **`sqlite`**: connection pool, embedded migrations, raw row types and
//!   stateless repositories (messages, conversations, branch index)
//! - **`ancestry`**: bounded root-to-leaf path resolution
//! - **`store`**: [`BranchStore`], the transactional API callers use
//!
//! ## Concurrency
//!
//! Writes to one conversation are serialized by a per-conversation mutex and
//! `BEGIN IMMEDIATE` transactions; writes to different conversations run in
//! parallel. Reads use WAL snapshots.

#![deny(unsafe_code)]

pub mod ancestry;
pub mod errors;
pub mod sqlite;
pub mod store;

pub use errors::{Result, StoreError};
pub use sqlite::repositories::ListOptions;
pub use store::{AppendOptions, BranchStore, CreateBranchOptions, IN_MEMORY_PATH};
