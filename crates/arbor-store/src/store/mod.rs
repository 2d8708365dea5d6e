//! Transactional facade over the repositories.

pub mod branch_store;
mod locks;

pub use branch_store::{AppendOptions, BranchStore, CreateBranchOptions, IN_MEMORY_PATH};
