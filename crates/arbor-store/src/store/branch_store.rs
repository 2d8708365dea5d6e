//! High-level transactional [`BranchStore`] API.
//!
//! Composes the repositories into conversation-centric operations. Every
//! mutation holds the conversation's in-process lock and runs inside one
//! `BEGIN IMMEDIATE` transaction, so callers never observe partial state and
//! sequence numbers are assigned without races. Multi-query reads run in a
//! deferred transaction for a consistent snapshot.

use arbor_core::{
    BranchRef, BranchSummary, Conversation, ConversationId, MessageId, MessageNode, NewMessage,
};
use arbor_settings::DatabaseSettings;
use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, info, instrument};

use crate::ancestry;
use crate::errors::{Result, StoreError};
use crate::sqlite::connection::{
    ConnectionConfig, ConnectionPool, PooledConnection, new_file, new_in_memory,
};
use crate::sqlite::migrations::run_migrations;
use crate::sqlite::repositories::{
    BranchRepo, ConversationRepo, ListOptions, MessageInsert, MessageRepo,
};
use crate::sqlite::row_types::into_nodes;
use crate::store::locks::ConversationLocks;

/// Database path that selects a private in-memory database.
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Options for appending a node.
#[derive(Debug)]
pub struct AppendOptions<'a> {
    /// Conversation to append to.
    pub conversation_id: &'a ConversationId,
    /// Node to continue from; `None` starts a new root.
    pub parent_id: Option<&'a MessageId>,
    /// Branch for the new node; `None` is the main line.
    pub branch_name: Option<&'a str>,
    /// Turn content.
    pub message: &'a NewMessage,
}

/// Options for forking a new named branch.
#[derive(Debug)]
pub struct CreateBranchOptions<'a> {
    /// Conversation to fork in.
    pub conversation_id: &'a ConversationId,
    /// Node the branch continues from.
    pub from_message_id: &'a MessageId,
    /// Name of the new branch; must be unused in the conversation.
    pub branch_name: &'a str,
    /// First turn on the new branch.
    pub message: &'a NewMessage,
}

/// Conversation branching engine over a pooled `SQLite` database.
///
/// `Send + Sync`; share it behind an `Arc`.
pub struct BranchStore {
    pool: ConnectionPool,
    locks: ConversationLocks,
}

impl BranchStore {
    /// Wrap an already-migrated pool.
    pub fn new(pool: ConnectionPool) -> Self {
        Self {
            pool,
            locks: ConversationLocks::default(),
        }
    }

    /// Open the database described by `settings` and run pending migrations.
    pub fn open(settings: &DatabaseSettings) -> Result<Self> {
        let config = ConnectionConfig::from(settings);
        let pool = if settings.path == IN_MEMORY_PATH {
            new_in_memory(&config)?
        } else {
            new_file(&settings.path, &config)?
        };
        Self::migrated(pool)
    }

    /// Fresh private in-memory store.
    pub fn open_in_memory() -> Result<Self> {
        Self::migrated(new_in_memory(&ConnectionConfig::default())?)
    }

    fn migrated(pool: ConnectionPool) -> Result<Self> {
        {
            let conn = pool.get()?;
            let applied = run_migrations(&conn)?;
            debug!(applied, "database ready");
        }
        Ok(Self::new(pool))
    }

    /// The underlying pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    fn write_tx(conn: &Connection) -> Result<Transaction<'_>> {
        Ok(Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?)
    }

    /// Run `f` in one `BEGIN IMMEDIATE` transaction under the conversation's
    /// lock, committing on success. The lock entry is pruned again when the
    /// conversation turns out not to exist.
    fn write<T>(
        &self,
        conversation_id: &str,
        f: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        let lock = self.locks.get(conversation_id);
        let result = {
            let _guard = lock.lock();
            self.conn().and_then(|conn| {
                let tx = Self::write_tx(&conn)?;
                let value = f(&*tx)?;
                tx.commit()?;
                Ok(value)
            })
        };
        drop(lock);
        if matches!(
            result,
            Err(StoreError::ConversationNotFound(_) | StoreError::InvalidConversation(_))
        ) {
            self.locks.prune(conversation_id);
        }
        result
    }

    // ─────────────────────────────────────────────────────────────────────
    // Conversations
    // ─────────────────────────────────────────────────────────────────────

    /// Create a conversation on the main line with zeroed counters.
    pub fn create_conversation(&self, title: Option<&str>) -> Result<Conversation> {
        let id = ConversationId::new();
        let conn = self.conn()?;
        let row = ConversationRepo::create(&conn, id.as_str(), title, &now())?;
        info!(conversation_id = %id, "conversation created");
        Ok(row.into_conversation())
    }

    /// Fetch a conversation.
    pub fn get_conversation(&self, id: &ConversationId) -> Result<Conversation> {
        let conn = self.conn()?;
        ConversationRepo::get_by_id(&conn, id.as_str())?
            .map(|row| row.into_conversation())
            .ok_or_else(|| StoreError::ConversationNotFound(id.to_string()))
    }

    /// Conversations, most recently updated first.
    pub fn list_conversations(&self, opts: ListOptions) -> Result<Vec<Conversation>> {
        let conn = self.conn()?;
        let rows = ConversationRepo::list(&conn, opts)?;
        Ok(rows.into_iter().map(|row| row.into_conversation()).collect())
    }

    /// Replace a conversation's title.
    pub fn update_title(&self, id: &ConversationId, title: Option<&str>) -> Result<Conversation> {
        let row = self.write(id.as_str(), |tx| {
            if !ConversationRepo::update_title(tx, id.as_str(), title, &now())? {
                return Err(StoreError::ConversationNotFound(id.to_string()));
            }
            ConversationRepo::get_by_id(tx, id.as_str())?
                .ok_or_else(|| StoreError::ConversationNotFound(id.to_string()))
        })?;
        Ok(row.into_conversation())
    }

    /// Delete a conversation and all of its nodes. Returns `false` if it did
    /// not exist.
    pub fn delete_conversation(&self, id: &ConversationId) -> Result<bool> {
        let lock = self.locks.get(id.as_str());
        let deleted = {
            let _guard = lock.lock();
            let conn = self.conn()?;
            let tx = Self::write_tx(&conn)?;
            let messages = MessageRepo::delete_by_conversation(&tx, id.as_str())?;
            let deleted = ConversationRepo::delete(&tx, id.as_str())?;
            tx.commit()?;
            if deleted {
                info!(conversation_id = %id, messages, "conversation deleted");
            }
            deleted
        };
        self.locks.remove(id.as_str());
        Ok(deleted)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Node store
    // ─────────────────────────────────────────────────────────────────────

    /// Append a node.
    ///
    /// Atomic: validation, sequence assignment, insert and counter increments
    /// happen in one transaction.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidBranchName`] for a blank, padded or overlong name
    /// - [`StoreError::InvalidConversation`] if the conversation is missing
    /// - [`StoreError::InvalidParent`] if the parent is missing, in another
    ///   conversation, or on a different branch that the node does not open
    #[instrument(skip_all, fields(conversation_id = %opts.conversation_id))]
    pub fn append(&self, opts: &AppendOptions<'_>) -> Result<MessageNode> {
        let node = self.write(opts.conversation_id.as_str(), |tx| insert_node(tx, opts))?;
        debug!(message_id = %node.id, sequence = node.sequence, "message appended");
        Ok(node)
    }

    /// Append to the active branch, continuing from its most recent node (or
    /// as a root when the branch is empty).
    #[instrument(skip_all, fields(conversation_id = %conversation_id))]
    pub fn append_to_active(
        &self,
        conversation_id: &ConversationId,
        message: &NewMessage,
    ) -> Result<MessageNode> {
        let node = self.write(conversation_id.as_str(), |tx| {
            let conversation = ConversationRepo::get_by_id(tx, conversation_id.as_str())?
                .ok_or_else(|| StoreError::InvalidConversation(conversation_id.to_string()))?;
            let active = conversation.active_branch.as_deref();
            let parent = MessageRepo::latest_in_branch(tx, conversation_id.as_str(), active)?
                .map(|row| MessageId::from_raw(row.id));

            insert_node(
                tx,
                &AppendOptions {
                    conversation_id,
                    parent_id: parent.as_ref(),
                    branch_name: active,
                    message,
                },
            )
        })?;
        debug!(message_id = %node.id, branch = %node.branch(), "message appended to active branch");
        Ok(node)
    }

    /// Fetch a node.
    pub fn get_message(&self, id: &MessageId) -> Result<MessageNode> {
        let conn = self.conn()?;
        fetch_node(&conn, id.as_str())
    }

    /// Direct children of a node in creation order (empty for a leaf or an
    /// unknown ID).
    pub fn get_children(&self, id: &MessageId) -> Result<Vec<MessageNode>> {
        let conn = self.conn()?;
        into_nodes(MessageRepo::get_children(&conn, id.as_str())?)
    }

    /// The active transcript: active-branch nodes plus the ancestors they
    /// inherit, paged from the most recent end and returned chronologically.
    pub fn list_active(
        &self,
        conversation_id: &ConversationId,
        opts: ListOptions,
    ) -> Result<Vec<MessageNode>> {
        let conn = self.conn()?;
        let rows = MessageRepo::list_active(&conn, conversation_id.as_str(), opts)?;
        debug!(conversation_id = %conversation_id, count = rows.len(), "listed active messages");
        into_nodes(rows)
    }

    /// All nodes of a branch (`None` = main line) in creation order.
    pub fn list_branch_messages(
        &self,
        conversation_id: &ConversationId,
        branch_name: Option<&str>,
        opts: ListOptions,
    ) -> Result<Vec<MessageNode>> {
        let conn = self.conn()?;
        into_nodes(MessageRepo::list_by_branch(
            &conn,
            conversation_id.as_str(),
            branch_name,
            opts,
        )?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Ancestry
    // ─────────────────────────────────────────────────────────────────────

    /// Root-to-leaf chain ending at `leaf_id`.
    ///
    /// # Errors
    ///
    /// [`StoreError::MessageNotFound`] for an unknown leaf;
    /// [`StoreError::CorruptAncestry`] on a parent cycle or a parent in
    /// another conversation.
    pub fn resolve_path(&self, leaf_id: &MessageId) -> Result<Vec<MessageNode>> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let rows = ancestry::resolve_path(&tx, leaf_id.as_str())?;
        tx.commit()?;
        debug!(leaf_id = %leaf_id, depth = rows.len(), "resolved path");
        into_nodes(rows)
    }

    /// Linear history of the active branch: the path to its most recent node.
    pub fn active_transcript(&self, conversation_id: &ConversationId) -> Result<Vec<MessageNode>> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let conversation = ConversationRepo::get_by_id(&tx, conversation_id.as_str())?
            .ok_or_else(|| StoreError::ConversationNotFound(conversation_id.to_string()))?;
        let latest = MessageRepo::latest_in_branch(
            &tx,
            conversation_id.as_str(),
            conversation.active_branch.as_deref(),
        )?;
        let rows = match latest {
            Some(leaf) => ancestry::resolve_path(&tx, &leaf.id)?,
            None => Vec::new(),
        };
        tx.commit()?;
        into_nodes(rows)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Branch index
    // ─────────────────────────────────────────────────────────────────────

    /// Named branches in order of first appearance. Never includes the main line.
    pub fn list_branch_names(&self, conversation_id: &ConversationId) -> Result<Vec<String>> {
        let conn = self.conn()?;
        BranchRepo::list_names(&conn, conversation_id.as_str())
    }

    /// Per-branch overview.
    pub fn list_branches(&self, conversation_id: &ConversationId) -> Result<Vec<BranchSummary>> {
        let conn = self.conn()?;
        BranchRepo::summaries(&conn, conversation_id.as_str())
    }

    /// Number of nodes on a branch (`None` = main line).
    pub fn count_branch(
        &self,
        conversation_id: &ConversationId,
        branch_name: Option<&str>,
    ) -> Result<i64> {
        let conn = self.conn()?;
        BranchRepo::count(&conn, conversation_id.as_str(), branch_name)
    }

    /// Make `branch_name` (`None` = main line) the conversation's active
    /// branch. A single-row update: readers see the old or the new branch,
    /// never both or neither.
    ///
    /// # Errors
    ///
    /// [`StoreError::ConversationNotFound`] or, for a named branch with no
    /// nodes, [`StoreError::BranchNotFound`]. The active branch is unchanged
    /// on error.
    #[instrument(skip_all, fields(conversation_id = %conversation_id, branch = ?branch_name))]
    pub fn switch_active(
        &self,
        conversation_id: &ConversationId,
        branch_name: Option<&str>,
    ) -> Result<Conversation> {
        let (current, now) = self.write(conversation_id.as_str(), |tx| {
            let current = ConversationRepo::get_by_id(tx, conversation_id.as_str())?
                .ok_or_else(|| StoreError::ConversationNotFound(conversation_id.to_string()))?;
            if let Some(name) = branch_name {
                if !BranchRepo::exists(tx, conversation_id.as_str(), name)? {
                    return Err(StoreError::BranchNotFound {
                        conversation_id: conversation_id.to_string(),
                        branch: name.to_string(),
                    });
                }
            }

            let now = now();
            let _ = ConversationRepo::set_active_branch(tx, conversation_id.as_str(), branch_name, &now)?;
            Ok((current, now))
        })?;

        let target = BranchRef::from_option(branch_name.map(String::from));
        let previous = BranchRef::from_option(current.active_branch.clone());
        info!(from = %previous, to = %target, "active branch switched");

        let mut updated = current.into_conversation();
        updated.active_branch = branch_name.map(String::from);
        updated.updated_at = now;
        Ok(updated)
    }

    /// Fork a new named branch from an existing node. The new branch is not
    /// activated.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidBranchName`] for an unacceptable name
    /// - [`StoreError::InvalidConversation`] if the conversation is missing
    /// - [`StoreError::MessageNotFound`] if the origin node is missing
    /// - [`StoreError::InvalidParent`] if the origin is in another conversation
    /// - [`StoreError::DuplicateBranchName`] if the name is already used
    #[instrument(skip_all, fields(conversation_id = %opts.conversation_id, branch = opts.branch_name))]
    pub fn create_branch(&self, opts: &CreateBranchOptions<'_>) -> Result<MessageNode> {
        let conversation_id = opts.conversation_id.as_str();
        if !BranchRef::is_valid_name(opts.branch_name) {
            return Err(StoreError::InvalidBranchName(opts.branch_name.to_string()));
        }

        let node = self.write(conversation_id, |tx| {
            if !ConversationRepo::exists(tx, conversation_id)? {
                return Err(StoreError::InvalidConversation(conversation_id.to_string()));
            }
            let origin = MessageRepo::get_by_id(tx, opts.from_message_id.as_str())?
                .ok_or_else(|| StoreError::MessageNotFound(opts.from_message_id.to_string()))?;
            if origin.conversation_id != conversation_id {
                return Err(StoreError::InvalidParent {
                    parent_id: origin.id,
                    reason: format!("belongs to conversation {}", origin.conversation_id),
                });
            }
            if BranchRepo::exists(tx, conversation_id, opts.branch_name)? {
                return Err(StoreError::DuplicateBranchName {
                    conversation_id: conversation_id.to_string(),
                    branch: opts.branch_name.to_string(),
                });
            }

            insert_node(
                tx,
                &AppendOptions {
                    conversation_id: opts.conversation_id,
                    parent_id: Some(opts.from_message_id),
                    branch_name: Some(opts.branch_name),
                    message: opts.message,
                },
            )
        })?;
        info!(from = %opts.from_message_id, message_id = %node.id, "branch created");
        Ok(node)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Branch points
    // ─────────────────────────────────────────────────────────────────────

    /// Nodes with at least one child, in creation order.
    pub fn list_branch_points(&self, conversation_id: &ConversationId) -> Result<Vec<MessageNode>> {
        let conn = self.conn()?;
        into_nodes(MessageRepo::list_branch_points(&conn, conversation_id.as_str())?)
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn fetch_node(conn: &Connection, id: &str) -> Result<MessageNode> {
    MessageRepo::get_by_id(conn, id)?
        .ok_or_else(|| StoreError::MessageNotFound(id.to_string()))?
        .into_node()
}

/// Validate and insert one node, bumping the conversation counters.
/// Runs inside the caller's write transaction.
fn insert_node(conn: &Connection, opts: &AppendOptions<'_>) -> Result<MessageNode> {
    let conversation_id = opts.conversation_id.as_str();

    if let Some(name) = opts.branch_name {
        if !BranchRef::is_valid_name(name) {
            return Err(StoreError::InvalidBranchName(name.to_string()));
        }
    }
    if !ConversationRepo::exists(conn, conversation_id)? {
        return Err(StoreError::InvalidConversation(conversation_id.to_string()));
    }
    if let Some(parent_id) = opts.parent_id {
        check_parent(conn, conversation_id, parent_id, opts.branch_name)?;
    }

    let id = MessageId::new();
    let sequence = MessageRepo::next_sequence(conn, conversation_id)?;
    let attachments = if opts.message.attachments.is_null() {
        "[]".to_string()
    } else {
        serde_json::to_string(&opts.message.attachments)?
    };
    let now = now();

    MessageRepo::insert(
        conn,
        &MessageInsert {
            id: id.as_str(),
            conversation_id,
            parent_id: opts.parent_id.map(MessageId::as_str),
            branch_name: opts.branch_name,
            sequence,
            role: opts.message.role.as_str(),
            content: &opts.message.content,
            model: opts.message.model.as_deref(),
            provider: opts.message.provider.as_deref(),
            token_count: opts.message.token_count,
            attachments: &attachments,
            created_at: &now,
        },
    )?;
    let _ = ConversationRepo::increment_counters(
        conn,
        conversation_id,
        1,
        opts.message.token_count.unwrap_or(0),
        &now,
    )?;

    fetch_node(conn, id.as_str())
}

/// A parent must exist in the same conversation. A node on a named branch
/// continues from a node of that branch or from the branch's fork origin;
/// the first node of a branch may fork from anywhere.
fn check_parent(
    conn: &Connection,
    conversation_id: &str,
    parent_id: &MessageId,
    branch_name: Option<&str>,
) -> Result<()> {
    let invalid = |reason: String| StoreError::InvalidParent {
        parent_id: parent_id.to_string(),
        reason,
    };

    let parent = MessageRepo::get_by_id(conn, parent_id.as_str())?
        .ok_or_else(|| invalid("does not exist".to_string()))?;
    if parent.conversation_id != conversation_id {
        return Err(invalid(format!(
            "belongs to conversation {}",
            parent.conversation_id
        )));
    }
    if parent.branch_name.as_deref() == branch_name {
        return Ok(());
    }

    let allowed = match branch_name {
        Some(name) => match BranchRepo::fork_origin(conn, conversation_id, name)? {
            None => true,
            Some(origin) => origin.as_deref() == Some(parent_id.as_str()),
        },
        None => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(invalid(format!(
            "parent is on {}, node targets {}",
            BranchRef::from_option(parent.branch_name),
            BranchRef::from_option(branch_name.map(String::from))
        )))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn store() -> BranchStore {
        BranchStore::open_in_memory().unwrap()
    }

    fn append(
        store: &BranchStore,
        conv: &ConversationId,
        parent: Option<&MessageId>,
        branch: Option<&str>,
        text: &str,
    ) -> Result<MessageNode> {
        store.append(&AppendOptions {
            conversation_id: conv,
            parent_id: parent,
            branch_name: branch,
            message: &NewMessage::user(text),
        })
    }

    fn ids(nodes: &[MessageNode]) -> Vec<&MessageId> {
        nodes.iter().map(|n| &n.id).collect()
    }

    #[test]
    fn append_assigns_sequence_and_counters() {
        let store = store();
        let conv = store.create_conversation(Some("t")).unwrap();
        let m1 = append(&store, &conv.id, None, None, "a").unwrap();
        let m2 = store
            .append(&AppendOptions {
                conversation_id: &conv.id,
                parent_id: Some(&m1.id),
                branch_name: None,
                message: &NewMessage::assistant("b").with_tokens(7),
            })
            .unwrap();

        assert_eq!(m1.sequence, 1);
        assert_eq!(m2.sequence, 2);
        assert!(m1.is_active);
        assert_eq!(m2.parent_id.as_ref(), Some(&m1.id));
        assert_eq!(m1.attachments, serde_json::json!([]));

        let conv = store.get_conversation(&conv.id).unwrap();
        assert_eq!(conv.message_count, 2);
        assert_eq!(conv.total_tokens, 7);
    }

    #[test]
    fn append_to_missing_conversation() {
        let store = store();
        let missing = ConversationId::new();
        assert_matches!(
            append(&store, &missing, None, None, "a"),
            Err(StoreError::InvalidConversation(_))
        );
    }

    #[test]
    fn append_rejects_bad_branch_names() {
        let store = store();
        let conv = store.create_conversation(None).unwrap();
        let long = "x".repeat(129);
        for name in ["", "   ", " padded", long.as_str()] {
            assert_matches!(
                append(&store, &conv.id, None, Some(name), "a"),
                Err(StoreError::InvalidBranchName(_)),
                "{name:?}"
            );
        }
        assert!(append(&store, &conv.id, None, Some("x".repeat(128).as_str()), "a").is_ok());
    }

    #[test]
    fn append_rejects_missing_and_foreign_parents() {
        let store = store();
        let a = store.create_conversation(None).unwrap();
        let b = store.create_conversation(None).unwrap();
        let in_b = append(&store, &b.id, None, None, "b").unwrap();

        assert_matches!(
            append(&store, &a.id, Some(&MessageId::new()), None, "x"),
            Err(StoreError::InvalidParent { .. })
        );
        assert_matches!(
            append(&store, &a.id, Some(&in_b.id), None, "x"),
            Err(StoreError::InvalidParent { reason, .. }) if reason.contains("conversation")
        );
        assert_eq!(store.get_conversation(&a.id).unwrap().message_count, 0);
    }

    #[test]
    fn append_enforces_branch_membership() {
        let store = store();
        let conv = store.create_conversation(None).unwrap();
        let m1 = append(&store, &conv.id, None, None, "a").unwrap();
        // opening a new branch from the main line is allowed
        let alt1 = append(&store, &conv.id, Some(&m1.id), Some("alt"), "b").unwrap();
        // a second continuation from alt's fork origin is allowed
        let alt2 = append(&store, &conv.id, Some(&m1.id), Some("alt"), "c").unwrap();
        assert_eq!(alt2.parent_id.as_ref(), Some(&m1.id));
        assert_eq!(store.count_branch(&conv.id, Some("alt")).unwrap(), 2);
        // continuing alt from some other main-line node is not
        let m2 = append(&store, &conv.id, Some(&m1.id), None, "m2").unwrap();
        assert_matches!(
            append(&store, &conv.id, Some(&m2.id), Some("alt"), "c2"),
            Err(StoreError::InvalidParent { .. })
        );
        // nor is continuing the main line from alt
        assert_matches!(
            append(&store, &conv.id, Some(&alt1.id), None, "d"),
            Err(StoreError::InvalidParent { .. })
        );
        assert!(append(&store, &conv.id, Some(&alt1.id), Some("alt"), "e").is_ok());
    }

    #[test]
    fn missing_conversations_leave_no_lock_entries() {
        let store = store();
        let missing = ConversationId::new();
        assert!(append(&store, &missing, None, None, "a").is_err());
        assert!(store.append_to_active(&missing, &NewMessage::user("a")).is_err());
        assert!(store.switch_active(&missing, None).is_err());
        assert!(store.update_title(&missing, Some("t")).is_err());
        assert_eq!(store.locks.len(), 0);

        let conv = store.create_conversation(None).unwrap();
        let _ = append(&store, &conv.id, None, None, "a").unwrap();
        assert_eq!(store.locks.len(), 1);
    }

    #[test]
    fn get_message_not_found() {
        let store = store();
        assert_matches!(
            store.get_message(&MessageId::new()),
            Err(StoreError::MessageNotFound(_))
        );
    }

    #[test]
    fn create_branch_errors() {
        let store = store();
        let conv = store.create_conversation(None).unwrap();
        let other = store.create_conversation(None).unwrap();
        let m1 = append(&store, &conv.id, None, None, "a").unwrap();
        let foreign = append(&store, &other.id, None, None, "z").unwrap();
        let fork = |from: &MessageId, name: &str| {
            store.create_branch(&CreateBranchOptions {
                conversation_id: &conv.id,
                from_message_id: from,
                branch_name: name,
                message: &NewMessage::user("hi"),
            })
        };

        assert!(fork(&m1.id, "alt").is_ok());
        assert_matches!(
            fork(&m1.id, "alt"),
            Err(StoreError::DuplicateBranchName { .. })
        );
        assert_matches!(
            fork(&MessageId::new(), "x"),
            Err(StoreError::MessageNotFound(_))
        );
        assert_matches!(fork(&foreign.id, "y"), Err(StoreError::InvalidParent { .. }));
        assert_matches!(fork(&m1.id, ""), Err(StoreError::InvalidBranchName(_)));
        assert_matches!(
            store.create_branch(&CreateBranchOptions {
                conversation_id: &ConversationId::new(),
                from_message_id: &m1.id,
                branch_name: "q",
                message: &NewMessage::user("hi"),
            }),
            Err(StoreError::InvalidConversation(_))
        );
        assert_eq!(store.count_branch(&conv.id, Some("alt")).unwrap(), 1);
    }

    #[test]
    fn switch_and_read_back() {
        let store = store();
        let conv = store.create_conversation(None).unwrap();
        let m1 = append(&store, &conv.id, None, None, "a").unwrap();
        let m3 = store
            .create_branch(&CreateBranchOptions {
                conversation_id: &conv.id,
                from_message_id: &m1.id,
                branch_name: "alt",
                message: &NewMessage::user("hi"),
            })
            .unwrap();
        assert!(!m3.is_active);

        let updated = store.switch_active(&conv.id, Some("alt")).unwrap();
        assert_eq!(updated.active_branch.as_deref(), Some("alt"));
        assert!(store.get_message(&m3.id).unwrap().is_active);
        assert!(!store.get_message(&m1.id).unwrap().is_active);

        let back = store.switch_active(&conv.id, None).unwrap();
        assert!(back.active_branch.is_none());
        assert!(store.get_message(&m1.id).unwrap().is_active);
    }

    #[test]
    fn switch_errors_leave_state() {
        let store = store();
        let conv = store.create_conversation(None).unwrap();
        assert_matches!(
            store.switch_active(&ConversationId::new(), None),
            Err(StoreError::ConversationNotFound(_))
        );
        assert_matches!(
            store.switch_active(&conv.id, Some("nope")),
            Err(StoreError::BranchNotFound { branch, .. }) if branch == "nope"
        );
        assert!(store.get_conversation(&conv.id).unwrap().active_branch.is_none());
    }

    #[test]
    fn append_to_active_chains_from_latest() {
        let store = store();
        let conv = store.create_conversation(None).unwrap();
        let m1 = store.append_to_active(&conv.id, &NewMessage::user("a")).unwrap();
        assert!(m1.is_root());
        let m2 = store
            .append_to_active(&conv.id, &NewMessage::assistant("b"))
            .unwrap();
        assert_eq!(m2.parent_id.as_ref(), Some(&m1.id));

        let alt = store
            .create_branch(&CreateBranchOptions {
                conversation_id: &conv.id,
                from_message_id: &m1.id,
                branch_name: "alt",
                message: &NewMessage::assistant("c"),
            })
            .unwrap();
        let _ = store.switch_active(&conv.id, Some("alt")).unwrap();
        let next = store.append_to_active(&conv.id, &NewMessage::user("d")).unwrap();
        assert_eq!(next.parent_id.as_ref(), Some(&alt.id));
        assert_eq!(next.branch_name.as_deref(), Some("alt"));

        let transcript = store.active_transcript(&conv.id).unwrap();
        assert_eq!(ids(&transcript), [&m1.id, &alt.id, &next.id]);
    }

    #[test]
    fn active_transcript_empty_and_missing() {
        let store = store();
        let conv = store.create_conversation(None).unwrap();
        assert!(store.active_transcript(&conv.id).unwrap().is_empty());
        assert_matches!(
            store.active_transcript(&ConversationId::new()),
            Err(StoreError::ConversationNotFound(_))
        );
    }

    #[test]
    fn update_and_delete_conversation() {
        let store = store();
        let conv = store.create_conversation(None).unwrap();
        let _ = append(&store, &conv.id, None, None, "a").unwrap();

        let renamed = store.update_title(&conv.id, Some("Renamed")).unwrap();
        assert_eq!(renamed.title.as_deref(), Some("Renamed"));
        assert_matches!(
            store.update_title(&ConversationId::new(), None),
            Err(StoreError::ConversationNotFound(_))
        );

        assert!(store.delete_conversation(&conv.id).unwrap());
        assert!(!store.delete_conversation(&conv.id).unwrap());
        assert!(store.get_conversation(&conv.id).unwrap_err().is_not_found());
        assert!(store.list_active(&conv.id, ListOptions::default()).unwrap().is_empty());
    }

    #[test]
    fn list_conversations_most_recent_first() {
        let store = store();
        let a = store.create_conversation(Some("a")).unwrap();
        let b = store.create_conversation(Some("b")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let _ = append(&store, &a.id, None, None, "bump").unwrap();

        let listed = store.list_conversations(ListOptions::default()).unwrap();
        let order: Vec<_> = listed.iter().map(|c| &c.id).collect();
        assert_eq!(order, [&a.id, &b.id]);
    }
}
