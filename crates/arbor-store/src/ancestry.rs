//! Root-to-leaf path resolution.
//!
//! Walks `parent_id` links from a leaf upward. The walk is bounded by the
//! conversation's `message_count + 1` fetches, so a corrupt parent cycle is
//! reported instead of looping forever. A parent that no longer exists ends
//! the walk and the last reachable node is treated as the root.

use std::collections::VecDeque;

use rusqlite::Connection;
use tracing::{debug, error};

use crate::errors::{Result, StoreError};
use crate::sqlite::repositories::{ConversationRepo, MessageRepo};
use crate::sqlite::row_types::MessageRow;

/// Resolve the chain from the root to `leaf_id`, inclusive, root first.
///
/// # Errors
///
/// - [`StoreError::MessageNotFound`] if the leaf does not exist
/// - [`StoreError::CorruptAncestry`] on a cycle or a parent in another conversation
pub fn resolve_path(conn: &Connection, leaf_id: &str) -> Result<Vec<MessageRow>> {
    let leaf = MessageRepo::get_by_id(conn, leaf_id)?
        .ok_or_else(|| StoreError::MessageNotFound(leaf_id.to_string()))?;

    let limit = match ConversationRepo::get_by_id(conn, &leaf.conversation_id)? {
        Some(conv) => conv.message_count,
        None => MessageRepo::count_by_conversation(conn, &leaf.conversation_id)?,
    } + 1;

    let conversation_id = leaf.conversation_id.clone();
    let mut next = leaf.parent_id.clone();
    let mut path = VecDeque::from([leaf]);
    let mut fetches: i64 = 1;

    while let Some(parent_id) = next {
        if fetches >= limit {
            error!(leaf_id, limit, "ancestry walk exceeded bound");
            return Err(StoreError::CorruptAncestry {
                message_id: parent_id,
                detail: format!("walk from {leaf_id} exceeded {limit} steps"),
            });
        }
        fetches += 1;

        let Some(parent) = MessageRepo::get_by_id(conn, &parent_id)? else {
            debug!(leaf_id, %parent_id, "ancestor missing, treating last node as root");
            break;
        };
        if parent.conversation_id != conversation_id {
            error!(leaf_id, %parent_id, "ancestor belongs to another conversation");
            return Err(StoreError::CorruptAncestry {
                message_id: parent_id,
                detail: format!(
                    "parent belongs to conversation {}, not {conversation_id}",
                    parent.conversation_id
                ),
            });
        }
        next = parent.parent_id.clone();
        path.push_front(parent);
    }

    Ok(path.into())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::sqlite::migrations::run_migrations;

    fn setup(sql: &str) -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        let _ = run_migrations(&conn).unwrap();
        conn.execute_batch(sql).unwrap();
        conn
    }

    fn ids(rows: &[MessageRow]) -> Vec<&str> {
        rows.iter().map(|r| r.id.as_str()).collect()
    }

    const TREE: &str = "
        INSERT INTO conversations (id, message_count, created_at, updated_at) VALUES ('c1', 4, 't', 't');
        INSERT INTO messages (id, conversation_id, parent_id, branch_name, sequence, role, content, created_at) VALUES
          ('m1', 'c1', NULL, NULL,  1, 'user', 'a', 't'),
          ('m2', 'c1', 'm1', NULL,  2, 'assistant', 'b', 't'),
          ('m3', 'c1', 'm1', 'alt', 3, 'assistant', 'c', 't'),
          ('m4', 'c1', 'm3', 'alt', 4, 'user', 'd', 't');";

    #[test]
    fn root_resolves_to_itself() {
        let conn = setup(TREE);
        assert_eq!(ids(&resolve_path(&conn, "m1").unwrap()), ["m1"]);
    }

    #[test]
    fn branch_leaf_includes_inherited_prefix() {
        let conn = setup(TREE);
        assert_eq!(ids(&resolve_path(&conn, "m4").unwrap()), ["m1", "m3", "m4"]);
        assert_eq!(ids(&resolve_path(&conn, "m2").unwrap()), ["m1", "m2"]);
    }

    #[test]
    fn missing_leaf() {
        let conn = setup(TREE);
        assert_matches!(resolve_path(&conn, "zz"), Err(StoreError::MessageNotFound(id)) if id == "zz");
    }

    #[test]
    fn missing_parent_ends_walk() {
        let conn = setup(
            "INSERT INTO conversations (id, message_count, created_at, updated_at) VALUES ('c1', 2, 't', 't');
             INSERT INTO messages (id, conversation_id, parent_id, sequence, role, content, created_at) VALUES
               ('m5', 'c1', 'gone', 1, 'user', 'a', 't'),
               ('m6', 'c1', 'm5',   2, 'user', 'b', 't');",
        );
        assert_eq!(ids(&resolve_path(&conn, "m6").unwrap()), ["m5", "m6"]);
    }

    #[test]
    fn cycle_is_corrupt() {
        let conn = setup(
            "INSERT INTO conversations (id, message_count, created_at, updated_at) VALUES ('c1', 2, 't', 't');
             INSERT INTO messages (id, conversation_id, parent_id, sequence, role, content, created_at) VALUES
               ('a', 'c1', 'b', 1, 'user', 'a', 't'),
               ('b', 'c1', 'a', 2, 'user', 'b', 't');",
        );
        assert_matches!(resolve_path(&conn, "a"), Err(StoreError::CorruptAncestry { .. }));
    }

    #[test]
    fn cross_conversation_parent_is_corrupt() {
        let conn = setup(
            "INSERT INTO conversations (id, message_count, created_at, updated_at) VALUES
               ('c1', 1, 't', 't'), ('c2', 1, 't', 't');
             INSERT INTO messages (id, conversation_id, parent_id, sequence, role, content, created_at) VALUES
               ('x', 'c2', NULL, 1, 'user', 'a', 't'),
               ('y', 'c1', 'x',  1, 'user', 'b', 't');",
        );
        assert_matches!(
            resolve_path(&conn, "y"),
            Err(StoreError::CorruptAncestry { message_id, .. }) if message_id == "x"
        );
    }
}
