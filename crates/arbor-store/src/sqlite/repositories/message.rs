//! Message repository: node inserts, lookups and per-branch listings.
//!
//! Every select joins `conversations` so the `is_active` column is derived
//! from the conversation's single `active_branch` value at read time.

use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::Result;
use crate::sqlite::row_types::MessageRow;

/// Offset/limit paging for list queries.
#[derive(Clone, Copy, Debug, Default)]
pub struct ListOptions {
    /// Maximum number of rows to return.
    pub limit: Option<i64>,
    /// Number of rows to skip.
    pub offset: Option<i64>,
}

impl ListOptions {
    /// Page with only a limit.
    pub fn limit(limit: i64) -> Self {
        Self {
            limit: Some(limit),
            offset: None,
        }
    }

    pub(crate) fn sql_limit(self) -> i64 {
        // SQLite treats a negative LIMIT as unbounded
        self.limit.map_or(-1, |l| l.max(0))
    }

    pub(crate) fn sql_offset(self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Column values for a new node.
#[derive(Debug)]
pub struct MessageInsert<'a> {
    /// Node ID.
    pub id: &'a str,
    /// Owning conversation.
    pub conversation_id: &'a str,
    /// Parent node.
    pub parent_id: Option<&'a str>,
    /// Branch label.
    pub branch_name: Option<&'a str>,
    /// Assigned sequence.
    pub sequence: i64,
    /// Role string.
    pub role: &'a str,
    /// Turn text.
    pub content: &'a str,
    /// Model tag.
    pub model: Option<&'a str>,
    /// Provider tag.
    pub provider: Option<&'a str>,
    /// Token count.
    pub token_count: Option<i64>,
    /// Attachments JSON.
    pub attachments: &'a str,
    /// Creation timestamp.
    pub created_at: &'a str,
}

fn select_sql(tail: &str) -> String {
    format!(
        "SELECT {} FROM messages m JOIN conversations c ON c.id = m.conversation_id {tail}",
        MessageRow::COLUMNS
    )
}

/// Message repository. Stateless; every method takes `&Connection`.
pub struct MessageRepo;

impl MessageRepo {
    /// Insert a node.
    pub fn insert(conn: &Connection, msg: &MessageInsert<'_>) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO messages (id, conversation_id, parent_id, branch_name, sequence, role,
             content, model, provider, token_count, attachments, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                msg.id,
                msg.conversation_id,
                msg.parent_id,
                msg.branch_name,
                msg.sequence,
                msg.role,
                msg.content,
                msg.model,
                msg.provider,
                msg.token_count,
                msg.attachments,
                msg.created_at,
            ],
        )?;
        Ok(())
    }

    /// Get a node by ID.
    pub fn get_by_id(conn: &Connection, message_id: &str) -> Result<Option<MessageRow>> {
        let row = conn
            .query_row(
                &select_sql("WHERE m.id = ?1"),
                params![message_id],
                MessageRow::from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Next sequence for a conversation (1 for the first node).
    pub fn next_sequence(conn: &Connection, conversation_id: &str) -> Result<i64> {
        let max: Option<i64> = conn.query_row(
            "SELECT MAX(sequence) FROM messages WHERE conversation_id = ?1",
            params![conversation_id],
            |row| row.get(0),
        )?;
        Ok(max.unwrap_or(0) + 1)
    }

    /// Direct children of a node, by sequence.
    pub fn get_children(conn: &Connection, message_id: &str) -> Result<Vec<MessageRow>> {
        let mut stmt = conn.prepare(&select_sql("WHERE m.parent_id = ?1 ORDER BY m.sequence ASC"))?;
        let rows = stmt
            .query_map(params![message_id], MessageRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Nodes of one branch (`None` = main line), ascending by sequence.
    pub fn list_by_branch(
        conn: &Connection,
        conversation_id: &str,
        branch_name: Option<&str>,
        opts: ListOptions,
    ) -> Result<Vec<MessageRow>> {
        let mut stmt = conn.prepare(&select_sql(
            "WHERE m.conversation_id = ?1 AND m.branch_name IS ?2
             ORDER BY m.sequence ASC LIMIT ?3 OFFSET ?4",
        ))?;
        let rows = stmt
            .query_map(
                params![conversation_id, branch_name, opts.sql_limit(), opts.sql_offset()],
                MessageRow::from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Nodes on the active branch plus every ancestor they descend from.
    ///
    /// The page is taken from the newest end (offset 0 = most recent) and
    /// returned in chronological order.
    pub fn list_active(
        conn: &Connection,
        conversation_id: &str,
        opts: ListOptions,
    ) -> Result<Vec<MessageRow>> {
        let sql = format!(
            "WITH RECURSIVE visible(id, parent_id) AS (
               SELECT m.id, m.parent_id
                 FROM messages m JOIN conversations c ON c.id = m.conversation_id
                WHERE m.conversation_id = ?1 AND m.branch_name IS c.active_branch
               UNION
               SELECT p.id, p.parent_id
                 FROM messages p JOIN visible v ON p.id = v.parent_id
                WHERE p.conversation_id = ?1
             )
             SELECT {} FROM messages m JOIN conversations c ON c.id = m.conversation_id
              WHERE m.id IN (SELECT id FROM visible)
              ORDER BY m.sequence DESC LIMIT ?2 OFFSET ?3",
            MessageRow::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt
            .query_map(
                params![conversation_id, opts.sql_limit(), opts.sql_offset()],
                MessageRow::from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.reverse();
        Ok(rows)
    }

    /// Most recent node of a branch.
    pub fn latest_in_branch(
        conn: &Connection,
        conversation_id: &str,
        branch_name: Option<&str>,
    ) -> Result<Option<MessageRow>> {
        let row = conn
            .query_row(
                &select_sql(
                    "WHERE m.conversation_id = ?1 AND m.branch_name IS ?2
                     ORDER BY m.sequence DESC LIMIT 1",
                ),
                params![conversation_id, branch_name],
                MessageRow::from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Nodes with at least one child, in creation order.
    pub fn list_branch_points(conn: &Connection, conversation_id: &str) -> Result<Vec<MessageRow>> {
        let mut stmt = conn.prepare(&select_sql(
            "WHERE m.conversation_id = ?1
               AND EXISTS (SELECT 1 FROM messages ch WHERE ch.parent_id = m.id)
             ORDER BY m.sequence ASC",
        ))?;
        let rows = stmt
            .query_map(params![conversation_id], MessageRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Count all nodes in a conversation.
    pub fn count_by_conversation(conn: &Connection, conversation_id: &str) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1",
            params![conversation_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Delete every node of a conversation. Returns rows removed.
    pub fn delete_by_conversation(conn: &Connection, conversation_id: &str) -> Result<usize> {
        let deleted = conn.execute(
            "DELETE FROM messages WHERE conversation_id = ?1",
            params![conversation_id],
        )?;
        Ok(deleted)
    }
}
