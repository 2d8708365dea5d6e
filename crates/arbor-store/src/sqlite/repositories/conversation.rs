//! Conversation repository: CRUD, active-branch pointer and counters.

use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::Result;
use crate::sqlite::repositories::message::ListOptions;
use crate::sqlite::row_types::ConversationRow;

/// Conversation repository. Stateless; every method takes `&Connection`.
pub struct ConversationRepo;

impl ConversationRepo {
    /// Insert a conversation on the main line with zeroed counters.
    pub fn create(
        conn: &Connection,
        id: &str,
        title: Option<&str>,
        now: &str,
    ) -> Result<ConversationRow> {
        let _ = conn.execute(
            "INSERT INTO conversations (id, title, active_branch, message_count, total_tokens,
             created_at, updated_at) VALUES (?1, ?2, NULL, 0, 0, ?3, ?3)",
            params![id, title, now],
        )?;
        Ok(ConversationRow {
            id: id.to_string(),
            title: title.map(String::from),
            active_branch: None,
            message_count: 0,
            total_tokens: 0,
            created_at: now.to_string(),
            updated_at: now.to_string(),
        })
    }

    /// Get a conversation by ID.
    pub fn get_by_id(conn: &Connection, id: &str) -> Result<Option<ConversationRow>> {
        let row = conn
            .query_row(
                &format!("SELECT {} FROM conversations WHERE id = ?1", ConversationRow::COLUMNS),
                params![id],
                ConversationRow::from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Whether a conversation exists.
    pub fn exists(conn: &Connection, id: &str) -> Result<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM conversations WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Conversations, most recently updated first.
    pub fn list(conn: &Connection, opts: ListOptions) -> Result<Vec<ConversationRow>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM conversations ORDER BY updated_at DESC, id DESC LIMIT ?1 OFFSET ?2",
            ConversationRow::COLUMNS
        ))?;
        let rows = stmt
            .query_map(
                params![opts.sql_limit(), opts.sql_offset()],
                ConversationRow::from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Point the conversation at a branch (`None` = main line).
    /// Returns `false` if the conversation does not exist.
    pub fn set_active_branch(
        conn: &Connection,
        id: &str,
        branch_name: Option<&str>,
        now: &str,
    ) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE conversations SET active_branch = ?1, updated_at = ?2 WHERE id = ?3",
            params![branch_name, now, id],
        )?;
        Ok(changed > 0)
    }

    /// Add to the append counters.
    pub fn increment_counters(
        conn: &Connection,
        id: &str,
        messages: i64,
        tokens: i64,
        now: &str,
    ) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE conversations
                SET message_count = message_count + ?1,
                    total_tokens  = total_tokens + ?2,
                    updated_at    = ?3
              WHERE id = ?4",
            params![messages, tokens, now, id],
        )?;
        Ok(changed > 0)
    }

    /// Replace the title.
    pub fn update_title(conn: &Connection, id: &str, title: Option<&str>, now: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE conversations SET title = ?1, updated_at = ?2 WHERE id = ?3",
            params![title, now, id],
        )?;
        Ok(changed > 0)
    }

    /// Delete a conversation row.
    pub fn delete(conn: &Connection, id: &str) -> Result<bool> {
        let changed = conn.execute("DELETE FROM conversations WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }
}
