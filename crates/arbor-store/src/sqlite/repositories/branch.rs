//! Branch index: aggregate queries over `messages.branch_name`.
//!
//! Branches have no table of their own. A branch exists exactly when at
//! least one node carries its name.

use arbor_core::{BranchSummary, MessageId};
use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::Result;

/// Branch repository. Stateless; every method takes `&Connection`.
pub struct BranchRepo;

impl BranchRepo {
    /// Distinct named branches, in order of first appearance.
    pub fn list_names(conn: &Connection, conversation_id: &str) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT branch_name FROM messages
              WHERE conversation_id = ?1 AND branch_name IS NOT NULL
              GROUP BY branch_name
              ORDER BY MIN(sequence) ASC",
        )?;
        let names = stmt
            .query_map(params![conversation_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Whether any node carries `branch_name`.
    pub fn exists(conn: &Connection, conversation_id: &str, branch_name: &str) -> Result<bool> {
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM messages WHERE conversation_id = ?1 AND branch_name = ?2 LIMIT 1",
                params![conversation_id, branch_name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Parent of the branch's first node. Outer `None` if the branch has no
    /// nodes; inner `None` if it starts at a root.
    pub fn fork_origin(
        conn: &Connection,
        conversation_id: &str,
        branch_name: &str,
    ) -> Result<Option<Option<String>>> {
        let origin = conn
            .query_row(
                "SELECT parent_id FROM messages
                  WHERE conversation_id = ?1 AND branch_name = ?2
                  ORDER BY sequence ASC LIMIT 1",
                params![conversation_id, branch_name],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(origin)
    }

    /// Number of nodes on a branch (`None` = main line).
    pub fn count(conn: &Connection, conversation_id: &str, branch_name: Option<&str>) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM messages WHERE conversation_id = ?1 AND branch_name IS ?2",
            params![conversation_id, branch_name],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Per-branch overview, in order of first appearance.
    pub fn summaries(conn: &Connection, conversation_id: &str) -> Result<Vec<BranchSummary>> {
        let mut stmt = conn.prepare(
            "SELECT b.branch_name,
                    COUNT(*),
                    (SELECT f.parent_id FROM messages f
                      WHERE f.conversation_id = b.conversation_id AND f.branch_name = b.branch_name
                      ORDER BY f.sequence ASC LIMIT 1),
                    MIN(b.created_at),
                    MAX(b.created_at),
                    (b.branch_name IS c.active_branch)
               FROM messages b JOIN conversations c ON c.id = b.conversation_id
              WHERE b.conversation_id = ?1 AND b.branch_name IS NOT NULL
              GROUP BY b.branch_name
              ORDER BY MIN(b.sequence) ASC",
        )?;
        let rows = stmt
            .query_map(params![conversation_id], |row| {
                Ok(BranchSummary {
                    name: row.get(0)?,
                    message_count: row.get(1)?,
                    fork_origin: row.get::<_, Option<String>>(2)?.map(MessageId::from_raw),
                    created_at: row.get(3)?,
                    last_activity_at: row.get(4)?,
                    is_active: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
