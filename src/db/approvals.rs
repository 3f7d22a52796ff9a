//! `approvals` table access.

use rusqlite::{params, OptionalExtension, Row};

use super::types::{json_column, json_param};
use super::{DbApproval, DbError, LedgerDb};
use crate::types::Resolution;

const APPROVAL_COLUMNS: &str = "id, kind, title, content, activity_id, resolution, created_by, \
     created_at, resolved_at, resolved_by, metadata";

fn map_approval(row: &Row<'_>) -> rusqlite::Result<DbApproval> {
    Ok(DbApproval {
        id: row.get(0)?,
        kind: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        activity_id: row.get(4)?,
        resolution: row.get(5)?,
        created_by: row.get(6)?,
        created_at: row.get(7)?,
        resolved_at: row.get(8)?,
        resolved_by: row.get(9)?,
        metadata: json_column(10, row.get(10)?)?,
    })
}

impl LedgerDb {
    pub fn insert_approval(&self, approval: &DbApproval) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO approvals
                 (id, kind, title, content, activity_id, resolution, created_by, created_at,
                  resolved_at, resolved_by, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                approval.id,
                approval.kind,
                approval.title,
                approval.content,
                approval.activity_id,
                approval.resolution,
                approval.created_by,
                approval.created_at,
                approval.resolved_at,
                approval.resolved_by,
                json_param(approval.metadata.as_ref()),
            ],
        )?;
        Ok(())
    }

    pub fn get_approval(&self, id: &str) -> Result<Option<DbApproval>, DbError> {
        let approval = self
            .conn
            .query_row(
                &format!("SELECT {APPROVAL_COLUMNS} FROM approvals WHERE id = ?1"),
                params![id],
                map_approval,
            )
            .optional()?;
        Ok(approval)
    }

    /// Resolve a pending approval. The `resolution = 'pending'` guard makes
    /// the write a no-op on already-resolved rows; callers read the returned
    /// row count to tell the two apart.
    pub fn patch_approval_resolution(
        &self,
        id: &str,
        resolution: Resolution,
        resolved_at: &str,
        resolved_by: Option<&str>,
    ) -> Result<usize, DbError> {
        let changed = self.conn.execute(
            "UPDATE approvals
             SET resolution = ?2, resolved_at = ?3, resolved_by = ?4
             WHERE id = ?1 AND resolution = 'pending'",
            params![id, resolution, resolved_at, resolved_by],
        )?;
        Ok(changed)
    }

    /// Patch content and/or metadata; resolution state is never touched here.
    pub fn patch_approval_content(
        &self,
        id: &str,
        content: Option<&str>,
        metadata: Option<&serde_json::Value>,
    ) -> Result<usize, DbError> {
        let changed = self.conn.execute(
            "UPDATE approvals
             SET content = COALESCE(?2, content),
                 metadata = COALESCE(?3, metadata)
             WHERE id = ?1",
            params![id, content, json_param(metadata)],
        )?;
        Ok(changed)
    }

    /// Pending approvals, newest first.
    pub fn pending_approvals(&self) -> Result<Vec<DbApproval>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {APPROVAL_COLUMNS} FROM approvals
             WHERE resolution = 'pending'
             ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map([], map_approval)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// All approvals, newest first, up to `limit`.
    pub fn list_approvals(&self, limit: usize) -> Result<Vec<DbApproval>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {APPROVAL_COLUMNS} FROM approvals
             ORDER BY created_at DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit as i64], map_approval)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Full scan for stat aggregation.
    pub fn all_approvals(&self) -> Result<Vec<DbApproval>, DbError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {APPROVAL_COLUMNS} FROM approvals"))?;
        let rows = stmt.query_map([], map_approval)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}
