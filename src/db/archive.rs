//! Warm-tier `activities_archive` table access.

use rusqlite::{params, Row};

use super::types::{json_column, json_param};
use super::{DbArchivedActivity, DbError, LedgerDb};
use crate::types::ActivityType;

const ARCHIVE_COLUMNS: &str =
    "id, timestamp, type, title, description, status, source, metadata, archived_at, original_id";

fn map_archived(row: &Row<'_>) -> rusqlite::Result<DbArchivedActivity> {
    Ok(DbArchivedActivity {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        activity_type: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        status: row.get(5)?,
        source: row.get(6)?,
        metadata: json_column(7, row.get(7)?)?,
        archived_at: row.get(8)?,
        original_id: row.get(9)?,
    })
}

impl LedgerDb {
    pub fn insert_archived(&self, archived: &DbArchivedActivity) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO activities_archive
                 (id, timestamp, type, title, description, status, source, metadata,
                  archived_at, original_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                archived.id,
                archived.timestamp,
                archived.activity_type,
                archived.title,
                archived.description,
                archived.status,
                archived.source,
                json_param(archived.metadata.as_ref()),
                archived.archived_at,
                archived.original_id,
            ],
        )?;
        Ok(())
    }

    pub fn delete_archived(&self, id: &str) -> Result<usize, DbError> {
        let deleted = self
            .conn
            .execute("DELETE FROM activities_archive WHERE id = ?1", params![id])?;
        Ok(deleted)
    }

    /// Rows strictly older than the cutoff, oldest first. Selection query for
    /// both the compress and cleanup jobs.
    pub fn archived_older_than(
        &self,
        cutoff_ts: &str,
    ) -> Result<Vec<DbArchivedActivity>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ARCHIVE_COLUMNS} FROM activities_archive
             WHERE timestamp < ?1
             ORDER BY timestamp ASC"
        ))?;
        let rows = stmt.query_map(params![cutoff_ts], map_archived)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Newest-first archive browse with optional type and date-range filters.
    pub fn list_archived(
        &self,
        activity_type: Option<ActivityType>,
        start_ts: Option<&str>,
        end_ts: Option<&str>,
        limit: usize,
    ) -> Result<Vec<DbArchivedActivity>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ARCHIVE_COLUMNS} FROM activities_archive
             WHERE (?1 IS NULL OR type = ?1)
               AND (?2 IS NULL OR timestamp >= ?2)
               AND (?3 IS NULL OR timestamp <= ?3)
             ORDER BY timestamp DESC LIMIT ?4"
        ))?;
        let rows = stmt.query_map(
            params![activity_type, start_ts, end_ts, limit as i64],
            map_archived,
        )?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Full warm-tier scan.
    pub fn all_archived(&self) -> Result<Vec<DbArchivedActivity>, DbError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {ARCHIVE_COLUMNS} FROM activities_archive"))?;
        let rows = stmt.query_map([], map_archived)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn count_archived(&self) -> Result<i64, DbError> {
        let count =
            self.conn
                .query_row("SELECT COUNT(*) FROM activities_archive", [], |row| {
                    row.get(0)
                })?;
        Ok(count)
    }
}
