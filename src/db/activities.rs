//! Hot-tier `activities` table access.

use rusqlite::{params, OptionalExtension, Row};

use super::types::{json_column, json_param};
use super::{DbActivity, DbError, LedgerDb};
use crate::types::ActivityStatus;

const ACTIVITY_COLUMNS: &str =
    "id, timestamp, type, title, description, status, source, metadata";

fn map_activity(row: &Row<'_>) -> rusqlite::Result<DbActivity> {
    Ok(DbActivity {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        activity_type: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        status: row.get(5)?,
        source: row.get(6)?,
        metadata: json_column(7, row.get(7)?)?,
    })
}

impl LedgerDb {
    pub fn insert_activity(&self, activity: &DbActivity) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO activities (id, timestamp, type, title, description, status, source, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                activity.id,
                activity.timestamp,
                activity.activity_type,
                activity.title,
                activity.description,
                activity.status,
                activity.source,
                json_param(activity.metadata.as_ref()),
            ],
        )?;
        Ok(())
    }

    pub fn get_activity(&self, id: &str) -> Result<Option<DbActivity>, DbError> {
        let activity = self
            .conn
            .query_row(
                &format!("SELECT {ACTIVITY_COLUMNS} FROM activities WHERE id = ?1"),
                params![id],
                map_activity,
            )
            .optional()?;
        Ok(activity)
    }

    /// Patch only the status column. Returns the number of rows changed
    /// (0 when the id doesn't exist).
    pub fn patch_activity_status(
        &self,
        id: &str,
        status: ActivityStatus,
    ) -> Result<usize, DbError> {
        let changed = self.conn.execute(
            "UPDATE activities SET status = ?2 WHERE id = ?1",
            params![id, status],
        )?;
        Ok(changed)
    }

    /// Patch description and/or metadata, leaving other columns alone.
    pub fn patch_activity_content(
        &self,
        id: &str,
        description: Option<&str>,
        metadata: Option<&serde_json::Value>,
    ) -> Result<usize, DbError> {
        let changed = self.conn.execute(
            "UPDATE activities
             SET description = COALESCE(?2, description),
                 metadata = COALESCE(?3, metadata)
             WHERE id = ?1",
            params![id, description, json_param(metadata)],
        )?;
        Ok(changed)
    }

    pub fn delete_activity(&self, id: &str) -> Result<usize, DbError> {
        let deleted = self
            .conn
            .execute("DELETE FROM activities WHERE id = ?1", params![id])?;
        Ok(deleted)
    }

    /// Newest-first listing with optional status filter and limit.
    pub fn list_activities(
        &self,
        status: Option<ActivityStatus>,
        limit: Option<usize>,
    ) -> Result<Vec<DbActivity>, DbError> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut out = Vec::new();
        match status {
            Some(status) => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {ACTIVITY_COLUMNS} FROM activities
                     WHERE status = ?1
                     ORDER BY timestamp DESC LIMIT ?2"
                ))?;
                let rows = stmt.query_map(params![status, limit], map_activity)?;
                for row in rows {
                    out.push(row?);
                }
            }
            None => {
                let mut stmt = self.conn.prepare(&format!(
                    "SELECT {ACTIVITY_COLUMNS} FROM activities
                     ORDER BY timestamp DESC LIMIT ?1"
                ))?;
                let rows = stmt.query_map(params![limit], map_activity)?;
                for row in rows {
                    out.push(row?);
                }
            }
        }
        Ok(out)
    }

    /// Full hot-tier scan, insertion order. The 7-day retention policy keeps
    /// this table small enough for stat aggregation to scan it.
    pub fn all_activities(&self) -> Result<Vec<DbActivity>, DbError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {ACTIVITY_COLUMNS} FROM activities"))?;
        let rows = stmt.query_map([], map_activity)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Rows strictly older than the cutoff, oldest first. The archive job's
    /// selection query (both dry-run and real).
    pub fn activities_older_than(&self, cutoff_ts: &str) -> Result<Vec<DbActivity>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities
             WHERE timestamp < ?1
             ORDER BY timestamp ASC"
        ))?;
        let rows = stmt.query_map(params![cutoff_ts], map_activity)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Rows strictly newer than `since`, newest first. Feed streaming.
    pub fn activities_since(
        &self,
        since_ts: &str,
        limit: usize,
    ) -> Result<Vec<DbActivity>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM activities
             WHERE timestamp > ?1
             ORDER BY timestamp DESC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![since_ts, limit as i64], map_activity)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn count_activities_since(&self, since_ts: &str) -> Result<i64, DbError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM activities WHERE timestamp > ?1",
            params![since_ts],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn latest_activity_ts(&self) -> Result<Option<String>, DbError> {
        let ts = self.conn.query_row(
            "SELECT MAX(timestamp) FROM activities",
            [],
            |row| row.get(0),
        )?;
        Ok(ts)
    }
}
