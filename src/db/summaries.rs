//! Cold-tier `daily_summaries` table access.

use rusqlite::{params, OptionalExtension, Row};

use super::types::{json_column, json_param};
use super::{DbDailySummary, DbError, LedgerDb};

const SUMMARY_COLUMNS: &str = "date, tasks_completed, commits_count, research_count, \
     notifications_count, approval_requests_count, approvals_processed, approvals_approved, \
     approvals_rejected, source_breakdown, summary, highlights, compressed_at, \
     activities_compressed";

fn map_summary(row: &Row<'_>) -> rusqlite::Result<DbDailySummary> {
    let highlights: Option<String> = row.get(11)?;
    let highlights = match highlights {
        None => None,
        Some(raw) => Some(serde_json::from_str(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(11, rusqlite::types::Type::Text, Box::new(e))
        })?),
    };
    Ok(DbDailySummary {
        date: row.get(0)?,
        tasks_completed: row.get(1)?,
        commits_count: row.get(2)?,
        research_count: row.get(3)?,
        notifications_count: row.get(4)?,
        approval_requests_count: row.get(5)?,
        approvals_processed: row.get(6)?,
        approvals_approved: row.get(7)?,
        approvals_rejected: row.get(8)?,
        source_breakdown: json_column(9, row.get(9)?)?,
        summary: row.get(10)?,
        highlights,
        compressed_at: row.get(12)?,
        activities_compressed: row.get(13)?,
    })
}

impl LedgerDb {
    pub fn get_summary(&self, date: &str) -> Result<Option<DbDailySummary>, DbError> {
        let summary = self
            .conn
            .query_row(
                &format!("SELECT {SUMMARY_COLUMNS} FROM daily_summaries WHERE date = ?1"),
                params![date],
                map_summary,
            )
            .optional()?;
        Ok(summary)
    }

    /// Insert or fully replace the summary for its date. Returns `true` when a
    /// new row was created, `false` when an existing one was updated — the
    /// compress job reports the two separately.
    pub fn upsert_summary(&self, summary: &DbDailySummary) -> Result<bool, DbError> {
        let existed: bool = self
            .conn
            .prepare("SELECT 1 FROM daily_summaries WHERE date = ?1")?
            .exists(params![summary.date])?;

        let highlights = summary
            .highlights
            .as_ref()
            .map(|h| serde_json::to_string(h).unwrap_or_else(|_| "[]".to_string()));

        self.conn.execute(
            "INSERT INTO daily_summaries
                 (date, tasks_completed, commits_count, research_count, notifications_count,
                  approval_requests_count, approvals_processed, approvals_approved,
                  approvals_rejected, source_breakdown, summary, highlights, compressed_at,
                  activities_compressed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
             ON CONFLICT(date) DO UPDATE SET
                 tasks_completed = excluded.tasks_completed,
                 commits_count = excluded.commits_count,
                 research_count = excluded.research_count,
                 notifications_count = excluded.notifications_count,
                 approval_requests_count = excluded.approval_requests_count,
                 approvals_processed = excluded.approvals_processed,
                 approvals_approved = excluded.approvals_approved,
                 approvals_rejected = excluded.approvals_rejected,
                 source_breakdown = excluded.source_breakdown,
                 summary = excluded.summary,
                 highlights = excluded.highlights,
                 compressed_at = excluded.compressed_at,
                 activities_compressed = excluded.activities_compressed",
            params![
                summary.date,
                summary.tasks_completed,
                summary.commits_count,
                summary.research_count,
                summary.notifications_count,
                summary.approval_requests_count,
                summary.approvals_processed,
                summary.approvals_approved,
                summary.approvals_rejected,
                json_param(summary.source_breakdown.as_ref()),
                summary.summary,
                highlights,
                summary.compressed_at,
                summary.activities_compressed,
            ],
        )?;
        Ok(!existed)
    }

    /// All summaries, date ascending.
    pub fn all_summaries(&self) -> Result<Vec<DbDailySummary>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SUMMARY_COLUMNS} FROM daily_summaries ORDER BY date ASC"
        ))?;
        let rows = stmt.query_map([], map_summary)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// The most recent `limit` summaries, newest first.
    pub fn recent_summaries(&self, limit: usize) -> Result<Vec<DbDailySummary>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SUMMARY_COLUMNS} FROM daily_summaries ORDER BY date DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit as i64], map_summary)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Summaries with `start <= date <= end`, newest first.
    pub fn summaries_in_range(
        &self,
        start_date: &str,
        end_date: &str,
    ) -> Result<Vec<DbDailySummary>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SUMMARY_COLUMNS} FROM daily_summaries
             WHERE date >= ?1 AND date <= ?2
             ORDER BY date DESC"
        ))?;
        let rows = stmt.query_map(params![start_date, end_date], map_summary)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}
