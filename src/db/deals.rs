//! `deals` and `deal_activities` table access.

use rusqlite::{params, OptionalExtension, Row};

use super::types::{json_column, json_param};
use super::{DbDeal, DbDealActivity, DbError, LedgerDb};
use crate::types::DealStage;

const DEAL_COLUMNS: &str = "id, title, company, value, stage, owner, next_action, \
     next_action_date, notes, source, contacts, created_at, updated_at";

const DEAL_ACTIVITY_COLUMNS: &str =
    "id, deal_id, type, description, timestamp, created_by, metadata";

fn map_deal(row: &Row<'_>) -> rusqlite::Result<DbDeal> {
    let contacts: Option<String> = row.get(10)?;
    let contacts = match contacts {
        None => Vec::new(),
        Some(raw) => serde_json::from_str(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(10, rusqlite::types::Type::Text, Box::new(e))
        })?,
    };
    Ok(DbDeal {
        id: row.get(0)?,
        title: row.get(1)?,
        company: row.get(2)?,
        value: row.get(3)?,
        stage: row.get(4)?,
        owner: row.get(5)?,
        next_action: row.get(6)?,
        next_action_date: row.get(7)?,
        notes: row.get(8)?,
        source: row.get(9)?,
        contacts,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

fn map_deal_activity(row: &Row<'_>) -> rusqlite::Result<DbDealActivity> {
    Ok(DbDealActivity {
        id: row.get(0)?,
        deal_id: row.get(1)?,
        activity_type: row.get(2)?,
        description: row.get(3)?,
        timestamp: row.get(4)?,
        created_by: row.get(5)?,
        metadata: json_column(6, row.get(6)?)?,
    })
}

fn contacts_param(deal: &DbDeal) -> Option<String> {
    if deal.contacts.is_empty() {
        None
    } else {
        serde_json::to_string(&deal.contacts).ok()
    }
}

impl LedgerDb {
    pub fn insert_deal(&self, deal: &DbDeal) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO deals
                 (id, title, company, value, stage, owner, next_action, next_action_date,
                  notes, source, contacts, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                deal.id,
                deal.title,
                deal.company,
                deal.value,
                deal.stage,
                deal.owner,
                deal.next_action,
                deal.next_action_date,
                deal.notes,
                deal.source,
                contacts_param(deal),
                deal.created_at,
                deal.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Full-row write; the service layer loads, merges, and writes back.
    pub fn update_deal(&self, deal: &DbDeal) -> Result<usize, DbError> {
        let changed = self.conn.execute(
            "UPDATE deals
             SET title = ?2, company = ?3, value = ?4, stage = ?5, owner = ?6,
                 next_action = ?7, next_action_date = ?8, notes = ?9, source = ?10,
                 contacts = ?11, updated_at = ?12
             WHERE id = ?1",
            params![
                deal.id,
                deal.title,
                deal.company,
                deal.value,
                deal.stage,
                deal.owner,
                deal.next_action,
                deal.next_action_date,
                deal.notes,
                deal.source,
                contacts_param(deal),
                deal.updated_at,
            ],
        )?;
        Ok(changed)
    }

    pub fn patch_deal_stage(
        &self,
        id: &str,
        stage: DealStage,
        updated_at: &str,
    ) -> Result<usize, DbError> {
        let changed = self.conn.execute(
            "UPDATE deals SET stage = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, stage, updated_at],
        )?;
        Ok(changed)
    }

    /// Bump `updated_at` only (activity was appended).
    pub fn touch_deal(&self, id: &str, updated_at: &str) -> Result<usize, DbError> {
        let changed = self.conn.execute(
            "UPDATE deals SET updated_at = ?2 WHERE id = ?1",
            params![id, updated_at],
        )?;
        Ok(changed)
    }

    pub fn get_deal(&self, id: &str) -> Result<Option<DbDeal>, DbError> {
        let deal = self
            .conn
            .query_row(
                &format!("SELECT {DEAL_COLUMNS} FROM deals WHERE id = ?1"),
                params![id],
                map_deal,
            )
            .optional()?;
        Ok(deal)
    }

    /// Recently-touched-first listing with optional stage/owner filters.
    pub fn list_deals(
        &self,
        stage: Option<DealStage>,
        owner: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<DbDeal>, DbError> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DEAL_COLUMNS} FROM deals
             WHERE (?1 IS NULL OR stage = ?1)
               AND (?2 IS NULL OR owner = ?2)
             ORDER BY updated_at DESC LIMIT ?3"
        ))?;
        let rows = stmt.query_map(params![stage, owner, limit], map_deal)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn all_deals(&self) -> Result<Vec<DbDeal>, DbError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {DEAL_COLUMNS} FROM deals"))?;
        let rows = stmt.query_map([], map_deal)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn insert_deal_activity(&self, activity: &DbDealActivity) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO deal_activities
                 (id, deal_id, type, description, timestamp, created_by, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                activity.id,
                activity.deal_id,
                activity.activity_type,
                activity.description,
                activity.timestamp,
                activity.created_by,
                json_param(activity.metadata.as_ref()),
            ],
        )?;
        Ok(())
    }

    /// All audit entries for one deal, newest first.
    pub fn activities_for_deal(&self, deal_id: &str) -> Result<Vec<DbDealActivity>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DEAL_ACTIVITY_COLUMNS} FROM deal_activities
             WHERE deal_id = ?1
             ORDER BY timestamp DESC"
        ))?;
        let rows = stmt.query_map(params![deal_id], map_deal_activity)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Timestamp of the deal's most recent audit entry, if any.
    pub fn last_deal_activity_ts(&self, deal_id: &str) -> Result<Option<String>, DbError> {
        let ts = self.conn.query_row(
            "SELECT MAX(timestamp) FROM deal_activities WHERE deal_id = ?1",
            params![deal_id],
            |row| row.get(0),
        )?;
        Ok(ts)
    }

    /// Latest audit entries across all deals, newest first.
    pub fn recent_deal_activities(&self, limit: usize) -> Result<Vec<DbDealActivity>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DEAL_ACTIVITY_COLUMNS} FROM deal_activities
             ORDER BY timestamp DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit as i64], map_deal_activity)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Audit entries strictly newer than `since`, newest first. Feed streaming.
    pub fn deal_activities_since(
        &self,
        since_ts: &str,
        limit: usize,
    ) -> Result<Vec<DbDealActivity>, DbError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DEAL_ACTIVITY_COLUMNS} FROM deal_activities
             WHERE timestamp > ?1
             ORDER BY timestamp DESC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![since_ts, limit as i64], map_deal_activity)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn count_deal_activities_since(&self, since_ts: &str) -> Result<i64, DbError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM deal_activities WHERE timestamp > ?1",
            params![since_ts],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn latest_deal_activity_ts(&self) -> Result<Option<String>, DbError> {
        let ts = self.conn.query_row(
            "SELECT MAX(timestamp) FROM deal_activities",
            [],
            |row| row.get(0),
        )?;
        Ok(ts)
    }
}
