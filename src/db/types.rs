//! Shared type definitions for the database layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{
    ActivityStatus, ActivityType, ApprovalKind, DealActivityType, DealSource, DealStage,
    Resolution,
};

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),
}

/// Decode an optional JSON TEXT column.
pub(crate) fn json_column(
    idx: usize,
    raw: Option<String>,
) -> rusqlite::Result<Option<serde_json::Value>> {
    match raw {
        None => Ok(None),
        Some(s) => serde_json::from_str(&s).map(Some).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        }),
    }
}

/// Encode an optional JSON value for a TEXT column.
pub(crate) fn json_param(value: Option<&serde_json::Value>) -> Option<String> {
    value.map(|v| v.to_string())
}

/// A row from the `activities` table (hot tier).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbActivity {
    pub id: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub title: String,
    pub description: String,
    pub status: ActivityStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// A row from the `activities_archive` table (warm tier).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbArchivedActivity {
    pub id: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub title: String,
    pub description: String,
    pub status: ActivityStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub archived_at: String,
    /// The hot-tier id this row was copied from. Never resolves back to a
    /// live row: the live row is deleted in the same transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_id: Option<String>,
}

/// A row from the `daily_summaries` table (cold tier).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbDailySummary {
    /// `YYYY-MM-DD`; unique by schema.
    pub date: String,
    pub tasks_completed: i64,
    pub commits_count: i64,
    pub research_count: i64,
    pub notifications_count: i64,
    pub approval_requests_count: i64,
    pub approvals_processed: i64,
    pub approvals_approved: i64,
    pub approvals_rejected: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_breakdown: Option<serde_json::Value>,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlights: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activities_compressed: Option<i64>,
}

/// A row from the `approvals` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbApproval {
    pub id: String,
    pub kind: ApprovalKind,
    pub title: String,
    pub content: String,
    /// Hot-tier activity this approval wraps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    pub resolution: Resolution,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// A contact on a deal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealContact {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// A row from the `deals` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbDeal {
    pub id: String,
    pub title: String,
    pub company: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    pub stage: DealStage,
    pub owner: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_action_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<DealSource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contacts: Vec<DealContact>,
    pub created_at: String,
    pub updated_at: String,
}

/// A row from the `deal_activities` table. Append-only audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbDealActivity {
    pub id: String,
    pub deal_id: String,
    #[serde(rename = "type")]
    pub activity_type: DealActivityType,
    pub description: String,
    pub timestamp: String,
    pub created_by: String,
    /// Stage changes carry `{"from": ..., "to": ...}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}
