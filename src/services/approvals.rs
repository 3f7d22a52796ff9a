//! Approval Workflow: human review of agent output.
//!
//! Every approval wraps a hot-tier `approval_request` activity; the pair is
//! created and resolved atomically so a reader never sees a resolved approval
//! next to a still-pending activity.

use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::db::{DbActivity, DbApproval, LedgerDb};
use crate::error::ServiceError;
use crate::types::{ActivityStatus, ActivityType, ApprovalKind, Resolution};
use crate::util::{local_midnight_utc, now_ts, ts_at, validate_bounded_string};

const TITLE_MAX: usize = 280;
const CONTENT_MAX: usize = 50_000;

#[derive(Debug, Clone)]
pub struct NewApproval {
    pub kind: ApprovalKind,
    pub title: String,
    pub content: String,
    pub created_by: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedApproval {
    pub approval_id: String,
    pub activity_id: String,
}

/// Queue a new approval. Inserts the pending activity and the approval row
/// linking to it in one transaction.
pub fn create(db: &LedgerDb, input: NewApproval) -> Result<CreatedApproval, ServiceError> {
    let title = validate_bounded_string(&input.title, "title", 1, TITLE_MAX)?;
    let content = validate_bounded_string(&input.content, "content", 1, CONTENT_MAX)?;

    let created_by = input.created_by.unwrap_or_else(|| "agent".to_string());
    let mut metadata = input.metadata.unwrap_or_else(|| json!({}));
    if let Some(map) = metadata.as_object_mut() {
        map.entry("priority").or_insert(json!("medium"));
    }

    let created_at = now_ts();
    let activity_id = Uuid::new_v4().to_string();
    let approval_id = Uuid::new_v4().to_string();

    db.with_transaction(|db| {
        db.insert_activity(&DbActivity {
            id: activity_id.clone(),
            timestamp: created_at.clone(),
            activity_type: ActivityType::ApprovalRequest,
            title: title.clone(),
            description: content.clone(),
            status: ActivityStatus::PendingApproval,
            source: Some(created_by.clone()),
            metadata: None,
        })?;
        db.insert_approval(&DbApproval {
            id: approval_id.clone(),
            kind: input.kind,
            title: title.clone(),
            content: content.clone(),
            activity_id: Some(activity_id.clone()),
            resolution: Resolution::Pending,
            created_by: Some(created_by.clone()),
            created_at: created_at.clone(),
            resolved_at: None,
            resolved_by: None,
            metadata: Some(metadata.clone()),
        })?;
        Ok(())
    })?;

    log::info!("queued {} approval {approval_id}", input.kind);
    Ok(CreatedApproval {
        approval_id,
        activity_id,
    })
}

/// Resolve a pending approval and propagate the outcome to its linked
/// activity, atomically. Resolutions are terminal: resolving an
/// already-resolved approval is a validation error, and `Pending` is not a
/// valid target.
pub fn resolve(
    db: &LedgerDb,
    id: &str,
    resolution: Resolution,
    resolved_by: Option<&str>,
) -> Result<(), ServiceError> {
    let status = resolution.as_activity_status().ok_or_else(|| {
        ServiceError::Validation("cannot resolve an approval back to pending".to_string())
    })?;

    let approval = db
        .get_approval(id)?
        .ok_or_else(|| ServiceError::not_found("approval", id))?;
    if approval.resolution != Resolution::Pending {
        return Err(ServiceError::Validation(format!(
            "approval {id} is already {}",
            approval.resolution
        )));
    }

    let resolved_at = now_ts();
    db.with_transaction(|db| {
        let changed = db.patch_approval_resolution(id, resolution, &resolved_at, resolved_by)?;
        if changed == 0 {
            // Raced with another resolver between the read and the write.
            return Err(ServiceError::Validation(format!(
                "approval {id} is already resolved"
            )));
        }
        if let Some(activity_id) = &approval.activity_id {
            if db.patch_activity_status(activity_id, status)? == 0 {
                log::warn!(
                    "approval {id} resolved but linked activity {activity_id} is gone"
                );
            }
        }
        Ok(())
    })?;

    log::info!("approval {id} resolved as {resolution}");
    Ok(())
}

pub fn approve(db: &LedgerDb, id: &str, resolved_by: Option<&str>) -> Result<(), ServiceError> {
    resolve(db, id, Resolution::Approved, resolved_by)
}

pub fn reject(db: &LedgerDb, id: &str, resolved_by: Option<&str>) -> Result<(), ServiceError> {
    resolve(db, id, Resolution::Rejected, resolved_by)
}

/// Resolve a batch. Missing and already-resolved ids are skipped; store
/// failures abort. Returns how many approvals actually transitioned.
pub fn bulk_resolve(
    db: &LedgerDb,
    ids: &[String],
    resolution: Resolution,
    resolved_by: Option<&str>,
) -> Result<usize, ServiceError> {
    let mut count = 0;
    for id in ids {
        match resolve(db, id, resolution, resolved_by) {
            Ok(()) => count += 1,
            Err(e) if e.is_skippable_in_bulk() => {
                log::debug!("bulk resolve skipped {id}: {e}");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(count)
}

pub fn bulk_approve(
    db: &LedgerDb,
    ids: &[String],
    resolved_by: Option<&str>,
) -> Result<usize, ServiceError> {
    bulk_resolve(db, ids, Resolution::Approved, resolved_by)
}

pub fn bulk_reject(
    db: &LedgerDb,
    ids: &[String],
    resolved_by: Option<&str>,
) -> Result<usize, ServiceError> {
    bulk_resolve(db, ids, Resolution::Rejected, resolved_by)
}

/// An approval joined with its linked activity (absent when the activity has
/// been archived out of the hot tier).
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalWithActivity {
    #[serde(flatten)]
    pub approval: DbApproval,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<DbActivity>,
}

fn enrich(db: &LedgerDb, approvals: Vec<DbApproval>) -> Result<Vec<ApprovalWithActivity>, ServiceError> {
    let mut out = Vec::with_capacity(approvals.len());
    for approval in approvals {
        let activity = match &approval.activity_id {
            Some(id) => db.get_activity(id)?,
            None => None,
        };
        out.push(ApprovalWithActivity { approval, activity });
    }
    Ok(out)
}

/// Pending approvals with their linked activities, newest first.
pub fn list_pending(db: &LedgerDb) -> Result<Vec<ApprovalWithActivity>, ServiceError> {
    let pending = db.pending_approvals()?;
    enrich(db, pending)
}

/// All approvals regardless of resolution, newest first.
pub fn list(db: &LedgerDb, limit: Option<usize>) -> Result<Vec<ApprovalWithActivity>, ServiceError> {
    let approvals = db.list_approvals(limit.unwrap_or(100))?;
    enrich(db, approvals)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalStats {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub approved_today: usize,
    pub rejected_today: usize,
    /// Percentage of resolved approvals that were rejected, rounded to the
    /// nearest integer. 0 when nothing has been resolved.
    pub rejection_rate: i64,
    pub total: usize,
}

pub fn get_stats(db: &LedgerDb) -> Result<ApprovalStats, ServiceError> {
    let all = db.all_approvals()?;
    let midnight = ts_at(local_midnight_utc());

    let mut stats = ApprovalStats {
        pending: 0,
        approved: 0,
        rejected: 0,
        approved_today: 0,
        rejected_today: 0,
        rejection_rate: 0,
        total: all.len(),
    };
    for a in &all {
        let today = a
            .resolved_at
            .as_deref()
            .map_or(false, |ts| ts >= midnight.as_str());
        match a.resolution {
            Resolution::Pending => stats.pending += 1,
            Resolution::Approved => {
                stats.approved += 1;
                if today {
                    stats.approved_today += 1;
                }
            }
            Resolution::Rejected => {
                stats.rejected += 1;
                if today {
                    stats.rejected_today += 1;
                }
            }
        }
    }
    let resolved = stats.approved + stats.rejected;
    if resolved > 0 {
        stats.rejection_rate = (stats.rejected as f64 / resolved as f64 * 100.0).round() as i64;
    }
    Ok(stats)
}

/// Edit an approval's content and/or metadata. Content edits are the one
/// mutation allowed after resolution; the resolution itself is never touched.
/// Edited content is mirrored into `metadata.editedContent` and into the
/// linked activity's description.
pub fn update(
    db: &LedgerDb,
    id: &str,
    content: Option<&str>,
    metadata: Option<serde_json::Value>,
) -> Result<(), ServiceError> {
    let approval = db
        .get_approval(id)?
        .ok_or_else(|| ServiceError::not_found("approval", id))?;

    let content = match content {
        Some(c) => Some(validate_bounded_string(c, "content", 1, CONTENT_MAX)?),
        None => None,
    };

    let mut merged = approval.metadata.unwrap_or_else(|| json!({}));
    if let Some(extra) = metadata {
        if let (Some(base), Some(patch)) = (merged.as_object_mut(), extra.as_object()) {
            for (k, v) in patch {
                base.insert(k.clone(), v.clone());
            }
        }
    }
    if let Some(c) = &content {
        if let Some(map) = merged.as_object_mut() {
            map.insert("editedContent".to_string(), json!(c));
        }
    }

    db.with_transaction(|db| {
        db.patch_approval_content(id, content.as_deref(), Some(&merged))?;
        if let Some(activity_id) = &approval.activity_id {
            db.patch_activity_content(activity_id, content.as_deref(), None)?;
        }
        Ok(())
    })
}
