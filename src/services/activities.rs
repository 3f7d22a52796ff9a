//! Activity Ledger: the hot-tier record of everything the agent does.

use serde::Serialize;
use uuid::Uuid;

use crate::db::{DbActivity, LedgerDb};
use crate::error::ServiceError;
use crate::types::{ActivityStatus, ActivityType, Tier};
use crate::util::{local_midnight_utc, now_ts, ts_at, validate_bounded_string};

const TITLE_MAX: usize = 280;
const DESCRIPTION_MAX: usize = 10_000;

/// Input for [`create`]. The timestamp is always server-assigned.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub activity_type: ActivityType,
    pub title: String,
    pub description: String,
    pub status: ActivityStatus,
    pub source: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Record a new activity. Returns the assigned id.
pub fn create(db: &LedgerDb, input: NewActivity) -> Result<String, ServiceError> {
    let title = validate_bounded_string(&input.title, "title", 1, TITLE_MAX)?;
    let description =
        validate_bounded_string(&input.description, "description", 0, DESCRIPTION_MAX)?;

    let activity = DbActivity {
        id: Uuid::new_v4().to_string(),
        timestamp: now_ts(),
        activity_type: input.activity_type,
        title,
        description,
        status: input.status,
        source: input.source,
        metadata: input.metadata,
    };
    db.insert_activity(&activity)?;
    log::debug!(
        "recorded activity {} ({})",
        activity.id,
        activity.activity_type
    );
    Ok(activity.id)
}

/// Whether a status change is legal. `approved`/`rejected` are terminal;
/// `pending_approval` resolves only into those; the working statuses
/// (`auto_done`, `notified`) move freely among themselves and into
/// `pending_approval`.
fn transition_allowed(from: ActivityStatus, to: ActivityStatus) -> bool {
    use ActivityStatus::*;
    if from == to {
        return true;
    }
    match from {
        Approved | Rejected => false,
        PendingApproval => matches!(to, Approved | Rejected),
        AutoDone | Notified => matches!(to, AutoDone | Notified | PendingApproval),
    }
}

/// Move an activity to a new status, enforcing the transition graph.
/// Same-status calls are accepted as no-ops.
pub fn update_status(
    db: &LedgerDb,
    id: &str,
    new_status: ActivityStatus,
) -> Result<(), ServiceError> {
    let activity = db
        .get_activity(id)?
        .ok_or_else(|| ServiceError::not_found("activity", id))?;

    if activity.status == new_status {
        return Ok(());
    }
    if !transition_allowed(activity.status, new_status) {
        return Err(ServiceError::Validation(format!(
            "illegal status transition {} -> {}",
            activity.status, new_status
        )));
    }

    db.patch_activity_status(id, new_status)?;
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStats {
    pub total_activities: usize,
    pub today_activities: usize,
    pub pending_approvals: usize,
    pub total_commits: usize,
    pub total_tasks: usize,
    pub tasks_completed_today: usize,
}

/// Dashboard counters over the hot tier. "Today" cuts off at local midnight,
/// not UTC midnight.
pub fn get_stats(db: &LedgerDb) -> Result<ActivityStats, ServiceError> {
    let all = db.all_activities()?;
    let midnight = ts_at(local_midnight_utc());

    let mut stats = ActivityStats {
        total_activities: all.len(),
        today_activities: 0,
        pending_approvals: 0,
        total_commits: 0,
        total_tasks: 0,
        tasks_completed_today: 0,
    };
    for a in &all {
        let today = a.timestamp >= midnight;
        if today {
            stats.today_activities += 1;
        }
        match a.activity_type {
            ActivityType::Commit => stats.total_commits += 1,
            ActivityType::Task => {
                stats.total_tasks += 1;
                if today && a.status == ActivityStatus::AutoDone {
                    stats.tasks_completed_today += 1;
                }
            }
            _ => {}
        }
        if a.status == ActivityStatus::PendingApproval {
            stats.pending_approvals += 1;
        }
    }
    Ok(stats)
}

/// Newest-first listing with optional status filter.
pub fn list(
    db: &LedgerDb,
    status: Option<ActivityStatus>,
    limit: Option<usize>,
) -> Result<Vec<DbActivity>, ServiceError> {
    Ok(db.list_activities(status, limit)?)
}

/// The `limit` most recent activities (default 5).
pub fn get_recent(db: &LedgerDb, limit: Option<usize>) -> Result<Vec<DbActivity>, ServiceError> {
    Ok(db.list_activities(None, Some(limit.unwrap_or(5)))?)
}

pub fn get_by_id(db: &LedgerDb, id: &str) -> Result<DbActivity, ServiceError> {
    db.get_activity(id)?
        .ok_or_else(|| ServiceError::not_found("activity", id))
}

/// A search hit, tagged with the tier it came from.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TieredActivity {
    pub id: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub title: String,
    pub description: String,
    pub status: ActivityStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub tier: Tier,
}

fn matches_query(title: &str, description: &str, query: &str) -> bool {
    let q = query.to_lowercase();
    title.to_lowercase().contains(&q) || description.to_lowercase().contains(&q)
}

/// Case-insensitive title/description search across the hot and warm tiers.
/// Results are merged newest-first and truncated to `limit` (default 20).
pub fn search_all(
    db: &LedgerDb,
    query: Option<&str>,
    activity_type: Option<ActivityType>,
    limit: Option<usize>,
) -> Result<Vec<TieredActivity>, ServiceError> {
    let limit = limit.unwrap_or(20);
    let mut hits: Vec<TieredActivity> = Vec::new();

    for a in db.all_activities()? {
        if let Some(t) = activity_type {
            if a.activity_type != t {
                continue;
            }
        }
        if let Some(q) = query {
            if !matches_query(&a.title, &a.description, q) {
                continue;
            }
        }
        hits.push(TieredActivity {
            id: a.id,
            timestamp: a.timestamp,
            activity_type: a.activity_type,
            title: a.title,
            description: a.description,
            status: a.status,
            source: a.source,
            tier: Tier::Hot,
        });
    }

    for a in db.all_archived()? {
        if let Some(t) = activity_type {
            if a.activity_type != t {
                continue;
            }
        }
        if let Some(q) = query {
            if !matches_query(&a.title, &a.description, q) {
                continue;
            }
        }
        hits.push(TieredActivity {
            id: a.id,
            timestamp: a.timestamp,
            activity_type: a.activity_type,
            title: a.title,
            description: a.description,
            status: a.status,
            source: a.source,
            tier: Tier::Warm,
        });
    }

    hits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    hits.truncate(limit);
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;
    use crate::db::DbArchivedActivity;
    use crate::util::now_ts;

    fn new_task(title: &str) -> NewActivity {
        NewActivity {
            activity_type: ActivityType::Task,
            title: title.to_string(),
            description: "desc".to_string(),
            status: ActivityStatus::AutoDone,
            source: Some("agent".to_string()),
            metadata: None,
        }
    }

    #[test]
    fn create_assigns_id_and_timestamp() {
        let db = test_db();
        let id = create(&db, new_task("Ship release")).unwrap();
        let got = get_by_id(&db, &id).unwrap();
        assert_eq!(got.title, "Ship release");
        assert!(!got.timestamp.is_empty());
    }

    #[test]
    fn create_rejects_empty_title() {
        let db = test_db();
        let err = create(&db, new_task("   ")).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(db.all_activities().unwrap().len(), 0);
    }

    #[test]
    fn terminal_statuses_do_not_transition() {
        let db = test_db();
        let mut input = new_task("Needs review");
        input.status = ActivityStatus::PendingApproval;
        let id = create(&db, input).unwrap();

        update_status(&db, &id, ActivityStatus::Approved).unwrap();
        let err = update_status(&db, &id, ActivityStatus::PendingApproval).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert_eq!(
            get_by_id(&db, &id).unwrap().status,
            ActivityStatus::Approved
        );
    }

    #[test]
    fn same_status_is_a_noop() {
        let db = test_db();
        let id = create(&db, new_task("Idempotent")).unwrap();
        update_status(&db, &id, ActivityStatus::AutoDone).unwrap();
    }

    #[test]
    fn update_status_unknown_id_is_not_found() {
        let db = test_db();
        let err = update_status(&db, "nope", ActivityStatus::Notified).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
    }

    #[test]
    fn pending_approval_only_resolves() {
        let db = test_db();
        let mut input = new_task("Gate");
        input.status = ActivityStatus::PendingApproval;
        let id = create(&db, input).unwrap();
        let err = update_status(&db, &id, ActivityStatus::AutoDone).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        update_status(&db, &id, ActivityStatus::Rejected).unwrap();
    }

    #[test]
    fn stats_count_types_and_pending() {
        let db = test_db();
        create(&db, new_task("T1")).unwrap();
        let mut commit = new_task("C1");
        commit.activity_type = ActivityType::Commit;
        create(&db, commit).unwrap();
        let mut pending = new_task("P1");
        pending.activity_type = ActivityType::ApprovalRequest;
        pending.status = ActivityStatus::PendingApproval;
        create(&db, pending).unwrap();

        let stats = get_stats(&db).unwrap();
        assert_eq!(stats.total_activities, 3);
        assert_eq!(stats.total_tasks, 1);
        assert_eq!(stats.total_commits, 1);
        assert_eq!(stats.pending_approvals, 1);
        assert_eq!(stats.tasks_completed_today, 1);
    }

    #[test]
    fn search_spans_both_tiers() {
        let db = test_db();
        create(&db, new_task("Deploy staging")).unwrap();
        db.insert_archived(&DbArchivedActivity {
            id: "arch-1".to_string(),
            timestamp: "2026-01-01T00:00:00.000Z".to_string(),
            activity_type: ActivityType::Task,
            title: "Deploy production".to_string(),
            description: "old".to_string(),
            status: ActivityStatus::AutoDone,
            source: None,
            metadata: None,
            archived_at: now_ts(),
            original_id: None,
        })
        .unwrap();

        let hits = search_all(&db, Some("deploy"), None, None).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].tier, Tier::Hot);
        assert_eq!(hits[1].tier, Tier::Warm);

        let hits = search_all(&db, Some("production"), None, None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].tier, Tier::Warm);
    }

    #[test]
    fn search_filters_by_type() {
        let db = test_db();
        create(&db, new_task("alpha work")).unwrap();
        let mut commit = new_task("alpha commit");
        commit.activity_type = ActivityType::Commit;
        create(&db, commit).unwrap();

        let hits = search_all(&db, Some("alpha"), Some(ActivityType::Commit), None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].activity_type, ActivityType::Commit);
    }
}
