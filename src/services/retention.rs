//! Retention Pipeline: hot -> warm -> cold.
//!
//! Three scheduled jobs (archive, compress, cleanup) plus a read-only tier
//! report. Each job has a `*_at` variant taking an explicit `now` so tests
//! can replay multi-month timelines; the public wrappers use `Utc::now()`.
//! Dry runs share the selection queries with the real runs and never mutate.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::db::{DbArchivedActivity, DbDailySummary, LedgerDb};
use crate::error::ServiceError;
use crate::types::{ActivityStatus, ActivityType};
use crate::util::{day_key, ts_at};

/// Hot-tier rows older than this move to the archive.
pub const ARCHIVE_THRESHOLD_DAYS: i64 = 7;
/// Warm-tier rows older than this compress into daily summaries.
pub const COMPRESS_THRESHOLD_DAYS: i64 = 90;

// ---------------------------------------------------------------------------
// Archive (hot -> warm)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(tag = "mode")]
pub enum ArchiveOutcome {
    #[serde(rename = "dryRun", rename_all = "camelCase")]
    DryRun {
        activities_to_archive: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        oldest_activity: Option<String>,
        cutoff_date: String,
    },
    #[serde(rename = "applied", rename_all = "camelCase")]
    Applied {
        archived: usize,
        cutoff_date: String,
        timestamp: String,
    },
}

pub fn archive(db: &LedgerDb, dry_run: bool) -> Result<ArchiveOutcome, ServiceError> {
    archive_at(db, Utc::now(), dry_run)
}

/// Move hot-tier rows older than the archive cutoff into the warm tier.
/// Copy-then-delete runs in one transaction; the insert comes first so a
/// partial failure can only duplicate, never lose.
pub fn archive_at(
    db: &LedgerDb,
    now: DateTime<Utc>,
    dry_run: bool,
) -> Result<ArchiveOutcome, ServiceError> {
    let cutoff = ts_at(now - Duration::days(ARCHIVE_THRESHOLD_DAYS));
    let candidates = db.activities_older_than(&cutoff)?;

    if dry_run {
        return Ok(ArchiveOutcome::DryRun {
            activities_to_archive: candidates.len(),
            oldest_activity: candidates.first().map(|a| a.timestamp.clone()),
            cutoff_date: cutoff,
        });
    }

    let archived_at = ts_at(now);
    let count = db.with_transaction(|db| {
        for activity in &candidates {
            db.insert_archived(&DbArchivedActivity {
                id: Uuid::new_v4().to_string(),
                timestamp: activity.timestamp.clone(),
                activity_type: activity.activity_type,
                title: activity.title.clone(),
                description: activity.description.clone(),
                status: activity.status,
                source: activity.source.clone(),
                metadata: activity.metadata.clone(),
                archived_at: archived_at.clone(),
                original_id: Some(activity.id.clone()),
            })?;
            db.delete_activity(&activity.id)?;
        }
        Ok(candidates.len())
    })?;

    log::info!("archived {count} activities older than {cutoff}");
    Ok(ArchiveOutcome::Applied {
        archived: count,
        cutoff_date: cutoff,
        timestamp: archived_at,
    })
}

// ---------------------------------------------------------------------------
// Compress (warm -> cold)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "mode")]
pub enum CompressOutcome {
    #[serde(rename = "dryRun", rename_all = "camelCase")]
    DryRun {
        activities_to_compress: usize,
        days_to_summarize: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        date_range: Option<DateRange>,
        cutoff_date: String,
    },
    #[serde(rename = "applied", rename_all = "camelCase")]
    Applied {
        summaries_created: usize,
        summaries_updated: usize,
        activities_deleted: usize,
        cutoff_date: String,
        timestamp: String,
    },
}

/// Fold one UTC date's worth of archived activities into a summary row.
fn summarize_group(
    date: &str,
    group: &[DbArchivedActivity],
    compressed_at: &str,
) -> DbDailySummary {
    let mut tasks_completed = 0;
    let mut commits = 0;
    let mut research = 0;
    let mut notifications = 0;
    let mut approval_requests = 0;
    let mut approved = 0;
    let mut rejected = 0;
    let mut sources: BTreeMap<String, i64> = BTreeMap::new();
    let mut highlights: Vec<String> = Vec::new();

    for a in group {
        match a.activity_type {
            ActivityType::Task => {
                if a.status == ActivityStatus::AutoDone {
                    tasks_completed += 1;
                }
            }
            ActivityType::Commit => commits += 1,
            ActivityType::Research => research += 1,
            ActivityType::Notification => notifications += 1,
            ActivityType::ApprovalRequest => {
                approval_requests += 1;
                match a.status {
                    ActivityStatus::Approved => approved += 1,
                    ActivityStatus::Rejected => rejected += 1,
                    _ => {}
                }
            }
        }
        let source = a.source.clone().unwrap_or_else(|| "unknown".to_string());
        *sources.entry(source).or_insert(0) += 1;
        if highlights.len() < 5
            && matches!(a.activity_type, ActivityType::Task | ActivityType::Commit)
        {
            highlights.push(a.title.clone());
        }
    }

    let summary = format!(
        "{} activities: {} tasks, {} commits, {} research, {} notifications",
        group.len(),
        tasks_completed,
        commits,
        research,
        notifications
    );

    DbDailySummary {
        date: date.to_string(),
        tasks_completed,
        commits_count: commits,
        research_count: research,
        notifications_count: notifications,
        approval_requests_count: approval_requests,
        approvals_processed: approved + rejected,
        approvals_approved: approved,
        approvals_rejected: rejected,
        source_breakdown: serde_json::to_value(&sources).ok(),
        summary,
        highlights: if highlights.is_empty() {
            None
        } else {
            Some(highlights)
        },
        compressed_at: Some(compressed_at.to_string()),
        activities_compressed: Some(group.len() as i64),
    }
}

pub fn compress(db: &LedgerDb, dry_run: bool) -> Result<CompressOutcome, ServiceError> {
    compress_at(db, Utc::now(), dry_run)
}

/// Fold warm-tier rows older than the compress cutoff into per-date summary
/// rows, then delete them. Each date group is one transaction, so a failure
/// mid-sweep leaves whole days either compressed or untouched.
pub fn compress_at(
    db: &LedgerDb,
    now: DateTime<Utc>,
    dry_run: bool,
) -> Result<CompressOutcome, ServiceError> {
    let cutoff = ts_at(now - Duration::days(COMPRESS_THRESHOLD_DAYS));
    let candidates = db.archived_older_than(&cutoff)?;

    let mut groups: BTreeMap<String, Vec<DbArchivedActivity>> = BTreeMap::new();
    for a in candidates {
        groups.entry(day_key(&a.timestamp).to_string()).or_default().push(a);
    }

    if dry_run {
        let total: usize = groups.values().map(Vec::len).sum();
        let date_range = match (groups.keys().next(), groups.keys().next_back()) {
            (Some(from), Some(to)) => Some(DateRange {
                from: from.clone(),
                to: to.clone(),
            }),
            _ => None,
        };
        return Ok(CompressOutcome::DryRun {
            activities_to_compress: total,
            days_to_summarize: groups.len(),
            date_range,
            cutoff_date: cutoff,
        });
    }

    let compressed_at = ts_at(now);
    let mut created = 0;
    let mut updated = 0;
    let mut deleted = 0;

    for (date, group) in &groups {
        let summary = summarize_group(date, group, &compressed_at);
        db.with_transaction(|db| {
            if db.upsert_summary(&summary)? {
                created += 1;
            } else {
                updated += 1;
            }
            for a in group {
                deleted += db.delete_archived(&a.id)?;
            }
            Ok(())
        })?;
    }

    log::info!(
        "compressed {deleted} archived activities into {} daily summaries",
        created + updated
    );
    Ok(CompressOutcome::Applied {
        summaries_created: created,
        summaries_updated: updated,
        activities_deleted: deleted,
        cutoff_date: cutoff,
        timestamp: compressed_at,
    })
}

// ---------------------------------------------------------------------------
// Cleanup (repair)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(tag = "mode")]
pub enum CleanupOutcome {
    #[serde(rename = "dryRun", rename_all = "camelCase")]
    DryRun {
        activities_to_delete: usize,
        total_old_archived: usize,
        summarized_dates: usize,
    },
    #[serde(rename = "applied", rename_all = "camelCase")]
    Applied { deleted: usize, timestamp: String },
}

pub fn cleanup(db: &LedgerDb, dry_run: bool) -> Result<CleanupOutcome, ServiceError> {
    cleanup_at(db, Utc::now(), dry_run)
}

/// Repair pass for the crash window between a summary upsert and its group
/// delete: drop old archived rows whose date already has a summary. Rows for
/// unsummarized dates are left for the next compress run.
pub fn cleanup_at(
    db: &LedgerDb,
    now: DateTime<Utc>,
    dry_run: bool,
) -> Result<CleanupOutcome, ServiceError> {
    let cutoff = ts_at(now - Duration::days(COMPRESS_THRESHOLD_DAYS));
    let old = db.archived_older_than(&cutoff)?;

    let summarized: BTreeSet<String> = db
        .all_summaries()?
        .into_iter()
        .map(|s| s.date)
        .collect();

    let doomed: Vec<&DbArchivedActivity> = old
        .iter()
        .filter(|a| summarized.contains(day_key(&a.timestamp)))
        .collect();

    if dry_run {
        return Ok(CleanupOutcome::DryRun {
            activities_to_delete: doomed.len(),
            total_old_archived: old.len(),
            summarized_dates: summarized.len(),
        });
    }

    let deleted = db.with_transaction(|db| {
        let mut n = 0;
        for a in &doomed {
            n += db.delete_archived(&a.id)?;
        }
        Ok(n)
    })?;

    if deleted > 0 {
        log::warn!("cleanup removed {deleted} already-summarized archived activities");
    }
    Ok(CleanupOutcome::Applied {
        deleted,
        timestamp: ts_at(now),
    })
}

// ---------------------------------------------------------------------------
// Tier info
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierCounts {
    pub count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_to_archive: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_to_compress: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed_days: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Thresholds {
    pub archive_after_days: i64,
    pub compress_after_days: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierInfo {
    pub hot: TierCounts,
    pub warm: TierCounts,
    pub cold: TierCounts,
    pub thresholds: Thresholds,
}

pub fn tier_info(db: &LedgerDb) -> Result<TierInfo, ServiceError> {
    tier_info_at(db, Utc::now())
}

/// Read-only report of row counts per tier and how much the next archive and
/// compress runs would move.
pub fn tier_info_at(db: &LedgerDb, now: DateTime<Utc>) -> Result<TierInfo, ServiceError> {
    let archive_cutoff = ts_at(now - Duration::days(ARCHIVE_THRESHOLD_DAYS));
    let compress_cutoff = ts_at(now - Duration::days(COMPRESS_THRESHOLD_DAYS));

    let hot = db.all_activities()?;
    let ready_to_archive = hot.iter().filter(|a| a.timestamp < archive_cutoff).count();

    let warm_count = db.count_archived()?;
    let ready_to_compress = db.archived_older_than(&compress_cutoff)?.len();

    let summaries = db.all_summaries()?;
    let compressed_days = summaries
        .iter()
        .filter(|s| s.compressed_at.is_some())
        .count();

    Ok(TierInfo {
        hot: TierCounts {
            count: hot.len() as i64,
            ready_to_archive: Some(ready_to_archive),
            ready_to_compress: None,
            compressed_days: None,
        },
        warm: TierCounts {
            count: warm_count,
            ready_to_archive: None,
            ready_to_compress: Some(ready_to_compress),
            compressed_days: None,
        },
        cold: TierCounts {
            count: summaries.len() as i64,
            ready_to_archive: None,
            ready_to_compress: None,
            compressed_days: Some(compressed_days),
        },
        thresholds: Thresholds {
            archive_after_days: ARCHIVE_THRESHOLD_DAYS,
            compress_after_days: COMPRESS_THRESHOLD_DAYS,
        },
    })
}

// ---------------------------------------------------------------------------
// Warm-tier reads
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveStats {
    pub count: i64,
    pub by_type: BTreeMap<String, i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest: Option<String>,
}

/// Browse the archive, newest first, with optional type and date-range bounds.
pub fn get_archived(
    db: &LedgerDb,
    activity_type: Option<ActivityType>,
    start_ts: Option<&str>,
    end_ts: Option<&str>,
    limit: Option<usize>,
) -> Result<Vec<DbArchivedActivity>, ServiceError> {
    Ok(db.list_archived(activity_type, start_ts, end_ts, limit.unwrap_or(100))?)
}

pub fn get_archive_stats(db: &LedgerDb) -> Result<ArchiveStats, ServiceError> {
    let all = db.all_archived()?;
    let mut by_type: BTreeMap<String, i64> = BTreeMap::new();
    let mut oldest: Option<String> = None;
    let mut newest: Option<String> = None;
    for a in &all {
        *by_type.entry(a.activity_type.as_str().to_string()).or_insert(0) += 1;
        if oldest.as_deref().map_or(true, |o| a.timestamp.as_str() < o) {
            oldest = Some(a.timestamp.clone());
        }
        if newest.as_deref().map_or(true, |n| a.timestamp.as_str() > n) {
            newest = Some(a.timestamp.clone());
        }
    }
    Ok(ArchiveStats {
        count: all.len() as i64,
        by_type,
        oldest,
        newest,
    })
}

// ---------------------------------------------------------------------------
// Cold-tier reads
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    pub total_days: usize,
    pub total_tasks: i64,
    pub total_commits: i64,
    pub avg_tasks_per_day: f64,
    pub compressed_days: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
}

pub fn get_summary_by_date(
    db: &LedgerDb,
    date: &str,
) -> Result<Option<DbDailySummary>, ServiceError> {
    crate::util::validate_yyyy_mm_dd(date, "date")?;
    Ok(db.get_summary(date)?)
}

/// The most recent `days` summaries, newest first.
pub fn get_recent_summaries(
    db: &LedgerDb,
    days: Option<usize>,
) -> Result<Vec<DbDailySummary>, ServiceError> {
    Ok(db.recent_summaries(days.unwrap_or(30))?)
}

pub fn get_summary_range(
    db: &LedgerDb,
    start_date: &str,
    end_date: &str,
) -> Result<Vec<DbDailySummary>, ServiceError> {
    crate::util::validate_yyyy_mm_dd(start_date, "startDate")?;
    crate::util::validate_yyyy_mm_dd(end_date, "endDate")?;
    Ok(db.summaries_in_range(start_date, end_date)?)
}

pub fn get_summary_stats(db: &LedgerDb) -> Result<SummaryStats, ServiceError> {
    let all = db.all_summaries()?;
    let total_days = all.len();
    let total_tasks: i64 = all.iter().map(|s| s.tasks_completed).sum();
    let total_commits: i64 = all.iter().map(|s| s.commits_count).sum();
    let avg_tasks_per_day = if total_days == 0 {
        0.0
    } else {
        (total_tasks as f64 / total_days as f64 * 10.0).round() / 10.0
    };
    let compressed_days = all.iter().filter(|s| s.compressed_at.is_some()).count();
    let date_range = match (all.first(), all.last()) {
        (Some(first), Some(last)) => Some(DateRange {
            from: first.date.clone(),
            to: last.date.clone(),
        }),
        _ => None,
    };
    Ok(SummaryStats {
        total_days,
        total_tasks,
        total_commits,
        avg_tasks_per_day,
        compressed_days,
        date_range,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_utils::test_db;
    use crate::db::DbActivity;
    use crate::types::ActivityStatus;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, 0).unwrap()
    }

    fn seed_activity(db: &LedgerDb, id: &str, age_days: i64, activity_type: ActivityType) {
        db.insert_activity(&DbActivity {
            id: id.to_string(),
            timestamp: ts_at(fixed_now() - Duration::days(age_days)),
            activity_type,
            title: format!("activity {id}"),
            description: "desc".to_string(),
            status: ActivityStatus::AutoDone,
            source: Some("agent".to_string()),
            metadata: None,
        })
        .unwrap();
    }

    fn seed_archived(db: &LedgerDb, id: &str, age_days: i64, activity_type: ActivityType) {
        db.insert_archived(&DbArchivedActivity {
            id: id.to_string(),
            timestamp: ts_at(fixed_now() - Duration::days(age_days)),
            activity_type,
            title: format!("archived {id}"),
            description: "desc".to_string(),
            status: ActivityStatus::AutoDone,
            source: Some("agent".to_string()),
            metadata: None,
            archived_at: ts_at(fixed_now() - Duration::days(age_days - 1)),
            original_id: None,
        })
        .unwrap();
    }

    #[test]
    fn archive_moves_old_rows_only() {
        let db = test_db();
        seed_activity(&db, "old", 8, ActivityType::Task);
        seed_activity(&db, "fresh", 2, ActivityType::Task);

        let outcome = archive_at(&db, fixed_now(), false).unwrap();
        match outcome {
            ArchiveOutcome::Applied { archived, .. } => assert_eq!(archived, 1),
            other => panic!("expected applied outcome, got {other:?}"),
        }

        assert!(db.get_activity("old").unwrap().is_none());
        assert!(db.get_activity("fresh").unwrap().is_some());

        let archived = db.all_archived().unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].original_id.as_deref(), Some("old"));
    }

    #[test]
    fn archive_dry_run_mutates_nothing() {
        let db = test_db();
        seed_activity(&db, "old", 10, ActivityType::Commit);

        let outcome = archive_at(&db, fixed_now(), true).unwrap();
        match outcome {
            ArchiveOutcome::DryRun {
                activities_to_archive,
                oldest_activity,
                ..
            } => {
                assert_eq!(activities_to_archive, 1);
                assert!(oldest_activity.is_some());
            }
            other => panic!("expected dry-run outcome, got {other:?}"),
        }
        assert!(db.get_activity("old").unwrap().is_some());
        assert_eq!(db.count_archived().unwrap(), 0);
    }

    #[test]
    fn compress_groups_by_date_and_is_idempotent() {
        let db = test_db();
        // Two rows on one old day, one on another.
        seed_archived(&db, "a1", 100, ActivityType::Task);
        seed_archived(&db, "a2", 100, ActivityType::Commit);
        seed_archived(&db, "b1", 95, ActivityType::Research);
        // Too recent to compress.
        seed_archived(&db, "recent", 30, ActivityType::Task);

        let outcome = compress_at(&db, fixed_now(), false).unwrap();
        match outcome {
            CompressOutcome::Applied {
                summaries_created,
                summaries_updated,
                activities_deleted,
                ..
            } => {
                assert_eq!(summaries_created, 2);
                assert_eq!(summaries_updated, 0);
                assert_eq!(activities_deleted, 3);
            }
            other => panic!("expected applied outcome, got {other:?}"),
        }
        assert_eq!(db.count_archived().unwrap(), 1);

        let day = day_key(&ts_at(fixed_now() - Duration::days(100))).to_string();
        let summary = db.get_summary(&day).unwrap().unwrap();
        assert_eq!(summary.tasks_completed, 1);
        assert_eq!(summary.commits_count, 1);
        assert_eq!(summary.activities_compressed, Some(2));
        assert_eq!(summary.highlights.as_ref().unwrap().len(), 2);

        // Second run finds nothing to do and leaves the summary untouched.
        let before = db.get_summary(&day).unwrap().unwrap();
        compress_at(&db, fixed_now(), false).unwrap();
        let after = db.get_summary(&day).unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn compress_dry_run_reports_range() {
        let db = test_db();
        seed_archived(&db, "a1", 120, ActivityType::Task);
        seed_archived(&db, "b1", 95, ActivityType::Task);

        let outcome = compress_at(&db, fixed_now(), true).unwrap();
        match outcome {
            CompressOutcome::DryRun {
                activities_to_compress,
                days_to_summarize,
                date_range,
                ..
            } => {
                assert_eq!(activities_to_compress, 2);
                assert_eq!(days_to_summarize, 2);
                let range = date_range.unwrap();
                assert!(range.from < range.to);
            }
            other => panic!("expected dry-run outcome, got {other:?}"),
        }
        assert_eq!(db.count_archived().unwrap(), 2);
    }

    #[test]
    fn cleanup_only_deletes_summarized_dates() {
        let db = test_db();
        seed_archived(&db, "summarized", 100, ActivityType::Task);
        seed_archived(&db, "orphan", 95, ActivityType::Task);

        let summarized_day = day_key(&ts_at(fixed_now() - Duration::days(100))).to_string();
        db.upsert_summary(&DbDailySummary {
            date: summarized_day,
            tasks_completed: 1,
            commits_count: 0,
            research_count: 0,
            notifications_count: 0,
            approval_requests_count: 0,
            approvals_processed: 0,
            approvals_approved: 0,
            approvals_rejected: 0,
            source_breakdown: None,
            summary: "1 activities: 1 tasks, 0 commits, 0 research, 0 notifications".to_string(),
            highlights: None,
            compressed_at: Some(ts_at(fixed_now())),
            activities_compressed: Some(1),
        })
        .unwrap();

        let outcome = cleanup_at(&db, fixed_now(), false).unwrap();
        match outcome {
            CleanupOutcome::Applied { deleted, .. } => assert_eq!(deleted, 1),
            other => panic!("expected applied outcome, got {other:?}"),
        }

        let remaining = db.all_archived().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "orphan");
    }

    #[test]
    fn cleanup_dry_run_mutates_nothing() {
        let db = test_db();
        seed_archived(&db, "summarized", 100, ActivityType::Task);
        seed_archived(&db, "orphan", 95, ActivityType::Task);

        let summarized_day = day_key(&ts_at(fixed_now() - Duration::days(100))).to_string();
        db.upsert_summary(&DbDailySummary {
            date: summarized_day,
            tasks_completed: 1,
            commits_count: 0,
            research_count: 0,
            notifications_count: 0,
            approval_requests_count: 0,
            approvals_processed: 0,
            approvals_approved: 0,
            approvals_rejected: 0,
            source_breakdown: None,
            summary: "1 activities: 1 tasks, 0 commits, 0 research, 0 notifications".to_string(),
            highlights: None,
            compressed_at: Some(ts_at(fixed_now())),
            activities_compressed: Some(1),
        })
        .unwrap();

        let outcome = cleanup_at(&db, fixed_now(), true).unwrap();
        match outcome {
            CleanupOutcome::DryRun {
                activities_to_delete,
                total_old_archived,
                summarized_dates,
            } => {
                assert_eq!(activities_to_delete, 1);
                assert_eq!(total_old_archived, 2);
                assert_eq!(summarized_dates, 1);
            }
            other => panic!("expected dry-run outcome, got {other:?}"),
        }
        assert_eq!(db.count_archived().unwrap(), 2);
    }

    #[test]
    fn summary_line_counts_completed_tasks_only() {
        let db = test_db();
        seed_archived(&db, "done", 100, ActivityType::Task);
        db.insert_archived(&DbArchivedActivity {
            id: "undone".to_string(),
            timestamp: ts_at(fixed_now() - Duration::days(100)),
            activity_type: ActivityType::Task,
            title: "archived undone".to_string(),
            description: "desc".to_string(),
            status: ActivityStatus::Notified,
            source: Some("agent".to_string()),
            metadata: None,
            archived_at: ts_at(fixed_now() - Duration::days(99)),
            original_id: None,
        })
        .unwrap();

        compress_at(&db, fixed_now(), false).unwrap();

        let day = day_key(&ts_at(fixed_now() - Duration::days(100))).to_string();
        let summary = db.get_summary(&day).unwrap().unwrap();
        assert_eq!(summary.tasks_completed, 1);
        assert_eq!(
            summary.summary,
            "2 activities: 1 tasks, 0 commits, 0 research, 0 notifications"
        );
    }

    #[test]
    fn tier_info_counts_all_tiers() {
        let db = test_db();
        seed_activity(&db, "hot-old", 8, ActivityType::Task);
        seed_activity(&db, "hot-new", 1, ActivityType::Task);
        seed_archived(&db, "warm-old", 100, ActivityType::Task);
        seed_archived(&db, "warm-new", 30, ActivityType::Task);

        let info = tier_info_at(&db, fixed_now()).unwrap();
        assert_eq!(info.hot.count, 2);
        assert_eq!(info.hot.ready_to_archive, Some(1));
        assert_eq!(info.warm.count, 2);
        assert_eq!(info.warm.ready_to_compress, Some(1));
        assert_eq!(info.cold.count, 0);
        assert_eq!(info.thresholds.archive_after_days, 7);
        assert_eq!(info.thresholds.compress_after_days, 90);
    }

    #[test]
    fn archive_stats_histogram() {
        let db = test_db();
        seed_archived(&db, "a", 10, ActivityType::Task);
        seed_archived(&db, "b", 20, ActivityType::Task);
        seed_archived(&db, "c", 30, ActivityType::Commit);

        let stats = get_archive_stats(&db).unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.by_type.get("task"), Some(&2));
        assert_eq!(stats.by_type.get("commit"), Some(&1));
        assert!(stats.oldest.unwrap() < stats.newest.unwrap());
    }

    #[test]
    fn summary_stats_average_rounds_to_tenths() {
        let db = test_db();
        for (date, tasks) in [("2026-01-01", 3), ("2026-01-02", 4)] {
            db.upsert_summary(&DbDailySummary {
                date: date.to_string(),
                tasks_completed: tasks,
                commits_count: 2,
                research_count: 0,
                notifications_count: 0,
                approval_requests_count: 0,
                approvals_processed: 0,
                approvals_approved: 0,
                approvals_rejected: 0,
                source_breakdown: None,
                summary: String::new(),
                highlights: None,
                compressed_at: Some(ts_at(fixed_now())),
                activities_compressed: Some(tasks),
            })
            .unwrap();
        }
        let stats = get_summary_stats(&db).unwrap();
        assert_eq!(stats.total_days, 2);
        assert_eq!(stats.total_tasks, 7);
        assert_eq!(stats.total_commits, 4);
        assert!((stats.avg_tasks_per_day - 3.5).abs() < f64::EPSILON);
        let range = stats.date_range.unwrap();
        assert_eq!(range.from, "2026-01-01");
        assert_eq!(range.to, "2026-01-02");
    }

    #[test]
    fn eight_day_lifecycle_end_to_end() {
        let db = test_db();
        // Day 0: activity recorded. Day 8: archive moves it. Day 91 past its
        // timestamp: compress folds it into a summary.
        seed_activity(&db, "lifecycle", 0, ActivityType::Task);

        let at_day_8 = fixed_now() + Duration::days(8);
        match archive_at(&db, at_day_8, false).unwrap() {
            ArchiveOutcome::Applied { archived, .. } => assert_eq!(archived, 1),
            other => panic!("expected applied outcome, got {other:?}"),
        }
        assert!(db.get_activity("lifecycle").unwrap().is_none());

        let at_day_91 = fixed_now() + Duration::days(91);
        match compress_at(&db, at_day_91, false).unwrap() {
            CompressOutcome::Applied {
                summaries_created,
                activities_deleted,
                ..
            } => {
                assert_eq!(summaries_created, 1);
                assert_eq!(activities_deleted, 1);
            }
            other => panic!("expected applied outcome, got {other:?}"),
        }
        assert_eq!(db.count_archived().unwrap(), 0);

        let day = day_key(&ts_at(fixed_now())).to_string();
        let summary = db.get_summary(&day).unwrap().unwrap();
        assert_eq!(summary.tasks_completed, 1);
    }
}
