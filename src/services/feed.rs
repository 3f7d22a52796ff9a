//! Visual Event Feed: a read-only projection over activities and deal audit
//! entries, scored for render weight. Nothing here mutates the store.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::db::{DbActivity, DbDealActivity, LedgerDb};
use crate::error::ServiceError;
use crate::types::{
    ActivityStatus, ActivityType, DealActivityType, DealStage, Intensity, VisualEventType,
};
use crate::util::{parse_ts, ts_at};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: VisualEventType,
    pub timestamp: String,
    pub title: String,
    pub intensity: Intensity,
}

fn activity_intensity(activity_type: ActivityType, status: ActivityStatus) -> Intensity {
    match activity_type {
        ActivityType::Commit | ActivityType::ApprovalRequest => Intensity::High,
        ActivityType::Task => {
            if status == ActivityStatus::AutoDone {
                Intensity::Medium
            } else {
                Intensity::Low
            }
        }
        ActivityType::Research => Intensity::Medium,
        ActivityType::Notification => Intensity::Low,
    }
}

/// The stage a `stage_change` entry moved into, read from its metadata.
fn stage_change_target(entry: &DbDealActivity) -> Option<DealStage> {
    entry
        .metadata
        .as_ref()
        .and_then(|m| m.get("to"))
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
}

fn deal_intensity(entry: &DbDealActivity) -> Intensity {
    match entry.activity_type {
        DealActivityType::Meeting => Intensity::High,
        DealActivityType::Call | DealActivityType::Email => Intensity::Medium,
        DealActivityType::StageChange => match stage_change_target(entry) {
            Some(DealStage::Won) | Some(DealStage::Lost) => Intensity::High,
            _ => Intensity::Medium,
        },
        DealActivityType::Note => Intensity::Low,
    }
}

fn deal_event_type(entry: &DbDealActivity) -> VisualEventType {
    match entry.activity_type {
        DealActivityType::Email => VisualEventType::Email,
        DealActivityType::Meeting => VisualEventType::Meeting,
        DealActivityType::Call => VisualEventType::Call,
        DealActivityType::Note => VisualEventType::Note,
        DealActivityType::StageChange => match stage_change_target(entry) {
            Some(DealStage::Won) => VisualEventType::DealWon,
            Some(DealStage::Lost) => VisualEventType::DealLost,
            _ => VisualEventType::StageChange,
        },
    }
}

fn activity_event(a: DbActivity) -> VisualEvent {
    VisualEvent {
        id: a.id,
        event_type: a.activity_type.into(),
        timestamp: a.timestamp,
        title: a.title,
        intensity: activity_intensity(a.activity_type, a.status),
    }
}

fn deal_event(db: &LedgerDb, entry: DbDealActivity) -> Result<VisualEvent, ServiceError> {
    let title = match db.get_deal(&entry.deal_id)? {
        Some(deal) => format!("{}: {}", deal.company, entry.description),
        None => entry.description.clone(),
    };
    Ok(VisualEvent {
        intensity: deal_intensity(&entry),
        event_type: deal_event_type(&entry),
        id: entry.id,
        timestamp: entry.timestamp,
        title,
    })
}

/// Events newer than `since` from both sources, merged newest-first and
/// truncated to `limit` (default 50).
pub fn stream(
    db: &LedgerDb,
    since: DateTime<Utc>,
    limit: Option<usize>,
) -> Result<Vec<VisualEvent>, ServiceError> {
    let limit = limit.unwrap_or(50);
    let since_ts = ts_at(since);

    let mut events: Vec<VisualEvent> = db
        .activities_since(&since_ts, limit)?
        .into_iter()
        .map(activity_event)
        .collect();
    for entry in db.deal_activities_since(&since_ts, limit)? {
        events.push(deal_event(db, entry)?);
    }

    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    events.truncate(limit);
    Ok(events)
}

/// The latest events regardless of age, for initial load (default 10).
pub fn latest(db: &LedgerDb, limit: Option<usize>) -> Result<Vec<VisualEvent>, ServiceError> {
    let limit = limit.unwrap_or(10);

    let mut events: Vec<VisualEvent> = db
        .list_activities(None, Some(limit))?
        .into_iter()
        .map(activity_event)
        .collect();
    for entry in db.recent_deal_activities(limit)? {
        events.push(deal_event(db, entry)?);
    }

    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    events.truncate(limit);
    Ok(events)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedStatus {
    Live,
    Recent,
    Idle,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minutes_since_last_event: Option<i64>,
    pub events_last_hour: i64,
    pub events_last_day: i64,
    pub status: FeedStatus,
    pub server_time: String,
}

pub fn stats(db: &LedgerDb) -> Result<FeedStats, ServiceError> {
    stats_at(db, Utc::now())
}

/// Feed liveness: `live` under 5 minutes since the last event, `recent` under
/// an hour, otherwise `idle` (including an empty store).
pub fn stats_at(db: &LedgerDb, now: DateTime<Utc>) -> Result<FeedStats, ServiceError> {
    let latest_timestamp = match (db.latest_activity_ts()?, db.latest_deal_activity_ts()?) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    };

    let minutes_since_last_event = latest_timestamp
        .as_deref()
        .and_then(parse_ts)
        .map(|dt| (now - dt).num_minutes());

    let hour_ago = ts_at(now - Duration::hours(1));
    let day_ago = ts_at(now - Duration::days(1));
    let events_last_hour =
        db.count_activities_since(&hour_ago)? + db.count_deal_activities_since(&hour_ago)?;
    let events_last_day =
        db.count_activities_since(&day_ago)? + db.count_deal_activities_since(&day_ago)?;

    let status = match minutes_since_last_event {
        Some(m) if m < 5 => FeedStatus::Live,
        Some(m) if m < 60 => FeedStatus::Recent,
        _ => FeedStatus::Idle,
    };

    Ok(FeedStats {
        latest_timestamp,
        minutes_since_last_event,
        events_last_hour,
        events_last_day,
        status,
        server_time: ts_at(now),
    })
}
