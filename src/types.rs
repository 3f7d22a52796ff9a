//! Domain enums shared across the db and service layers.
//!
//! Every enum round-trips through its wire literal (the snake_case string the
//! original dashboard API uses) for serde, SQL storage, and CLI parsing.
//! Parsing an unknown literal is a validation error, surfaced before any
//! mutation.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Generate `as_str`/`FromStr`/`Display` plus rusqlite codecs for a unit enum
/// whose variants map 1:1 onto fixed string literals.
macro_rules! str_enum {
    ($name:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl FromStr for $name {
            type Err = ServiceError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(ServiceError::Validation(format!(
                        concat!("unknown ", $label, ": {}"),
                        other
                    ))),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(self.as_str().into())
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse()
                    .map_err(|e: ServiceError| FromSqlError::Other(Box::new(e)))
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Activity ledger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Task,
    Commit,
    Research,
    Notification,
    ApprovalRequest,
}

str_enum!(ActivityType, "activity type", {
    Task => "task",
    Commit => "commit",
    Research => "research",
    Notification => "notification",
    ApprovalRequest => "approval_request",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    AutoDone,
    Notified,
    PendingApproval,
    Approved,
    Rejected,
}

str_enum!(ActivityStatus, "activity status", {
    AutoDone => "auto_done",
    Notified => "notified",
    PendingApproval => "pending_approval",
    Approved => "approved",
    Rejected => "rejected",
});

impl ActivityStatus {
    /// Terminal statuses never transition out; see
    /// `services::activities::update_status` for the full graph.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActivityStatus::Approved | ActivityStatus::Rejected)
    }
}

// ---------------------------------------------------------------------------
// Approvals
// ---------------------------------------------------------------------------

/// What kind of agent output is awaiting review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalKind {
    Email,
    Lead,
    Meeting,
    Task,
    Other,
}

str_enum!(ApprovalKind, "approval kind", {
    Email => "email",
    Lead => "lead",
    Meeting => "meeting",
    Task => "task",
    Other => "other",
});

/// Tri-state approval outcome. `Pending` is an explicit value, never the
/// absence of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Pending,
    Approved,
    Rejected,
}

str_enum!(Resolution, "resolution", {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

impl Resolution {
    /// The activity status a resolved approval propagates to its linked
    /// activity. `Pending` has no counterpart (pending approvals leave the
    /// activity at `pending_approval`).
    pub fn as_activity_status(&self) -> Option<ActivityStatus> {
        match self {
            Resolution::Pending => None,
            Resolution::Approved => Some(ActivityStatus::Approved),
            Resolution::Rejected => Some(ActivityStatus::Rejected),
        }
    }
}

// ---------------------------------------------------------------------------
// Deals
// ---------------------------------------------------------------------------

/// Pipeline stages in board order. Derived `Ord` follows declaration order,
/// which is the order the kanban board renders columns.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DealStage {
    Lead,
    ContactMade,
    MeetingBooked,
    MeetingDone,
    ProposalSent,
    Negotiating,
    Won,
    Lost,
    OnHold,
}

str_enum!(DealStage, "deal stage", {
    Lead => "lead",
    ContactMade => "contact_made",
    MeetingBooked => "meeting_booked",
    MeetingDone => "meeting_done",
    ProposalSent => "proposal_sent",
    Negotiating => "negotiating",
    Won => "won",
    Lost => "lost",
    OnHold => "on_hold",
});

impl DealStage {
    pub const ORDER: [DealStage; 9] = [
        DealStage::Lead,
        DealStage::ContactMade,
        DealStage::MeetingBooked,
        DealStage::MeetingDone,
        DealStage::ProposalSent,
        DealStage::Negotiating,
        DealStage::Won,
        DealStage::Lost,
        DealStage::OnHold,
    ];

    /// Won/lost/on-hold deals are excluded from active pipeline value.
    pub fn is_active(&self) -> bool {
        !matches!(self, DealStage::Won | DealStage::Lost | DealStage::OnHold)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealSource {
    Referral,
    Inbound,
    Outbound,
    Tender,
    Event,
    Other,
}

str_enum!(DealSource, "deal source", {
    Referral => "referral",
    Inbound => "inbound",
    Outbound => "outbound",
    Tender => "tender",
    Event => "event",
    Other => "other",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealActivityType {
    Email,
    Meeting,
    Call,
    Note,
    StageChange,
}

str_enum!(DealActivityType, "deal activity type", {
    Email => "email",
    Meeting => "meeting",
    Call => "call",
    Note => "note",
    StageChange => "stage_change",
});

// ---------------------------------------------------------------------------
// Visual event feed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualEventType {
    Task,
    Commit,
    Research,
    Notification,
    ApprovalRequest,
    Email,
    Meeting,
    Call,
    Note,
    StageChange,
    DealWon,
    DealLost,
}

str_enum!(VisualEventType, "visual event type", {
    Task => "task",
    Commit => "commit",
    Research => "research",
    Notification => "notification",
    ApprovalRequest => "approval_request",
    Email => "email",
    Meeting => "meeting",
    Call => "call",
    Note => "note",
    StageChange => "stage_change",
    DealWon => "deal_won",
    DealLost => "deal_lost",
});

impl From<ActivityType> for VisualEventType {
    fn from(t: ActivityType) -> Self {
        match t {
            ActivityType::Task => VisualEventType::Task,
            ActivityType::Commit => VisualEventType::Commit,
            ActivityType::Research => VisualEventType::Research,
            ActivityType::Notification => VisualEventType::Notification,
            ActivityType::ApprovalRequest => VisualEventType::ApprovalRequest,
        }
    }
}

/// Render weight for a feed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Low,
    Medium,
    High,
}

str_enum!(Intensity, "intensity", {
    Low => "low",
    Medium => "medium",
    High => "high",
});

/// Which storage tier a search hit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Hot,
    Warm,
}

str_enum!(Tier, "tier", {
    Hot => "hot",
    Warm => "warm",
});
