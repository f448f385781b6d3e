use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for students and adult participants.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubjectId(pub String);

/// Identifier wrapper for training programs owned by enrollment management.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProgramId(pub String);

/// Identifier wrapper for payments owned by billing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentId(pub String);

/// Identifier wrapper for scheduled events (tournaments, seminars, gradings).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduledEventId(pub String);

/// Billing plan kinds. Only `Monthly` and `Yearly` extend payment eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    Monthly,
    Yearly,
    Other,
}

impl PlanKind {
    /// Whether a payment on this plan participates in the eligibility window.
    pub const fn qualifies(self) -> bool {
        matches!(self, PlanKind::Monthly | PlanKind::Yearly)
    }
}

/// Read-only payment snapshot served by the billing collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub subject_id: SubjectId,
    pub occurred_at: NaiveDate,
    pub succeeded: bool,
    pub plan_kind: PlanKind,
}

/// Payment lifecycle states as reported by billing state-transition notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    Pending,
    Settled,
    Failed,
}

/// Subject attributes served by the member directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRecord {
    pub birth_date: NaiveDate,
    pub attendance_count: u32,
}

/// Ordered rank names. Comparisons go through ordinal positions, never
/// through string ordering; an unknown or missing rank maps to the lowest
/// ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankLadder {
    names: Vec<String>,
}

impl RankLadder {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn ordinal(&self, name: &str) -> usize {
        self.names
            .iter()
            .position(|candidate| candidate.eq_ignore_ascii_case(name))
            .unwrap_or(0)
    }

    pub fn ordinal_or_lowest(&self, name: Option<&str>) -> usize {
        name.map(|value| self.ordinal(value)).unwrap_or(0)
    }
}

impl Default for RankLadder {
    fn default() -> Self {
        Self::new(
            [
                "white", "yellow", "orange", "green", "blue", "purple", "brown", "red", "black",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
        )
    }
}

/// Lifecycle status of a scheduled event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduledEventStatus {
    Draft,
    Open,
    Closed,
    Cancelled,
    Completed,
}

impl ScheduledEventStatus {
    pub const fn registration_open(self) -> bool {
        matches!(self, ScheduledEventStatus::Open)
    }
}

/// Descriptor of a scheduled event as served by the event catalog. Absent
/// bounds impose no constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub id: ScheduledEventId,
    pub status: ScheduledEventStatus,
    pub registration_deadline: Option<DateTime<Utc>>,
    pub max_participants: Option<u32>,
    pub min_age: Option<u8>,
    pub max_age: Option<u8>,
    pub min_rank: Option<String>,
    pub max_rank: Option<String>,
}
