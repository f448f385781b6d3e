use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::super::domain::{PaymentId, ProgramId, SubjectId};

/// Identifier of a recorded domain occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Administrator-chosen rule identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RuleId(pub String);

/// Administrator-chosen discount template identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateId(pub String);

/// Identifier of an issued discount code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeId(pub Uuid);

impl CodeId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Identifier of a rule-firing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssignmentId(pub Uuid);

impl AssignmentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Domain occurrences that may trigger automated discounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainEventKind {
    Enrollment,
    FirstPayment,
    RankPromotion,
    AttendanceMilestone,
    Referral,
    Birthday,
    SeasonalPromotion,
}

/// Append-only ledger entry. Only `processed_at` is ever written after
/// creation, exactly once, as the idempotency marker for the matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub id: EventId,
    pub kind: DomainEventKind,
    pub subject_id: SubjectId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    #[serde(default)]
    pub payload: serde_json::Map<String, serde_json::Value>,
    pub occurred_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

/// Closed set of typed rule predicates. Absent fields impose no constraint;
/// this is deliberately not an expression language.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RuleConditions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_age: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_rank: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_attendance: Option<u32>,
}

/// Administrator-authored automation rule; read-only to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomationRule {
    pub id: RuleId,
    pub event_kind: DomainEventKind,
    pub template_id: TemplateId,
    /// Empty set means the rule applies to everyone, not to no one.
    #[serde(default)]
    pub applicable_programs: BTreeSet<ProgramId>,
    #[serde(default)]
    pub conditions: RuleConditions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_uses_per_subject: Option<u32>,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
}

impl AutomationRule {
    /// Open-ended bounds are treated as unbounded; both ends inclusive.
    pub fn in_window(&self, now: DateTime<Utc>) -> bool {
        self.valid_from.map_or(true, |from| now >= from)
            && self.valid_until.map_or(true, |until| now <= until)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    FixedAmount,
    Percentage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountScope {
    PerSubject,
    PerFamily,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountUsage {
    OneTime,
    Ongoing,
}

/// Discount configuration authored by an administrator; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountTemplate {
    pub id: TemplateId,
    pub kind: DiscountKind,
    pub value: u32,
    pub scope: DiscountScope,
    pub usage_type: DiscountUsage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_uses: Option<u32>,
    /// Fallback code lifetime when the issuing rule has no `valid_until`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_validity_days: Option<i64>,
}

/// A concrete, redeemable code materialized from a template. `current_uses`
/// moves only through the atomic redeem/restore store operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountCode {
    pub id: CodeId,
    pub template_id: TemplateId,
    pub kind: DiscountKind,
    pub value: u32,
    pub scope: DiscountScope,
    pub usage_type: DiscountUsage,
    pub current_uses: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_uses: Option<u32>,
    pub owner_subject_id: SubjectId,
    pub valid_from: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
}

/// Record of one rule firing for one event. Unique on
/// `(rule_id, event_id, subject_id)`; deleted outright on compensation so a
/// retry can issue cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountAssignment {
    pub id: AssignmentId,
    pub rule_id: RuleId,
    pub event_id: EventId,
    pub subject_id: SubjectId,
    pub code_id: CodeId,
    pub assigned_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Set by the redemption flow; keys compensation on payment failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumed_by: Option<PaymentId>,
}

/// Outbound "discount issued" notice handed to the delivery collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountNotice {
    pub subject_id: SubjectId,
    pub rule_id: RuleId,
    pub template_id: TemplateId,
    pub code_id: CodeId,
    pub kind: DiscountKind,
    pub value: u32,
}
