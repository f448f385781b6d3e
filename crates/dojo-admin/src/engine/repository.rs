use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::automation::domain::{
    AssignmentId, AutomationRule, CodeId, DiscountAssignment, DiscountCode, DiscountNotice,
    DiscountTemplate, DomainEvent, DomainEventKind, EventId, RuleId, TemplateId,
};
use super::domain::{
    PaymentId, PaymentRecord, ProgramId, ScheduledEvent, ScheduledEventId, SubjectId,
    SubjectRecord,
};

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result of an insert-or-conflict assignment write. `AlreadyExists` is an
/// expected outcome under concurrent processing, never a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentInsert {
    Created,
    AlreadyExists,
}

/// Result of an atomic code redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeRedemption {
    Redeemed,
    Exhausted,
}

/// Storage boundary for the event ledger, rules, templates, codes, and
/// assignments. The engine owns no storage engine of its own; it layers
/// invariants on top of whatever store implements this trait. Implementations
/// must enforce the `(rule, event, subject)` uniqueness inside
/// `insert_assignment` and perform the use-counter adjustments atomically —
/// these two contracts carry the whole subsystem's concurrency story.
pub trait AutomationStore: Send + Sync {
    fn append_event(&self, event: DomainEvent) -> Result<(), StoreError>;
    fn event(&self, id: &EventId) -> Result<Option<DomainEvent>, StoreError>;
    /// Stamp the completion marker. Returns `false` when the event was
    /// already stamped; calling twice is a no-op, not an error.
    fn mark_event_processed(&self, id: &EventId, at: DateTime<Utc>) -> Result<bool, StoreError>;

    fn insert_rule(&self, rule: AutomationRule) -> Result<(), StoreError>;
    /// Active rules for one event kind; window and condition filtering stay
    /// with the matcher.
    fn active_rules(&self, kind: DomainEventKind) -> Result<Vec<AutomationRule>, StoreError>;

    fn insert_template(&self, template: DiscountTemplate) -> Result<(), StoreError>;
    fn template(&self, id: &TemplateId) -> Result<Option<DiscountTemplate>, StoreError>;

    fn insert_code(&self, code: DiscountCode) -> Result<(), StoreError>;
    fn code(&self, id: &CodeId) -> Result<Option<DiscountCode>, StoreError>;
    /// Remove a half-created code after losing the assignment race.
    fn delete_code(&self, id: &CodeId) -> Result<(), StoreError>;
    /// Atomically increment `current_uses` (bounded by `max_uses`) and stamp
    /// the owning assignment with the consuming payment.
    fn redeem_code(&self, id: &CodeId, payment: &PaymentId) -> Result<CodeRedemption, StoreError>;
    /// Atomically decrement `current_uses`, never below zero.
    fn restore_code_use(&self, id: &CodeId) -> Result<(), StoreError>;

    /// Insert-or-conflict on the `(rule, event, subject)` key. The
    /// uniqueness check must happen inside the store, not before the call.
    fn insert_assignment(
        &self,
        assignment: DiscountAssignment,
    ) -> Result<AssignmentInsert, StoreError>;
    fn assignment_count(&self, rule: &RuleId, subject: &SubjectId) -> Result<u32, StoreError>;
    fn assignments_for_payment(
        &self,
        payment: &PaymentId,
    ) -> Result<Vec<DiscountAssignment>, StoreError>;
    fn delete_assignment(&self, id: &AssignmentId) -> Result<(), StoreError>;
}

/// Payment history lookup owned by billing.
pub trait BillingHistory: Send + Sync {
    /// Successful payments only, ordered most recent first.
    fn successful_payments(&self, subject: &SubjectId) -> Result<Vec<PaymentRecord>, StoreError>;
}

/// Member lookups owned by enrollment management.
pub trait MemberDirectory: Send + Sync {
    fn subject(&self, id: &SubjectId) -> Result<Option<SubjectRecord>, StoreError>;
    fn current_rank(&self, id: &SubjectId) -> Result<Option<String>, StoreError>;
    fn active_program_ids(&self, id: &SubjectId) -> Result<BTreeSet<ProgramId>, StoreError>;
    fn program_active(&self, id: &ProgramId) -> Result<bool, StoreError>;
}

/// Scheduled-event lookups owned by event management.
pub trait EventCatalog: Send + Sync {
    fn scheduled_event(&self, id: &ScheduledEventId)
        -> Result<Option<ScheduledEvent>, StoreError>;
    fn confirmed_count(&self, id: &ScheduledEventId) -> Result<u32, StoreError>;
    fn is_registered(
        &self,
        event: &ScheduledEventId,
        subject: &SubjectId,
    ) -> Result<bool, StoreError>;
}

/// Notice dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NoticeError {
    #[error("notice transport unavailable: {0}")]
    Transport(String),
}

/// Outbound notification hook. Delivery failures never roll back issuance.
pub trait NoticePublisher: Send + Sync {
    fn publish(&self, notice: DiscountNotice) -> Result<(), NoticeError>;
}
