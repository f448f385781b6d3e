//! Eligibility & automated discount rule engine.
//!
//! The read path (payment eligibility, registration constraints) is a set of
//! stateless evaluators over snapshots. The write path is an asynchronous
//! pipeline — event ledger, rule matcher, discount issuer, assignment ledger
//! — whose correctness rests on a storage-level uniqueness constraint and
//! atomic use counters rather than on application-side locking.

pub mod automation;
pub mod domain;
pub mod eligibility;
pub mod registration;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use automation::{
    AssignmentId, AutomationRule, CodeId, DiscountAssignment, DiscountCode, DiscountKind,
    DiscountNotice, DiscountScope, DiscountTemplate, DiscountUsage, DomainEvent, DomainEventKind,
    EventId, IssuanceResult, RuleConditions, RuleId, SubjectAttributes, TemplateId,
};
pub use domain::{
    PaymentId, PaymentRecord, PaymentState, PlanKind, ProgramId, RankLadder, ScheduledEvent,
    ScheduledEventId, ScheduledEventStatus, SubjectId, SubjectRecord,
};
pub use eligibility::{
    EligibilityReason, EligibilityStatus, EligibilityWindows, PaymentEligibilityEvaluator,
};
pub use registration::{
    primary_violation, RegistrationAssessment, RegistrationContext, RegistrationEvaluator,
    RegistrationSubject, RegistrationViolation,
};
pub use repository::{
    AssignmentInsert, AutomationStore, BillingHistory, CodeRedemption, EventCatalog,
    MemberDirectory, NoticeError, NoticePublisher, StoreError,
};
pub use router::engine_router;
pub use service::{
    EngineConfig, EngineError, ProcessOutcome, RedemptionOutcome, RevocationOutcome,
    RuleEngineService, RuleIssuance,
};
