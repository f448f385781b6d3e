//! Asynchronous discounting pipeline: ledger events are matched against
//! administrator-authored rules and turned into at-most-once discount
//! issuances.

pub mod domain;
pub(crate) mod issuer;
pub(crate) mod matcher;

pub use domain::{
    AssignmentId, AutomationRule, CodeId, DiscountAssignment, DiscountCode, DiscountKind,
    DiscountNotice, DiscountScope, DiscountTemplate, DiscountUsage, DomainEvent, DomainEventKind,
    EventId, RuleConditions, RuleId, TemplateId,
};
pub use issuer::IssuanceResult;
pub use matcher::SubjectAttributes;
