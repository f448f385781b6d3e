use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::automation::domain::{
    AutomationRule, CodeId, DomainEvent, DomainEventKind, EventId, RuleId,
};
use super::automation::issuer::{self, IssuanceResult};
use super::automation::matcher::{self, SubjectAttributes};
use super::domain::{PaymentId, PaymentState, RankLadder, ScheduledEventId, SubjectId};
use super::eligibility::{EligibilityStatus, EligibilityWindows, PaymentEligibilityEvaluator};
use super::registration::{
    RegistrationAssessment, RegistrationContext, RegistrationEvaluator, RegistrationSubject,
    RegistrationViolation,
};
use super::repository::{
    AutomationStore, BillingHistory, CodeRedemption, EventCatalog, MemberDirectory,
    NoticePublisher, StoreError,
};

/// Engine-wide configuration: plan validity windows and the rank ladder.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub windows: EligibilityWindows,
    pub ladder: RankLadder,
}

/// Error raised by the engine facade. Business ineligibility is never an
/// error; it travels through the typed assessment/outcome results.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid rule configuration: {0}")]
    InvalidConfiguration(String),
}

impl EngineError {
    fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

/// Outcome of processing one ledger event against all matching rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessOutcome {
    pub event_id: EventId,
    pub already_processed: bool,
    pub issuances: Vec<RuleIssuance>,
}

impl ProcessOutcome {
    fn already(event_id: EventId) -> Self {
        Self {
            event_id,
            already_processed: true,
            issuances: Vec::new(),
        }
    }
}

/// One rule's issuance result within a `ProcessOutcome`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleIssuance {
    pub rule_id: RuleId,
    #[serde(flatten)]
    pub result: IssuanceResult,
}

/// Outcome of reporting a code consumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum RedemptionOutcome {
    Redeemed,
    Exhausted,
}

/// Outcome of a compensation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum RevocationOutcome {
    /// The reported transition was not `Pending -> Failed`; nothing fires.
    NotApplicable,
    Revoked { count: u32 },
}

/// Facade composing the read-path evaluators with the discounting pipeline.
/// Generic over the storage boundary and the external collaborators so every
/// piece can be exercised in isolation.
pub struct RuleEngineService<S, B, M, C, N> {
    store: Arc<S>,
    billing: Arc<B>,
    members: Arc<M>,
    catalog: Arc<C>,
    notices: Arc<N>,
    eligibility: PaymentEligibilityEvaluator,
    registration: RegistrationEvaluator,
    ladder: RankLadder,
}

impl<S, B, M, C, N> RuleEngineService<S, B, M, C, N>
where
    S: AutomationStore + 'static,
    B: BillingHistory + 'static,
    M: MemberDirectory + 'static,
    C: EventCatalog + 'static,
    N: NoticePublisher + 'static,
{
    pub fn new(
        store: Arc<S>,
        billing: Arc<B>,
        members: Arc<M>,
        catalog: Arc<C>,
        notices: Arc<N>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            billing,
            members,
            catalog,
            notices,
            eligibility: PaymentEligibilityEvaluator::new(config.windows),
            registration: RegistrationEvaluator::new(config.ladder.clone()),
            ladder: config.ladder,
        }
    }

    /// Derive the trial/active/expired status for one subject. Pure over the
    /// billing snapshot and the injected `today`.
    pub fn evaluate_payment_eligibility(
        &self,
        subject_id: &SubjectId,
        today: NaiveDate,
    ) -> Result<EligibilityStatus, EngineError> {
        if self.members.subject(subject_id)?.is_none() {
            return Err(EngineError::not_found("subject", subject_id.0.clone()));
        }
        let history = self.billing.successful_payments(subject_id)?;
        Ok(self.eligibility.evaluate(&history, today))
    }

    /// Full-set registration check for one (event, subject) pair. A missing
    /// event or subject is a structural failure surfaced as `NotFound`, not
    /// an assessment.
    pub fn evaluate_registration_eligibility(
        &self,
        event_id: &ScheduledEventId,
        subject_id: &SubjectId,
        now: DateTime<Utc>,
    ) -> Result<RegistrationAssessment, EngineError> {
        let event = self.catalog.scheduled_event(event_id)?;
        let subject = match self.members.subject(subject_id)? {
            Some(record) => Some(RegistrationSubject {
                birth_date: record.birth_date,
                rank: self.members.current_rank(subject_id)?,
            }),
            None => None,
        };
        let context = if event.is_some() {
            RegistrationContext {
                already_registered: self.catalog.is_registered(event_id, subject_id)?,
                confirmed_count: self.catalog.confirmed_count(event_id)?,
            }
        } else {
            RegistrationContext::default()
        };

        let assessment =
            self.registration
                .evaluate(event.as_ref(), subject.as_ref(), &context, now);
        match assessment.primary_reason {
            Some(RegistrationViolation::EventNotFound) => {
                Err(EngineError::not_found("event", event_id.0.clone()))
            }
            Some(RegistrationViolation::SubjectNotFound) => {
                Err(EngineError::not_found("subject", subject_id.0.clone()))
            }
            _ => Ok(assessment),
        }
    }

    /// Append a domain occurrence to the ledger. Fire-and-forget trigger for
    /// the asynchronous discounting pipeline.
    pub fn record_domain_event(
        &self,
        kind: DomainEventKind,
        subject_id: SubjectId,
        context_id: Option<String>,
        payload: serde_json::Map<String, serde_json::Value>,
        occurred_at: DateTime<Utc>,
    ) -> Result<EventId, EngineError> {
        let event = DomainEvent {
            id: EventId::generate(),
            kind,
            subject_id,
            context_id,
            payload,
            occurred_at,
            processed_at: None,
        };
        let id = event.id;
        self.store.append_event(event)?;
        Ok(id)
    }

    /// Run one ledger event through matching and issuance. Idempotent: a
    /// re-delivery of an already-processed event is a no-op, and concurrent
    /// invocations collapse onto one assignment per rule through the store's
    /// uniqueness constraint.
    pub fn process_event(
        &self,
        event_id: &EventId,
        now: DateTime<Utc>,
    ) -> Result<ProcessOutcome, EngineError> {
        let event = self
            .store
            .event(event_id)?
            .ok_or_else(|| EngineError::not_found("event", event_id.0.to_string()))?;
        if event.processed_at.is_some() {
            return Ok(ProcessOutcome::already(event.id));
        }

        let record = self
            .members
            .subject(&event.subject_id)?
            .ok_or_else(|| EngineError::not_found("subject", event.subject_id.0.clone()))?;
        let attributes = SubjectAttributes {
            birth_date: record.birth_date,
            rank: self.members.current_rank(&event.subject_id)?,
            attendance_count: record.attendance_count,
        };
        let programs = self.members.active_program_ids(&event.subject_id)?;

        let candidates = self.store.active_rules(event.kind)?;
        let matched =
            matcher::matching_rules(candidates, &event, &attributes, &programs, &self.ladder, now);

        let mut issuances = Vec::with_capacity(matched.len());
        for rule in &matched {
            let template = self
                .store
                .template(&rule.template_id)?
                .ok_or_else(|| EngineError::not_found("template", rule.template_id.0.clone()))?;
            let (result, notice) =
                issuer::issue_for_rule(self.store.as_ref(), rule, &template, &event, now)?;
            if let Some(notice) = notice {
                // Delivery failures must not roll back the issuance.
                if let Err(err) = self.notices.publish(notice) {
                    warn!(rule = %rule.id.0, error = %err, "discount notice delivery failed");
                }
            }
            issuances.push(RuleIssuance {
                rule_id: rule.id.clone(),
                result,
            });
        }

        self.store.mark_event_processed(event_id, now)?;
        info!(event = %event.id.0, rules = matched.len(), "domain event processed");

        Ok(ProcessOutcome {
            event_id: event.id,
            already_processed: false,
            issuances,
        })
    }

    /// Report that billing consumed a code for a payment.
    pub fn record_redemption(
        &self,
        code_id: &CodeId,
        payment_id: &PaymentId,
    ) -> Result<RedemptionOutcome, EngineError> {
        match self.store.redeem_code(code_id, payment_id) {
            Ok(CodeRedemption::Redeemed) => Ok(RedemptionOutcome::Redeemed),
            Ok(CodeRedemption::Exhausted) => Ok(RedemptionOutcome::Exhausted),
            Err(StoreError::NotFound) => {
                Err(EngineError::not_found("discount code", code_id.0.to_string()))
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Compensation entry point for payment state transitions. Fires only on
    /// `Pending -> Failed`; every other transition is reported back as
    /// `NotApplicable` so repeated failure notifications cannot restore a
    /// use twice.
    pub fn revoke_assignments_for_payment(
        &self,
        payment_id: &PaymentId,
        previous: PaymentState,
        next: PaymentState,
    ) -> Result<RevocationOutcome, EngineError> {
        if !(previous == PaymentState::Pending && next == PaymentState::Failed) {
            return Ok(RevocationOutcome::NotApplicable);
        }

        let assignments = self.store.assignments_for_payment(payment_id)?;
        let mut count = 0u32;
        for assignment in assignments {
            self.store.restore_code_use(&assignment.code_id)?;
            self.store.delete_assignment(&assignment.id)?;
            count += 1;
        }
        if count > 0 {
            info!(payment = %payment_id.0, count, "revoked discount assignments");
        }
        Ok(RevocationOutcome::Revoked { count })
    }

    /// Admin path: persist a rule after validating its references, so the
    /// hot path never has to handle a rule pointing at a missing template or
    /// an inactive program.
    pub fn register_rule(&self, rule: AutomationRule) -> Result<(), EngineError> {
        if self.store.template(&rule.template_id)?.is_none() {
            return Err(EngineError::InvalidConfiguration(format!(
                "rule '{}' references unknown template '{}'",
                rule.id.0, rule.template_id.0
            )));
        }
        for program in &rule.applicable_programs {
            if !self.members.program_active(program)? {
                return Err(EngineError::InvalidConfiguration(format!(
                    "rule '{}' references inactive program '{}'",
                    rule.id.0, program.0
                )));
            }
        }
        self.store.insert_rule(rule)?;
        Ok(())
    }
}
