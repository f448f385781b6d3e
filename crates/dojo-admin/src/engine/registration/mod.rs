mod priority;
mod rules;

pub use priority::primary_violation;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{RankLadder, ScheduledEvent};

/// Closed set of registration constraint violations. `EventNotFound` and
/// `SubjectNotFound` are structural and short-circuit the business checks;
/// all other members are independent and evaluated in full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationViolation {
    EventNotFound,
    SubjectNotFound,
    AlreadyRegistered,
    RegistrationNotOpen,
    DeadlinePassed,
    Full,
    TooYoung,
    TooOld,
    RankTooLow,
    RankTooHigh,
}

/// Subject snapshot consulted by the registration checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationSubject {
    pub birth_date: NaiveDate,
    pub rank: Option<String>,
}

/// Live registration state for one (event, subject) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegistrationContext {
    pub already_registered: bool,
    pub confirmed_count: u32,
}

/// Outcome of a registration eligibility check: the complete violation set
/// plus the single highest-priority reason for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrationAssessment {
    pub eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_reason: Option<RegistrationViolation>,
    pub violations: Vec<RegistrationViolation>,
}

impl RegistrationAssessment {
    pub(crate) fn from_violations(violations: Vec<RegistrationViolation>) -> Self {
        Self {
            eligible: violations.is_empty(),
            primary_reason: primary_violation(&violations),
            violations,
        }
    }
}

/// Evaluates every registration constraint for one (event, subject) pair,
/// returning the full violation set rather than the first failure.
#[derive(Debug, Clone)]
pub struct RegistrationEvaluator {
    ladder: RankLadder,
}

impl RegistrationEvaluator {
    pub fn new(ladder: RankLadder) -> Self {
        Self { ladder }
    }

    pub fn evaluate(
        &self,
        event: Option<&ScheduledEvent>,
        subject: Option<&RegistrationSubject>,
        context: &RegistrationContext,
        now: DateTime<Utc>,
    ) -> RegistrationAssessment {
        let Some(event) = event else {
            return RegistrationAssessment::from_violations(vec![
                RegistrationViolation::EventNotFound,
            ]);
        };
        let Some(subject) = subject else {
            return RegistrationAssessment::from_violations(vec![
                RegistrationViolation::SubjectNotFound,
            ]);
        };

        let violations = rules::collect_violations(event, subject, context, &self.ladder, now);
        RegistrationAssessment::from_violations(violations)
    }
}
