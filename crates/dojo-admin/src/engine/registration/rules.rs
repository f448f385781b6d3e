use chrono::{DateTime, Utc};

use super::super::domain::{RankLadder, ScheduledEvent};
use super::super::eligibility::clock;
use super::{RegistrationContext, RegistrationSubject, RegistrationViolation};

/// Run every business constraint and collect each violation. The checks are
/// independent on purpose: downstream admin tooling needs the full picture,
/// so no check may short-circuit another.
pub(crate) fn collect_violations(
    event: &ScheduledEvent,
    subject: &RegistrationSubject,
    context: &RegistrationContext,
    ladder: &RankLadder,
    now: DateTime<Utc>,
) -> Vec<RegistrationViolation> {
    let mut violations = Vec::new();

    if context.already_registered {
        violations.push(RegistrationViolation::AlreadyRegistered);
    }

    if !event.status.registration_open() {
        violations.push(RegistrationViolation::RegistrationNotOpen);
    }

    if let Some(deadline) = event.registration_deadline {
        if deadline < now {
            violations.push(RegistrationViolation::DeadlinePassed);
        }
    }

    if let Some(capacity) = event.max_participants {
        if context.confirmed_count >= capacity {
            violations.push(RegistrationViolation::Full);
        }
    }

    let age = clock::age_years(subject.birth_date, now.date_naive());
    if let Some(min_age) = event.min_age {
        if age < i32::from(min_age) {
            violations.push(RegistrationViolation::TooYoung);
        }
    }
    if let Some(max_age) = event.max_age {
        if age > i32::from(max_age) {
            violations.push(RegistrationViolation::TooOld);
        }
    }

    let ordinal = ladder.ordinal_or_lowest(subject.rank.as_deref());
    if let Some(min_rank) = &event.min_rank {
        if ordinal < ladder.ordinal(min_rank) {
            violations.push(RegistrationViolation::RankTooLow);
        }
    }
    if let Some(max_rank) = &event.max_rank {
        if ordinal > ladder.ordinal(max_rank) {
            violations.push(RegistrationViolation::RankTooHigh);
        }
    }

    violations
}
