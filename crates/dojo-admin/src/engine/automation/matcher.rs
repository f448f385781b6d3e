use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};

use super::super::domain::{ProgramId, RankLadder};
use super::super::eligibility::clock;
use super::domain::{AutomationRule, DomainEvent, RuleConditions};

/// Subject attributes consulted by rule conditions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectAttributes {
    pub birth_date: NaiveDate,
    pub rank: Option<String>,
    pub attendance_count: u32,
}

/// Filter candidate rules down to those that fire for this event. Pure over
/// an already-fetched snapshot so it can run on any thread and be tested
/// without a store.
pub(crate) fn matching_rules(
    candidates: Vec<AutomationRule>,
    event: &DomainEvent,
    subject: &SubjectAttributes,
    programs: &BTreeSet<ProgramId>,
    ladder: &RankLadder,
    now: DateTime<Utc>,
) -> Vec<AutomationRule> {
    candidates
        .into_iter()
        .filter(|rule| rule.active && rule.event_kind == event.kind)
        .filter(|rule| rule.in_window(now))
        .filter(|rule| {
            // Empty scope is an explicit "applies to everyone" policy.
            rule.applicable_programs.is_empty()
                || !rule.applicable_programs.is_disjoint(programs)
        })
        .filter(|rule| conditions_met(&rule.conditions, subject, ladder, now.date_naive()))
        .collect()
}

/// Only conditions present in the rule are checked; absent fields impose no
/// constraint.
fn conditions_met(
    conditions: &RuleConditions,
    subject: &SubjectAttributes,
    ladder: &RankLadder,
    today: NaiveDate,
) -> bool {
    let age = clock::age_years(subject.birth_date, today);
    if let Some(min_age) = conditions.min_age {
        if age < i32::from(min_age) {
            return false;
        }
    }
    if let Some(max_age) = conditions.max_age {
        if age > i32::from(max_age) {
            return false;
        }
    }
    if let Some(min_rank) = &conditions.min_rank {
        if ladder.ordinal_or_lowest(subject.rank.as_deref()) < ladder.ordinal(min_rank) {
            return false;
        }
    }
    if let Some(min_attendance) = conditions.min_attendance {
        if subject.attendance_count < min_attendance {
            return false;
        }
    }
    true
}
