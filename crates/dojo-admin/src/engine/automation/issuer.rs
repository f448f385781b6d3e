use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::super::repository::{AssignmentInsert, AutomationStore, StoreError};
use super::domain::{
    AssignmentId, AutomationRule, CodeId, DiscountAssignment, DiscountCode, DiscountNotice,
    DiscountTemplate, DomainEvent,
};

/// Per-rule outcome of an issuance attempt. Ceiling hits and lost races are
/// normal results, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum IssuanceResult {
    Issued {
        code_id: CodeId,
        assignment_id: AssignmentId,
    },
    CeilingReached,
    AlreadyIssued,
}

/// Materialize a code for one matched rule and record the assignment.
///
/// The assignment insert carries the at-most-once guarantee: when a
/// concurrent invocation already recorded `(rule, event, subject)`, the
/// half-created code is deleted so no orphaned code survives, and the other
/// writer's outcome stands.
pub(crate) fn issue_for_rule<S>(
    store: &S,
    rule: &AutomationRule,
    template: &DiscountTemplate,
    event: &DomainEvent,
    now: DateTime<Utc>,
) -> Result<(IssuanceResult, Option<DiscountNotice>), StoreError>
where
    S: AutomationStore + ?Sized,
{
    if let Some(limit) = rule.max_uses_per_subject {
        if store.assignment_count(&rule.id, &event.subject_id)? >= limit {
            return Ok((IssuanceResult::CeilingReached, None));
        }
    }

    let valid_until = rule.valid_until.or_else(|| {
        template
            .default_validity_days
            .map(|days| now + Duration::days(days))
    });

    let code = DiscountCode {
        id: CodeId::generate(),
        template_id: template.id.clone(),
        kind: template.kind,
        value: template.value,
        scope: template.scope,
        usage_type: template.usage_type,
        current_uses: 0,
        max_uses: template.max_uses,
        owner_subject_id: event.subject_id.clone(),
        valid_from: now,
        valid_until,
    };
    store.insert_code(code.clone())?;

    let assignment = DiscountAssignment {
        id: AssignmentId::generate(),
        rule_id: rule.id.clone(),
        event_id: event.id,
        subject_id: event.subject_id.clone(),
        code_id: code.id,
        assigned_at: now,
        expires_at: valid_until,
        consumed_by: None,
    };

    match store.insert_assignment(assignment.clone())? {
        AssignmentInsert::Created => {
            let notice = DiscountNotice {
                subject_id: event.subject_id.clone(),
                rule_id: rule.id.clone(),
                template_id: template.id.clone(),
                code_id: code.id,
                kind: code.kind,
                value: code.value,
            };
            Ok((
                IssuanceResult::Issued {
                    code_id: code.id,
                    assignment_id: assignment.id,
                },
                Some(notice),
            ))
        }
        AssignmentInsert::AlreadyExists => {
            store.delete_code(&code.id)?;
            Ok((IssuanceResult::AlreadyIssued, None))
        }
    }
}
