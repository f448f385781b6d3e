use chrono::{DateTime, NaiveDate, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

use dojo_admin::engine::{
    AssignmentId, AssignmentInsert, AutomationRule, AutomationStore, BillingHistory, CodeId,
    CodeRedemption, DiscountAssignment, DiscountCode, DiscountNotice, DiscountTemplate,
    DomainEvent, DomainEventKind, EventCatalog, EventId, MemberDirectory, NoticeError,
    NoticePublisher, PaymentId, PaymentRecord, ProgramId, RuleId, ScheduledEvent,
    ScheduledEventId, StoreError, SubjectId, SubjectRecord, TemplateId,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Single-process storage backend. The uniqueness and atomicity contracts
/// that a database would enforce with constraints live behind one mutex here.
#[derive(Default)]
pub(crate) struct InMemoryAutomationStore {
    inner: Mutex<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    events: HashMap<EventId, DomainEvent>,
    rules: Vec<AutomationRule>,
    templates: HashMap<TemplateId, DiscountTemplate>,
    codes: HashMap<CodeId, DiscountCode>,
    assignments: HashMap<AssignmentId, DiscountAssignment>,
    assignment_keys: HashSet<(RuleId, EventId, SubjectId)>,
}

impl InMemoryAutomationStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        self.inner.lock().expect("store mutex poisoned")
    }

    pub(crate) fn seed_template(&self, template: DiscountTemplate) {
        self.lock().templates.insert(template.id.clone(), template);
    }

    pub(crate) fn seed_rule(&self, rule: AutomationRule) {
        self.lock().rules.push(rule);
    }

    pub(crate) fn code_snapshot(&self, id: &CodeId) -> Option<DiscountCode> {
        self.lock().codes.get(id).cloned()
    }
}

impl AutomationStore for InMemoryAutomationStore {
    fn append_event(&self, event: DomainEvent) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.events.contains_key(&event.id) {
            return Err(StoreError::Conflict);
        }
        inner.events.insert(event.id, event);
        Ok(())
    }

    fn event(&self, id: &EventId) -> Result<Option<DomainEvent>, StoreError> {
        Ok(self.lock().events.get(id).cloned())
    }

    fn mark_event_processed(&self, id: &EventId, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let event = inner.events.get_mut(id).ok_or(StoreError::NotFound)?;
        if event.processed_at.is_some() {
            return Ok(false);
        }
        event.processed_at = Some(at);
        Ok(true)
    }

    fn insert_rule(&self, rule: AutomationRule) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.rules.iter().any(|existing| existing.id == rule.id) {
            return Err(StoreError::Conflict);
        }
        inner.rules.push(rule);
        Ok(())
    }

    fn active_rules(&self, kind: DomainEventKind) -> Result<Vec<AutomationRule>, StoreError> {
        Ok(self
            .lock()
            .rules
            .iter()
            .filter(|rule| rule.active && rule.event_kind == kind)
            .cloned()
            .collect())
    }

    fn insert_template(&self, template: DiscountTemplate) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.templates.contains_key(&template.id) {
            return Err(StoreError::Conflict);
        }
        inner.templates.insert(template.id.clone(), template);
        Ok(())
    }

    fn template(&self, id: &TemplateId) -> Result<Option<DiscountTemplate>, StoreError> {
        Ok(self.lock().templates.get(id).cloned())
    }

    fn insert_code(&self, code: DiscountCode) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.codes.contains_key(&code.id) {
            return Err(StoreError::Conflict);
        }
        inner.codes.insert(code.id, code);
        Ok(())
    }

    fn code(&self, id: &CodeId) -> Result<Option<DiscountCode>, StoreError> {
        Ok(self.lock().codes.get(id).cloned())
    }

    fn delete_code(&self, id: &CodeId) -> Result<(), StoreError> {
        self.lock().codes.remove(id).ok_or(StoreError::NotFound)?;
        Ok(())
    }

    fn redeem_code(&self, id: &CodeId, payment: &PaymentId) -> Result<CodeRedemption, StoreError> {
        let mut inner = self.lock();
        let code = inner.codes.get_mut(id).ok_or(StoreError::NotFound)?;
        if let Some(max_uses) = code.max_uses {
            if code.current_uses >= max_uses {
                return Ok(CodeRedemption::Exhausted);
            }
        }
        code.current_uses += 1;
        if let Some(assignment) = inner
            .assignments
            .values_mut()
            .find(|assignment| assignment.code_id == *id && assignment.consumed_by.is_none())
        {
            assignment.consumed_by = Some(payment.clone());
        }
        Ok(CodeRedemption::Redeemed)
    }

    fn restore_code_use(&self, id: &CodeId) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let code = inner.codes.get_mut(id).ok_or(StoreError::NotFound)?;
        code.current_uses = code.current_uses.saturating_sub(1);
        Ok(())
    }

    fn insert_assignment(
        &self,
        assignment: DiscountAssignment,
    ) -> Result<AssignmentInsert, StoreError> {
        let mut inner = self.lock();
        let key = (
            assignment.rule_id.clone(),
            assignment.event_id,
            assignment.subject_id.clone(),
        );
        if !inner.assignment_keys.insert(key) {
            return Ok(AssignmentInsert::AlreadyExists);
        }
        inner.assignments.insert(assignment.id, assignment);
        Ok(AssignmentInsert::Created)
    }

    fn assignment_count(&self, rule: &RuleId, subject: &SubjectId) -> Result<u32, StoreError> {
        Ok(self
            .lock()
            .assignments
            .values()
            .filter(|assignment| assignment.rule_id == *rule && assignment.subject_id == *subject)
            .count() as u32)
    }

    fn assignments_for_payment(
        &self,
        payment: &PaymentId,
    ) -> Result<Vec<DiscountAssignment>, StoreError> {
        Ok(self
            .lock()
            .assignments
            .values()
            .filter(|assignment| assignment.consumed_by.as_ref() == Some(payment))
            .cloned()
            .collect())
    }

    fn delete_assignment(&self, id: &AssignmentId) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let assignment = inner.assignments.remove(id).ok_or(StoreError::NotFound)?;
        inner.assignment_keys.remove(&(
            assignment.rule_id.clone(),
            assignment.event_id,
            assignment.subject_id.clone(),
        ));
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryBillingLedger {
    payments: Mutex<HashMap<SubjectId, Vec<PaymentRecord>>>,
}

impl InMemoryBillingLedger {
    pub(crate) fn seed_payment(&self, record: PaymentRecord) {
        let mut guard = self.payments.lock().expect("billing mutex poisoned");
        let history = guard.entry(record.subject_id.clone()).or_default();
        history.push(record);
        history.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
    }
}

impl BillingHistory for InMemoryBillingLedger {
    fn successful_payments(&self, subject: &SubjectId) -> Result<Vec<PaymentRecord>, StoreError> {
        let guard = self.payments.lock().expect("billing mutex poisoned");
        Ok(guard
            .get(subject)
            .map(|history| {
                history
                    .iter()
                    .filter(|record| record.succeeded)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryMemberDirectory {
    inner: Mutex<DirectoryInner>,
}

#[derive(Default)]
struct DirectoryInner {
    subjects: HashMap<SubjectId, SubjectRecord>,
    ranks: HashMap<SubjectId, String>,
    enrollments: HashMap<SubjectId, BTreeSet<ProgramId>>,
    active_programs: BTreeSet<ProgramId>,
}

impl InMemoryMemberDirectory {
    fn lock(&self) -> std::sync::MutexGuard<'_, DirectoryInner> {
        self.inner.lock().expect("directory mutex poisoned")
    }

    pub(crate) fn seed_subject(&self, id: SubjectId, record: SubjectRecord) {
        self.lock().subjects.insert(id, record);
    }

    pub(crate) fn set_rank(&self, id: SubjectId, rank: String) {
        self.lock().ranks.insert(id, rank);
    }

    pub(crate) fn add_program(&self, program: ProgramId) {
        self.lock().active_programs.insert(program);
    }

    pub(crate) fn enroll(&self, id: SubjectId, program: ProgramId) {
        let mut inner = self.lock();
        inner.active_programs.insert(program.clone());
        inner.enrollments.entry(id).or_default().insert(program);
    }
}

impl MemberDirectory for InMemoryMemberDirectory {
    fn subject(&self, id: &SubjectId) -> Result<Option<SubjectRecord>, StoreError> {
        Ok(self.lock().subjects.get(id).cloned())
    }

    fn current_rank(&self, id: &SubjectId) -> Result<Option<String>, StoreError> {
        Ok(self.lock().ranks.get(id).cloned())
    }

    fn active_program_ids(&self, id: &SubjectId) -> Result<BTreeSet<ProgramId>, StoreError> {
        Ok(self.lock().enrollments.get(id).cloned().unwrap_or_default())
    }

    fn program_active(&self, id: &ProgramId) -> Result<bool, StoreError> {
        Ok(self.lock().active_programs.contains(id))
    }
}

#[derive(Default)]
pub(crate) struct InMemoryEventCatalog {
    inner: Mutex<CatalogInner>,
}

#[derive(Default)]
struct CatalogInner {
    events: HashMap<ScheduledEventId, ScheduledEvent>,
    confirmed: HashMap<ScheduledEventId, u32>,
    registered: HashSet<(ScheduledEventId, SubjectId)>,
}

impl InMemoryEventCatalog {
    fn lock(&self) -> std::sync::MutexGuard<'_, CatalogInner> {
        self.inner.lock().expect("catalog mutex poisoned")
    }

    pub(crate) fn seed_event(&self, event: ScheduledEvent) {
        self.lock().events.insert(event.id.clone(), event);
    }

    pub(crate) fn set_confirmed(&self, id: ScheduledEventId, count: u32) {
        self.lock().confirmed.insert(id, count);
    }
}

impl EventCatalog for InMemoryEventCatalog {
    fn scheduled_event(&self, id: &ScheduledEventId) -> Result<Option<ScheduledEvent>, StoreError> {
        Ok(self.lock().events.get(id).cloned())
    }

    fn confirmed_count(&self, id: &ScheduledEventId) -> Result<u32, StoreError> {
        Ok(self.lock().confirmed.get(id).copied().unwrap_or(0))
    }

    fn is_registered(
        &self,
        event: &ScheduledEventId,
        subject: &SubjectId,
    ) -> Result<bool, StoreError> {
        Ok(self
            .lock()
            .registered
            .contains(&(event.clone(), subject.clone())))
    }
}

/// Notice delivery backed by the process log. A real deployment would hand
/// the notice to an email or push gateway; the engine only requires that
/// failures surface as `NoticeError`.
#[derive(Default)]
pub(crate) struct LoggingNoticePublisher {
    delivered: Mutex<Vec<DiscountNotice>>,
}

impl LoggingNoticePublisher {
    pub(crate) fn delivered(&self) -> Vec<DiscountNotice> {
        self.delivered.lock().expect("notice mutex poisoned").clone()
    }
}

impl NoticePublisher for LoggingNoticePublisher {
    fn publish(&self, notice: DiscountNotice) -> Result<(), NoticeError> {
        info!(
            subject = %notice.subject_id.0,
            rule = %notice.rule_id.0,
            code = %notice.code_id.0,
            "discount notice dispatched"
        );
        self.delivered
            .lock()
            .expect("notice mutex poisoned")
            .push(notice);
        Ok(())
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}
