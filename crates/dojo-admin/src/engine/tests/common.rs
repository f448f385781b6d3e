use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use crate::engine::automation::domain::{
    AssignmentId, AutomationRule, CodeId, DiscountAssignment, DiscountCode, DiscountKind,
    DiscountNotice, DiscountScope, DiscountTemplate, DiscountUsage, DomainEvent, DomainEventKind,
    EventId, RuleConditions, RuleId, TemplateId,
};
use crate::engine::domain::{
    PaymentId, PaymentRecord, PlanKind, ProgramId, ScheduledEvent, ScheduledEventId,
    ScheduledEventStatus, SubjectId, SubjectRecord,
};
use crate::engine::repository::{
    AssignmentInsert, AutomationStore, BillingHistory, CodeRedemption, EventCatalog,
    MemberDirectory, NoticeError, NoticePublisher, StoreError,
};
use crate::engine::service::{EngineConfig, RuleEngineService};

pub(super) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn subject(id: &str) -> SubjectId {
    SubjectId(id.to_string())
}

pub(super) fn payment(subject_id: &str, occurred_at: NaiveDate, plan: PlanKind) -> PaymentRecord {
    PaymentRecord {
        subject_id: subject(subject_id),
        occurred_at,
        succeeded: true,
        plan_kind: plan,
    }
}

pub(super) fn template(id: &str) -> DiscountTemplate {
    DiscountTemplate {
        id: TemplateId(id.to_string()),
        kind: DiscountKind::Percentage,
        value: 20,
        scope: DiscountScope::PerSubject,
        usage_type: DiscountUsage::OneTime,
        max_uses: Some(1),
        default_validity_days: Some(30),
    }
}

pub(super) fn rule(id: &str, kind: DomainEventKind, template_id: &str) -> AutomationRule {
    AutomationRule {
        id: RuleId(id.to_string()),
        event_kind: kind,
        template_id: TemplateId(template_id.to_string()),
        applicable_programs: BTreeSet::new(),
        conditions: RuleConditions::default(),
        max_uses_per_subject: None,
        active: true,
        valid_from: None,
        valid_until: None,
    }
}

pub(super) fn domain_event(kind: DomainEventKind, subject_id: &str) -> DomainEvent {
    DomainEvent {
        id: EventId::generate(),
        kind,
        subject_id: subject(subject_id),
        context_id: None,
        payload: serde_json::Map::new(),
        occurred_at: fixed_now() - Duration::minutes(5),
        processed_at: None,
    }
}

pub(super) fn open_event(id: &str) -> ScheduledEvent {
    ScheduledEvent {
        id: ScheduledEventId(id.to_string()),
        status: ScheduledEventStatus::Open,
        registration_deadline: Some(fixed_now() + Duration::days(7)),
        max_participants: Some(20),
        min_age: None,
        max_age: None,
        min_rank: None,
        max_rank: None,
    }
}

#[derive(Default)]
pub(super) struct MemoryStore {
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

impl MemoryStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, StoreInner> {
        self.inner.lock().expect("store mutex poisoned")
    }

    pub(super) fn seed_template(&self, template: DiscountTemplate) {
        self.lock().templates.insert(template.id.clone(), template);
    }

    pub(super) fn seed_rule(&self, rule: AutomationRule) {
        self.lock().rules.push(rule);
    }

    pub(super) fn code_count(&self) -> usize {
        self.lock().codes.len()
    }

    pub(super) fn code_uses(&self, id: &CodeId) -> u32 {
        self.lock().codes.get(id).expect("code present").current_uses
    }

    pub(super) fn assignments(&self) -> Vec<DiscountAssignment> {
        self.lock().assignments.values().cloned().collect()
    }
}

impl AutomationStore for MemoryStore {
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
            .filter(|assignment| {
                assignment.rule_id == *rule && assignment.subject_id == *subject
            })
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
pub(super) struct MemoryDirectory {
    inner: Mutex<DirectoryInner>,
}

#[derive(Default)]
struct DirectoryInner {
    subjects: HashMap<SubjectId, SubjectRecord>,
    ranks: HashMap<SubjectId, String>,
    enrollments: HashMap<SubjectId, BTreeSet<ProgramId>>,
    active_programs: BTreeSet<ProgramId>,
}

impl MemoryDirectory {
    fn lock(&self) -> std::sync::MutexGuard<'_, DirectoryInner> {
        self.inner.lock().expect("directory mutex poisoned")
    }

    pub(super) fn seed_subject(&self, id: &str, birth_date: NaiveDate, attendance_count: u32) {
        self.lock().subjects.insert(
            subject(id),
            SubjectRecord {
                birth_date,
                attendance_count,
            },
        );
    }

    pub(super) fn set_rank(&self, id: &str, rank: &str) {
        self.lock().ranks.insert(subject(id), rank.to_string());
    }

    pub(super) fn add_program(&self, program: &str) {
        self.lock()
            .active_programs
            .insert(ProgramId(program.to_string()));
    }

    pub(super) fn enroll(&self, id: &str, program: &str) {
        let mut inner = self.lock();
        inner.active_programs.insert(ProgramId(program.to_string()));
        inner
            .enrollments
            .entry(subject(id))
            .or_default()
            .insert(ProgramId(program.to_string()));
    }
}

impl MemberDirectory for MemoryDirectory {
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
pub(super) struct MemoryBilling {
    payments: Mutex<HashMap<SubjectId, Vec<PaymentRecord>>>,
}

impl MemoryBilling {
    pub(super) fn seed_payment(&self, record: PaymentRecord) {
        let mut guard = self.payments.lock().expect("billing mutex poisoned");
        let history = guard.entry(record.subject_id.clone()).or_default();
        history.push(record);
        history.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
    }
}

impl BillingHistory for MemoryBilling {
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
pub(super) struct MemoryCatalog {
    inner: Mutex<CatalogInner>,
}

#[derive(Default)]
struct CatalogInner {
    events: HashMap<ScheduledEventId, ScheduledEvent>,
    confirmed: HashMap<ScheduledEventId, u32>,
    registered: HashSet<(ScheduledEventId, SubjectId)>,
}

impl MemoryCatalog {
    fn lock(&self) -> std::sync::MutexGuard<'_, CatalogInner> {
        self.inner.lock().expect("catalog mutex poisoned")
    }

    pub(super) fn seed_event(&self, event: ScheduledEvent) {
        self.lock().events.insert(event.id.clone(), event);
    }

    pub(super) fn set_confirmed(&self, id: &str, count: u32) {
        self.lock()
            .confirmed
            .insert(ScheduledEventId(id.to_string()), count);
    }

    pub(super) fn register(&self, event: &str, subject_id: &str) {
        self.lock()
            .registered
            .insert((ScheduledEventId(event.to_string()), subject(subject_id)));
    }
}

impl EventCatalog for MemoryCatalog {
    fn scheduled_event(
        &self,
        id: &ScheduledEventId,
    ) -> Result<Option<ScheduledEvent>, StoreError> {
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

#[derive(Default)]
pub(super) struct MemoryNotices {
    notices: Mutex<Vec<DiscountNotice>>,
}

impl MemoryNotices {
    pub(super) fn notices(&self) -> Vec<DiscountNotice> {
        self.notices.lock().expect("notice mutex poisoned").clone()
    }
}

impl NoticePublisher for MemoryNotices {
    fn publish(&self, notice: DiscountNotice) -> Result<(), NoticeError> {
        self.notices
            .lock()
            .expect("notice mutex poisoned")
            .push(notice);
        Ok(())
    }
}

pub(super) struct FailingNotices;

impl NoticePublisher for FailingNotices {
    fn publish(&self, _notice: DiscountNotice) -> Result<(), NoticeError> {
        Err(NoticeError::Transport("smtp relay offline".to_string()))
    }
}

pub(super) type TestService =
    RuleEngineService<MemoryStore, MemoryBilling, MemoryDirectory, MemoryCatalog, MemoryNotices>;

pub(super) struct Harness {
    pub(super) service: TestService,
    pub(super) store: Arc<MemoryStore>,
    pub(super) billing: Arc<MemoryBilling>,
    pub(super) members: Arc<MemoryDirectory>,
    pub(super) catalog: Arc<MemoryCatalog>,
    pub(super) notices: Arc<MemoryNotices>,
}

pub(super) fn harness() -> Harness {
    let store = Arc::new(MemoryStore::default());
    let billing = Arc::new(MemoryBilling::default());
    let members = Arc::new(MemoryDirectory::default());
    let catalog = Arc::new(MemoryCatalog::default());
    let notices = Arc::new(MemoryNotices::default());
    let service = RuleEngineService::new(
        store.clone(),
        billing.clone(),
        members.clone(),
        catalog.clone(),
        notices.clone(),
        EngineConfig::default(),
    );
    Harness {
        service,
        store,
        billing,
        members,
        catalog,
        notices,
    }
}
