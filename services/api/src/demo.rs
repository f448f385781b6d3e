use crate::infra::{
    InMemoryAutomationStore, InMemoryBillingLedger, InMemoryEventCatalog, InMemoryMemberDirectory,
    LoggingNoticePublisher,
};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use clap::Args;
use std::collections::BTreeSet;
use std::sync::Arc;

use dojo_admin::engine::{
    AutomationRule, DiscountKind, DiscountScope, DiscountTemplate, DiscountUsage,
    DomainEventKind, EngineConfig, IssuanceResult, PaymentId, PaymentRecord,
    PaymentState, PlanKind, ProgramId, RuleConditions, RuleEngineService, RuleId, ScheduledEvent,
    ScheduledEventId, ScheduledEventStatus, SubjectId, SubjectRecord, TemplateId,
};
use dojo_admin::error::AppError;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Override the evaluation date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Skip the discount automation portion of the demo.
    #[arg(long)]
    pub(crate) skip_automation: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        today,
        skip_automation,
    } = args;

    let today = today.unwrap_or_else(|| Utc::now().date_naive());
    let now = today
        .and_hms_opt(12, 0, 0)
        .map(|midday| Utc.from_utc_datetime(&midday))
        .unwrap_or_else(Utc::now);

    let store = Arc::new(InMemoryAutomationStore::default());
    let billing = Arc::new(InMemoryBillingLedger::default());
    let members = Arc::new(InMemoryMemberDirectory::default());
    let catalog = Arc::new(InMemoryEventCatalog::default());
    let notices = Arc::new(LoggingNoticePublisher::default());
    let service = RuleEngineService::new(
        store.clone(),
        billing.clone(),
        members.clone(),
        catalog.clone(),
        notices.clone(),
        EngineConfig::default(),
    );

    let alex = SubjectId("alex".to_string());
    members.seed_subject(
        alex.clone(),
        SubjectRecord {
            birth_date: NaiveDate::from_ymd_opt(1996, 5, 20).unwrap_or(today),
            attendance_count: 42,
        },
    );
    members.set_rank(alex.clone(), "green".to_string());
    members.enroll(alex.clone(), ProgramId("adults".to_string()));
    billing.seed_payment(PaymentRecord {
        subject_id: alex.clone(),
        occurred_at: today - Duration::days(12),
        succeeded: true,
        plan_kind: PlanKind::Monthly,
    });

    println!("Dojo admin rule engine demo (evaluated {today})");

    println!("\nPayment eligibility");
    let status = service.evaluate_payment_eligibility(&alex, today)?;
    println!(
        "- {}: eligible={} reason={:?} last_payment={:?}",
        alex.0, status.eligible, status.reason, status.last_payment_date
    );

    println!("\nEvent registration");
    let spring_cup = ScheduledEventId("spring-cup".to_string());
    catalog.seed_event(ScheduledEvent {
        id: spring_cup.clone(),
        status: ScheduledEventStatus::Open,
        registration_deadline: Some(now + Duration::days(7)),
        max_participants: Some(16),
        min_age: Some(18),
        max_age: None,
        min_rank: Some("yellow".to_string()),
        max_rank: None,
    });
    let assessment = service.evaluate_registration_eligibility(&spring_cup, &alex, now)?;
    if assessment.eligible {
        println!("- {} may register for {}", alex.0, spring_cup.0);
    } else {
        println!(
            "- {} blocked from {}: primary={:?} violations={:?}",
            alex.0, spring_cup.0, assessment.primary_reason, assessment.violations
        );
    }

    catalog.set_confirmed(spring_cup.clone(), 16);
    let full = service.evaluate_registration_eligibility(&spring_cup, &alex, now)?;
    println!(
        "- once the event fills up: primary={:?} violations={:?}",
        full.primary_reason, full.violations
    );

    if skip_automation {
        return Ok(());
    }

    println!("\nDiscount automation");
    store.seed_template(DiscountTemplate {
        id: TemplateId("welcome-10".to_string()),
        kind: DiscountKind::Percentage,
        value: 10,
        scope: DiscountScope::PerSubject,
        usage_type: DiscountUsage::OneTime,
        max_uses: Some(1),
        default_validity_days: Some(30),
    });
    store.seed_rule(AutomationRule {
        id: RuleId("enrollment-welcome".to_string()),
        event_kind: DomainEventKind::Enrollment,
        template_id: TemplateId("welcome-10".to_string()),
        applicable_programs: BTreeSet::new(),
        conditions: RuleConditions::default(),
        max_uses_per_subject: Some(1),
        active: true,
        valid_from: None,
        valid_until: None,
    });

    let event_id = service.record_domain_event(
        DomainEventKind::Enrollment,
        alex.clone(),
        Some("adults".to_string()),
        serde_json::Map::new(),
        now,
    )?;
    println!("- recorded enrollment event {}", event_id.0);

    let outcome = service.process_event(&event_id, now)?;
    let mut issued_code = None;
    for issuance in &outcome.issuances {
        match issuance.result {
            IssuanceResult::Issued { code_id, .. } => {
                println!("- rule {} issued code {}", issuance.rule_id.0, code_id.0);
                issued_code = Some(code_id);
            }
            ref other => println!("- rule {}: {:?}", issuance.rule_id.0, other),
        }
    }
    for notice in notices.delivered() {
        println!(
            "- notice dispatched: {}% off for {} (code {})",
            notice.value, notice.subject_id.0, notice.code_id.0
        );
    }

    let replay = service.process_event(&event_id, now)?;
    println!(
        "- replayed delivery: already_processed={} issuances={}",
        replay.already_processed,
        replay.issuances.len()
    );

    let Some(code_id) = issued_code else {
        return Ok(());
    };

    println!("\nRedemption and compensation");
    let payment = PaymentId("pay-001".to_string());
    let redemption = service.record_redemption(&code_id, &payment)?;
    println!("- billing redeemed {} -> {:?}", code_id.0, redemption);
    if let Some(code) = store.code_snapshot(&code_id) {
        println!("- code usage now {}/{:?}", code.current_uses, code.max_uses);
    }

    let revocation =
        service.revoke_assignments_for_payment(&payment, PaymentState::Pending, PaymentState::Failed)?;
    println!("- payment {} failed -> {:?}", payment.0, revocation);
    if let Some(code) = store.code_snapshot(&code_id) {
        println!(
            "- code usage restored to {}/{:?}; ready for a retried payment",
            code.current_uses, code.max_uses
        );
    }

    Ok(())
}
