use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::automation::domain::{AutomationRule, CodeId, DomainEventKind, EventId};
use super::domain::{PaymentId, PaymentState, ScheduledEventId, SubjectId};
use super::repository::{
    AutomationStore, BillingHistory, EventCatalog, MemberDirectory, NoticePublisher, StoreError,
};
use super::service::{EngineError, RuleEngineService};

/// Router builder exposing the engine's operations over HTTP.
pub fn engine_router<S, B, M, C, N>(service: Arc<RuleEngineService<S, B, M, C, N>>) -> Router
where
    S: AutomationStore + 'static,
    B: BillingHistory + 'static,
    M: MemberDirectory + 'static,
    C: EventCatalog + 'static,
    N: NoticePublisher + 'static,
{
    Router::new()
        .route(
            "/api/v1/subjects/:subject_id/payment-eligibility",
            get(payment_eligibility_handler::<S, B, M, C, N>),
        )
        .route(
            "/api/v1/events/:event_id/registration/:subject_id",
            get(registration_handler::<S, B, M, C, N>),
        )
        .route(
            "/api/v1/automation/events",
            post(record_event_handler::<S, B, M, C, N>),
        )
        .route(
            "/api/v1/automation/events/:event_id/process",
            post(process_event_handler::<S, B, M, C, N>),
        )
        .route(
            "/api/v1/automation/rules",
            post(register_rule_handler::<S, B, M, C, N>),
        )
        .route(
            "/api/v1/billing/payments/:payment_id/redemption",
            post(redemption_handler::<S, B, M, C, N>),
        )
        .route(
            "/api/v1/billing/payments/:payment_id/revocation",
            post(revocation_handler::<S, B, M, C, N>),
        )
        .with_state(service)
}

pub(crate) fn error_response(error: EngineError) -> Response {
    let status = match &error {
        EngineError::NotFound { .. } | EngineError::Store(StoreError::NotFound) => {
            StatusCode::NOT_FOUND
        }
        EngineError::Store(StoreError::Conflict) => StatusCode::CONFLICT,
        EngineError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::InvalidConfiguration(_) => StatusCode::UNPROCESSABLE_ENTITY,
    };
    let payload = json!({ "error": error.to_string() });
    (status, Json(payload)).into_response()
}

fn bad_event_id(raw: &str) -> Response {
    let payload = json!({ "error": format!("'{raw}' is not a valid event id") });
    (StatusCode::BAD_REQUEST, Json(payload)).into_response()
}

async fn payment_eligibility_handler<S, B, M, C, N>(
    State(service): State<Arc<RuleEngineService<S, B, M, C, N>>>,
    Path(subject_id): Path<String>,
) -> Response
where
    S: AutomationStore + 'static,
    B: BillingHistory + 'static,
    M: MemberDirectory + 'static,
    C: EventCatalog + 'static,
    N: NoticePublisher + 'static,
{
    let subject = SubjectId(subject_id);
    match service.evaluate_payment_eligibility(&subject, Utc::now().date_naive()) {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn registration_handler<S, B, M, C, N>(
    State(service): State<Arc<RuleEngineService<S, B, M, C, N>>>,
    Path((event_id, subject_id)): Path<(String, String)>,
) -> Response
where
    S: AutomationStore + 'static,
    B: BillingHistory + 'static,
    M: MemberDirectory + 'static,
    C: EventCatalog + 'static,
    N: NoticePublisher + 'static,
{
    let event = ScheduledEventId(event_id);
    let subject = SubjectId(subject_id);
    match service.evaluate_registration_eligibility(&event, &subject, Utc::now()) {
        Ok(assessment) => (StatusCode::OK, Json(assessment)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecordEventRequest {
    pub(crate) kind: DomainEventKind,
    pub(crate) subject_id: String,
    #[serde(default)]
    pub(crate) context_id: Option<String>,
    #[serde(default)]
    pub(crate) payload: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub(crate) occurred_at: Option<DateTime<Utc>>,
}

async fn record_event_handler<S, B, M, C, N>(
    State(service): State<Arc<RuleEngineService<S, B, M, C, N>>>,
    Json(request): Json<RecordEventRequest>,
) -> Response
where
    S: AutomationStore + 'static,
    B: BillingHistory + 'static,
    M: MemberDirectory + 'static,
    C: EventCatalog + 'static,
    N: NoticePublisher + 'static,
{
    let occurred_at = request.occurred_at.unwrap_or_else(Utc::now);
    match service.record_domain_event(
        request.kind,
        SubjectId(request.subject_id),
        request.context_id,
        request.payload,
        occurred_at,
    ) {
        Ok(event_id) => {
            let payload = json!({ "event_id": event_id });
            (StatusCode::ACCEPTED, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

async fn process_event_handler<S, B, M, C, N>(
    State(service): State<Arc<RuleEngineService<S, B, M, C, N>>>,
    Path(event_id): Path<String>,
) -> Response
where
    S: AutomationStore + 'static,
    B: BillingHistory + 'static,
    M: MemberDirectory + 'static,
    C: EventCatalog + 'static,
    N: NoticePublisher + 'static,
{
    let Ok(id) = Uuid::parse_str(&event_id) else {
        return bad_event_id(&event_id);
    };
    match service.process_event(&EventId(id), Utc::now()) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn register_rule_handler<S, B, M, C, N>(
    State(service): State<Arc<RuleEngineService<S, B, M, C, N>>>,
    Json(rule): Json<AutomationRule>,
) -> Response
where
    S: AutomationStore + 'static,
    B: BillingHistory + 'static,
    M: MemberDirectory + 'static,
    C: EventCatalog + 'static,
    N: NoticePublisher + 'static,
{
    match service.register_rule(rule) {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RedemptionRequest {
    pub(crate) code_id: Uuid,
}

async fn redemption_handler<S, B, M, C, N>(
    State(service): State<Arc<RuleEngineService<S, B, M, C, N>>>,
    Path(payment_id): Path<String>,
    Json(request): Json<RedemptionRequest>,
) -> Response
where
    S: AutomationStore + 'static,
    B: BillingHistory + 'static,
    M: MemberDirectory + 'static,
    C: EventCatalog + 'static,
    N: NoticePublisher + 'static,
{
    let payment = PaymentId(payment_id);
    match service.record_redemption(&CodeId(request.code_id), &payment) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RevocationRequest {
    pub(crate) previous: PaymentState,
    pub(crate) next: PaymentState,
}

async fn revocation_handler<S, B, M, C, N>(
    State(service): State<Arc<RuleEngineService<S, B, M, C, N>>>,
    Path(payment_id): Path<String>,
    Json(request): Json<RevocationRequest>,
) -> Response
where
    S: AutomationStore + 'static,
    B: BillingHistory + 'static,
    M: MemberDirectory + 'static,
    C: EventCatalog + 'static,
    N: NoticePublisher + 'static,
{
    let payment = PaymentId(payment_id);
    match service.revoke_assignments_for_payment(&payment, request.previous, request.next) {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}
