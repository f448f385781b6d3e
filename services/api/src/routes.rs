use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use serde_json::json;
use std::sync::Arc;

use dojo_admin::engine::{
    engine_router, AutomationStore, BillingHistory, EventCatalog, MemberDirectory,
    NoticePublisher, RuleEngineService,
};

pub(crate) fn with_engine_routes<S, B, M, C, N>(
    service: Arc<RuleEngineService<S, B, M, C, N>>,
) -> axum::Router
where
    S: AutomationStore + 'static,
    B: BillingHistory + 'static,
    M: MemberDirectory + 'static,
    C: EventCatalog + 'static,
    N: NoticePublisher + 'static,
{
    engine_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{
        InMemoryAutomationStore, InMemoryBillingLedger, InMemoryEventCatalog,
        InMemoryMemberDirectory, LoggingNoticePublisher,
    };
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::NaiveDate;
    use dojo_admin::engine::{EngineConfig, SubjectId, SubjectRecord};
    use tower::ServiceExt;

    fn build_router() -> axum::Router {
        let members = Arc::new(InMemoryMemberDirectory::default());
        members.seed_subject(
            SubjectId("alex".to_string()),
            SubjectRecord {
                birth_date: NaiveDate::from_ymd_opt(1996, 5, 20).expect("valid date"),
                attendance_count: 0,
            },
        );
        let service = Arc::new(RuleEngineService::new(
            Arc::new(InMemoryAutomationStore::default()),
            Arc::new(InMemoryBillingLedger::default()),
            members,
            Arc::new(InMemoryEventCatalog::default()),
            Arc::new(LoggingNoticePublisher::default()),
            EngineConfig::default(),
        ));
        with_engine_routes(service)
    }

    #[tokio::test]
    async fn healthcheck_reports_ok() {
        let response = build_router()
            .oneshot(
                Request::get("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), 1024).await.expect("body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(body["status"], json!("ok"));
    }

    #[tokio::test]
    async fn engine_routes_are_mounted() {
        let response = build_router()
            .oneshot(
                Request::get("/api/v1/subjects/alex/payment-eligibility")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), 1024 * 64)
            .await
            .expect("body");
        let body: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(body["reason"], json!("trial"));
    }
}
