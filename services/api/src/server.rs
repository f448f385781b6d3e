use crate::cli::ServeArgs;
use crate::infra::{
    AppState, InMemoryAutomationStore, InMemoryBillingLedger, InMemoryEventCatalog,
    InMemoryMemberDirectory, LoggingNoticePublisher,
};
use crate::routes::with_engine_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dojo_admin::config::AppConfig;
use dojo_admin::engine::{EngineConfig, RankLadder, RuleEngineService};
use dojo_admin::error::AppError;
use dojo_admin::telemetry;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let engine_config = EngineConfig {
        windows: config.engine.windows(),
        ladder: RankLadder::default(),
    };
    let service = Arc::new(RuleEngineService::new(
        Arc::new(InMemoryAutomationStore::default()),
        Arc::new(InMemoryBillingLedger::default()),
        Arc::new(InMemoryMemberDirectory::default()),
        Arc::new(InMemoryEventCatalog::default()),
        Arc::new(LoggingNoticePublisher::default()),
        engine_config,
    ));

    let app = with_engine_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "rule engine service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
