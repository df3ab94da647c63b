use crate::cli::ServeArgs;
use crate::infra::{sample_catalog, AppState, InMemorySessionStore};
use crate::routes::with_session_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use survey_engine::config::AppConfig;
use survey_engine::error::AppError;
use survey_engine::surveys::catalog::SurveyCatalog;
use survey_engine::surveys::service::SurveySessionService;
use survey_engine::telemetry;
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

    let catalog = match config.surveys.definitions_dir.as_ref() {
        Some(dir) => SurveyCatalog::load_dir(dir)?,
        None => sample_catalog()?,
    };
    info!(surveys = catalog.len(), "survey catalog loaded");

    let store = Arc::new(InMemorySessionStore::default());
    let session_service = Arc::new(SurveySessionService::new(Arc::new(catalog), store));

    let app = with_session_routes(session_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "survey session engine ready");

    axum::serve(listener, app).await?;
    Ok(())
}
