use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::with_allocation_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use housing_allocation::config::AppConfig;
use housing_allocation::error::AppError;
use housing_allocation::telemetry;
use housing_allocation::workflows::allocation::AllocationService;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(data_dir) = args.data_dir.take() {
        config.storage.data_dir = data_dir;
    }
    if let Some(seed_dir) = args.seed_dir.take() {
        config.storage.seed_dir = Some(seed_dir);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let (service, reports) = AllocationService::open(&config.storage)?;
    let skipped: usize = reports.iter().map(|report| report.skipped).sum();
    if skipped > 0 {
        warn!(skipped, "some persisted records could not be read and were left out");
    }

    let app = with_allocation_routes(Arc::new(service))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        data_dir = %config.storage.data_dir.display(),
        "housing allocation service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
