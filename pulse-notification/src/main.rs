use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod config;
mod models;
mod routes;
mod schema;
mod services;
mod store;
mod templates;
#[cfg(test)]
mod testing;

use config::AppConfig;
use pulse_shared::clients::db::create_pool;
use pulse_shared::clients::email::{EmailClient, EmailDispatch};
use pulse_shared::clients::redis::RedisClient;
use services::runner::{RedisRunLock, RunLock, SpikeRunner};
use services::spike_processor::SpikeProcessor;
use store::{PgSpikeStore, SpikeStore};

pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn SpikeStore>,
    pub runner: SpikeRunner,
    pub metrics_handle: Option<PrometheusHandle>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route("/cron/spike-notifications", post(routes::cron::run_spike_notifications))
        .layer(axum::middleware::from_fn(pulse_shared::middleware::metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pulse_shared::middleware::init_tracing("pulse-notification");

    let config = AppConfig::load()?;
    let port = config.port;

    let pool = create_pool(&config.database_url, config.db_pool_size)?;
    let store: Arc<dyn SpikeStore> = Arc::new(PgSpikeStore::new(pool));

    let email: Arc<dyn EmailDispatch> = Arc::new(EmailClient::new(
        &config.resend_api_key,
        &config.from_email,
        &config.from_name,
    ));

    let lock: Option<Arc<dyn RunLock>> = if config.redis_url.is_empty() {
        tracing::info!("redis_url not set, overlapping spike runs are not prevented");
        None
    } else {
        let redis = RedisClient::connect(&config.redis_url).await?;
        Some(Arc::new(RedisRunLock::new(redis, config.run_lock_ttl_secs)) as Arc<dyn RunLock>)
    };

    let processor = SpikeProcessor::new(store.clone(), email, config.dashboard_url.clone(), config.batch_size);
    let runner = SpikeRunner::new(processor, lock);

    if config.spike_interval_secs > 0 {
        tracing::info!(interval_secs = config.spike_interval_secs, "in-process spike schedule enabled");
        services::scheduler::spawn_spike_task(runner.clone(), config.spike_interval_secs);
    }

    let metrics_handle = pulse_shared::middleware::init_metrics()?;

    let state = Arc::new(AppState { config, store, runner, metrics_handle: Some(metrics_handle) });
    let app = router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "pulse-notification starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
