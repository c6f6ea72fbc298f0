use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

mod config;
mod models;
mod provider;
mod range;
mod routes;
mod schema;
mod services;
mod store;
#[cfg(test)]
mod testing;

use config::AppConfig;
use provider::{AnalyticsProvider, GoogleAnalyticsClient};
use pulse_shared::clients::db::create_pool;
use pulse_shared::middleware::JwtSecretSource;
use services::dashboard::DashboardService;
use services::pipeline::FetchPipeline;
use services::staleness::StalenessEvaluator;
use store::{AnalyticsStore, PgAnalyticsStore};

pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn AnalyticsStore>,
    pub provider: Arc<dyn AnalyticsProvider>,
    pub dashboard: DashboardService,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn AnalyticsStore>,
        provider: Arc<dyn AnalyticsProvider>,
        metrics_handle: Option<PrometheusHandle>,
    ) -> Self {
        let evaluator = StalenessEvaluator::new(store.clone(), config.staleness_threshold());
        let pipeline = FetchPipeline::new(store.clone(), provider.clone());
        let dashboard = DashboardService::new(store.clone(), evaluator, pipeline, config.top_items);

        Self { config, store, provider, dashboard, metrics_handle }
    }
}

impl JwtSecretSource for AppState {
    fn jwt_secret(&self) -> &str {
        &self.config.jwt_secret
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .route("/analytics", get(routes::dashboard::get_analytics))
        .route(
            "/connections/google",
            get(routes::connections::get_connection)
                .post(routes::connections::connect_google)
                .delete(routes::connections::disconnect),
        )
        .layer(axum::middleware::from_fn(pulse_shared::middleware::metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pulse_shared::middleware::init_tracing("pulse-analytics");

    let config = AppConfig::load()?;
    let port = config.port;

    let pool = create_pool(&config.database_url, config.db_pool_size)?;
    let store: Arc<dyn AnalyticsStore> = Arc::new(PgAnalyticsStore::new(pool));
    let provider: Arc<dyn AnalyticsProvider> = Arc::new(GoogleAnalyticsClient::new(&config));

    let metrics_handle = pulse_shared::middleware::init_metrics()?;

    let state = Arc::new(AppState::new(config, store, provider, Some(metrics_handle)));
    let app = router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "pulse-analytics starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
