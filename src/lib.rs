//! Loan service - health, loan and statistics endpoints with request
//! logging and Prometheus metrics.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod telemetry;

use std::sync::Arc;

use axum::{
    extract::FromRef, middleware as axum_middleware, response::IntoResponse, routing::get, Router,
};

use tower_http::catch_panic::CatchPanicLayer;

use error::ApiError;
use middleware::instrumentation_middleware;

pub use config::Config;
pub use db::{create_db_pool, DbPool, PgSessionProvider, SessionProvider};
pub use telemetry::MetricsRegistry;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<dyn SessionProvider>,
    pub metrics: MetricsRegistry,
}

impl AppState {
    pub fn new(sessions: impl SessionProvider + 'static, metrics: MetricsRegistry) -> Self {
        Self {
            sessions: Arc::new(sessions),
            metrics,
        }
    }
}

impl FromRef<AppState> for MetricsRegistry {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}

/// Loan and statistics route groups. Both are mounted under `/api`.
pub struct ApiRoutes {
    pub loans: Router<AppState>,
    pub stats: Router<AppState>,
}

impl Default for ApiRoutes {
    fn default() -> Self {
        Self {
            loans: Router::new(),
            stats: Router::new(),
        }
    }
}

pub fn create_router(state: AppState, api: ApiRoutes) -> Router {
    let metrics = state.metrics.clone();

    let public_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/metrics", get(handlers::metrics::metrics_handler))
        .route("/api-docs/openapi.json", get(openapi::openapi_json));

    let api_routes = api.loans.merge(api.stats);

    Router::new()
        .merge(public_routes)
        .nest("/api", api_routes)
        .fallback(fallback_handler)
        // Inside the instrumentation layer, so a panicking handler still
        // yields a 500 that gets logged and counted.
        .layer(CatchPanicLayer::new())
        .layer(axum_middleware::from_fn_with_state(
            metrics,
            instrumentation_middleware,
        ))
        .with_state(state)
}

async fn fallback_handler() -> impl IntoResponse {
    ApiError::not_found("Not found", "NOT_FOUND")
}

pub fn init_tracing(config: &Config) {
    telemetry::init_telemetry(config);
}
