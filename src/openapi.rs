//! OpenAPI documentation for the service's own endpoints.
//!
//! Route groups mounted under `/api` are documented by their owners.

use axum::Json;
use utoipa::OpenApi;

use crate::error::ApiError;
use crate::handlers::health::HealthResponse;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Loan Service API",
        version = "1.0.0",
        description = "Loan and statistics service.\n\n\
        ## Operations\n\
        - `GET /health` checks database connectivity\n\
        - `GET /metrics` exposes Prometheus metrics\n\
        - Loan and statistics routes live under `/api`",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "/", description = "Current server")
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Metrics", description = "Prometheus scrape endpoint")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::metrics::metrics_handler,
    ),
    components(schemas(HealthResponse, ApiError))
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
