//! Health check handler.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use crate::db::SessionProvider;
use crate::AppState;

/// Statement used to prove the database answers.
pub const LIVENESS_QUERY: &str = "SELECT 1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Liveness {
    Healthy,
    Unhealthy { message: String },
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: String,
    #[schema(example = "connected")]
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "failed to acquire database session: timed out waiting for connection")]
    pub error: Option<String>,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            database: "connected".to_string(),
            error: None,
        }
    }

    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            status: "unhealthy".to_string(),
            database: "connection failed".to_string(),
            error: Some(error.into()),
        }
    }
}

/// Runs the liveness query inside one scoped session.
pub fn check_liveness(sessions: &dyn SessionProvider) -> Liveness {
    let result = sessions.with_session(&mut |session| {
        session.execute(LIVENESS_QUERY)?;
        Ok(())
    });

    match result {
        Ok(()) => Liveness::Healthy,
        Err(e) => {
            warn!(error = %e, "Database liveness check failed");
            Liveness::Unhealthy {
                message: e.to_string(),
            }
        }
    }
}

pub fn health_response(liveness: Liveness) -> (StatusCode, Json<HealthResponse>) {
    match liveness {
        Liveness::Healthy => (StatusCode::OK, Json(HealthResponse::healthy())),
        Liveness::Unhealthy { message } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(HealthResponse::unhealthy(message)),
        ),
    }
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Database is reachable", body = HealthResponse),
        (status = 500, description = "Database is unreachable", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let sessions = state.sessions.clone();

    let liveness = tokio::task::spawn_blocking(move || check_liveness(sessions.as_ref()))
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "Liveness check task failed");
            Liveness::Unhealthy {
                message: e.to_string(),
            }
        });

    health_response(liveness)
}
