//! Shared error types.

use axum::{http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

/// JSON error body returned by the service itself (not by the route groups
/// mounted under `/api`, which own their error shapes).
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }

    pub fn not_found(
        error: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::NOT_FOUND, Json(Self::new(error, code)))
    }
}

/// Failure while opening or using a database session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to acquire database session: {0}")]
    Acquire(#[from] diesel::r2d2::PoolError),

    #[error("database query failed: {0}")]
    Query(#[from] diesel::result::Error),

    #[error("database unavailable: {0}")]
    Unavailable(String),
}

/// Invalid or incomplete startup configuration.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} must be a valid {expected}, got {value:?}")]
    Invalid {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}
