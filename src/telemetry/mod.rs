//! Observability: structured logging and Prometheus metrics.

pub mod metrics;
pub mod tracing;

pub use self::metrics::{MetricsRegistry, PROMETHEUS_CONTENT_TYPE};
pub use self::tracing::init_telemetry;
