//! Request metrics using the metrics crate and a Prometheus recorder.
//!
//! The recorder is owned by [`MetricsRegistry`] rather than installed
//! globally; every recording call routes to it explicitly through
//! `metrics::with_local_recorder`. Two registries never share series.

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{
    BuildError, Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder,
};

pub const REQUEST_COUNT: &str = "http_requests_total";
pub const REQUEST_LATENCY: &str = "http_request_duration_seconds";

/// Content type of the text exposition format.
pub const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Default Prometheus client buckets, in seconds.
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0,
];

#[derive(Clone)]
pub struct MetricsRegistry {
    recorder: Arc<PrometheusRecorder>,
    handle: PrometheusHandle,
}

impl MetricsRegistry {
    pub fn new() -> Result<Self, BuildError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(Matcher::Full(REQUEST_LATENCY.to_string()), LATENCY_BUCKETS)?
            .build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            describe_counter!(REQUEST_COUNT, "Total HTTP Requests");
            describe_histogram!(REQUEST_LATENCY, Unit::Seconds, "HTTP Request Latency");
        });

        Ok(Self {
            recorder: Arc::new(recorder),
            handle,
        })
    }

    /// Folds one finished request into the aggregates.
    pub fn record_request(&self, method: &str, endpoint: &str, status: u16, latency: Duration) {
        metrics::with_local_recorder(self.recorder.as_ref(), || {
            histogram!(
                REQUEST_LATENCY,
                "method" => method.to_string(),
                "endpoint" => endpoint.to_string()
            )
            .record(latency.as_secs_f64());

            counter!(
                REQUEST_COUNT,
                "method" => method.to_string(),
                "endpoint" => endpoint.to_string(),
                "status" => status.to_string()
            )
            .increment(1);
        });
    }

    /// Folds buffered histogram samples into their buckets. Without this,
    /// samples are only drained when `/metrics` is scraped.
    pub fn run_upkeep(&self) {
        self.handle.run_upkeep();
    }

    /// Calls [`MetricsRegistry::run_upkeep`] every `period` on the current
    /// runtime until the returned task is aborted.
    pub fn spawn_upkeep(&self, period: Duration) -> tokio::task::JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                registry.run_upkeep();
            }
        })
    }

    /// Text exposition of every series recorded so far.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}
