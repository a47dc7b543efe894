//! Request logging and metrics middleware.
//!
//! Runs around every route, the fallback included. One log line and one
//! metric sample are produced per request; the response passes through
//! untouched.

use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, MatchedPath, Request, State},
    http::{header, Method, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::{info, warn};

use crate::telemetry::MetricsRegistry;

/// Endpoint label used when no route matched, keeping label cardinality
/// bounded by the route table.
pub const UNKNOWN_ENDPOINT: &str = "unknown";

struct RequestContext {
    start: Instant,
    method: Method,
    url: String,
    endpoint: String,
    remote_addr: Option<SocketAddr>,
}

impl RequestContext {
    fn begin(request: &Request) -> Self {
        Self {
            start: Instant::now(),
            method: request.method().clone(),
            url: full_url(request),
            endpoint: endpoint_label(request.extensions().get::<MatchedPath>()),
            remote_addr: request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
        }
    }

    fn finish(self, status: StatusCode, metrics: &MetricsRegistry) {
        let latency = self.start.elapsed();
        let remote_addr = self
            .remote_addr
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "-".to_string());

        contained("log", || {
            info!(
                method = %self.method,
                url = %self.url,
                status = status.as_u16(),
                remote_addr = %remote_addr,
                "request"
            );
        });

        contained("metrics", || {
            metrics.record_request(
                self.method.as_str(),
                &self.endpoint,
                status.as_u16(),
                latency,
            );
        });
    }
}

pub async fn instrumentation_middleware(
    State(metrics): State<MetricsRegistry>,
    request: Request,
    next: Next,
) -> Response {
    let context = RequestContext::begin(&request);

    let response = next.run(request).await;

    context.finish(response.status(), &metrics);
    response
}

fn endpoint_label(matched: Option<&MatchedPath>) -> String {
    matched
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNKNOWN_ENDPOINT.to_string())
}

/// Scheme, host, path and query of the request as the client addressed it.
fn full_url(request: &Request) -> String {
    let uri = request.uri();
    if uri.scheme().is_some() {
        return uri.to_string();
    }

    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .unwrap_or("localhost");
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    format!("http://{host}{path}")
}

/// Instrumentation must never fail the request it observes.
fn contained(stage: &str, record: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(record)).is_err() {
        warn!(stage, "Request instrumentation failed");
    }
}
