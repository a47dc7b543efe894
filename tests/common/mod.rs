//! Common test utilities for integration tests.
//!
//! Spawns the real router on an ephemeral port. Database access goes
//! through [`FakeSessions`] unless a test supplies its own provider.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use reqwest::Client;
use serde_json::Value;
use tokio::net::TcpListener;
use tracing_subscriber::fmt::MakeWriter;

use loan_service::{
    create_router,
    db::{PoolStatus, Session},
    error::SessionError,
    ApiRoutes, AppState, MetricsRegistry, SessionProvider,
};

/// Size of the pretend pool behind [`FakeSessions`].
const FAKE_POOL_SIZE: u32 = 4;

/// A test application instance with its own HTTP client and base URL.
pub struct TestApp {
    pub client: Client,
    pub base_url: String,
}

impl TestApp {
    /// Spawns the service backed by a healthy fake database.
    pub async fn spawn() -> Self {
        Self::spawn_with(FakeSessions::healthy(), ApiRoutes::default()).await
    }

    pub async fn spawn_with(sessions: Arc<dyn SessionProvider>, api: ApiRoutes) -> Self {
        let state = AppState {
            sessions,
            metrics: MetricsRegistry::new().expect("Failed to build metrics registry"),
        };
        let app = create_router(state, api);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test server");
        let addr = listener.local_addr().expect("Failed to read local address");

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        Self {
            client: Client::new(),
            base_url: format!("http://{}", addr),
        }
    }

    /// Makes an unauthenticated GET request.
    pub async fn get_public(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("Failed to send GET request")
    }

    /// Makes an unauthenticated POST request with an empty body.
    pub async fn post_public(&self, path: &str) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("Failed to send POST request")
    }

    /// Scrapes `/metrics` and returns the body.
    pub async fn scrape(&self) -> String {
        self.get_public("/metrics")
            .await
            .text()
            .await
            .expect("Failed to read metrics body")
    }
}

/// Value of the first sample line for `metric` carrying every label in `labels`.
pub fn sample(rendered: &str, metric: &str, labels: &[&str]) -> Option<f64> {
    rendered
        .lines()
        .filter(|line| line.starts_with(&format!("{metric}{{")))
        .find(|line| labels.iter().all(|l| line.contains(l)))
        .and_then(|line| line.rsplit(' ').next())
        .and_then(|v| v.parse().ok())
}

/// In-memory stand-in for the database pool.
///
/// Tracks how many sessions are open right now and how many were ever
/// opened, so tests can check that every session is handed back.
pub struct FakeSessions {
    refuse: Mutex<Option<String>>,
    fail_queries: Mutex<Option<String>>,
    open: AtomicU32,
    opened: AtomicU32,
}

struct FakeSession<'a> {
    owner: &'a FakeSessions,
}

impl Session for FakeSession<'_> {
    fn execute(&mut self, _statement: &str) -> Result<usize, SessionError> {
        match self.owner.fail_queries.lock().unwrap().clone() {
            Some(message) => Err(SessionError::Unavailable(message)),
            None => Ok(1),
        }
    }
}

impl Drop for FakeSession<'_> {
    fn drop(&mut self) {
        self.owner.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeSessions {
    pub fn healthy() -> Arc<Self> {
        Arc::new(Self {
            refuse: Mutex::new(None),
            fail_queries: Mutex::new(None),
            open: AtomicU32::new(0),
            opened: AtomicU32::new(0),
        })
    }

    /// Every session opens, but every statement fails.
    pub fn failing_queries(message: &str) -> Arc<Self> {
        let sessions = Self::healthy();
        sessions.set_query_failure(Some(message));
        sessions
    }

    /// No session can be opened at all.
    pub fn refusing(message: &str) -> Arc<Self> {
        let sessions = Self::healthy();
        *sessions.refuse.lock().unwrap() = Some(message.to_string());
        sessions
    }

    pub fn set_query_failure(&self, message: Option<&str>) {
        *self.fail_queries.lock().unwrap() = message.map(str::to_string);
    }

    pub fn opened(&self) -> u32 {
        self.opened.load(Ordering::SeqCst)
    }
}

impl SessionProvider for FakeSessions {
    fn with_session(
        &self,
        work: &mut dyn FnMut(&mut dyn Session) -> Result<(), SessionError>,
    ) -> Result<(), SessionError> {
        if let Some(message) = self.refuse.lock().unwrap().clone() {
            return Err(SessionError::Unavailable(message));
        }

        self.open.fetch_add(1, Ordering::SeqCst);
        self.opened.fetch_add(1, Ordering::SeqCst);
        let mut session = FakeSession { owner: self };
        work(&mut session)
    }

    fn status(&self) -> PoolStatus {
        let open = self.open.load(Ordering::SeqCst);
        PoolStatus {
            connections: FAKE_POOL_SIZE,
            idle: FAKE_POOL_SIZE.saturating_sub(open),
        }
    }
}

/// Collects JSON log output in memory.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl CapturedLogs {
    /// Installs a JSON subscriber writing here for the current thread.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .json()
            .flatten_event(true)
            .with_writer(self.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Per-request access log lines.
    pub fn request_lines(&self) -> Vec<Value> {
        let buf = self.0.lock().unwrap();
        String::from_utf8_lossy(&buf)
            .lines()
            .filter_map(|line| serde_json::from_str::<Value>(line).ok())
            .filter(|line| line["message"] == "request")
            .collect()
    }
}

/// Asserts that a response has a specific status code.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $expected:expr) => {
        assert_eq!(
            $response.status().as_u16(),
            $expected,
            "Expected status {}, got {}",
            $expected,
            $response.status()
        );
    };
}
