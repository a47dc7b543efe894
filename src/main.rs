use loan_service::{
    create_db_pool, create_router, init_tracing, ApiRoutes, AppState, Config, MetricsRegistry,
    PgSessionProvider,
};
use std::time::Duration;
use tracing::{error, info, warn};

const METRICS_UPKEEP_PERIOD: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {e}");
        std::process::exit(1);
    });

    init_tracing(&config);

    info!(
        service = "loan-service",
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.server.environment,
        "Starting server"
    );

    for issue in config.validate_for_production() {
        warn!(issue = %issue, "Configuration warning");
    }

    info!(
        database_url = %config.database.redacted_url(),
        max_connections = config.database.max_connections,
        "Connecting to database"
    );

    let db_pool = create_db_pool(&config.database);

    let metrics = MetricsRegistry::new().unwrap_or_else(|e| {
        error!(error = %e, "Failed to build metrics registry");
        std::process::exit(1);
    });

    let upkeep = metrics.spawn_upkeep(METRICS_UPKEEP_PERIOD);

    let state = AppState::new(PgSessionProvider::new(db_pool), metrics);
    let app = create_router(state, ApiRoutes::default());

    let http_addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&http_addr)
        .await
        .unwrap_or_else(|e| {
            error!(error = %e, address = %http_addr, "Failed to bind HTTP server");
            std::process::exit(1);
        });

    info!(http_address = %http_addr, "HTTP server ready");

    let result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    if let Err(e) = result {
        error!(error = %e, "HTTP server error");
    }

    upkeep.abort();

    info!("Server shutdown complete");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install CTRL+C signal handler");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
