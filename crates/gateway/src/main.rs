//! SPF API Gateway
//!
//! HTTP front end of the ingress core.
//! Handles:
//! - Package uploads into the shared temporary directory
//! - Task dispatch to the ingress worker over the queue
//! - Inline package retrieval
//! - Event and ingress package listings
//! - Observability (logging, metrics)
//!
//! Authentication happens upstream; the acting user arrives in trusted
//! headers (see [`spf_common::auth`]).

mod handlers;
mod middleware;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use spf_common::{
    config::{AppConfig, IngressConfig},
    db::{DbPool, Repository},
    metrics::register_metrics,
    queue::{Queue, TaskQueue},
    storage::S3Storage,
};
use spf_ingress::package::HttpPackageBuilder;
use spf_ingress::Pipelines;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub ingress: Arc<IngressConfig>,
    /// Absent when running against an in-memory store
    pub db: Option<DbPool>,
    pub queue: Arc<dyn TaskQueue>,
    pub pipelines: Pipelines,
    pub body_limit: usize,
    pub request_timeout: Duration,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {e}");
        e
    })?;

    // Initialize tracing
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.observability.log_level))
        .with_target(true);
    if config.observability.json_logging {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!("Starting SPF API Gateway v{}", spf_common::VERSION);

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        register_metrics();
    }

    // Object storage; missing credentials are fatal
    config.storage.validate()?;
    let storage = Arc::new(S3Storage::new(&config.storage)?);

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    let store = Arc::new(Repository::new(db.clone()));

    info!("Connecting to task queue...");
    let queue = Arc::new(Queue::new(&config.queue).await?);

    tokio::fs::create_dir_all(&config.ingress.temp_dir).await?;

    let builder = Arc::new(HttpPackageBuilder::new(config.storage.timeout() * 10)?);
    let state = AppState {
        ingress: Arc::new(config.ingress.clone()),
        db: Some(db),
        queue,
        pipelines: Pipelines::new(store, storage, builder, &config.ingress),
        body_limit: config.server.body_limit_bytes,
        request_timeout: config.request_timeout(),
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let api_routes = Router::new()
        // Package endpoints
        .route("/packages", post(handlers::packages::upload_package))
        .route("/packages/register", post(handlers::packages::register_package))
        .route("/packages/{pid_v3}", get(handlers::packages::get_packages))
        .route("/packages/{pid_v3}/make", post(handlers::packages::make_package))
        // Ledger endpoints
        .route("/events", get(handlers::ledger::list_events))
        .route("/ingress-packages", get(handlers::ledger::list_ingress_packages))
        .route_layer(axum::middleware::from_fn(middleware::metrics::track_metrics));

    // Compose the app
    Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        .layer(DefaultBodyLimit::max(state.body_limit))
        .layer(TimeoutLayer::new(state.request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
