//! SPF Ingress Worker
//!
//! Processes ingress tasks from the SQS queue:
//! 1. Receives a task message
//! 2. Runs its pipeline (upload, register content, make package, retrieve)
//! 3. Records the outcome in the event ledger
//! 4. Deletes the message, or leaves it for redelivery

use std::net::SocketAddr;
use std::sync::Arc;

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use spf_common::{
    config::AppConfig,
    db::{DbPool, Repository},
    metrics::{register_metrics, METRICS_PREFIX, PIPELINE_BUCKETS},
    queue::Queue,
    storage::S3Storage,
    VERSION,
};
use spf_ingress::package::HttpPackageBuilder;
use spf_ingress::{Pipelines, Worker};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

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

    info!(service = %config.observability.service_name, "Starting SPF Ingress Worker v{}", VERSION);

    // Initialize metrics
    if config.observability.metrics_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .set_buckets_for_metric(
                Matcher::Prefix(format!("{METRICS_PREFIX}_pipeline")),
                PIPELINE_BUCKETS,
            )?
            .install()?;
        register_metrics();
        info!(%addr, "Metrics exporter listening");
    }

    // Object storage; missing credentials are fatal
    config.storage.validate()?;
    let storage = Arc::new(S3Storage::new(&config.storage)?);

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;
    db.migrate().await?;
    let store = Arc::new(Repository::new(db));

    let builder = Arc::new(HttpPackageBuilder::new(config.storage.timeout() * 10)?);
    let pipelines = Pipelines::new(store, storage, builder, &config.ingress);

    info!("Connecting to task queue...");
    let queue = Arc::new(Queue::new(&config.queue).await?);

    let worker = Worker::new(queue, pipelines, config.queue.max_receive_count);
    info!("Ingress worker ready, starting queue polling...");
    worker.run(shutdown_signal()).await;

    info!("Ingress worker shutting down");
    Ok(())
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
