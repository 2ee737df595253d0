//! Beacon Binary Entry Point
//!
//! Runs one telemetry cycle: collect the cluster snapshot, deliver it, and
//! exit. Scheduling repeated cycles is left to the environment (cron,
//! CronJob, systemd timer).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use beacon::report::DEFAULT_RETENTION;
use beacon::{
    CloudReport, CollectorRegistry, DeliveryClient, FsRecordStore, HttpClusterReader, LocalReport,
    Report, Telemetry,
};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Beacon - Cluster Telemetry Reporter
#[derive(Parser, Debug)]
#[command(name = "beacon", version, about, long_about = None)]
struct Cli {
    /// Remote telemetry base URL (empty: save snapshots locally)
    #[arg(long, env = "TELEMETRY_CLOUD_URL", default_value = "")]
    url: String,

    /// Reporter identity sent with every remote delivery
    #[arg(long = "cloud-id", env = "TELEMETRY_CLOUD_ID", default_value = "")]
    cloud_id: String,

    /// How long snapshot history is retained before pruning
    #[arg(
        long,
        env = "TELEMETRY_HISTORY_RETENTION",
        default_value = "365days",
        value_parser = humantime::parse_duration
    )]
    history_retention: Duration,

    /// Base URL of the cluster-state API
    #[arg(long, env = "TELEMETRY_API_URL", default_value = "http://127.0.0.1:9090")]
    api_url: String,

    /// Bearer token for the cluster-state API
    #[arg(long, env = "TELEMETRY_API_TOKEN")]
    api_token: Option<String>,

    /// Directory holding durable snapshot records
    #[arg(long, env = "TELEMETRY_STATE_DIR", default_value = ".telemetry")]
    state_dir: PathBuf,

    /// Directory local snapshot artifacts are written to
    #[arg(long, env = "TELEMETRY_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,beacon=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let report: Arc<dyn Report> = if cli.url.is_empty() {
        tracing::info!(dir = %cli.output_dir.display(), "Using local report sink");
        Arc::new(LocalReport::new(cli.output_dir))
    } else {
        tracing::info!(url = %cli.url, "Using cloud report sink");
        let retention = if cli.history_retention.is_zero() {
            DEFAULT_RETENTION
        } else {
            cli.history_retention
        };
        Arc::new(CloudReport::new(
            Arc::new(FsRecordStore::new(cli.state_dir)),
            DeliveryClient::new()?,
            cli.url,
            cli.cloud_id,
            retention,
        ))
    };

    let reader = Arc::new(HttpClusterReader::new(cli.api_url, cli.api_token)?);
    let registry = CollectorRegistry::with_defaults();
    tracing::info!(collectors = registry.len(), "Starting collection cycle");

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    Telemetry::new(registry, reader, report).run(&cancel).await?;

    tracing::info!("Collection cycle complete");
    Ok(())
}

/// Cancel the cycle on Ctrl+C or SIGTERM.
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }

    cancel.cancel();
}
