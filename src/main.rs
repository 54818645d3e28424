//! retailstore -- admin web application over Azure Storage.
//!
//! Storage resources are provisioned lazily on first use, so startup only
//! validates the configuration and builds one client per storage kind.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use retailstore::config::{Config, LoggingConfig};
use retailstore::storage::Backends;

/// Command-line arguments for the retailstore server.
#[derive(Parser, Debug)]
#[command(
    name = "retailstore",
    version,
    about = "Admin pages over Azure Table, Blob, File and Queue storage"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "retailstore.yaml")]
    config: String,

    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,
}

/// `RUST_LOG` wins; otherwise `logging.level` from the config file.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config: Config = retailstore::config::load_config(&cli.config)?;
    init_tracing(&config.logging);
    info!("Configuration loaded from {}", cli.config);

    if config.storage.connection_string.trim().is_empty() {
        anyhow::bail!(
            "no storage connection string: set storage.connection_string in {} or {}",
            cli.config,
            retailstore::config::CONNECTION_STRING_ENV
        );
    }

    let bind_addr = cli
        .bind
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));

    if config.observability.metrics {
        retailstore::metrics::init_metrics()?;
        retailstore::metrics::describe_metrics();
        info!("Prometheus metrics initialized");
    }

    let backends = Backends::azure(&config.storage.connection_string)?;
    info!(
        table = %config.storage.table_name,
        container = %config.storage.blob_container,
        share = %config.storage.file_share,
        queue = %config.storage.queue_name,
        "Azure storage clients ready"
    );

    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout);
    let state = Arc::new(retailstore::AppState::new(config, backends));
    let app = retailstore::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("retailstore listening on {}", bind_addr);

    // On SIGTERM/SIGINT stop accepting connections, then give in-flight
    // requests up to `shutdown_timeout` to finish.
    let (signalled_tx, signalled_rx) = tokio::sync::oneshot::channel::<()>();
    let server = async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                let _ = signalled_tx.send(());
            })
            .await
    };
    let deadline = async move {
        if signalled_rx.await.is_ok() {
            tokio::time::sleep(shutdown_timeout).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = server => result?,
        _ = deadline => warn!(
            "In-flight requests still running after {}s, exiting",
            shutdown_timeout.as_secs()
        ),
    }

    info!("retailstore shut down");
    Ok(())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        },
    }
}
