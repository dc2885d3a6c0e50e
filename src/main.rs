use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use calendar_store::{
    ArchivalWorker, EventStore, InMemoryEventStore, PgEventStore, PgStoreConfig,
    config::{AppConfig, StoreBackend},
};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(3);

/// Calendar event store daemon: keeps the store open and archives past
/// events on a fixed schedule.
#[derive(Debug, Parser)]
#[command(name = "calendar-store", version, about)]
struct Cli {
    /// Storage backend (memory or postgres); overrides STORE_BACKEND
    #[arg(long)]
    backend: Option<StoreBackend>,

    /// Seconds between archival runs; overrides ARCHIVE_PERIOD_SECS
    #[arg(long)]
    archive_period_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env().context("failed to load application configuration")?;
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(secs) = cli.archive_period_secs {
        config.archive_period = Duration::from_secs(secs);
    }

    let pg_store = match config.backend {
        StoreBackend::Memory => {
            info!("store backend: memory");
            None
        }
        StoreBackend::Postgres => {
            info!("store backend: postgres");
            let pg = connect_with_retry(&config.pg_store_config(), config.db_connect_attempts).await?;
            pg.migrate()
                .await
                .context("failed to apply event schema migrations")?;
            Some(pg)
        }
    };

    let store: Arc<dyn EventStore> = match &pg_store {
        Some(pg) => Arc::new(pg.clone()),
        None => Arc::new(InMemoryEventStore::new()),
    };

    let worker = ArchivalWorker::new(store, config.archival_config())
        .context("invalid archival schedule")?
        .spawn();

    shutdown_signal().await;
    info!("shutting down");

    worker.stop().await.context("archival worker did not stop cleanly")?;
    if let Some(pg) = pg_store {
        pg.close().await;
    }

    info!("calendar store stopped");
    Ok(())
}

async fn connect_with_retry(config: &PgStoreConfig, attempts: u32) -> Result<PgEventStore> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match PgEventStore::connect(config).await {
            Ok(store) => return Ok(store),
            Err(err) if attempt < attempts => {
                warn!(attempt, attempts, error = %err, "waiting for PostgreSQL");
                tokio::time::sleep(CONNECT_RETRY_DELAY).await;
                attempt += 1;
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to connect to PostgreSQL after {} attempts", attempts)
                });
            }
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("calendar_store=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "unable to install Ctrl+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "unable to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
