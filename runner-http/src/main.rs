use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ingest_core::Ingestor;
use ingest_core::config::{CONFIG_ENV_VAR, IngestConfig, StorageBackend, load_config};
use ingest_core::storage::{MemoryRecordStore, PgRecordStore, RecordStore};
use ingest_core::telemetry::init_tracing;
use runner_http::IngestServer;
use tokio::net::TcpListener;
use tracing::info;

/// CSV bulk-ingestion HTTP service.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// YAML config file. Falls back to the INGEST_CONFIG variable, then to defaults.
    #[arg(short, long, env = "INGEST_CONFIG_PATH")]
    config: Option<String>,

    /// Overrides storage.database_url.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Overrides server.listen_addr.
    #[arg(long)]
    listen_addr: Option<String>,
}

/// Entry point of the long-running ingestion server.
///
/// Loads config, sets up logging, connects the record store and serves
/// uploads until the process is stopped.
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = if args.config.is_some() || std::env::var_os(CONFIG_ENV_VAR).is_some() {
        load_config(args.config.as_deref())
            .await
            .context("Failed to load config")?
    } else {
        IngestConfig::default()
    };
    if let Some(url) = args.database_url {
        config.storage.database_url = Some(url);
    }
    if let Some(addr) = args.listen_addr {
        config.server.listen_addr = addr;
    }

    init_tracing(config.server.log_file.as_deref())?;
    config.validate().context("Invalid config")?;

    let store: Arc<dyn RecordStore> = match config.storage.backend {
        StorageBackend::Postgres => {
            let store = PgRecordStore::connect(&config.storage)
                .await
                .context("Failed to connect to database")?;
            store
                .migrate()
                .await
                .context("Failed to create users table")?;
            Arc::new(store)
        }
        StorageBackend::Memory => Arc::new(MemoryRecordStore::new()),
    };

    let ingestor = Arc::new(Ingestor::new(store, config.processing.clone()));
    let app = IngestServer::new(
        ingestor,
        config.server.log_file.clone(),
        config.server.max_upload_bytes,
    )
    .into_router();

    let listener = TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.listen_addr))?;
    info!(
        listen_addr = %config.server.listen_addr,
        backend = ?config.storage.backend,
        "Starting server"
    );

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
