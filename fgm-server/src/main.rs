//! fgm-server - focus-group manager backend
//!
//! Serves the questionnaire, setup wizard, admin and storage APIs over one
//! SQLite database inside the root folder.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use fgm_common::config::{self, RootFolderInitializer, RootFolderResolver, TomlConfig};
use fgm_common::db::init_database;
use fgm_server::storage::{LocalObjectStore, StorageClient};
use fgm_server::{build_router, AppState};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const MODULE_NAME: &str = "fgm-server";

/// Command-line arguments for fgm-server
#[derive(Parser, Debug)]
#[command(name = "fgm-server")]
#[command(about = "Focus-group manager backend")]
#[command(version)]
struct Args {
    /// Root folder holding the database and stored objects
    #[arg(short, long, env = config::ROOT_FOLDER_ENV)]
    root_folder: Option<PathBuf>,

    /// Port to listen on (overrides the config file)
    #[arg(short, long, env = "FGM_PORT")]
    port: Option<u16>,

    /// Config file (default: ~/.config/fgm/fgm-server.toml, then /etc/fgm/fgm-server.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn init_tracing(config: &TomlConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let file_layer = match &config.logging.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = config::load_or_default(args.config.as_deref(), MODULE_NAME);
    init_tracing(&config)?;

    info!(
        "Starting focus-group manager ({}) v{}",
        MODULE_NAME,
        env!("CARGO_PKG_VERSION")
    );

    let root_folder = RootFolderResolver::new()
        .with_cli_arg(args.root_folder)
        .with_toml(&config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to prepare root folder")?;
    info!("Root folder: {}", initializer.root_folder().display());

    let db_path = initializer.database_path();
    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    info!("Database ready: {}", db_path.display());

    let host = config.server.host.clone();
    let port = args.port.unwrap_or(config.server.port);

    let storage_root = initializer.storage_path();
    let public_base_url = config
        .storage
        .public_base_url
        .clone()
        .unwrap_or_else(|| format!("http://{}:{}/files", host, port));
    let storage = StorageClient::new(
        Arc::new(LocalObjectStore::new(&storage_root)),
        config.storage.bucket.clone(),
        public_base_url,
        config.storage.max_upload_bytes,
    );
    info!(
        "Object storage: bucket '{}' under {} (limit {} bytes)",
        storage.bucket(),
        storage_root.display(),
        storage.max_upload_bytes()
    );

    let api_token = config.auth.resolve_token();
    if api_token.is_none() {
        warn!("No API token configured - authentication disabled");
    }

    let state = AppState::new(pool, storage, storage_root, api_token.as_deref());
    let app = build_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("fgm-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
