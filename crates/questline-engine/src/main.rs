//! Questline binary.
//!
//! Wires the progress engine to its storage and HTTP surface: loads
//! configuration, opens the local store, connects the remote store when
//! one is configured, activates the learner's session, and serves the
//! progress API until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `questline-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Open the local store under `storage.data_dir`
//! 4. Select the remote store (a lazy `PostgreSQL` pool, if configured)
//! 5. Resolve the learner account
//! 6. Activate the session from the local copy
//! 7. Apply the remote schema in the background
//! 8. Serve the progress API
//! 9. On shutdown, flush pending progress remotely and deactivate

mod account;
mod error;
mod remote;

use std::path::PathBuf;
use std::sync::Arc;

use questline_core::clock::SystemClock;
use questline_core::config::{EngineConfig, LoggingConfig};
use questline_db::{LocalStore, RemoteBackend};
use questline_server::{AppState, ServerConfig};
use questline_sync::{Session, SessionDeps};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

const DEFAULT_CONFIG_PATH: &str = "questline-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any initialization step or the server fails.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    let config = load_config()?;
    init_logging(&config.logging);
    info!(
        utc_offset_minutes = config.clock.utc_offset_minutes,
        debounce_ms = config.sync.debounce_ms,
        tick_interval_ms = config.economy.tick_interval_ms,
        "Configuration loaded"
    );

    let store = LocalStore::open(&config.storage.data_dir)?;
    info!(data_dir = %config.storage.data_dir.display(), "Local store opened");

    let remote = remote::select(&config.infrastructure);
    info!(remote = remote.kind(), "Remote store selected");

    let account = account::resolve(&config.account, &config.storage.data_dir)?;
    let deps = SessionDeps {
        store,
        remote: remote.clone(),
        clock: Arc::new(SystemClock),
        config: config.clone(),
    };
    let session = Arc::new(Session::activate(account, deps).await?);
    for event in session.startup_events() {
        info!(user_id = %account.id, ?event, "Startup event");
    }
    let _migrations = remote::spawn_migrations(&remote);

    let server_config = ServerConfig {
        host: String::from("0.0.0.0"),
        port: config.infrastructure.server_port,
    };
    let state = Arc::new(AppState::new(Arc::clone(&session)));
    questline_server::start_server(&server_config, state, shutdown_signal()).await?;

    if let Err(e) = session.flush().await {
        warn!(error = %e, "Final remote flush failed; local copy is current");
    }
    session.deactivate().await;
    if let RemoteBackend::Postgres(pool) = &remote {
        pool.close().await;
    }

    info!(user_id = %account.id, "questline-engine shutdown complete");
    Ok(())
}

/// Load configuration from `QUESTLINE_CONFIG` or `questline-config.yaml`.
///
/// A missing file means defaults, still subject to environment overrides.
fn load_config() -> Result<EngineConfig, EngineError> {
    let path = std::env::var("QUESTLINE_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    if path.exists() {
        Ok(EngineConfig::from_file(&path)?)
    } else {
        let mut config = EngineConfig::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `logging.level`.
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Resolve when `Ctrl-C` is received.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!(error = %e, "Failed to listen for shutdown signal"),
    }
}
