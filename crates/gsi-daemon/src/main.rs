//! GSI relay daemon.
//!
//! Receives game state pushes from a game client and logs every committed
//! update. Further listeners can be attached through the library crates.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `gsi-config.yaml` (or `$GSI_CONFIG`) and `GSI__*`
//! 2. Initialize structured logging (tracing)
//! 3. Build the ingest pipeline and register the update logger
//! 4. Bind the HTTP endpoint
//! 5. Serve until Ctrl-C, then stop the listener

mod update_log;

use gsi_core::config::LoggingConfig;
use gsi_core::{GsiConfig, LogFormat};
use gsi_server::GsiServer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::update_log::UpdateLogger;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the listen address
/// cannot be bound, or the signal handler cannot be installed.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GsiConfig::load()?;
    init_logging(&config.logging);

    info!(
        host = config.server.host,
        port = config.server.port,
        max_connections = config.server.max_connections,
        auth_tokens = config.filters.auth_tokens.len(),
        await_listeners = config.listeners.await_completion,
        "gsi-daemon starting"
    );

    let server = GsiServer::from_config(&config);
    server.pipeline().listeners().register(UpdateLogger);
    for filter in server.pipeline().filters().describe() {
        info!(filter, "acceptance filter active");
    }

    let addr = server.start().await?;
    info!(%addr, "ready for game state updates");

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    server.stop().await?;
    let stats = server.pipeline().stats().snapshot();
    info!(
        accepted = stats.accepted,
        rejected = stats.rejected,
        "gsi-daemon shutdown complete"
    );
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` overrides `logging.level`.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match logging.format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}
