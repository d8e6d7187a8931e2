//! User service (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────┐
//!                        │                   USER SERVICE                    │
//!                        │                                                   │
//!   Client Request       │  ┌─────────┐   ┌──────────────────────────────┐   │
//!   ─────────────────────┼─▶│   net   │──▶│ [route] → http pipeline      │   │
//!                        │  │listener │   │ observe → metrics → capture  │   │
//!                        │  └─────────┘   │   → admission (/api)         │   │
//!                        │                └──────────────┬───────────────┘   │
//!                        │                               ▼                   │
//!   Client Response      │                ┌──────────────────────────────┐   │
//!   ◀────────────────────┼────────────────│ handlers → store (UserStore) │   │
//!                        │                └──────────────────────────────┘   │
//!                        │                                                   │
//!                        │  config · observability · lifecycle (signals,     │
//!                        │  Starting → Serving → Draining → Stopped)         │
//!                        └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use user_service::config::load_config;
use user_service::http::{AppState, HttpServer};
use user_service::lifecycle::{ShutdownOutcome, TerminationSignals};
use user_service::observability::init_logging;
use user_service::store::MemoryStore;

#[derive(Parser, Debug)]
#[command(name = "user-service", version, about = "User CRUD HTTP service")]
struct Cli {
    /// Optional TOML configuration file; environment variables override it.
    #[arg(short, long, env = "CONFIG_PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let _log_guard = init_logging(&config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address(),
        max_connections = config.listener.max_connections,
        rate_limit_rps = config.rate_limit.requests_per_second,
        rate_limit_burst = config.rate_limit.burst_size,
        request_timeout_secs = config.timeouts.request_secs,
        shutdown_timeout_secs = config.timeouts.shutdown_secs,
        database = ?config.database,
        "Configuration loaded"
    );

    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(&config, store)?;
    let shutdown_timeout = config.timeouts.shutdown();

    let mut signals = TerminationSignals::register()?;
    let server = HttpServer::new(config, state).start().await?;

    signals.recv().await;

    // A second signal while draining skips the rest of the deadline.
    let second_signal = async move {
        signals.recv().await;
    };
    match server.shutdown_or_force(shutdown_timeout, second_signal).await {
        ShutdownOutcome::Graceful => tracing::info!("Shutdown complete"),
        ShutdownOutcome::Forced { abandoned } => {
            tracing::warn!(abandoned, "Shutdown complete with abandoned connections")
        }
    }

    Ok(())
}
