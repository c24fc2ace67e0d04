//! `exercise-relay` binary.
//!
//! Configured through `RELAY_*` environment variables (see
//! [`RelayBuilder::from_env`]); log verbosity through `RUST_LOG`.

// ============================================================================
// Imports
// ============================================================================

use exercise_relay::{RelayBuilder, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging, honoring `RUST_LOG` when set.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let server = RelayBuilder::from_env()?.build().await?;

    if let Some(bridge) = server.bridge() {
        match bridge.health().await {
            Ok(health) => info!(
                status = %health.status,
                exercise = ?health.current_exercise,
                "Analysis service reachable"
            ),
            Err(e) => warn!(error = %e, "Analysis service not reachable yet"),
        }
    }

    info!(url = %server.ws_url(&"fist".into()), "Waiting for clients");

    tokio::signal::ctrl_c().await?;

    server.shutdown();
    info!("Relay stopped");

    Ok(())
}
