//! Relay server assembly.
//!
//! This module provides the main entry point: configure with
//! [`RelayBuilder`], run as a [`RelayServer`].
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`RelayServer`] | Running server: listener, hub, sessions |
//! | [`RelayBuilder`] | Fluent configuration builder |
//! | [`RelayOptions`] | Queue, deadline and routing options |
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use exercise_relay::{RelayOptions, RelayServer, Result};
//!
//! # async fn example() -> Result<()> {
//! let server = RelayServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .analysis_url("http://localhost:5001")
//!     .options(RelayOptions::new().with_analysis_timeout(Duration::from_secs(5)))
//!     .build()
//!     .await?;
//!
//! tokio::signal::ctrl_c().await?;
//! server.shutdown();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for relay configuration.
pub mod builder;

/// Running server.
pub mod core;

/// Relay tuning options.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::RelayBuilder;
pub use core::RelayServer;
pub use options::RelayOptions;
