//! Exercise relay - WebSocket bridge between camera clients and a hand-pose
//! analysis service.
//!
//! Clients stream camera frames over one WebSocket per exercise; each frame
//! is normalized, scored by the analysis service over HTTP and answered with
//! a feedback message on the same socket.
//!
//! # Architecture
//!
//! ```text
//! Client ──frame──► inbound pump ──► RelayHandler ──HTTP──► analysis service
//!   ▲                                     │
//!   └──feedback── outbound pump ◄── Outbox ◄┘
//! ```
//!
//! Key design principles:
//!
//! - Each connection runs two pumps: one reader, one writer
//! - Frames on one connection are scored one at a time, in arrival order
//! - The outbound queue is bounded; feedback is dropped, never blocked on
//! - Per-frame failures become error feedback and never close the socket
//! - A single hub task owns the set of live connections
//!
//! # Quick Start
//!
//! ```no_run
//! use exercise_relay::{RelayServer, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let server = RelayServer::builder()
//!         .bind("0.0.0.0:8080")
//!         .analysis_url("http://localhost:5001")
//!         .build()
//!         .await?;
//!
//!     println!("Stream frames to {}", server.ws_url(&"fist".into()));
//!
//!     tokio::signal::ctrl_c().await?;
//!     server.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bridge`] | Analysis service client behind [`FrameAnalyzer`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Client and analysis service message types |
//! | [`relay`] | Frame normalization and translation |
//! | [`server`] | Builder, options and running server |
//! | [`session`] | Exercise session registry |
//! | [`transport`] | WebSocket transport layer |

// ============================================================================
// Modules
// ============================================================================

/// Analysis service client.
///
/// [`BridgeClient`] talks HTTP; anything implementing [`FrameAnalyzer`] can
/// stand in for it.
pub mod bridge;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Message types for clients and the analysis service.
pub mod protocol;

/// Frame normalization and per-frame translation.
pub mod relay;

/// Relay server assembly.
///
/// Use [`RelayServer::builder()`] to configure and start a server.
pub mod server;

/// Exercise session tracking.
pub mod session;

/// WebSocket transport layer.
///
/// Routed upgrade, connection pumps, hub and accept loop.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Bridge types
pub use bridge::{BridgeClient, FrameAnalyzer};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ConnectionId, ExerciseId, SessionId, UserId};

// Protocol types
pub use protocol::{
    AnalysisRequest, AnalysisResponse, Feedback, FeedbackStatus, FrameMessage, Progress,
};

// Relay types
pub use relay::RelayHandler;

// Server types
pub use server::{RelayBuilder, RelayOptions, RelayServer};

// Session types
pub use session::{ExerciseSession, SessionRegistry};

// Transport types
pub use transport::{ConnectionInfo, Hub};
