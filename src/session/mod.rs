//! Exercise session tracking.
//!
//! A session records that a user started an exercise and, once stopped,
//! how long it lasted. Sessions are independent of WebSocket connections:
//! a client may reconnect several times within one session.
//!
//! # Example
//!
//! ```
//! use exercise_relay::SessionRegistry;
//!
//! let registry = SessionRegistry::new();
//! let session = registry.start("alice", "fist");
//! let stopped = registry.stop(session.id).unwrap();
//! assert!(stopped.duration().is_some());
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Session store.
pub mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use registry::{ExerciseSession, SessionRegistry};
