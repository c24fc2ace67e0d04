//! Relay handler: upgrade orchestration and frame translation.
//!
//! Sits between the transport layer and the analysis bridge:
//!
//! ```text
//!  FrameMessage ──► normalize_frame ──► AnalysisRequest ──► FrameAnalyzer
//!                                                               │
//!  Feedback ◄──────────── Feedback::from_analysis ◄─────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `handler` | [`RelayHandler`]: upgrade, register, spawn pumps, translate frames |
//! | `normalize` | Frame encoding normalization |

// ============================================================================
// Submodules
// ============================================================================

/// Upgrade orchestration and frame translation.
pub mod handler;

/// Frame encoding normalization.
pub mod normalize;

// ============================================================================
// Re-exports
// ============================================================================

pub use handler::RelayHandler;
pub use normalize::{is_base64_text, normalize_frame, pad_base64};
