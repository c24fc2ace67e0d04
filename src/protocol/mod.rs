//! Wire message types.
//!
//! This module defines the message formats on both sides of the relay.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | [`FrameMessage`] | Client → Relay | One encoded sensor frame |
//! | [`Feedback`] | Relay → Client | Scored result of one frame |
//! | [`AnalysisRequest`] | Relay → Analysis service | Frame to score |
//! | [`AnalysisResponse`] | Analysis service → Relay | Detection result |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `analysis` | Analysis service request/response bodies |
//! | `feedback` | Outbound feedback and progress records |
//! | `frame` | Inbound frame envelope |

// ============================================================================
// Submodules
// ============================================================================

/// Analysis service request and response bodies.
pub mod analysis;

/// Outbound feedback messages.
pub mod feedback;

/// Inbound frame envelope.
pub mod frame;

// ============================================================================
// Re-exports
// ============================================================================

pub use analysis::{
    AnalysisRequest, AnalysisResponse, ExerciseInfo, ExerciseList, ServiceHealth, ServiceReply,
};
pub use feedback::{Feedback, FeedbackStatus, Progress};
pub use frame::FrameMessage;
