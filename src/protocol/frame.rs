//! Inbound frame envelope.
//!
//! Clients send one JSON object per WebSocket message:
//!
//! ```json
//! {
//!   "frame": "<base64 image>",
//!   "exercise_type": "fist"
//! }
//! ```
//!
//! `exercise_type` is optional and overrides the exercise bound to the
//! connection for that frame only. This is the only accepted envelope; bare
//! binary frames without the JSON wrapper are rejected as malformed.

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::identifiers::ExerciseId;

// ============================================================================
// Wire Shape
// ============================================================================

/// Raw envelope as it arrives; every field optional so missing ones can be
/// reported precisely.
#[derive(Debug, Deserialize)]
struct RawFrameMessage {
    #[serde(default)]
    frame: Option<String>,
    #[serde(default)]
    exercise_type: Option<String>,
}

// ============================================================================
// FrameMessage
// ============================================================================

/// A validated inbound frame message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameMessage {
    /// Encoded frame exactly as the client sent it (not yet normalized).
    pub frame: String,

    /// Optional per-frame exercise override.
    pub exercise_type: Option<ExerciseId>,
}

impl FrameMessage {
    /// Parses a client message payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedMessage`] if the payload is not a JSON object
    /// or the `frame` field is missing, empty or whitespace only.
    pub fn parse(payload: &[u8]) -> Result<Self> {
        let raw: RawFrameMessage = serde_json::from_slice(payload)
            .map_err(|e| Error::malformed(format!("invalid JSON envelope: {e}")))?;

        let frame = raw
            .frame
            .filter(|f| !f.trim().is_empty())
            .ok_or_else(|| Error::malformed("missing 'frame' field"))?;

        let exercise_type = raw
            .exercise_type
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .map(ExerciseId::from);

        Ok(Self {
            frame,
            exercise_type,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
