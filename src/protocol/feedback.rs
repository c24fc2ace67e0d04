//! Outbound feedback messages.
//!
//! One [`Feedback`] is produced per inbound frame, either from a decoded
//! analysis reply or as an inline error.
//!
//! # Format
//!
//! ```json
//! {
//!   "fist_detected": false,
//!   "hand_detected": true,
//!   "raised_fingers": 3,
//!   "finger_states": [false, true, true, true, false],
//!   "message": "ok",
//!   "processed_frame": "<base64 jpeg>",
//!   "current_exercise": "fist",
//!   "exercise_name": "Fist",
//!   "structured": { "step": 2, "step_name": "Hold", "countdown": 3, ... },
//!   "status": "success",
//!   "timestamp": 1700000000
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::identifiers::ExerciseId;

use super::analysis::AnalysisResponse;

// ============================================================================
// FeedbackStatus
// ============================================================================

/// Outcome marker carried by every feedback message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackStatus {
    /// Frame was scored.
    Success,
    /// Frame could not be scored; `error` explains why.
    Error,
}

// ============================================================================
// Progress
// ============================================================================

/// Structured progress record for multi-step exercises.
///
/// The analysis service has used two spellings for several fields; the
/// alternates are accepted on input and the canonical names are emitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Current step number.
    #[serde(default)]
    pub step: u32,

    /// Human-readable step name.
    #[serde(default, alias = "state_name")]
    pub step_name: String,

    /// Seconds left while holding a pose.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub countdown: Option<u32>,

    /// Completion of the current step.
    #[serde(default, alias = "progress_percent")]
    pub progress: f64,

    /// Current repetition cycle.
    #[serde(default, alias = "current_cycle")]
    pub cycle: u32,

    /// Total repetition cycles.
    #[serde(default)]
    pub total_cycles: u32,

    /// Step status text.
    #[serde(default)]
    pub status: String,
}

// ============================================================================
// Feedback
// ============================================================================

/// Scored result of one frame, sent back to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    /// Fist pose detected.
    pub fist_detected: bool,

    /// Any hand detected.
    pub hand_detected: bool,

    /// Number of raised fingers.
    pub raised_fingers: u32,

    /// Per-finger raised flags, thumb first.
    #[serde(default)]
    pub finger_states: Vec<bool>,

    /// Human-readable status line.
    pub message: String,

    /// Annotated frame, base64 JPEG.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub processed_frame: String,

    /// Exercise the frame was scored against.
    pub current_exercise: ExerciseId,

    /// Display name of that exercise.
    #[serde(default)]
    pub exercise_name: String,

    /// Multi-step progress, when the exercise has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured: Option<Progress>,

    /// Success or error marker.
    pub status: FeedbackStatus,

    /// Error detail when `status` is `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Unix timestamp (seconds) when the feedback was produced.
    pub timestamp: i64,
}

impl Feedback {
    /// Builds feedback from a decoded analysis reply.
    ///
    /// `exercise` is used when the service does not echo one back. A reply
    /// flagged as an error by the service becomes error feedback that still
    /// carries whatever detection fields it had.
    #[must_use]
    pub fn from_analysis(response: AnalysisResponse, exercise: &ExerciseId) -> Self {
        let failed = response.is_error();
        let error = if failed {
            Some(
                response
                    .error
                    .clone()
                    .unwrap_or_else(|| response.message.clone()),
            )
        } else {
            None
        };

        Self {
            fist_detected: response.fist_detected,
            hand_detected: response.hand_detected,
            raised_fingers: response.raised_fingers,
            finger_states: response.finger_states,
            message: response.message,
            processed_frame: response.processed_frame,
            current_exercise: response
                .current_exercise
                .unwrap_or_else(|| exercise.clone()),
            exercise_name: response.exercise_name.unwrap_or_default(),
            structured: response.structured,
            status: if failed {
                FeedbackStatus::Error
            } else {
                FeedbackStatus::Success
            },
            error,
            timestamp: now_unix(),
        }
    }

    /// Builds inline error feedback for a frame that could not be scored.
    #[must_use]
    pub fn error(exercise: &ExerciseId, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self {
            fist_detected: false,
            hand_detected: false,
            raised_fingers: 0,
            finger_states: Vec::new(),
            message: detail.clone(),
            processed_frame: String::new(),
            current_exercise: exercise.clone(),
            exercise_name: String::new(),
            structured: None,
            status: FeedbackStatus::Error,
            error: Some(detail),
            timestamp: now_unix(),
        }
    }

    /// Returns `true` if this is error feedback.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status == FeedbackStatus::Error
    }

    /// Serializes to the JSON text sent over the socket.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[inline]
fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}

// ============================================================================
// Tests
// ============================================================================
