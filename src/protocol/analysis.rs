//! Analysis service request and response bodies.
//!
//! The analysis service is consumed purely as a JSON request/response
//! contract. Its detection algorithm is opaque to the relay.
//!
//! # Endpoints
//!
//! | Method | Path | Request | Response |
//! |--------|------|---------|----------|
//! | `POST` | `/process` | [`AnalysisRequest`] | [`AnalysisResponse`] |
//! | `GET` | `/health` | - | [`ServiceHealth`] |
//! | `GET` | `/exercises` | - | [`ExerciseList`] |
//! | `POST` | `/set_exercise` | `{"exercise_id": ..}` | [`ServiceReply`] |
//! | `POST` | `/reset_exercise` | - | [`ServiceReply`] |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::ExerciseId;

use super::feedback::Progress;

// ============================================================================
// AnalysisRequest
// ============================================================================

/// Body of `POST /process`.
///
/// # Format
///
/// ```json
/// { "frame": "<normalized base64>", "exercise_type": "fist" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Normalized, padded base64 frame.
    pub frame: String,

    /// Exercise context for this frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exercise_type: Option<ExerciseId>,
}

impl AnalysisRequest {
    /// Creates a request for a normalized frame.
    #[inline]
    #[must_use]
    pub fn new(frame: impl Into<String>, exercise_type: Option<ExerciseId>) -> Self {
        Self {
            frame: frame.into(),
            exercise_type,
        }
    }
}

// ============================================================================
// AnalysisResponse
// ============================================================================

/// Body returned by `POST /process`.
///
/// Every field is optional on the wire; missing ones take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    /// Fist pose detected.
    #[serde(default)]
    pub fist_detected: bool,

    /// Any hand detected.
    #[serde(default)]
    pub hand_detected: bool,

    /// Number of raised fingers.
    #[serde(default)]
    pub raised_fingers: u32,

    /// Per-finger raised flags.
    #[serde(default)]
    pub finger_states: Vec<bool>,

    /// Human-readable status line.
    #[serde(default)]
    pub message: String,

    /// Annotated frame, base64 JPEG.
    #[serde(default)]
    pub processed_frame: String,

    /// Exercise the service scored against.
    #[serde(default)]
    pub current_exercise: Option<ExerciseId>,

    /// Display name of that exercise.
    #[serde(default)]
    pub exercise_name: Option<String>,

    /// Multi-step progress record.
    #[serde(default)]
    pub structured: Option<Progress>,

    /// `"success"` or `"error"`.
    #[serde(default)]
    pub status: String,

    /// Error detail reported by the service.
    #[serde(default)]
    pub error: Option<String>,
}

impl AnalysisResponse {
    /// Returns `true` if the service flagged this reply as a failure.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status.eq_ignore_ascii_case("error") || self.error.is_some()
    }
}

// ============================================================================
// Auxiliary Endpoints
// ============================================================================

/// One exercise known to the analysis service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseInfo {
    /// Exercise tag.
    pub id: ExerciseId,
    /// Display name.
    #[serde(default)]
    pub name: String,
}

/// Body of `GET /exercises`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExerciseList {
    /// Available exercises.
    #[serde(default)]
    pub exercises: Vec<ExerciseInfo>,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceHealth {
    /// `"ok"` when healthy.
    #[serde(default)]
    pub status: String,
    /// Exercise currently selected in the service.
    #[serde(default)]
    pub current_exercise: Option<ExerciseId>,
    /// Exercises the service can score.
    #[serde(default)]
    pub available_exercises: Vec<ExerciseInfo>,
}

impl ServiceHealth {
    /// Returns `true` if the service reports itself healthy.
    #[inline]
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}

/// Acknowledgement returned by the exercise control endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceReply {
    /// `"success"` or `"error"`.
    #[serde(default)]
    pub status: String,
    /// Optional detail.
    #[serde(default)]
    pub message: Option<String>,
    /// Exercise selected after the call.
    #[serde(default)]
    pub current_exercise: Option<ExerciseId>,
    /// Display name of that exercise.
    #[serde(default)]
    pub exercise_name: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================
