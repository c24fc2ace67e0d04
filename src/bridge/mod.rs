//! Analysis service bridge.
//!
//! The relay never scores frames itself. Each normalized frame is handed to
//! a [`FrameAnalyzer`], whose production implementation is [`BridgeClient`]
//! talking HTTP to the external analysis service.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `client` | `reqwest`-backed [`BridgeClient`] |

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;

use crate::error::Result;
use crate::protocol::{AnalysisRequest, AnalysisResponse};

// ============================================================================
// Submodules
// ============================================================================

/// HTTP client for the analysis service.
pub mod client;

// ============================================================================
// Re-exports
// ============================================================================

pub use client::BridgeClient;

// ============================================================================
// FrameAnalyzer
// ============================================================================

/// Scores one frame.
///
/// Implementations must be cheap to share: the relay holds one instance
/// behind an `Arc` and calls it concurrently from every inbound pump.
#[async_trait]
pub trait FrameAnalyzer: Send + Sync {
    /// Scores a normalized frame.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::AnalysisTransport`] on network failure or timeout
    /// - [`crate::Error::AnalysisStatus`] on a non-success status
    /// - [`crate::Error::AnalysisDecode`] if the reply cannot be decoded
    async fn process_frame(&self, request: &AnalysisRequest) -> Result<AnalysisResponse>;
}
