//! Error types for the exercise relay.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use exercise_relay::{Result, Error};
//!
//! async fn example(bridge: &BridgeClient, request: &AnalysisRequest) -> Result<()> {
//!     let response = bridge.process_frame(request).await?;
//!     println!("{}", response.message);
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidUrl`] |
//! | Upgrade | [`Error::Upgrade`], [`Error::UnknownRoute`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::Timeout`] |
//! | Client input | [`Error::MalformedMessage`] |
//! | Analysis service | [`Error::AnalysisTransport`], [`Error::AnalysisStatus`], [`Error::AnalysisDecode`] |
//! | Sessions | [`Error::SessionNotFound`], [`Error::SessionAlreadyStopped`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::SessionId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when relay configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Analysis service URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ========================================================================
    // Upgrade Errors
    // ========================================================================
    /// WebSocket protocol upgrade failed.
    ///
    /// Fatal for that connection attempt; never retried.
    #[error("Upgrade failed: {message}")]
    Upgrade {
        /// Description of the upgrade failure.
        message: String,
    },

    /// Upgrade request targeted a path that is not an exercise stream.
    #[error("Unknown route: {path}")]
    UnknownRoute {
        /// The requested path.
        path: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Persistent connection failure.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection closed by the peer or by the relay.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Operation deadline exceeded.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Client Input Errors
    // ========================================================================
    /// Inbound client message could not be used.
    ///
    /// Answered with an inline error feedback; the connection stays open.
    #[error("Malformed message: {message}")]
    MalformedMessage {
        /// What was wrong with the message.
        message: String,
    },

    // ========================================================================
    // Analysis Service Errors
    // ========================================================================
    /// Network failure or timeout talking to the analysis service.
    #[error("Analysis service unreachable: {message}")]
    AnalysisTransport {
        /// Description of the transport failure.
        message: String,
        /// Whether the request exceeded its deadline.
        timed_out: bool,
    },

    /// Analysis service answered with a non-success status.
    #[error("Analysis service returned {status}: {body}")]
    AnalysisStatus {
        /// HTTP status code.
        status: u16,
        /// Response body, kept as detail.
        body: String,
    },

    /// Analysis service reply body could not be decoded.
    #[error("Analysis response decode failed: {message}")]
    AnalysisDecode {
        /// Description of the decode failure.
        message: String,
    },

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// Exercise session not found.
    #[error("Session not found: {session_id}")]
    SessionNotFound {
        /// The missing session ID.
        session_id: SessionId,
    },

    /// Exercise session was already stopped.
    #[error("Session already stopped: {session_id}")]
    SessionAlreadyStopped {
        /// The stopped session ID.
        session_id: SessionId,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an upgrade error.
    #[inline]
    pub fn upgrade(message: impl Into<String>) -> Self {
        Self::Upgrade {
            message: message.into(),
        }
    }

    /// Creates an unknown route error.
    #[inline]
    pub fn unknown_route(path: impl Into<String>) -> Self {
        Self::UnknownRoute { path: path.into() }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Creates a malformed message error.
    #[inline]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedMessage {
            message: message.into(),
        }
    }

    /// Creates an analysis transport error.
    #[inline]
    pub fn analysis_transport(message: impl Into<String>, timed_out: bool) -> Self {
        Self::AnalysisTransport {
            message: message.into(),
            timed_out,
        }
    }

    /// Creates an analysis status error.
    #[inline]
    pub fn analysis_status(status: u16, body: impl Into<String>) -> Self {
        Self::AnalysisStatus {
            status,
            body: body.into(),
        }
    }

    /// Creates an analysis decode error.
    #[inline]
    pub fn analysis_decode(message: impl Into<String>) -> Self {
        Self::AnalysisDecode {
            message: message.into(),
        }
    }

    /// Creates a session not found error.
    #[inline]
    pub fn session_not_found(session_id: SessionId) -> Self {
        Self::SessionNotFound { session_id }
    }

    /// Creates a session already stopped error.
    #[inline]
    pub fn session_already_stopped(session_id: SessionId) -> Self {
        Self::SessionAlreadyStopped { session_id }
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::analysis_decode(err.to_string())
        } else {
            Self::analysis_transport(err.to_string(), err.is_timeout())
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::AnalysisTransport {
                    timed_out: true,
                    ..
                }
        )
    }

    /// Returns `true` if this error came from the analysis service.
    #[inline]
    #[must_use]
    pub fn is_analysis_error(&self) -> bool {
        matches!(
            self,
            Self::AnalysisTransport { .. } | Self::AnalysisStatus { .. } | Self::AnalysisDecode { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionClosed | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors affect one frame only; the stream keeps going.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.is_analysis_error() || matches!(self, Self::MalformedMessage { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
