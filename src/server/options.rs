//! Relay tuning options.
//!
//! Controls queue sizing, socket deadlines, the analysis call bound and
//! which exercise streams are accepted.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use exercise_relay::RelayOptions;
//!
//! let options = RelayOptions::new()
//!     .with_queue_capacity(64)
//!     .with_ping_interval(Duration::from_secs(15))
//!     .with_read_timeout(Duration::from_secs(45));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

use crate::bridge::client::DEFAULT_ANALYSIS_TIMEOUT;
use crate::error::{Error, Result};
use crate::identifiers::ExerciseId;
use crate::transport::PumpConfig;
use crate::transport::connection::{
    DEFAULT_PING_INTERVAL, DEFAULT_QUEUE_CAPACITY, DEFAULT_READ_TIMEOUT, DEFAULT_WRITE_TIMEOUT,
};

// ============================================================================
// Constants
// ============================================================================

/// Default largest accepted inbound message (16 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 << 20;

/// Exercise streams served out of the box.
pub const DEFAULT_EXERCISES: [&str; 3] = ["fist", "fist-index", "fist-palm"];

// ============================================================================
// RelayOptions
// ============================================================================

/// Relay configuration options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOptions {
    /// Outbound queue slots per connection.
    pub queue_capacity: usize,

    /// Bound on each socket write.
    pub write_timeout: Duration,

    /// Keepalive ping period.
    pub ping_interval: Duration,

    /// Read deadline; must exceed `ping_interval`.
    pub read_timeout: Duration,

    /// Bound on one analysis service call.
    pub analysis_timeout: Duration,

    /// Largest accepted inbound message in bytes.
    pub max_message_size: usize,

    /// Exercise ids accepted on `/ws/exercise/{id}`; empty accepts any.
    pub exercises: Vec<ExerciseId>,
}

impl Default for RelayOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl RelayOptions {
    /// Creates options with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            ping_interval: DEFAULT_PING_INTERVAL,
            read_timeout: DEFAULT_READ_TIMEOUT,
            analysis_timeout: DEFAULT_ANALYSIS_TIMEOUT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            exercises: DEFAULT_EXERCISES.into_iter().map(ExerciseId::from).collect(),
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl RelayOptions {
    /// Sets the outbound queue capacity.
    #[inline]
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the per-write deadline.
    #[inline]
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Sets the keepalive period.
    #[inline]
    #[must_use]
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Sets the read deadline.
    #[inline]
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Sets the analysis call bound.
    #[inline]
    #[must_use]
    pub fn with_analysis_timeout(mut self, timeout: Duration) -> Self {
        self.analysis_timeout = timeout;
        self
    }

    /// Sets the largest accepted inbound message.
    #[inline]
    #[must_use]
    pub fn with_max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    /// Replaces the accepted exercise ids.
    #[inline]
    #[must_use]
    pub fn with_exercises(mut self, exercises: impl IntoIterator<Item = impl Into<ExerciseId>>) -> Self {
        self.exercises = exercises.into_iter().map(Into::into).collect();
        self
    }

    /// Accepts any exercise id.
    #[inline]
    #[must_use]
    pub fn with_any_exercise(mut self) -> Self {
        self.exercises.clear();
        self
    }
}

// ============================================================================
// Derived Settings
// ============================================================================

impl RelayOptions {
    /// Checks the options for consistency.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::config("queue_capacity must be greater than zero"));
        }
        if self.write_timeout.is_zero() || self.ping_interval.is_zero() {
            return Err(Error::config("write_timeout and ping_interval must be non-zero"));
        }
        if self.read_timeout <= self.ping_interval {
            return Err(Error::config(format!(
                "read_timeout ({:?}) must exceed ping_interval ({:?})",
                self.read_timeout, self.ping_interval
            )));
        }
        if self.analysis_timeout.is_zero() {
            return Err(Error::config("analysis_timeout must be non-zero"));
        }
        if self.max_message_size == 0 {
            return Err(Error::config("max_message_size must be greater than zero"));
        }
        Ok(())
    }

    /// Pump deadlines derived from these options.
    #[inline]
    #[must_use]
    pub fn pump_config(&self) -> PumpConfig {
        PumpConfig {
            write_timeout: self.write_timeout,
            ping_interval: self.ping_interval,
            read_timeout: self.read_timeout,
        }
    }

    /// WebSocket protocol limits derived from these options.
    #[must_use]
    pub fn websocket_config(&self) -> WebSocketConfig {
        WebSocketConfig::default()
            .max_message_size(Some(self.max_message_size))
            .max_frame_size(Some(self.max_message_size))
    }
}

// ============================================================================
// Tests
// ============================================================================
