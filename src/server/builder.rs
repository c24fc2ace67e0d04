//! Builder pattern for relay configuration.
//!
//! Provides a fluent API for configuring and starting a [`RelayServer`].
//!
//! # Example
//!
//! ```no_run
//! use exercise_relay::RelayServer;
//!
//! # async fn example() -> exercise_relay::Result<()> {
//! let server = RelayServer::builder()
//!     .bind("127.0.0.1:8080")
//!     .analysis_url("http://localhost:5001")
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::bridge::{BridgeClient, FrameAnalyzer};
use crate::error::{Error, Result};

use super::core::RelayServer;
use super::options::RelayOptions;

// ============================================================================
// Constants
// ============================================================================

/// Listen address used when none is configured.
pub const DEFAULT_BIND: &str = "0.0.0.0:8080";

/// Analysis service root used by [`RelayBuilder::from_env`] when unset.
pub const DEFAULT_ANALYSIS_URL: &str = "http://localhost:5001";

/// Environment variable holding the listen address.
pub const ENV_BIND: &str = "RELAY_BIND";

/// Environment variable holding the analysis service root.
pub const ENV_ANALYSIS_URL: &str = "RELAY_ANALYSIS_URL";

/// Environment variable holding the outbound queue capacity.
pub const ENV_QUEUE_CAPACITY: &str = "RELAY_QUEUE_CAPACITY";

/// Environment variable holding the analysis timeout in seconds.
pub const ENV_ANALYSIS_TIMEOUT_SECS: &str = "RELAY_ANALYSIS_TIMEOUT_SECS";

// ============================================================================
// RelayBuilder
// ============================================================================

/// Builder for configuring a [`RelayServer`].
///
/// Use [`RelayServer::builder()`] to create a new builder.
#[derive(Clone, Default)]
pub struct RelayBuilder {
    /// Listen address, `host:port`.
    bind: Option<String>,
    /// Analysis service root URL.
    analysis_url: Option<String>,
    /// Frame analyzer overriding the HTTP bridge.
    analyzer: Option<Arc<dyn FrameAnalyzer>>,
    /// Tuning options.
    options: RelayOptions,
}

impl fmt::Debug for RelayBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayBuilder")
            .field("bind", &self.bind)
            .field("analysis_url", &self.analysis_url)
            .field("analyzer", &self.analyzer.is_some())
            .field("options", &self.options)
            .finish()
    }
}

// ============================================================================
// RelayBuilder Implementation
// ============================================================================

impl RelayBuilder {
    /// Creates a new builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder from `RELAY_*` environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `RELAY_BIND` | `0.0.0.0:8080` |
    /// | `RELAY_ANALYSIS_URL` | `http://localhost:5001` |
    /// | `RELAY_QUEUE_CAPACITY` | 256 |
    /// | `RELAY_ANALYSIS_TIMEOUT_SECS` | 10 |
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a numeric variable does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut options = RelayOptions::default();

        if let Some(raw) = lookup(ENV_QUEUE_CAPACITY) {
            options.queue_capacity = parse_number(ENV_QUEUE_CAPACITY, &raw)?;
        }
        if let Some(raw) = lookup(ENV_ANALYSIS_TIMEOUT_SECS) {
            options.analysis_timeout = Duration::from_secs(parse_number(ENV_ANALYSIS_TIMEOUT_SECS, &raw)?);
        }

        let bind = lookup(ENV_BIND).unwrap_or_else(|| DEFAULT_BIND.to_string());
        let analysis_url = lookup(ENV_ANALYSIS_URL).unwrap_or_else(|| DEFAULT_ANALYSIS_URL.to_string());

        debug!(%bind, %analysis_url, "Relay configuration read from environment");

        Ok(Self::new().bind(bind).analysis_url(analysis_url).options(options))
    }

    /// Sets the listen address.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address such as `"0.0.0.0:8080"` (port 0 for random)
    #[inline]
    #[must_use]
    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        self.bind = Some(addr.into());
        self
    }

    /// Sets the analysis service root URL.
    #[inline]
    #[must_use]
    pub fn analysis_url(mut self, url: impl Into<String>) -> Self {
        self.analysis_url = Some(url.into());
        self
    }

    /// Replaces the tuning options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: RelayOptions) -> Self {
        self.options = options;
        self
    }

    /// Scores frames with `analyzer` instead of the HTTP bridge.
    ///
    /// An analysis URL may still be set; the bridge is then available for
    /// service calls through [`RelayServer::bridge`].
    #[inline]
    #[must_use]
    pub fn analyzer(mut self, analyzer: Arc<dyn FrameAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// Checks the configuration without starting anything.
    ///
    /// # Errors
    ///
    /// Same as [`RelayBuilder::build`], minus bind failures.
    pub fn validate(&self) -> Result<()> {
        self.clone().resolve().map(|_| ())
    }

    /// Validates, binds and starts the relay.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if neither an analysis URL nor an analyzer is set
    /// - [`Error::Config`] if the bind address or options are invalid
    /// - [`Error::InvalidUrl`] if the analysis URL does not parse
    /// - [`Error::Io`] if binding fails
    pub async fn build(self) -> Result<RelayServer> {
        RelayServer::start(self.resolve()?).await
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Fully validated relay configuration.
pub(crate) struct RelayConfig {
    pub bind: SocketAddr,
    pub analyzer: Arc<dyn FrameAnalyzer>,
    pub bridge: Option<BridgeClient>,
    pub options: RelayOptions,
}

impl RelayBuilder {
    fn resolve(self) -> Result<RelayConfig> {
        self.options.validate()?;

        let bind = self.validate_bind()?;

        let bridge = self
            .analysis_url
            .as_deref()
            .map(|url| BridgeClient::with_timeout(url, self.options.analysis_timeout))
            .transpose()?;

        let analyzer: Arc<dyn FrameAnalyzer> = match (self.analyzer, &bridge) {
            (Some(analyzer), _) => analyzer,
            (None, Some(bridge)) => Arc::new(bridge.clone()),
            (None, None) => {
                return Err(Error::config(
                    "Analysis service URL is required. Use .analysis_url() or .analyzer() to set it.\n\
                     Example: RelayServer::builder().analysis_url(\"http://localhost:5001\")",
                ));
            }
        };

        Ok(RelayConfig {
            bind,
            analyzer,
            bridge,
            options: self.options,
        })
    }

    fn validate_bind(&self) -> Result<SocketAddr> {
        let raw = self.bind.as_deref().unwrap_or(DEFAULT_BIND);
        raw.parse()
            .map_err(|e| Error::config(format!("Invalid bind address '{raw}': {e}")))
    }
}

fn parse_number<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| Error::config(format!("{key}='{raw}' is not a valid number: {e}")))
}

// ============================================================================
// Tests
// ============================================================================
