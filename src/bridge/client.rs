//! HTTP client for the analysis service.
//!
//! # Example
//!
//! ```ignore
//! use exercise_relay::bridge::BridgeClient;
//! use exercise_relay::protocol::AnalysisRequest;
//!
//! let bridge = BridgeClient::new("http://localhost:5001")?;
//! let reply = bridge
//!     .process_frame(&AnalysisRequest::new(frame_b64, Some("fist".into())))
//!     .await?;
//! println!("raised fingers: {}", reply.raised_fingers);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::ExerciseId;
use crate::protocol::{
    AnalysisRequest, AnalysisResponse, ExerciseInfo, ExerciseList, ServiceHealth, ServiceReply,
};

use super::FrameAnalyzer;

// ============================================================================
// Constants
// ============================================================================

/// Default bound on one analysis call.
pub const DEFAULT_ANALYSIS_TIMEOUT: Duration = Duration::from_secs(10);

/// User agent sent to the analysis service.
const USER_AGENT: &str = concat!("exercise-relay/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// BridgeClient
// ============================================================================

/// Request/response adapter to the external analysis service.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Clone)]
pub struct BridgeClient {
    /// Service root, always ending in `/`.
    base_url: Url,
    /// Pooled HTTP client with the call timeout baked in.
    http: reqwest::Client,
    /// Per-call timeout.
    timeout: Duration,
}

impl fmt::Debug for BridgeClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeClient")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// BridgeClient - Constructors
// ============================================================================

impl BridgeClient {
    /// Creates a client with the default 10s timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if `base_url` does not parse
    /// - [`Error::Config`] if the scheme is not http/https
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_ANALYSIS_TIMEOUT)
    }

    /// Creates a client with a custom per-call timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidUrl`] if `base_url` does not parse
    /// - [`Error::Config`] if the scheme is not http/https or the timeout is zero
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = parse_base_url(base_url)?;

        if timeout.is_zero() {
            return Err(Error::config("analysis timeout must be greater than zero"));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        debug!(base_url = %base_url, timeout_ms = timeout.as_millis() as u64, "Bridge client created");

        Ok(Self {
            base_url,
            http,
            timeout,
        })
    }

    /// Returns the service root URL.
    #[inline]
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the per-call timeout.
    #[inline]
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

// ============================================================================
// BridgeClient - Service Operations
// ============================================================================

impl BridgeClient {
    /// Checks service liveness via `GET /health`.
    ///
    /// # Errors
    ///
    /// Same error kinds as [`FrameAnalyzer::process_frame`].
    pub async fn health(&self) -> Result<ServiceHealth> {
        let response = self.http.get(self.endpoint("health")?).send().await?;
        decode(response).await
    }

    /// Lists exercises the service can score via `GET /exercises`.
    ///
    /// # Errors
    ///
    /// Same error kinds as [`FrameAnalyzer::process_frame`].
    pub async fn exercises(&self) -> Result<Vec<ExerciseInfo>> {
        let response = self.http.get(self.endpoint("exercises")?).send().await?;
        let list: ExerciseList = decode(response).await?;
        Ok(list.exercises)
    }

    /// Selects the exercise the service scores against.
    ///
    /// # Errors
    ///
    /// Same error kinds as [`FrameAnalyzer::process_frame`]. An unknown
    /// exercise comes back as [`Error::AnalysisStatus`] with status 400.
    pub async fn set_exercise(&self, exercise: &ExerciseId) -> Result<ServiceReply> {
        let response = self
            .http
            .post(self.endpoint("set_exercise")?)
            .json(&json!({ "exercise_id": exercise }))
            .send()
            .await?;
        decode(response).await
    }

    /// Resets the current exercise's progress in the service.
    ///
    /// # Errors
    ///
    /// Same error kinds as [`FrameAnalyzer::process_frame`].
    pub async fn reset_exercise(&self) -> Result<ServiceReply> {
        let response = self
            .http
            .post(self.endpoint("reset_exercise")?)
            .send()
            .await?;
        decode(response).await
    }

    /// Resolves a service path against the base URL.
    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }
}

// ============================================================================
// FrameAnalyzer
// ============================================================================

#[async_trait]
impl FrameAnalyzer for BridgeClient {
    async fn process_frame(&self, request: &AnalysisRequest) -> Result<AnalysisResponse> {
        let url = self.endpoint("process")?;

        trace!(
            url = %url,
            frame_len = request.frame.len(),
            exercise = ?request.exercise_type,
            "Sending frame to analysis service"
        );

        let response = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .inspect_err(|e| warn!(error = %e, "Analysis request failed"))?;

        decode(response).await
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Parses and normalizes the service root so relative joins keep its path.
fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::config(format!(
            "analysis URL must be http or https, got '{}'",
            url.scheme()
        )));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

/// Reads the body, maps non-2xx to [`Error::AnalysisStatus`] and decodes.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        warn!(status = status.as_u16(), body_len = body.len(), "Analysis service returned error status");
        return Err(Error::analysis_status(status.as_u16(), body));
    }

    serde_json::from_str(&body).map_err(|e| Error::analysis_decode(e.to_string()))
}

// ============================================================================
// Tests
// ============================================================================
