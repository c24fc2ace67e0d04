//! Upgrade orchestration and frame translation.
//!
//! [`RelayHandler`] is shared by every connection. For each accepted socket
//! it completes the routed upgrade, registers the new connection with the
//! hub and starts its pumps. Each connection's inbound pump then calls back
//! into the handler (as its [`FrameHandler`]) for every message.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, info, warn};

use crate::bridge::FrameAnalyzer;
use crate::error::Result;
use crate::identifiers::{ConnectionId, ExerciseId};
use crate::protocol::{AnalysisRequest, Feedback, FrameMessage};
use crate::server::RelayOptions;
use crate::transport::{Connection, FrameHandler, Hub, PumpHandles, accept_exercise_stream};

use super::normalize::normalize_frame;

// ============================================================================
// RelayHandler
// ============================================================================

/// Wires connections to the hub and to the analysis bridge.
pub struct RelayHandler {
    hub: Hub,
    analyzer: Arc<dyn FrameAnalyzer>,
    options: RelayOptions,
}

impl fmt::Debug for RelayHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayHandler")
            .field("hub", &self.hub)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl RelayHandler {
    /// Creates a handler.
    #[must_use]
    pub fn new(hub: Hub, analyzer: Arc<dyn FrameAnalyzer>, options: RelayOptions) -> Self {
        Self {
            hub,
            analyzer,
            options,
        }
    }

    /// Returns the hub connections are registered with.
    #[inline]
    #[must_use]
    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Returns the frame analyzer.
    #[inline]
    #[must_use]
    pub fn analyzer(&self) -> &Arc<dyn FrameAnalyzer> {
        &self.analyzer
    }

    /// Returns the relay options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &RelayOptions {
        &self.options
    }

    /// Upgrades an accepted socket and starts relaying on it.
    ///
    /// # Arguments
    ///
    /// * `stream` - Freshly accepted socket
    /// * `peer` - Remote address, for logs and hub snapshots
    ///
    /// # Errors
    ///
    /// - [`crate::Error::UnknownRoute`] if the path is not an exercise stream
    /// - [`crate::Error::Upgrade`] if the handshake fails or is not completed
    ///   within the write timeout
    pub async fn handle_upgrade<S>(
        self: &Arc<Self>,
        stream: S,
        peer: SocketAddr,
    ) -> Result<(ConnectionId, PumpHandles)>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (ws, exercise) = accept_exercise_stream(
            stream,
            &self.options.exercises,
            self.options.websocket_config(),
            self.options.write_timeout,
        )
        .await?;

        let connection = Connection::new(ws, exercise, self.options.queue_capacity).with_peer(peer);
        let id = connection.id();

        self.hub.register(connection.registration());

        info!(connection_id = %id, exercise = %connection.exercise(), %peer, "Exercise stream opened");

        let handler: Arc<dyn FrameHandler> = Arc::clone(self) as Arc<dyn FrameHandler>;
        let handles = connection.spawn(self.hub.clone(), handler, self.options.pump_config());

        Ok((id, handles))
    }

    /// Scores one client message, always producing feedback.
    ///
    /// Malformed messages and analysis failures become error feedback for
    /// the same client; nothing here can end the connection.
    pub async fn translate(&self, payload: &[u8], bound: &ExerciseId) -> Feedback {
        let message = match FrameMessage::parse(payload) {
            Ok(message) => message,
            Err(e) => {
                debug!(exercise = %bound, payload_len = payload.len(), error = %e, "Malformed client message");
                return Feedback::error(bound, e.to_string());
            }
        };

        let exercise = message.exercise_type.unwrap_or_else(|| bound.clone());
        let frame = normalize_frame(message.frame.as_bytes());
        let request = AnalysisRequest::new(frame, Some(exercise.clone()));

        match self.analyzer.process_frame(&request).await {
            Ok(response) => Feedback::from_analysis(response, &exercise),
            Err(e) if e.is_recoverable() => {
                warn!(%exercise, error = %e, timeout = e.is_timeout(), "Frame analysis failed");
                Feedback::error(&exercise, e.to_string())
            }
            Err(e) => {
                error!(%exercise, error = %e, "Frame analyzer failed outside the analysis path");
                Feedback::error(&exercise, e.to_string())
            }
        }
    }
}

#[async_trait]
impl FrameHandler for RelayHandler {
    async fn handle_frame(&self, payload: &[u8], exercise: &ExerciseId) -> Feedback {
        self.translate(payload, exercise).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use parking_lot::Mutex;

    use crate::error::Error;
    use crate::protocol::{AnalysisResponse, FeedbackStatus};

    /// Records requests and replies with a fixed outcome.
    struct StubAnalyzer {
        seen: Mutex<Vec<AnalysisRequest>>,
        fail: bool,
    }

    impl StubAnalyzer {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                fail: true,
            })
        }
    }

    #[async_trait]
    impl FrameAnalyzer for StubAnalyzer {
        async fn process_frame(&self, request: &AnalysisRequest) -> Result<AnalysisResponse> {
            self.seen.lock().push(request.clone());
            if self.fail {
                return Err(Error::analysis_transport("operation timed out", true));
            }
            Ok(AnalysisResponse {
                hand_detected: true,
                raised_fingers: 3,
                message: "ok".into(),
                status: "success".into(),
                ..Default::default()
            })
        }
    }

    fn handler_with(analyzer: Arc<StubAnalyzer>) -> RelayHandler {
        RelayHandler::new(Hub::start(), analyzer, RelayOptions::default())
    }

    #[tokio::test]
    async fn test_translate_success() {
        let analyzer = StubAnalyzer::ok();
        let handler = handler_with(analyzer.clone());

        let feedback = handler
            .translate(br#"{"frame":"aGVsbG8","exercise_type":"fist"}"#, &"fist".into())
            .await;

        assert_eq!(feedback.status, FeedbackStatus::Success);
        assert!(feedback.hand_detected);
        assert_eq!(feedback.raised_fingers, 3);
        assert!(feedback.timestamp > 0);

        let seen = analyzer.seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].frame, "aGVsbG8=");
        assert_eq!(seen[0].exercise_type, Some(ExerciseId::from("fist")));
    }

    #[tokio::test]
    async fn test_translate_uses_bound_exercise_by_default() {
        let analyzer = StubAnalyzer::ok();
        let handler = handler_with(analyzer.clone());

        let feedback = handler
            .translate(br#"{"frame":"AAAA"}"#, &"fist-palm".into())
            .await;

        assert_eq!(feedback.current_exercise.as_str(), "fist-palm");
        assert_eq!(
            analyzer.seen.lock()[0].exercise_type,
            Some(ExerciseId::from("fist-palm"))
        );
    }

    #[tokio::test]
    async fn test_translate_message_override_wins() {
        let analyzer = StubAnalyzer::ok();
        let handler = handler_with(analyzer.clone());

        let _ = handler
            .translate(br#"{"frame":"AAAA","exercise_type":"fist-index"}"#, &"fist".into())
            .await;

        assert_eq!(
            analyzer.seen.lock()[0].exercise_type,
            Some(ExerciseId::from("fist-index"))
        );
    }

    #[tokio::test]
    async fn test_translate_malformed_skips_analyzer() {
        let analyzer = StubAnalyzer::ok();
        let handler = handler_with(analyzer.clone());

        let feedback = handler
            .translate(br#"{"exercise_type":"fist"}"#, &"fist".into())
            .await;

        assert!(feedback.is_error());
        assert!(feedback.error.unwrap().contains("frame"));
        assert!(analyzer.seen.lock().is_empty());
    }

    #[tokio::test]
    async fn test_translate_analysis_failure_is_error_feedback() {
        let handler = handler_with(StubAnalyzer::failing());

        let feedback = handler
            .translate(br#"{"frame":"AAAA"}"#, &"fist".into())
            .await;

        assert!(feedback.is_error());
        assert!(feedback.error.unwrap().contains("timed out"));
    }

    /// Fails with an error that is not an analysis error.
    struct DisconnectedAnalyzer;

    #[async_trait]
    impl FrameAnalyzer for DisconnectedAnalyzer {
        async fn process_frame(&self, _request: &AnalysisRequest) -> Result<AnalysisResponse> {
            Err(Error::ConnectionClosed)
        }
    }

    #[tokio::test]
    async fn test_translate_unrecoverable_failure_is_still_feedback() {
        let handler = RelayHandler::new(
            Hub::start(),
            Arc::new(DisconnectedAnalyzer),
            RelayOptions::default(),
        );

        let feedback = handler
            .translate(br#"{"frame":"AAAA"}"#, &"fist".into())
            .await;

        assert!(feedback.is_error());
        assert_eq!(feedback.error.as_deref(), Some("Connection closed"));
    }

    #[tokio::test]
    async fn test_translate_blank_frame_skips_analyzer() {
        let analyzer = StubAnalyzer::ok();
        let handler = handler_with(analyzer.clone());

        let feedback = handler.translate(br#"{"frame":"  "}"#, &"fist".into()).await;

        assert!(feedback.is_error());
        assert!(analyzer.seen.lock().is_empty());
    }
}
