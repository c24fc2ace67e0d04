//! Routed WebSocket upgrade.
//!
//! Clients open one stream per exercise at `/ws/exercise/{exercise}`. The
//! exercise is taken from the request path during the handshake; any other
//! path is refused with `404 Not Found` before the upgrade completes.
//!
//! # Connection Flow
//!
//! 1. TCP connection accepted by the server loop
//! 2. HTTP upgrade request inspected, exercise extracted from the path
//! 3. Handshake completed (or refused with 404)
//! 4. Upgraded stream handed to a [`super::Connection`]

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::ExerciseId;

// ============================================================================
// Constants
// ============================================================================

/// Path prefix of exercise streams.
pub const EXERCISE_ROUTE_PREFIX: &str = "/ws/exercise/";

// ============================================================================
// Routing
// ============================================================================

/// Extracts the exercise from an upgrade path.
///
/// Returns `None` unless the path is exactly `/ws/exercise/{id}` with a
/// non-empty id made of ASCII letters, digits, `-` or `_`, and the id is in
/// `allowed` (an empty `allowed` list accepts any id).
#[must_use]
pub fn route_exercise(path: &str, allowed: &[ExerciseId]) -> Option<ExerciseId> {
    let id = path.strip_prefix(EXERCISE_ROUTE_PREFIX)?.trim_end_matches('/');

    let well_formed = !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    if !well_formed {
        return None;
    }

    if !allowed.is_empty() && !allowed.iter().any(|a| a.as_str() == id) {
        return None;
    }

    Some(ExerciseId::from(id))
}

// ============================================================================
// Upgrade
// ============================================================================

/// Completes the WebSocket handshake for an exercise stream.
///
/// A peer that has not finished the handshake within `deadline` is dropped.
///
/// # Returns
///
/// The upgraded stream and the exercise bound by its path.
///
/// # Errors
///
/// - [`Error::UnknownRoute`] if the path is not an allowed exercise stream
/// - [`Error::Upgrade`] if the handshake fails or misses its deadline
pub async fn accept_exercise_stream<S>(
    stream: S,
    allowed: &[ExerciseId],
    config: WebSocketConfig,
    deadline: Duration,
) -> Result<(WebSocketStream<S>, ExerciseId)>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut routed: Option<ExerciseId> = None;
    let mut refused: Option<String> = None;

    let callback = |request: &Request, response: Response| -> std::result::Result<Response, ErrorResponse> {
        let path = request.uri().path();
        match route_exercise(path, allowed) {
            Some(exercise) => {
                routed = Some(exercise);
                Ok(response)
            }
            None => {
                refused = Some(path.to_string());
                let mut rejection = ErrorResponse::new(Some(format!("no exercise stream at {path}")));
                *rejection.status_mut() = StatusCode::NOT_FOUND;
                Err(rejection)
            }
        }
    };

    let handshake = tokio_tungstenite::accept_hdr_async_with_config(stream, callback, Some(config));
    let Ok(upgraded) = timeout(deadline, handshake).await else {
        return Err(Error::upgrade(format!(
            "handshake not completed within {}ms",
            deadline.as_millis()
        )));
    };

    match (upgraded, routed) {
        (Ok(ws), Some(exercise)) => {
            debug!(%exercise, "Exercise stream upgraded");
            Ok((ws, exercise))
        }
        (Ok(_), None) => Err(Error::upgrade("handshake completed without a route")),
        (Err(e), _) => match refused {
            Some(path) => Err(Error::unknown_route(path)),
            None => Err(Error::upgrade(e.to_string())),
        },
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> Vec<ExerciseId> {
        ["fist", "fist-index", "fist-palm"]
            .into_iter()
            .map(ExerciseId::from)
            .collect()
    }

    #[test]
    fn test_route_known_exercise() {
        let allowed = defaults();
        assert_eq!(
            route_exercise("/ws/exercise/fist-palm", &allowed),
            Some(ExerciseId::from("fist-palm"))
        );
    }

    #[test]
    fn test_route_tolerates_trailing_slash() {
        let allowed = defaults();
        assert_eq!(
            route_exercise("/ws/exercise/fist/", &allowed),
            Some(ExerciseId::from("fist"))
        );
    }

    #[test]
    fn test_route_rejects_unlisted_exercise() {
        assert_eq!(route_exercise("/ws/exercise/squat", &defaults()), None);
    }

    #[test]
    fn test_route_accepts_any_when_unrestricted() {
        assert_eq!(
            route_exercise("/ws/exercise/squat", &[]),
            Some(ExerciseId::from("squat"))
        );
    }

    #[tokio::test]
    async fn test_stalled_handshake_is_dropped() {
        // The client half never sends an upgrade request.
        let (server, _client) = tokio::io::duplex(1024);

        let err = accept_exercise_stream(
            server,
            &defaults(),
            WebSocketConfig::default(),
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Upgrade { .. }));
        assert!(err.to_string().contains("50ms"));
    }

    #[tokio::test]
    async fn test_upgrade_binds_exercise_from_path() {
        let (server, client) = tokio::io::duplex(4096);

        let client = tokio::spawn(async move {
            tokio_tungstenite::client_async("ws://relay/ws/exercise/fist-index", client)
                .await
                .map(|_| ())
        });

        let (_ws, exercise) = accept_exercise_stream(
            server,
            &defaults(),
            WebSocketConfig::default(),
            Duration::from_secs(2),
        )
        .await
        .unwrap();

        assert_eq!(exercise, ExerciseId::from("fist-index"));
        client.await.unwrap().unwrap();
    }

    #[test]
    fn test_route_rejects_other_paths() {
        let allowed = defaults();
        assert_eq!(route_exercise("/", &allowed), None);
        assert_eq!(route_exercise("/ws/exercise/", &allowed), None);
        assert_eq!(route_exercise("/ws/exercise/fist/extra", &allowed), None);
        assert_eq!(route_exercise("/api/health", &allowed), None);
    }
}
