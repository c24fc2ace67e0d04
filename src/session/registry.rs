//! In-memory exercise session registry.
//!
//! Tracks which user is doing which exercise and for how long. Sessions are
//! kept after they stop so their duration stays queryable.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::identifiers::{ExerciseId, SessionId, UserId};

// ============================================================================
// ExerciseSession
// ============================================================================

/// One user's run of one exercise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExerciseSession {
    /// Session identifier.
    pub id: SessionId,

    /// User performing the exercise.
    pub user_id: UserId,

    /// Exercise being performed.
    pub exercise: ExerciseId,

    /// When the session started.
    pub started_at: DateTime<Utc>,

    /// When the session stopped, if it has.
    pub ended_at: Option<DateTime<Utc>>,

    /// `false` once stopped.
    pub active: bool,
}

impl ExerciseSession {
    fn begin(user_id: UserId, exercise: ExerciseId) -> Self {
        Self {
            id: SessionId::generate(),
            user_id,
            exercise,
            started_at: Utc::now(),
            ended_at: None,
            active: true,
        }
    }

    /// Time between start and stop, or `None` while the session is active.
    #[must_use]
    pub fn duration(&self) -> Option<TimeDelta> {
        self.ended_at.map(|ended| ended - self.started_at)
    }
}

// ============================================================================
// SessionRegistry
// ============================================================================

/// Thread-safe session store.
///
/// Cloning is cheap; clones share the same sessions.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<FxHashMap<SessionId, ExerciseSession>>>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a session and returns a copy of it.
    pub fn start(&self, user_id: impl Into<UserId>, exercise: impl Into<ExerciseId>) -> ExerciseSession {
        let session = ExerciseSession::begin(user_id.into(), exercise.into());

        self.sessions.write().insert(session.id, session.clone());

        info!(
            session_id = %session.id,
            user_id = %session.user_id,
            exercise = %session.exercise,
            "Exercise session started"
        );

        session
    }

    /// Stops a session and returns its final state.
    ///
    /// # Errors
    ///
    /// - [`Error::SessionNotFound`] if no session has this id
    /// - [`Error::SessionAlreadyStopped`] if it was stopped before
    pub fn stop(&self, session_id: SessionId) -> Result<ExerciseSession> {
        let stopped = {
            let mut sessions = self.sessions.write();
            let session = sessions
                .get_mut(&session_id)
                .ok_or_else(|| Error::session_not_found(session_id))?;

            if !session.active {
                return Err(Error::session_already_stopped(session_id));
            }

            session.active = false;
            session.ended_at = Some(Utc::now());
            session.clone()
        };

        info!(
            session_id = %session_id,
            duration_ms = stopped.duration().map_or(0, |d| d.num_milliseconds()),
            "Exercise session stopped"
        );

        Ok(stopped)
    }

    /// Looks up a session.
    #[must_use]
    pub fn get(&self, session_id: SessionId) -> Option<ExerciseSession> {
        self.sessions.read().get(&session_id).cloned()
    }

    /// Active sessions of one user, oldest first.
    #[must_use]
    pub fn active_for_user(&self, user_id: &UserId) -> Vec<ExerciseSession> {
        let mut active: Vec<_> = self
            .sessions
            .read()
            .values()
            .filter(|s| s.active && &s.user_id == user_id)
            .cloned()
            .collect();
        active.sort_by_key(|s| s.started_at);
        active
    }

    /// All sessions, oldest first.
    #[must_use]
    pub fn list(&self) -> Vec<ExerciseSession> {
        let mut all: Vec<_> = self.sessions.read().values().cloned().collect();
        all.sort_by_key(|s| s.started_at);
        debug!(count = all.len(), "Listed sessions");
        all
    }

    /// Number of sessions, active or stopped.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Returns `true` if no session was ever started.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_creates_active_session() {
        let registry = SessionRegistry::new();
        let session = registry.start("alice", "fist");

        assert!(session.active);
        assert!(session.ended_at.is_none());
        assert!(session.duration().is_none());
        assert_eq!(session.exercise.as_str(), "fist");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(session.id), Some(session));
    }

    #[test]
    fn test_stop_sets_end_time() {
        let registry = SessionRegistry::new();
        let session = registry.start("alice", "fist");

        let stopped = registry.stop(session.id).unwrap();
        assert!(!stopped.active);
        assert!(stopped.ended_at.is_some());
        assert!(stopped.duration().unwrap() >= TimeDelta::zero());
        assert_eq!(registry.get(session.id), Some(stopped));
    }

    #[test]
    fn test_stop_twice_fails() {
        let registry = SessionRegistry::new();
        let session = registry.start("alice", "fist");

        registry.stop(session.id).unwrap();
        let err = registry.stop(session.id).unwrap_err();
        assert!(matches!(err, Error::SessionAlreadyStopped { .. }));
    }

    #[test]
    fn test_stop_unknown_fails() {
        let registry = SessionRegistry::new();
        let err = registry.stop(SessionId::generate()).unwrap_err();
        assert!(matches!(err, Error::SessionNotFound { .. }));
    }

    #[test]
    fn test_active_for_user_filters() {
        let registry = SessionRegistry::new();
        let first = registry.start("alice", "fist");
        let _second = registry.start("alice", "fist-palm");
        let _other = registry.start("bob", "fist");
        registry.stop(first.id).unwrap();

        let active = registry.active_for_user(&UserId::from("alice"));
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].exercise.as_str(), "fist-palm");
    }

    #[test]
    fn test_list_keeps_stopped_sessions() {
        let registry = SessionRegistry::new();
        let session = registry.start("alice", "fist");
        registry.start("bob", "fist-index");
        registry.stop(session.id).unwrap();

        assert_eq!(registry.list().len(), 2);
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let registry = SessionRegistry::new();
        let clone = registry.clone();
        let session = clone.start("alice", "fist");
        assert!(registry.get(session.id).is_some());
    }
}
