//! Registry of live connections.
//!
//! The hub is a coordinator task that owns the only cross-connection
//! mutable state in the relay. Every operation is a command on one channel
//! and runs to completion before the next one starts, so registry mutations
//! never interleave.
//!
//! # Architecture
//!
//! ```text
//!  inbound pump A ──┐
//!  inbound pump B ──┼── HubCommand ──► ┌──────────────────────────────┐
//!  relay handler  ──┘   (unbounded)    │  Hub task                    │
//!                                      │  ConnectionId → Registration │
//!                                      └──────────────────────────────┘
//! ```
//!
//! The hub only holds registrations. It never reads from or writes to a
//! socket; dropping a registration releases its outbox sender so the
//! connection's outbound queue can close.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::identifiers::{ConnectionId, ExerciseId};

use super::connection::Outbox;

// ============================================================================
// Registration
// ============================================================================

/// Non-owning registry entry for one connection.
pub struct Registration {
    /// Connection handle.
    pub id: ConnectionId,
    /// Exercise bound to the connection.
    pub exercise: ExerciseId,
    /// Remote address, when known.
    pub peer: Option<SocketAddr>,
    /// When the connection was registered.
    pub registered_at: Instant,
    /// Sender side of the connection's outbound queue.
    pub(crate) outbox: Outbox,
}

impl Registration {
    /// Creates a registration for a connection's outbox.
    #[must_use]
    pub fn new(id: ConnectionId, exercise: ExerciseId, peer: Option<SocketAddr>, outbox: Outbox) -> Self {
        Self {
            id,
            exercise,
            peer,
            registered_at: Instant::now(),
            outbox,
        }
    }

    fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            id: self.id,
            exercise: self.exercise.clone(),
            peer: self.peer,
            age: self.registered_at.elapsed(),
            dropped: self.outbox.dropped(),
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("exercise", &self.exercise)
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

/// Snapshot of one registered connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Connection handle.
    pub id: ConnectionId,
    /// Exercise bound to the connection.
    pub exercise: ExerciseId,
    /// Remote address, when known.
    pub peer: Option<SocketAddr>,
    /// Time since registration.
    pub age: Duration,
    /// Feedback messages dropped on a full outbound queue so far.
    pub dropped: u64,
}

// ============================================================================
// HubCommand
// ============================================================================

/// Commands processed one at a time by the hub task.
enum HubCommand {
    Register(Registration),
    Unregister(ConnectionId),
    Broadcast(String),
    Contains(ConnectionId, oneshot::Sender<bool>),
    Snapshot(oneshot::Sender<Vec<ConnectionInfo>>),
    Shutdown,
}

// ============================================================================
// Hub
// ============================================================================

/// Handle to the connection registry task.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct Hub {
    command_tx: mpsc::UnboundedSender<HubCommand>,
}

impl fmt::Debug for Hub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub")
            .field("running", &self.is_running())
            .finish()
    }
}

impl Hub {
    /// Spawns the hub task and returns a handle to it.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start() -> Self {
        Self::start_with_handle().0
    }

    /// Spawns the hub task, also returning its join handle.
    #[must_use]
    pub fn start_with_handle() -> (Self, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(Self::run(command_rx));
        (Self { command_tx }, task)
    }

    /// Adds a connection to the live set.
    pub fn register(&self, registration: Registration) {
        let id = registration.id;
        if self.command_tx.send(HubCommand::Register(registration)).is_err() {
            debug!(connection_id = %id, "Hub stopped, registration discarded");
        }
    }

    /// Removes a connection from the live set. Unknown IDs are ignored.
    pub fn unregister(&self, id: ConnectionId) {
        if self.command_tx.send(HubCommand::Unregister(id)).is_err() {
            debug!(connection_id = %id, "Hub stopped, unregister ignored");
        }
    }

    /// Offers a message to every registered connection's outbound queue.
    ///
    /// Uses the same non-blocking enqueue as feedback: full queues drop it.
    pub fn broadcast(&self, message: impl Into<String>) {
        let _ = self.command_tx.send(HubCommand::Broadcast(message.into()));
    }

    /// Returns `true` if the connection is currently registered.
    pub async fn contains(&self, id: ConnectionId) -> bool {
        let (tx, rx) = oneshot::channel();
        if self.command_tx.send(HubCommand::Contains(id, tx)).is_err() {
            return false;
        }
        rx.await.unwrap_or(false)
    }

    /// Returns the number of registered connections.
    pub async fn connection_count(&self) -> usize {
        self.connections().await.len()
    }

    /// Returns a snapshot of all registered connections, ordered by ID.
    pub async fn connections(&self) -> Vec<ConnectionInfo> {
        let (tx, rx) = oneshot::channel();
        if self.command_tx.send(HubCommand::Snapshot(tx)).is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Stops the hub task, dropping every registration.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(HubCommand::Shutdown);
    }

    /// Returns `true` while the hub task accepts commands.
    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.command_tx.is_closed()
    }

    /// Hub task: the single owner of the registry.
    async fn run(mut command_rx: mpsc::UnboundedReceiver<HubCommand>) {
        let mut registry: FxHashMap<ConnectionId, Registration> = FxHashMap::default();

        debug!("Hub started");

        while let Some(command) = command_rx.recv().await {
            match command {
                HubCommand::Register(registration) => {
                    let id = registration.id;
                    let exercise = registration.exercise.clone();
                    if registry.insert(id, registration).is_some() {
                        warn!(connection_id = %id, "Connection registered twice, replaced");
                    }
                    info!(connection_id = %id, %exercise, live = registry.len(), "Connection registered");
                }

                HubCommand::Unregister(id) => match registry.remove(&id) {
                    Some(registration) => {
                        info!(
                            connection_id = %id,
                            exercise = %registration.exercise,
                            dropped = registration.outbox.dropped(),
                            live = registry.len(),
                            "Connection unregistered"
                        );
                    }
                    None => trace!(connection_id = %id, "Unregister for unknown connection"),
                },

                HubCommand::Broadcast(message) => {
                    let mut delivered = 0usize;
                    for registration in registry.values() {
                        if registration.outbox.push(message.clone()) {
                            delivered += 1;
                        }
                    }
                    debug!(delivered, live = registry.len(), "Broadcast enqueued");
                }

                HubCommand::Contains(id, reply) => {
                    let _ = reply.send(registry.contains_key(&id));
                }

                HubCommand::Snapshot(reply) => {
                    let mut snapshot: Vec<ConnectionInfo> =
                        registry.values().map(Registration::info).collect();
                    snapshot.sort_by_key(|info| info.id);
                    let _ = reply.send(snapshot);
                }

                HubCommand::Shutdown => {
                    debug!(live = registry.len(), "Hub shutdown requested");
                    break;
                }
            }
        }

        registry.clear();
        debug!("Hub terminated");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(exercise: &str, capacity: usize) -> (Registration, tokio::sync::mpsc::Receiver<String>) {
        let (outbox, queue) = Outbox::channel(capacity);
        let reg = Registration::new(ConnectionId::next(), ExerciseId::from(exercise), None, outbox);
        (reg, queue)
    }

    #[tokio::test]
    async fn test_register_then_unregister() {
        let hub = Hub::start();
        let (reg, _queue) = registration("fist", 4);
        let id = reg.id;

        hub.register(reg);
        assert!(hub.contains(id).await);
        assert_eq!(hub.connection_count().await, 1);

        hub.unregister(id);
        assert!(!hub.contains(id).await);
        assert_eq!(hub.connection_count().await, 0);

        hub.shutdown();
    }

    #[tokio::test]
    async fn test_double_unregister_is_noop() {
        let hub = Hub::start();
        let (keep, _q1) = registration("fist", 4);
        let (gone, _q2) = registration("fist-palm", 4);
        let keep_id = keep.id;
        let gone_id = gone.id;

        hub.register(keep);
        hub.register(gone);
        hub.unregister(gone_id);
        hub.unregister(gone_id);

        let live = hub.connections().await;
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].id, keep_id);

        hub.shutdown();
    }

    #[tokio::test]
    async fn test_unregister_unknown_is_noop() {
        let hub = Hub::start();
        hub.unregister(ConnectionId::next());
        assert_eq!(hub.connection_count().await, 0);
        hub.shutdown();
    }

    #[tokio::test]
    async fn test_unregister_releases_outbox_sender() {
        let hub = Hub::start();
        let (reg, mut queue) = registration("fist", 4);
        let id = reg.id;

        hub.register(reg);
        hub.unregister(id);
        // Snapshot round-trip guarantees the unregister has been processed.
        let _ = hub.connections().await;

        assert!(queue.recv().await.is_none());
        hub.shutdown();
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_connection() {
        let hub = Hub::start();
        let (a, mut qa) = registration("fist", 4);
        let (b, mut qb) = registration("fist-index", 4);

        hub.register(a);
        hub.register(b);
        hub.broadcast("{\"notice\":\"maintenance\"}");

        assert_eq!(qa.recv().await.as_deref(), Some("{\"notice\":\"maintenance\"}"));
        assert_eq!(qb.recv().await.as_deref(), Some("{\"notice\":\"maintenance\"}"));

        hub.shutdown();
    }

    #[tokio::test]
    async fn test_broadcast_drops_on_full_queue() {
        let hub = Hub::start();
        let (reg, _queue) = registration("fist", 1);
        let id = reg.id;

        hub.register(reg);
        hub.broadcast("one");
        hub.broadcast("two");

        let live = hub.connections().await;
        assert_eq!(live[0].id, id);
        assert_eq!(live[0].dropped, 1);

        hub.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_stops_task() {
        let (hub, task) = Hub::start_with_handle();
        hub.shutdown();
        task.await.expect("hub task should exit cleanly");

        assert!(!hub.is_running());
        assert!(!hub.contains(ConnectionId::next()).await);
        assert!(hub.connections().await.is_empty());
    }
}
