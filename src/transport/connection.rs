//! One client connection and its two pumps.
//!
//! Each upgraded socket is split into a read half and a write half, each
//! driven by its own tokio task:
//!
//! ```text
//!            ┌──────────────┐   Outbox (bounded, try_send)   ┌───────────────┐
//!  socket ──►│ inbound pump │ ─────────────────────────────► │ outbound pump │──► socket
//!   read     │  read+score  │                                │ drain + ping  │    write
//!            └──────┬───────┘                                └───────────────┘
//!                   │ on exit
//!                   ▼
//!              Hub::unregister
//! ```
//!
//! The inbound pump never waits on the outbound pump: a full queue drops the
//! feedback and counts the drop. Unregistration happens only in the inbound
//! pump, so it runs exactly once per connection.
//!
//! Either pump stopping stops the other. The inbound pump drops its outbox
//! on exit, which closes the queue and ends the outbound pump; the outbound
//! pump drops the queue on exit, which the inbound pump observes between
//! reads.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::{ConnectionId, ExerciseId};
use crate::protocol::Feedback;

use super::hub::{Hub, Registration};

// ============================================================================
// Constants
// ============================================================================

/// Default outbound queue capacity per connection.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Default bound on one socket write.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default keepalive period.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);

/// Default read deadline; a silent peer is dead after this long.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// FrameHandler
// ============================================================================

/// Turns one inbound client message into one feedback message.
///
/// Called sequentially by the inbound pump, so feedback order follows frame
/// order on a connection. Implementations report every per-frame failure as
/// error feedback instead of returning an error.
#[async_trait]
pub trait FrameHandler: Send + Sync {
    /// Handles the payload of one text or binary message.
    async fn handle_frame(&self, payload: &[u8], exercise: &ExerciseId) -> Feedback;
}

// ============================================================================
// Outbox
// ============================================================================

/// Sender side of a connection's bounded outbound queue.
///
/// Enqueueing never blocks. When the queue is full (or already closed) the
/// message is dropped and counted.
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::Sender<String>,
    dropped: Arc<AtomicU64>,
}

impl fmt::Debug for Outbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outbox")
            .field("capacity", &self.tx.max_capacity())
            .field("dropped", &self.dropped())
            .finish()
    }
}

impl Outbox {
    /// Creates an outbox and the queue it feeds.
    ///
    /// `capacity` is clamped to at least 1.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let outbox = Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (outbox, rx)
    }

    /// Enqueues a serialized message without waiting.
    ///
    /// Returns `false` and records a drop if the queue is full or closed.
    pub fn push(&self, message: String) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(_) => {
                let _ = self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Total messages dropped so far.
    #[inline]
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Queue capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Returns `true` once the outbound pump has stopped draining.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the outbound pump has dropped its queue.
    pub async fn closed(&self) {
        self.tx.closed().await;
    }
}

// ============================================================================
// PumpConfig
// ============================================================================

/// Deadlines governing both pumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpConfig {
    /// Bound on each socket write (feedback or ping).
    pub write_timeout: Duration,
    /// Keepalive ping period.
    pub ping_interval: Duration,
    /// Read deadline; any inbound message resets it.
    pub read_timeout: Duration,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            ping_interval: DEFAULT_PING_INTERVAL,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

// ============================================================================
// PumpStats
// ============================================================================

/// Counters reported by the inbound pump when it exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Text or binary messages received.
    pub frames_received: u64,
    /// Feedback messages accepted by the outbound queue.
    pub feedback_enqueued: u64,
    /// Feedback messages dropped on a full queue.
    pub feedback_dropped: u64,
}

/// Join handles for a connection's two pump tasks.
#[derive(Debug)]
pub struct PumpHandles {
    /// Inbound pump; resolves to its counters.
    pub inbound: JoinHandle<PumpStats>,
    /// Outbound pump.
    pub outbound: JoinHandle<()>,
}

// ============================================================================
// Connection
// ============================================================================

/// One upgraded client socket, bound to an exercise.
///
/// Owned by the relay handler that created it until [`Connection::spawn`]
/// hands the socket halves to the pumps.
pub struct Connection<S> {
    id: ConnectionId,
    exercise: ExerciseId,
    peer: Option<SocketAddr>,
    ws: WebSocketStream<S>,
    outbox: Outbox,
    queue: mpsc::Receiver<String>,
}

impl<S> fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("exercise", &self.exercise)
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wraps an upgraded socket.
    #[must_use]
    pub fn new(ws: WebSocketStream<S>, exercise: ExerciseId, queue_capacity: usize) -> Self {
        let (outbox, queue) = Outbox::channel(queue_capacity);
        Self {
            id: ConnectionId::next(),
            exercise,
            peer: None,
            ws,
            outbox,
            queue,
        }
    }

    /// Records the remote address.
    #[must_use]
    pub fn with_peer(mut self, peer: SocketAddr) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Connection handle.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Exercise bound to this connection.
    #[inline]
    #[must_use]
    pub fn exercise(&self) -> &ExerciseId {
        &self.exercise
    }

    /// A sender clone for the outbound queue.
    #[inline]
    #[must_use]
    pub fn outbox(&self) -> Outbox {
        self.outbox.clone()
    }

    /// Builds the hub registration for this connection.
    #[must_use]
    pub fn registration(&self) -> Registration {
        Registration::new(self.id, self.exercise.clone(), self.peer, self.outbox.clone())
    }

    /// Splits the socket and starts both pumps.
    pub fn spawn(
        self,
        hub: Hub,
        handler: Arc<dyn FrameHandler>,
        config: PumpConfig,
    ) -> PumpHandles {
        let Self {
            id,
            exercise,
            ws,
            outbox,
            queue,
            ..
        } = self;

        let (write, read) = ws.split();

        let outbound = tokio::spawn(run_outbound(id, write, queue, config));
        let inbound = tokio::spawn(run_inbound(id, exercise, read, outbox, hub, handler, config));

        PumpHandles { inbound, outbound }
    }
}

// ============================================================================
// Inbound Pump
// ============================================================================

/// Reads messages until close, error, read deadline or outbound stop,
/// scoring each one.
async fn run_inbound<S>(
    id: ConnectionId,
    exercise: ExerciseId,
    mut read: SplitStream<WebSocketStream<S>>,
    outbox: Outbox,
    hub: Hub,
    handler: Arc<dyn FrameHandler>,
    config: PumpConfig,
) -> PumpStats
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut stats = PumpStats::default();

    loop {
        let message = match next_message(&mut read, &outbox, config.read_timeout).await {
            Ok(message) => message,
            Err(e) if e.is_connection_error() => {
                debug!(connection_id = %id, reason = %e, "Inbound pump stopping");
                break;
            }
            Err(e) => {
                warn!(connection_id = %id, reason = %e, "Inbound pump stopping, peer considered dead");
                break;
            }
        };

        let feedback = match &message {
            Message::Text(text) => handler.handle_frame(text.as_str().as_bytes(), &exercise).await,
            Message::Binary(data) => handler.handle_frame(data, &exercise).await,
            // Ping/pong only refresh the read deadline; close never gets here.
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) | Message::Close(_) => continue,
        };

        stats.frames_received += 1;

        let json = match feedback.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(connection_id = %id, error = %e, "Failed to serialize feedback");
                continue;
            }
        };

        if outbox.push(json) {
            stats.feedback_enqueued += 1;
            trace!(connection_id = %id, error = feedback.is_error(), "Feedback enqueued");
        } else {
            stats.feedback_dropped += 1;
            debug!(connection_id = %id, dropped = outbox.dropped(), "Outbound queue full, feedback dropped");
        }
    }

    hub.unregister(id);

    debug!(
        connection_id = %id,
        frames = stats.frames_received,
        enqueued = stats.feedback_enqueued,
        dropped = stats.feedback_dropped,
        "Inbound pump exited"
    );

    stats
}

/// Waits for the next data or keepalive message.
///
/// # Errors
///
/// - [`Error::ConnectionClosed`] on a close frame or end of stream
/// - [`Error::WebSocket`] if the read fails
/// - [`Error::Connection`] once the outbound pump has stopped
/// - [`Error::Timeout`] if nothing arrives within `read_timeout`
async fn next_message<S>(
    read: &mut SplitStream<WebSocketStream<S>>,
    outbox: &Outbox,
    read_timeout: Duration,
) -> Result<Message>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    tokio::select! {
        result = timeout(read_timeout, read.next()) => match result {
            Ok(Some(Ok(Message::Close(frame)))) => {
                trace!(?frame, "Close received");
                Err(Error::ConnectionClosed)
            }
            Ok(Some(Ok(message))) => Ok(message),
            Ok(Some(Err(e))) => Err(Error::from(e)),
            Ok(None) => Err(Error::ConnectionClosed),
            Err(_) => Err(Error::timeout("socket read", read_timeout.as_millis() as u64)),
        },

        () = outbox.closed() => Err(Error::connection("outbound pump stopped")),
    }
}

// ============================================================================
// Outbound Pump
// ============================================================================

/// Drains the queue to the socket and sends keepalive pings.
async fn run_outbound<S>(
    id: ConnectionId,
    mut write: SplitSink<WebSocketStream<S>, Message>,
    mut queue: mpsc::Receiver<String>,
    config: PumpConfig,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut ticker = interval_at(Instant::now() + config.ping_interval, config.ping_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            message = queue.recv() => {
                let Some(json) = message else {
                    debug!(connection_id = %id, "Outbound queue closed");
                    let _ = write_with_deadline(&mut write, Message::Close(None), config.write_timeout).await;
                    break;
                };

                if let Err(e) = write_with_deadline(&mut write, Message::Text(json.into()), config.write_timeout).await {
                    warn!(connection_id = %id, error = %e, "Feedback write failed");
                    break;
                }
            }

            _ = ticker.tick() => {
                if let Err(e) = write_with_deadline(&mut write, Message::Ping(Vec::new().into()), config.write_timeout).await {
                    warn!(connection_id = %id, error = %e, "Ping failed");
                    break;
                }
                trace!(connection_id = %id, "Ping sent");
            }
        }
    }

    // Dropping `queue` on return also stops the inbound pump.
    let _ = timeout(config.write_timeout, write.close()).await;

    debug!(connection_id = %id, "Outbound pump exited");
}

/// Sends one message under a deadline.
async fn write_with_deadline<S>(
    write: &mut SplitSink<WebSocketStream<S>, Message>,
    message: Message,
    deadline: Duration,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match timeout(deadline, write.send(message)).await {
        Ok(result) => result.map_err(Error::from),
        Err(_) => Err(Error::timeout("socket write", deadline.as_millis() as u64)),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    use tokio::io::{DuplexStream, duplex};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::tungstenite::protocol::Role;
    use tokio_tungstenite::{MaybeTlsStream, accept_async, connect_async};

    type ClientStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

    /// Echoes the payload length back as the raised finger count.
    struct CountingHandler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FrameHandler for CountingHandler {
        async fn handle_frame(&self, payload: &[u8], exercise: &ExerciseId) -> Feedback {
            let _ = self.calls.fetch_add(1, Ordering::SeqCst);
            let mut feedback = Feedback::error(exercise, "stub");
            feedback.raised_fingers = payload.len() as u32;
            feedback
        }
    }

    async fn socket_pair() -> (WebSocketStream<TcpStream>, ClientStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let (ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
            ws
        });

        let (stream, _) = listener.accept().await.unwrap();
        let server = accept_async(stream).await.unwrap();
        (server, client.await.unwrap())
    }

    /// An in-memory socket pair with a small buffer in each direction.
    async fn duplex_pair(
        buffer: usize,
    ) -> (WebSocketStream<DuplexStream>, WebSocketStream<DuplexStream>) {
        let (server, client) = duplex(buffer);
        let server = WebSocketStream::from_raw_socket(server, Role::Server, None).await;
        let client = WebSocketStream::from_raw_socket(client, Role::Client, None).await;
        (server, client)
    }

    fn counting() -> Arc<CountingHandler> {
        Arc::new(CountingHandler {
            calls: AtomicUsize::new(0),
        })
    }

    #[test]
    fn test_default_pump_config() {
        let config = PumpConfig::default();
        assert_eq!(config.write_timeout.as_secs(), 10);
        assert_eq!(config.ping_interval.as_secs(), 30);
        assert!(config.read_timeout > config.ping_interval);
    }

    #[tokio::test]
    async fn test_outbox_push_and_receive() {
        let (outbox, mut queue) = Outbox::channel(4);
        assert!(outbox.push("hello".into()));
        assert_eq!(queue.recv().await.as_deref(), Some("hello"));
        assert_eq!(outbox.dropped(), 0);
    }

    #[tokio::test]
    async fn test_outbox_drops_beyond_capacity() {
        let capacity = 8;
        let (outbox, _queue) = Outbox::channel(capacity);

        let accepted = (0..capacity + 5)
            .filter(|i| outbox.push(format!("msg-{i}")))
            .count();

        assert_eq!(accepted, capacity);
        assert_eq!(outbox.dropped(), 5);
    }

    #[tokio::test]
    async fn test_outbox_counts_push_to_closed_queue() {
        let (outbox, queue) = Outbox::channel(4);
        drop(queue);

        assert!(outbox.is_closed());
        assert!(!outbox.push("late".into()));
        assert_eq!(outbox.dropped(), 1);
    }

    #[test]
    fn test_outbox_capacity_is_clamped() {
        let (outbox, _queue) = Outbox::channel(0);
        assert_eq!(outbox.capacity(), 1);
    }

    #[tokio::test]
    async fn test_pumps_relay_in_order_and_unregister_on_close() {
        let hub = Hub::start();
        let (server, mut client) = socket_pair().await;

        let connection = Connection::new(server, ExerciseId::from("fist"), 16);
        let id = connection.id();
        hub.register(connection.registration());

        let handler = counting();
        let handles = connection.spawn(hub.clone(), handler.clone(), PumpConfig::default());

        for len in 1..=5usize {
            client.send(Message::Text("x".repeat(len).into())).await.unwrap();
        }

        let mut seen = Vec::new();
        while seen.len() < 5 {
            match client.next().await.unwrap().unwrap() {
                Message::Text(text) => {
                    let feedback: Feedback = serde_json::from_str(text.as_str()).unwrap();
                    seen.push(feedback.raised_fingers);
                }
                _ => continue,
            }
        }
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert!(hub.contains(id).await);

        client.close(None).await.unwrap();

        let stats = handles.inbound.await.unwrap();
        assert_eq!(stats.frames_received, 5);
        assert_eq!(stats.feedback_enqueued, 5);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 5);

        handles.outbound.await.unwrap();
        assert!(!hub.contains(id).await);

        hub.shutdown();
    }

    #[tokio::test]
    async fn test_silent_peer_hits_read_deadline() {
        let hub = Hub::start();
        let (server, mut client) = socket_pair().await;

        let connection = Connection::new(server, ExerciseId::from("fist"), 4);
        let id = connection.id();
        hub.register(connection.registration());

        let config = PumpConfig {
            write_timeout: Duration::from_secs(1),
            ping_interval: Duration::from_secs(60),
            read_timeout: Duration::from_millis(100),
        };
        let handler = counting();
        let handles = connection.spawn(hub.clone(), handler, config);

        let stats = handles.inbound.await.unwrap();
        assert_eq!(stats.frames_received, 0);
        assert!(!hub.contains(id).await);

        // Unregistering dropped the last outbox, so the queue closed.
        let message = timeout(Duration::from_secs(2), client.next())
            .await
            .expect("close within deadline")
            .unwrap()
            .unwrap();
        assert!(matches!(message, Message::Close(_)));
        handles.outbound.await.unwrap();

        hub.shutdown();
    }

    #[tokio::test]
    async fn test_closed_queue_drains_then_sends_close_frame() {
        let (server, mut client) = socket_pair().await;
        let (write, _read) = server.split();
        let (outbox, queue) = Outbox::channel(4);

        let pump = tokio::spawn(run_outbound(
            ConnectionId::next(),
            write,
            queue,
            PumpConfig::default(),
        ));

        assert!(outbox.push(r#"{"status":"success"}"#.into()));
        drop(outbox);

        let first = client.next().await.unwrap().unwrap();
        assert_eq!(first.into_text().unwrap().as_str(), r#"{"status":"success"}"#);

        let second = client.next().await.unwrap().unwrap();
        assert!(matches!(second, Message::Close(_)));

        timeout(Duration::from_secs(2), pump)
            .await
            .expect("pump exits after close")
            .unwrap();
    }

    #[tokio::test]
    async fn test_next_message_classifies_stop_reasons() {
        let (server, mut client) = duplex_pair(1024).await;
        let (_write, mut read) = server.split();
        let (outbox, queue) = Outbox::channel(4);
        let read_timeout = Duration::from_secs(5);

        client.send(Message::Text("{}".into())).await.unwrap();
        let message = next_message(&mut read, &outbox, read_timeout).await.unwrap();
        assert!(matches!(message, Message::Text(_)));

        drop(queue);
        let err = next_message(&mut read, &outbox, read_timeout).await.unwrap_err();
        assert!(matches!(err, Error::Connection { .. }));
        assert!(err.is_connection_error());

        let (outbox, _queue) = Outbox::channel(4);
        client.close(None).await.unwrap();
        let err = next_message(&mut read, &outbox, read_timeout).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_next_message_times_out_on_silence() {
        let (server, _client) = duplex_pair(1024).await;
        let (_write, mut read) = server.split();
        let (outbox, _queue) = Outbox::channel(4);

        let err = next_message(&mut read, &outbox, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(!err.is_connection_error());
    }

    #[tokio::test]
    async fn test_stalled_writer_stops_both_pumps() {
        let hub = Hub::start();
        let (server, mut client) = duplex_pair(1024).await;

        let connection = Connection::new(server, ExerciseId::from("fist"), 64);
        let id = connection.id();
        hub.register(connection.registration());

        // Read deadline far beyond the test: only the stalled write can end it.
        let config = PumpConfig {
            write_timeout: Duration::from_millis(100),
            ping_interval: Duration::from_secs(60),
            read_timeout: Duration::from_secs(30),
        };
        let handles = connection.spawn(hub.clone(), counting(), config);

        // Keeps sending frames and never reads, so feedback backs up.
        let sender = tokio::spawn(async move {
            for _ in 0..500 {
                if client.send(Message::Text("{}".into())).await.is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        });

        timeout(Duration::from_secs(5), handles.outbound)
            .await
            .expect("outbound pump gives up on the stalled write")
            .unwrap();

        let stats = timeout(Duration::from_secs(5), handles.inbound)
            .await
            .expect("inbound pump stops with the outbound pump")
            .unwrap();

        assert!(stats.frames_received > 0);
        assert!(!hub.contains(id).await);

        sender.abort();
        hub.shutdown();
    }

    #[tokio::test]
    async fn test_outbound_pump_sends_keepalive_ping() {
        let hub = Hub::start();
        let (server, mut client) = socket_pair().await;

        let connection = Connection::new(server, ExerciseId::from("fist"), 4);
        let config = PumpConfig {
            write_timeout: Duration::from_secs(1),
            ping_interval: Duration::from_millis(50),
            read_timeout: Duration::from_secs(5),
        };
        let handler = counting();
        let _handles = connection.spawn(hub.clone(), handler, config);

        let message = timeout(Duration::from_secs(2), client.next())
            .await
            .expect("ping within deadline")
            .unwrap()
            .unwrap();
        assert!(matches!(message, Message::Ping(_)));

        hub.shutdown();
    }
}
