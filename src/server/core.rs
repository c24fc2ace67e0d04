//! Running relay server.
//!
//! [`RelayServer`] owns the listener, the hub, the relay handler and the
//! session registry. It is created by [`RelayBuilder::build`] and stays up
//! until [`RelayServer::shutdown`] is called.
//!
//! # Example
//!
//! ```no_run
//! use exercise_relay::RelayServer;
//!
//! # async fn example() -> exercise_relay::Result<()> {
//! let server = RelayServer::builder()
//!     .bind("127.0.0.1:0")
//!     .analysis_url("http://localhost:5001")
//!     .build()
//!     .await?;
//!
//! println!("clients connect to {}", server.ws_url(&"fist".into()));
//!
//! server.shutdown();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tracing::info;

use crate::bridge::{BridgeClient, FrameAnalyzer};
use crate::error::Result;
use crate::identifiers::ExerciseId;
use crate::relay::RelayHandler;
use crate::session::SessionRegistry;
use crate::transport::{ConnectionInfo, EXERCISE_ROUTE_PREFIX, Hub, Listener};

use super::builder::{RelayBuilder, RelayConfig};
use super::options::RelayOptions;

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the server.
struct ServerInner {
    /// Accepting socket.
    listener: Listener,

    /// Live connection registry.
    hub: Hub,

    /// Upgrade and translation logic shared by all connections.
    handler: Arc<RelayHandler>,

    /// HTTP bridge, when an analysis URL was configured.
    bridge: Option<BridgeClient>,

    /// Exercise sessions.
    sessions: SessionRegistry,
}

// ============================================================================
// RelayServer
// ============================================================================

/// Exercise-frame relay server.
///
/// Cloning is cheap; clones refer to the same server.
#[derive(Clone)]
pub struct RelayServer {
    inner: Arc<ServerInner>,
}

impl fmt::Debug for RelayServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayServer")
            .field("local_addr", &self.local_addr())
            .field("bridge", &self.inner.bridge)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// RelayServer - Public API
// ============================================================================

impl RelayServer {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> RelayBuilder {
        RelayBuilder::new()
    }

    /// Address the server is bound to.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.listener.local_addr()
    }

    /// Port the server is bound to.
    #[inline]
    #[must_use]
    pub fn port(&self) -> u16 {
        self.local_addr().port()
    }

    /// Client URL for an exercise stream.
    ///
    /// Format: `ws://{host}:{port}/ws/exercise/{exercise}`. A wildcard bind
    /// address is reported as `127.0.0.1`.
    #[must_use]
    pub fn ws_url(&self, exercise: &ExerciseId) -> String {
        let addr = self.local_addr();
        let host = match addr.ip() {
            ip if ip.is_unspecified() => SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port()),
            _ => addr,
        };
        format!("ws://{host}{EXERCISE_ROUTE_PREFIX}{exercise}")
    }

    /// Live connection registry.
    #[inline]
    #[must_use]
    pub fn hub(&self) -> &Hub {
        &self.inner.hub
    }

    /// Exercise session registry.
    #[inline]
    #[must_use]
    pub fn sessions(&self) -> &SessionRegistry {
        &self.inner.sessions
    }

    /// HTTP bridge to the analysis service, if one was configured.
    #[inline]
    #[must_use]
    pub fn bridge(&self) -> Option<&BridgeClient> {
        self.inner.bridge.as_ref()
    }

    /// Frame analyzer used for scoring.
    #[inline]
    #[must_use]
    pub fn analyzer(&self) -> &Arc<dyn FrameAnalyzer> {
        self.inner.handler.analyzer()
    }

    /// Relay options in effect.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &RelayOptions {
        self.inner.handler.options()
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.inner.hub.connection_count().await
    }

    /// Snapshot of live connections.
    pub async fn connections(&self) -> Vec<ConnectionInfo> {
        self.inner.hub.connections().await
    }

    /// Stops accepting and stops the hub.
    ///
    /// Connections already open keep running until their client leaves or
    /// their read deadline passes.
    pub fn shutdown(&self) {
        info!(local_addr = %self.local_addr(), "Relay shutting down");
        self.inner.listener.shutdown();
        self.inner.hub.shutdown();
    }

    /// Returns `true` once [`RelayServer::shutdown`] has been called.
    #[inline]
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.listener.is_shut_down()
    }
}

// ============================================================================
// RelayServer - Internal
// ============================================================================

impl RelayServer {
    /// Starts the hub and the accept loop.
    pub(crate) async fn start(config: RelayConfig) -> Result<Self> {
        let RelayConfig {
            bind,
            analyzer,
            bridge,
            options,
        } = config;

        let hub = Hub::start();
        let handler = Arc::new(RelayHandler::new(hub.clone(), analyzer, options));

        let listener = match Listener::bind(bind, Arc::clone(&handler)).await {
            Ok(listener) => listener,
            Err(e) => {
                hub.shutdown();
                return Err(e);
            }
        };

        info!(
            local_addr = %listener.local_addr(),
            bridge = ?bridge.as_ref().map(|b| b.base_url().as_str()),
            exercises = ?handler.options().exercises,
            "Relay started"
        );

        Ok(Self {
            inner: Arc::new(ServerInner {
                listener,
                hub,
                handler,
                bridge,
                sessions: SessionRegistry::new(),
            }),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
