//! TCP accept loop.
//!
//! Accepts sockets on the bound address and hands each one to the
//! [`RelayHandler`] on its own task, so a slow handshake never blocks the
//! next accept.

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::relay::RelayHandler;

// ============================================================================
// Constants
// ============================================================================

/// How often the accept loop re-checks the shutdown flag.
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ============================================================================
// Listener
// ============================================================================

/// Bound listening socket with a running accept loop.
#[derive(Debug)]
pub struct Listener {
    local_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
}

impl Listener {
    /// Binds `addr` and starts accepting exercise streams.
    ///
    /// Port 0 picks a free port; see [`Listener::local_addr`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Io`] if binding fails.
    pub async fn bind(addr: SocketAddr, handler: Arc<RelayHandler>) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        let shutdown = Arc::new(AtomicBool::new(false));

        info!(%local_addr, "Relay listening");

        tokio::spawn(accept_loop(listener, handler, Arc::clone(&shutdown)));

        Ok(Self {
            local_addr,
            shutdown,
        })
    }

    /// Address actually bound.
    #[inline]
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting. Live connections are left to finish on their own.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`Listener::shutdown`] has been called.
    #[inline]
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// Accept Loop
// ============================================================================

async fn accept_loop(listener: TcpListener, handler: Arc<RelayHandler>, shutdown: Arc<AtomicBool>) {
    debug!("Accept loop started");

    loop {
        if shutdown.load(Ordering::SeqCst) {
            debug!("Accept loop shutting down");
            break;
        }

        // Bounded wait so the shutdown flag is seen promptly.
        match timeout(SHUTDOWN_POLL_INTERVAL, listener.accept()).await {
            Ok(Ok((stream, peer))) => {
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    if let Err(e) = serve_socket(handler, stream, peer).await {
                        warn!(error = %e, %peer, "Upgrade failed");
                    }
                });
            }
            Ok(Err(e)) => {
                error!(error = %e, "Accept failed");
            }
            Err(_) => continue,
        }
    }

    debug!("Accept loop terminated");
}

async fn serve_socket(handler: Arc<RelayHandler>, stream: TcpStream, peer: SocketAddr) -> Result<()> {
    debug!(%peer, "New TCP connection");

    if let Err(e) = stream.set_nodelay(true) {
        debug!(%peer, error = %e, "Could not disable Nagle");
    }

    // Pumps run detached; their handles are not needed here.
    let (connection_id, _handles) = handler.handle_upgrade(stream, peer).await?;
    debug!(%connection_id, %peer, "Pumps started");
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
