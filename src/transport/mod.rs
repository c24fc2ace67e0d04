//! WebSocket transport layer.
//!
//! This module owns everything that touches client sockets: the routed
//! upgrade, the per-connection pumps and the hub that tracks live
//! connections.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  /ws/exercise/{id}  ┌───────────────────────────────┐
//! │ Client       │◄───────────────────►│ Connection                    │
//! │ (camera app) │      WebSocket      │  inbound pump ─► Outbox ─►    │
//! └──────────────┘                     │  outbound pump (+ keepalive)  │
//!                                      └──────────────┬────────────────┘
//!                                                     │ register / unregister
//!                                                     ▼
//!                                      ┌───────────────────────────────┐
//!                                      │ Hub (single coordinator task) │
//!                                      └───────────────────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Listener` - Accept the TCP socket
//! 2. `accept_exercise_stream` - Upgrade and bind the exercise from the path
//! 3. `Connection::new` - Wrap the socket with a bounded outbound queue
//! 4. `Hub::register` - Add to the live set
//! 5. `Connection::spawn` - Start inbound and outbound pumps
//! 6. Inbound pump exit - `Hub::unregister`, queue closes, outbound pump exits
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Connection, outbox and pumps |
//! | `hub` | Live connection registry |
//! | `listener` | TCP accept loop |
//! | `upgrade` | Routed WebSocket handshake |

// ============================================================================
// Submodules
// ============================================================================

/// Connection, outbox and pumps.
pub mod connection;

/// Live connection registry.
pub mod hub;

/// TCP accept loop.
pub mod listener;

/// Routed WebSocket handshake.
pub mod upgrade;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, FrameHandler, Outbox, PumpConfig, PumpHandles, PumpStats};
pub use hub::{ConnectionInfo, Hub, Registration};
pub use listener::Listener;
pub use upgrade::{EXERCISE_ROUTE_PREFIX, accept_exercise_stream, route_exercise};
