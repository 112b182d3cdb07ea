//! Socket transport layer.
//!
//! The wrapper talks to sockets only through the [`Socket`] and
//! [`SocketFactory`] traits. [`TungsteniteFactory`] is the default
//! implementation over `tokio-tungstenite`. [`TriggerServer`] is the
//! matching server that broadcasts payloads to groups of clients.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   create(url, sink)   ┌──────────────────┐
//! │ WebSocketWrapper │──────────────────────►│  SocketFactory   │
//! │                  │                       └────────┬─────────┘
//! │   signal loop    │◄──── SocketEventSink ──────────┤
//! │                  │                       ┌────────▼─────────┐
//! │                  │── send / close ──────►│  Socket (task)   │
//! └──────────────────┘                       └──────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `server` | Group broadcast server |
//! | `socket` | Socket traits and event sink |
//! | `tungstenite` | Default `tokio-tungstenite` socket |

// ============================================================================
// Submodules
// ============================================================================

/// Group broadcast server.
pub mod server;

/// Socket traits and event sink.
pub mod socket;

/// Default socket implementation.
pub mod tungstenite;

// ============================================================================
// Re-exports
// ============================================================================

pub use server::{TriggerServer, group_from_path};
pub use socket::{BinaryType, Socket, SocketEventSink, SocketFactory};
pub use tungstenite::{TungsteniteFactory, TungsteniteSocket};
