//! ws-events - Element-bound WebSocket connections.
//!
//! This library binds a connect attribute on a document element to a
//! persistent WebSocket. The connection reconnects with jittered backoff
//! after abnormal closures, lives exactly as long as its element stays in
//! the live document, and turns every inbound message into named events
//! dispatched on the element.
//!
//! # Architecture
//!
//! ```text
//! host lifecycle hooks ──► Coordinator ──► WebSocketWrapper ──► Socket
//!                                             │     ▲
//!                         LivenessGuard ◄─────┤     │ SocketEvent
//!                         MessageRouter ◄─────┘     │
//!                               │                   │
//!                               ▼                   │
//!                           EventBus (host)    SocketFactory
//! ```
//!
//! The host supplies the [`Document`] and [`EventBus`] collaborators; the
//! crate supplies everything between them and the network.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use ws_events::{Config, Coordinator, ElementId};
//!
//! let coordinator = Coordinator::new(Config::new(), document, bus);
//!
//! // Element subtree added to the page
//! coordinator.process_node(&ElementId::new(1));
//!
//! // Element removed from the page
//! coordinator.cleanup_element(&ElementId::new(1));
//! ```
//!
//! # Message Format
//!
//! - `refresh` dispatches the event `refresh`
//! - `{"refresh": null, "toast": "Saved"}` dispatches `refresh` then `toast`,
//!   each with `{ "value": ... }` as detail
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`attach`] | Coordinator, configuration, URL resolution |
//! | [`connection`] | Backoff, liveness guard, wrapper, router |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`host`] | Traits the embedding host implements |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Socket events and element notifications |
//! | [`transport`] | Socket traits, the default tungstenite socket, the trigger server |

// ============================================================================
// Modules
// ============================================================================

/// Element attachment.
///
/// Use [`Coordinator`] to connect elements discovered in the document.
pub mod attach;

/// Connection core.
///
/// Contains the [`WebSocketWrapper`] state machine and the pieces it uses.
pub mod connection;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Host collaborator traits.
pub mod host;

/// Type-safe identifiers.
pub mod identifiers;

/// Socket events and element notifications.
pub mod protocol;

/// Socket transport layer.
pub mod transport;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Attachment
pub use attach::{Config, Coordinator, resolve_source};

// Connection core
pub use connection::{
    ConnectionState, LivenessGuard, MessageRouter, ReconnectDelay, RouteOutcome,
    WebSocketWrapper, WrapperBuilder,
};

// Error types
pub use error::{Error, Result};

// Host traits
pub use host::{Document, EventBus};

// Identifier types
pub use identifiers::{ElementId, MemberId, WrapperId};

// Protocol types
pub use protocol::{
    CloseEvent, Event, EventDetail, Payload, ReadyState, SocketEvent, SocketEventKind, names,
};

// Transport types
pub use transport::{
    BinaryType, Socket, SocketEventSink, SocketFactory, TriggerServer, TungsteniteFactory,
};
