//! Events dispatched on the owning element.
//!
//! Lifecycle notifications use the fixed names in [`names`]. Application
//! events produced by the message router are named by the server.

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Value, json};

use crate::connection::WebSocketWrapper;

use super::event::CloseEvent;

// ============================================================================
// Event Names
// ============================================================================

/// Names of the lifecycle notifications.
pub mod names {
    /// A socket is about to be created. Not cancellable.
    pub const CONNECTING: &str = "htmx:wsEventConnecting";
    /// The socket opened.
    pub const OPEN: &str = "htmx:wsEventOpen";
    /// The socket closed.
    pub const CLOSE: &str = "htmx:wsEventClose";
    /// The socket reported an error. Dispatched as an error-kind event.
    pub const ERROR: &str = "htmx:wsEventError";
    /// A message arrived. Cancellable: a veto skips the message entirely.
    pub const BEFORE_MESSAGE: &str = "htmx:wsEventBeforeMessage";
    /// A message finished routing.
    pub const AFTER_MESSAGE: &str = "htmx:wsEventAfterMessage";
    /// A JSON payload could not be decoded. Dispatched as an error-kind event.
    pub const DECODE_ERROR: &str = "htmx:wsEventDecodeError";
}

// ============================================================================
// EventDetail
// ============================================================================

/// Detail attached to a dispatched event.
#[derive(Debug, Clone)]
pub enum EventDetail {
    /// No detail. Used for single-name application events.
    None,
    /// Value for one key of a multi-event payload.
    Value(Value),
    /// A connection attempt is starting.
    Connecting,
    /// The socket opened.
    Open {
        /// Public handle of the wrapper.
        socket: WebSocketWrapper,
    },
    /// The socket closed.
    Close {
        /// Raw close event.
        event: CloseEvent,
        /// Public handle of the wrapper.
        socket: WebSocketWrapper,
    },
    /// The socket reported an error.
    Error {
        /// Error text from the transport.
        error: String,
        /// Public handle of the wrapper.
        socket: WebSocketWrapper,
    },
    /// Before/after message notifications.
    Message {
        /// Raw payload.
        message: String,
        /// Public handle of the wrapper.
        socket: WebSocketWrapper,
    },
    /// A payload failed to decode.
    DecodeError {
        /// Raw payload.
        message: String,
        /// Decoder error.
        error: String,
        /// Public handle of the wrapper.
        socket: WebSocketWrapper,
    },
}

impl EventDetail {
    /// Returns the wrapper handle carried by lifecycle details.
    #[must_use]
    pub fn socket(&self) -> Option<&WebSocketWrapper> {
        match self {
            Self::Open { socket }
            | Self::Close { socket, .. }
            | Self::Error { socket, .. }
            | Self::Message { socket, .. }
            | Self::DecodeError { socket, .. } => Some(socket),
            Self::None | Self::Value(_) | Self::Connecting => None,
        }
    }

    /// Returns the application value, if any.
    #[inline]
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Renders the detail as JSON for hosts with a JSON event bus.
    ///
    /// Wrapper handles are rendered as their id.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::None => Value::Null,
            Self::Value(value) => json!({ "value": value }),
            Self::Connecting => json!({ "event": { "type": "connecting" } }),
            Self::Open { socket } => json!({
                "event": { "type": "open" },
                "socketWrapper": socket.id(),
            }),
            Self::Close { event, socket } => json!({
                "event": event,
                "socketWrapper": socket.id(),
            }),
            Self::Error { error, socket } => json!({
                "error": error,
                "socketWrapper": socket.id(),
            }),
            Self::Message { message, socket } => json!({
                "message": message,
                "socketWrapper": socket.id(),
            }),
            Self::DecodeError {
                message,
                error,
                socket,
            } => json!({
                "message": message,
                "error": error,
                "socketWrapper": socket.id(),
            }),
        }
    }
}

// ============================================================================
// Event
// ============================================================================

/// A named event dispatched on an element.
#[derive(Debug, Clone)]
pub struct Event {
    /// Event name.
    pub name: String,
    /// Attached detail.
    pub detail: EventDetail,
}

impl Event {
    /// Creates an event.
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, detail: EventDetail) -> Self {
        Self {
            name: name.into(),
            detail,
        }
    }

    /// Creates an event without detail.
    #[inline]
    #[must_use]
    pub fn bare(name: impl Into<String>) -> Self {
        Self::new(name, EventDetail::None)
    }
}

// ============================================================================
// Tests
// ============================================================================
