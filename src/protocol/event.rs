//! Socket-level events.
//!
//! Every socket implementation reports what happens to it through these
//! types, whichever transport sits underneath.
//!
//! # Event Kinds
//!
//! | Kind | Payload | Emitted |
//! |------|---------|---------|
//! | `open` | - | Handshake completed |
//! | `message` | [`Payload`] | Frame received |
//! | `error` | error text | Transport failure |
//! | `close` | [`CloseEvent`] | Socket closed, always last |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::Serialize;

// ============================================================================
// Close Codes
// ============================================================================

/// WebSocket close codes referenced by the reconnect policy (RFC 6455 §7.4).
pub mod close_code {
    /// Normal closure.
    pub const NORMAL: u16 = 1000;
    /// Endpoint going away.
    pub const GOING_AWAY: u16 = 1001;
    /// No status code was present in the close frame.
    pub const NO_STATUS: u16 = 1005;
    /// Connection dropped without a close frame.
    pub const ABNORMAL: u16 = 1006;
    /// Server is restarting.
    pub const SERVICE_RESTART: u16 = 1012;
    /// Server is overloaded, try again later.
    pub const TRY_AGAIN_LATER: u16 = 1013;

    /// Codes after which the server expects clients to reconnect.
    pub const TRANSIENT: [u16; 3] = [ABNORMAL, SERVICE_RESTART, TRY_AGAIN_LATER];
}

// ============================================================================
// ReadyState
// ============================================================================

/// Connection state of a single socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReadyState {
    /// Handshake in progress.
    Connecting = 0,
    /// Open and able to send.
    Open = 1,
    /// Close handshake in progress.
    Closing = 2,
    /// Closed or never opened.
    Closed = 3,
}

impl ReadyState {
    /// Converts a raw state byte, treating unknown values as closed.
    #[inline]
    #[must_use]
    pub const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connecting,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

// ============================================================================
// CloseEvent
// ============================================================================

/// Details of a socket closure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseEvent {
    /// Close code sent by the peer, or synthesized for dropped connections.
    pub code: u16,
    /// Close reason sent by the peer.
    pub reason: String,
    /// Whether the close handshake completed.
    pub was_clean: bool,
}

impl CloseEvent {
    /// Creates a close event.
    #[inline]
    #[must_use]
    pub fn new(code: u16, reason: impl Into<String>, was_clean: bool) -> Self {
        Self {
            code,
            reason: reason.into(),
            was_clean,
        }
    }

    /// Close event for a connection lost without a close frame.
    #[inline]
    #[must_use]
    pub fn abnormal() -> Self {
        Self::new(close_code::ABNORMAL, "", false)
    }

    /// Returns `true` if the server expects the client to reconnect.
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        close_code::TRANSIENT.contains(&self.code)
    }
}

// ============================================================================
// Payload
// ============================================================================

/// Data carried by a message event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Text frame.
    Text(String),
    /// Binary frame, delivered raw.
    Binary(Vec<u8>),
}

impl Payload {
    /// Returns the text, if this is a text payload.
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }
}

// ============================================================================
// SocketEvent
// ============================================================================

/// An event reported by a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// The connection is open.
    Open,
    /// A message arrived.
    Message(Payload),
    /// A transport error occurred.
    Error(String),
    /// The connection closed. No further events follow.
    Close(CloseEvent),
}

impl SocketEvent {
    /// Returns the kind of this event.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> SocketEventKind {
        match self {
            Self::Open => SocketEventKind::Open,
            Self::Message(_) => SocketEventKind::Message,
            Self::Error(_) => SocketEventKind::Error,
            Self::Close(_) => SocketEventKind::Close,
        }
    }
}

// ============================================================================
// SocketEventKind
// ============================================================================

/// The closed set of socket events listeners can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketEventKind {
    /// `open`
    Open,
    /// `message`
    Message,
    /// `error`
    Error,
    /// `close`
    Close,
}

impl SocketEventKind {
    /// Returns the DOM-style event name.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Message => "message",
            Self::Error => "error",
            Self::Close => "close",
        }
    }
}

impl fmt::Display for SocketEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
