//! Socket abstraction.
//!
//! A [`Socket`] is a handle to one low-level connection. It reports what
//! happens to it through the [`SocketEventSink`] it was created with.
//! [`SocketFactory`] is the strategy the wrapper uses to create sockets,
//! so hosts and tests can replace the network transport.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::mpsc;
use url::Url;

use crate::connection::wrapper::Signal;
use crate::error::{Error, Result};
use crate::protocol::{ReadyState, SocketEvent};

// ============================================================================
// BinaryType
// ============================================================================

/// How binary frames are surfaced to listeners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BinaryType {
    /// Deliver binary frames as raw bytes.
    #[default]
    Blob,
    /// Decode binary frames as UTF-8 (lossy) and deliver them as text.
    Text,
}

impl FromStr for BinaryType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "blob" | "arraybuffer" => Ok(Self::Blob),
            "text" => Ok(Self::Text),
            other => Err(Error::config(format!(
                "binary type must be \"blob\", \"arraybuffer\" or \"text\", got \"{other}\""
            ))),
        }
    }
}

// ============================================================================
// Socket
// ============================================================================

/// Handle to one low-level connection.
pub trait Socket: Send + Sync {
    /// Current connection state.
    fn ready_state(&self) -> ReadyState;

    /// Sends a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] unless the socket is open.
    fn send(&self, text: &str) -> Result<()>;

    /// Starts the close handshake. A `close` event follows.
    fn close(&self);
}

// ============================================================================
// SocketFactory
// ============================================================================

/// Creates sockets.
///
/// `create` must return without waiting for the connection; progress is
/// reported through `events`.
pub trait SocketFactory: Send + Sync {
    /// Creates a socket connecting to `url`.
    fn create(&self, url: &Url, binary_type: BinaryType, events: SocketEventSink)
    -> Arc<dyn Socket>;
}

// ============================================================================
// SocketEventSink
// ============================================================================

/// Where a socket reports its events.
///
/// Each sink is bound to the connection attempt that created it; events
/// sent after the wrapper has moved on to a newer socket are dropped.
#[derive(Clone)]
pub struct SocketEventSink {
    /// Connection attempt this sink belongs to.
    generation: u64,
    /// Wrapper signal channel.
    tx: mpsc::UnboundedSender<Signal>,
}

impl SocketEventSink {
    /// Creates a sink for the given connection attempt.
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<Signal>) -> Self {
        Self { generation, tx }
    }

    /// Reports an event. Returns `false` once the wrapper has shut down.
    pub fn emit(&self, event: SocketEvent) -> bool {
        self.tx
            .send(Signal::Socket {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

impl fmt::Debug for SocketEventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketEventSink")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
