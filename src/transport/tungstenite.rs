//! Default socket backed by `tokio-tungstenite`.
//!
//! Each socket spawns one tokio task that performs the handshake, pumps
//! inbound frames into the event sink and writes outbound commands.
//!
//! # Event Order
//!
//! ```text
//! connect ok:    open → message* → [error] → close
//! connect error: error → close(1006)
//! ```
//!
//! A connection that drops without a close frame reports code 1006, the
//! same way browsers do.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::{CloseEvent, Payload, ReadyState, SocketEvent, close_code};

use super::socket::{BinaryType, Socket, SocketEventSink, SocketFactory};

// ============================================================================
// SocketCommand
// ============================================================================

/// Internal commands for the socket task.
enum SocketCommand {
    /// Send a text frame.
    Send(String),
    /// Start the close handshake.
    Close,
}

// ============================================================================
// TungsteniteFactory
// ============================================================================

/// Creates [`TungsteniteSocket`]s.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteFactory;

impl SocketFactory for TungsteniteFactory {
    fn create(
        &self,
        url: &Url,
        binary_type: BinaryType,
        events: SocketEventSink,
    ) -> Arc<dyn Socket> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let state = Arc::new(AtomicU8::new(ReadyState::Connecting as u8));

        tokio::spawn(run_socket(
            url.clone(),
            binary_type,
            events,
            command_rx,
            Arc::clone(&state),
        ));

        Arc::new(TungsteniteSocket { command_tx, state })
    }
}

// ============================================================================
// TungsteniteSocket
// ============================================================================

/// Handle to a socket task.
pub struct TungsteniteSocket {
    /// Channel for sending commands to the socket task.
    command_tx: mpsc::UnboundedSender<SocketCommand>,
    /// Ready state (shared with the socket task).
    state: Arc<AtomicU8>,
}

impl Socket for TungsteniteSocket {
    fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn send(&self, text: &str) -> Result<()> {
        if self.ready_state() != ReadyState::Open {
            return Err(Error::NotConnected);
        }

        self.command_tx
            .send(SocketCommand::Send(text.to_owned()))
            .map_err(|_| Error::ConnectionClosed)
    }

    fn close(&self) {
        let previous = self.ready_state();
        if matches!(previous, ReadyState::Closing | ReadyState::Closed) {
            return;
        }

        self.state
            .store(ReadyState::Closing as u8, Ordering::Release);
        let _ = self.command_tx.send(SocketCommand::Close);
    }
}

// ============================================================================
// Socket Task
// ============================================================================

/// Runs one connection from handshake to close.
async fn run_socket(
    url: Url,
    binary_type: BinaryType,
    events: SocketEventSink,
    mut command_rx: mpsc::UnboundedReceiver<SocketCommand>,
    state: Arc<AtomicU8>,
) {
    let ws_stream = tokio::select! {
        result = connect_async(url.as_str()) => match result {
            Ok((stream, _response)) => stream,
            Err(e) => {
                let err = Error::from(e);
                warn!(%url, error = %err, "WebSocket connect failed");
                events.emit(SocketEvent::Error(err.to_string()));
                finish(&state, &events, CloseEvent::abnormal());
                return;
            }
        },

        _ = wait_for_close(&mut command_rx) => {
            debug!(%url, "Socket closed before handshake completed");
            finish(&state, &events, CloseEvent::abnormal());
            return;
        }
    };

    // A close requested during the handshake wins over the open transition
    if state
        .compare_exchange(
            ReadyState::Connecting as u8,
            ReadyState::Open as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        )
        .is_ok()
    {
        debug!(%url, "WebSocket open");
        events.emit(SocketEvent::Open);
    }

    let (mut ws_write, mut ws_read) = ws_stream.split();
    let mut commands_open = true;

    let close_event = loop {
        tokio::select! {
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        trace!(len = text.len(), "Text frame received");
                        events.emit(SocketEvent::Message(Payload::Text(text.to_string())));
                    }

                    Some(Ok(Message::Binary(data))) => {
                        let payload = match binary_type {
                            BinaryType::Blob => Payload::Binary(data.to_vec()),
                            BinaryType::Text => {
                                Payload::Text(String::from_utf8_lossy(&data).into_owned())
                            }
                        };
                        events.emit(SocketEvent::Message(payload));
                    }

                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "WebSocket closed by remote");
                        break match frame {
                            Some(frame) => {
                                CloseEvent::new(u16::from(frame.code), frame.reason.to_string(), true)
                            }
                            None => CloseEvent::new(close_code::NO_STATUS, "", true),
                        };
                    }

                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        events.emit(SocketEvent::Error(e.to_string()));
                        break CloseEvent::abnormal();
                    }

                    None => {
                        debug!("WebSocket stream ended without close frame");
                        break CloseEvent::abnormal();
                    }

                    // Ignore Ping, Pong, raw Frame
                    Some(Ok(_)) => {}
                }
            }

            command = command_rx.recv(), if commands_open => {
                match command {
                    Some(SocketCommand::Send(text)) => {
                        if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                            warn!(error = %e, "Failed to send text frame");
                        }
                    }

                    // Handle dropped: close the connection as well
                    Some(SocketCommand::Close) | None => {
                        commands_open = false;
                        state.store(ReadyState::Closing as u8, Ordering::Release);
                        if let Err(e) = ws_write.close().await {
                            debug!(error = %e, "Close handshake failed");
                        }
                    }
                }
            }
        }
    };

    finish(&state, &events, close_event);
}

/// Resolves once a close is requested or every handle is dropped.
async fn wait_for_close(command_rx: &mut mpsc::UnboundedReceiver<SocketCommand>) {
    loop {
        match command_rx.recv().await {
            Some(SocketCommand::Close) | None => return,
            // Sends are rejected before open, nothing to flush
            Some(SocketCommand::Send(_)) => {}
        }
    }
}

/// Marks the socket closed and emits the final close event.
fn finish(state: &AtomicU8, events: &SocketEventSink, close_event: CloseEvent) {
    state.store(ReadyState::Closed as u8, Ordering::Release);
    debug!(code = close_event.code, "Socket task terminated");
    events.emit(SocketEvent::Close(close_event));
}

// ============================================================================
// Tests
// ============================================================================
