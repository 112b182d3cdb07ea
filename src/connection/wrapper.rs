//! Reconnecting socket wrapper.
//!
//! A [`WebSocketWrapper`] owns one socket at a time for one element. It
//! creates a fresh socket through its factory on every connection attempt,
//! replays caller listeners onto it, and reconnects with backoff after
//! transient closures.
//!
//! # State Machine
//!
//! ```text
//!              ┌───────────── retry timer ─────────────┐
//!              ▼                                       │
//! spawn ──► Connecting ──open──► Open ──close(1006/1012/1013)──► Retrying
//!              │                  │
//!              └──── close(other) / close() / orphaned ───► Closed
//! ```
//!
//! # Signal Loop
//!
//! The wrapper spawns a tokio task that owns all mutable state and handles
//! one signal at a time:
//!
//! - Socket events, tagged with the connection attempt that produced them
//! - Retry timer ticks
//! - Listener registrations and close requests from handles
//!
//! Events tagged with an older attempt come from a discarded socket and
//! are dropped.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::host::{Document, EventBus};
use crate::identifiers::{ElementId, WrapperId};
use crate::protocol::{
    CloseEvent, Event, EventDetail, ReadyState, SocketEvent, SocketEventKind, names,
};
use crate::transport::{Socket, SocketEventSink};

use super::backoff::ReconnectDelay;
use super::liveness::LivenessGuard;

// ============================================================================
// Types
// ============================================================================

/// Listener callback for socket events.
///
/// Receives the event and the public handle of the wrapper.
pub type Listener = Arc<dyn Fn(&SocketEvent, &WebSocketWrapper) + Send + Sync>;

/// Creates a new socket reporting to the given sink.
pub type ConnectFn = Box<dyn Fn(SocketEventSink) -> Arc<dyn Socket> + Send + Sync>;

// ============================================================================
// Signal
// ============================================================================

/// Internal signals for the wrapper task.
pub(crate) enum Signal {
    /// Event from the socket created by connection attempt `generation`.
    Socket {
        generation: u64,
        event: SocketEvent,
    },
    /// Retry timer armed after attempt `generation` closed.
    Retry { generation: u64 },
    /// Register a listener.
    AddListener {
        kind: SocketEventKind,
        listener: Listener,
    },
    /// Tear the wrapper down.
    Close,
}

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of a wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Waiting for the current socket to open.
    Connecting,
    /// Current socket is open.
    Open,
    /// Closed transiently, waiting for the retry timer.
    Retrying,
    /// Torn down. No further reconnects.
    Closed,
}

// ============================================================================
// Shared
// ============================================================================

/// State visible to handles (written by the wrapper task).
struct Shared {
    /// Wrapper id.
    id: WrapperId,
    /// Owning element.
    element: ElementId,
    /// Set as soon as a close is requested.
    closing: AtomicBool,
    /// Latest published status.
    status: Mutex<Status>,
}

/// Snapshot of the wrapper task's state.
struct Status {
    state: ConnectionState,
    retry_count: u32,
    socket: Option<Arc<dyn Socket>>,
}

// ============================================================================
// WebSocketWrapper
// ============================================================================

/// Public handle to a reconnecting socket wrapper.
///
/// Cheap to clone. All clones control the same wrapper.
///
/// # Example
///
/// ```ignore
/// let wrapper = WebSocketWrapper::builder(element, document, bus)
///     .factory(move |sink| factory.create(&url, BinaryType::Blob, sink))
///     .listener(SocketEventKind::Message, |event, _| println!("{event:?}"))
///     .spawn()?;
///
/// wrapper.send("hello")?;
/// wrapper.close();
/// ```
#[derive(Clone)]
pub struct WebSocketWrapper {
    /// State shared with the wrapper task.
    shared: Arc<Shared>,
    /// Channel for sending signals to the wrapper task.
    tx: mpsc::UnboundedSender<Signal>,
}

impl WebSocketWrapper {
    /// Starts configuring a wrapper for `element`.
    #[inline]
    #[must_use]
    pub fn builder(
        element: ElementId,
        document: Arc<dyn Document>,
        bus: Arc<dyn EventBus>,
    ) -> WrapperBuilder {
        WrapperBuilder::new(element, document, bus)
    }

    /// Returns the wrapper id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> WrapperId {
        self.shared.id
    }

    /// Returns the owning element.
    #[inline]
    #[must_use]
    pub fn element(&self) -> ElementId {
        self.shared.element
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.status.lock().state
    }

    /// Returns the number of reconnects since the last successful open.
    #[inline]
    #[must_use]
    pub fn retry_count(&self) -> u32 {
        self.shared.status.lock().retry_count
    }

    /// Returns the ready state of the current socket.
    #[must_use]
    pub fn ready_state(&self) -> ReadyState {
        self.shared
            .status
            .lock()
            .socket
            .as_ref()
            .map_or(ReadyState::Closed, |socket| socket.ready_state())
    }

    /// Returns `true` once the wrapper is closed or closing.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closing.load(Ordering::Acquire) || self.state() == ConnectionState::Closed
    }

    /// Registers a listener for socket events.
    ///
    /// The listener stays registered across reconnects, and listeners for
    /// the same event run in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the wrapper has terminated.
    pub fn add_event_listener(
        &self,
        kind: SocketEventKind,
        listener: impl Fn(&SocketEvent, &WebSocketWrapper) + Send + Sync + 'static,
    ) -> Result<()> {
        self.tx
            .send(Signal::AddListener {
                kind,
                listener: Arc::new(listener),
            })
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Sends a text frame over the current socket.
    ///
    /// Nothing is queued: sending while connecting or retrying fails.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the wrapper is closed
    /// - [`Error::NotConnected`] if no socket is open
    pub fn send(&self, text: &str) -> Result<()> {
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        let socket = self.shared.status.lock().socket.clone();
        socket.ok_or(Error::NotConnected)?.send(text)
    }

    /// Closes the wrapper. No reconnect follows, whatever the close code.
    pub fn close(&self) {
        if self.shared.closing.swap(true, Ordering::AcqRel) {
            return;
        }

        let _ = self.tx.send(Signal::Close);
    }
}

impl fmt::Debug for WebSocketWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocketWrapper")
            .field("id", &self.shared.id)
            .field("element", &self.shared.element)
            .field("state", &self.state())
            .finish()
    }
}

impl PartialEq for WebSocketWrapper {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for WebSocketWrapper {}

// ============================================================================
// WrapperBuilder
// ============================================================================

/// Builder for [`WebSocketWrapper`].
pub struct WrapperBuilder {
    element: ElementId,
    document: Arc<dyn Document>,
    bus: Arc<dyn EventBus>,
    connect: Option<ConnectFn>,
    reconnect_delay: ReconnectDelay,
    listeners: Vec<(SocketEventKind, Listener)>,
}

impl WrapperBuilder {
    /// Creates a builder with the default reconnect delay and no factory.
    #[must_use]
    pub fn new(element: ElementId, document: Arc<dyn Document>, bus: Arc<dyn EventBus>) -> Self {
        Self {
            element,
            document,
            bus,
            connect: None,
            reconnect_delay: ReconnectDelay::default(),
            listeners: Vec::new(),
        }
    }

    /// Sets the function that creates a socket for each attempt.
    #[inline]
    #[must_use]
    pub fn factory(
        mut self,
        connect: impl Fn(SocketEventSink) -> Arc<dyn Socket> + Send + Sync + 'static,
    ) -> Self {
        self.connect = Some(Box::new(connect));
        self
    }

    /// Sets the reconnect delay policy.
    #[inline]
    #[must_use]
    pub fn reconnect_delay(mut self, policy: ReconnectDelay) -> Self {
        self.reconnect_delay = policy;
        self
    }

    /// Registers a listener before the first socket is created.
    #[inline]
    #[must_use]
    pub fn listener(
        mut self,
        kind: SocketEventKind,
        listener: impl Fn(&SocketEvent, &WebSocketWrapper) + Send + Sync + 'static,
    ) -> Self {
        self.listeners.push((kind, Arc::new(listener)));
        self
    }

    /// Creates the wrapper and starts the first connection attempt.
    ///
    /// The attempt starts before this returns; the `connecting` event has
    /// already been dispatched. Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no factory was set.
    pub fn spawn(self) -> Result<WebSocketWrapper> {
        let connect = self
            .connect
            .ok_or_else(|| Error::config("socket factory is required. Use .factory() to set it."))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            id: WrapperId::generate(),
            element: self.element,
            closing: AtomicBool::new(false),
            status: Mutex::new(Status {
                state: ConnectionState::Connecting,
                retry_count: 0,
                socket: None,
            }),
        });
        let handle = WebSocketWrapper {
            shared,
            tx: tx.clone(),
        };

        let mut task = WrapperTask {
            handle: handle.clone(),
            guard: LivenessGuard::new(self.document, self.element),
            bus: self.bus,
            connect,
            reconnect_delay: self.reconnect_delay,
            listeners: self.listeners,
            tx,
            socket: None,
            generation: 0,
            state: ConnectionState::Connecting,
            retry_count: 0,
            closed: false,
            retry_timer: None,
        };

        info!(wrapper = %handle.id(), element = %handle.element(), "Wrapper created");

        task.enter_connecting();
        tokio::spawn(task.run(rx));

        Ok(handle)
    }
}

// ============================================================================
// WrapperTask
// ============================================================================

/// Owns the mutable wrapper state. Runs on its own tokio task.
struct WrapperTask {
    handle: WebSocketWrapper,
    guard: LivenessGuard,
    bus: Arc<dyn EventBus>,
    connect: ConnectFn,
    reconnect_delay: ReconnectDelay,
    listeners: Vec<(SocketEventKind, Listener)>,
    tx: mpsc::UnboundedSender<Signal>,
    socket: Option<Arc<dyn Socket>>,
    generation: u64,
    state: ConnectionState,
    retry_count: u32,
    /// Set by an explicit close or an orphaned element.
    closed: bool,
    retry_timer: Option<JoinHandle<()>>,
}

impl WrapperTask {
    /// Signal loop. Exits once the wrapper reaches `Closed`.
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Signal>) {
        while self.state != ConnectionState::Closed {
            let Some(signal) = rx.recv().await else {
                break;
            };

            match signal {
                Signal::Socket { generation, event } => {
                    if generation != self.generation {
                        trace!(
                            wrapper = %self.handle.id(),
                            generation,
                            current = self.generation,
                            "Dropping event from discarded socket"
                        );
                        continue;
                    }
                    self.handle_socket_event(event);
                }

                Signal::Retry { generation } => self.handle_retry(generation),

                Signal::AddListener { kind, listener } => self.listeners.push((kind, listener)),

                Signal::Close => self.handle_close_request(),
            }
        }

        if let Some(timer) = self.retry_timer.take() {
            timer.abort();
        }
        self.socket = None;
        self.state = ConnectionState::Closed;
        self.publish();

        debug!(wrapper = %self.handle.id(), "Wrapper terminated");
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    /// Starts a new connection attempt.
    ///
    /// Only entered with no current socket: at spawn, or from a retry after
    /// the previous socket reported its close.
    fn enter_connecting(&mut self) {
        self.generation += 1;
        self.state = ConnectionState::Connecting;

        debug!(
            wrapper = %self.handle.id(),
            generation = self.generation,
            retry_count = self.retry_count,
            "Connecting"
        );

        self.dispatch(names::CONNECTING, EventDetail::Connecting);

        // The sink exists before the socket, so no event can be missed
        let sink = SocketEventSink::new(self.generation, self.tx.clone());
        self.socket = Some((self.connect)(sink));
        self.publish();
    }

    fn handle_socket_event(&mut self, event: SocketEvent) {
        match &event {
            SocketEvent::Open => self.handle_open(),
            SocketEvent::Message(_) => {}
            SocketEvent::Error(error) => self.handle_error(error),
            SocketEvent::Close(close_event) => self.handle_close(close_event),
        }

        self.notify_listeners(&event);
    }

    fn handle_open(&mut self) {
        self.retry_count = 0;
        self.state = ConnectionState::Open;
        self.publish();

        info!(wrapper = %self.handle.id(), "Socket open");

        let socket = self.handle.clone();
        self.dispatch(names::OPEN, EventDetail::Open { socket });
    }

    fn handle_error(&mut self, error: &str) {
        warn!(wrapper = %self.handle.id(), error, "Socket error");

        self.bus.dispatch_error(
            &self.guard.element(),
            &Event::new(
                names::ERROR,
                EventDetail::Error {
                    error: error.to_owned(),
                    socket: self.handle.clone(),
                },
            ),
        );

        self.close_if_orphaned();
    }

    fn handle_close(&mut self, close_event: &CloseEvent) {
        // The socket is finished; drop it so sends fail fast
        self.socket = None;
        let orphaned = self.close_if_orphaned();

        if !orphaned && !self.closed && close_event.is_transient() {
            self.schedule_retry(close_event.code);
        } else {
            debug!(
                wrapper = %self.handle.id(),
                code = close_event.code,
                orphaned,
                closed = self.closed,
                "Socket closed, not reconnecting"
            );
            self.state = ConnectionState::Closed;
        }
        self.publish();

        self.dispatch(
            names::CLOSE,
            EventDetail::Close {
                event: close_event.clone(),
                socket: self.handle.clone(),
            },
        );
    }

    /// Arms the retry timer, or gives up if the delay policy is broken.
    fn schedule_retry(&mut self, code: u16) {
        let delay = match self.reconnect_delay.delay(self.retry_count) {
            Ok(delay) => delay,
            Err(e) => {
                warn!(wrapper = %self.handle.id(), error = %e, "Cannot compute reconnect delay");
                self.state = ConnectionState::Closed;
                return;
            }
        };

        info!(
            wrapper = %self.handle.id(),
            code,
            retry_count = self.retry_count,
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect"
        );

        self.state = ConnectionState::Retrying;
        if let Some(previous) = self.retry_timer.take() {
            previous.abort();
        }
        self.retry_timer = Some(spawn_retry_timer(
            self.tx.clone(),
            self.generation,
            delay,
        ));
    }

    fn handle_retry(&mut self, generation: u64) {
        if generation != self.generation || self.state != ConnectionState::Retrying {
            return;
        }
        self.retry_timer = None;

        if self.closed {
            return;
        }

        if !self.guard.is_live() {
            debug!(wrapper = %self.handle.id(), "Element gone before retry, abandoning");
            self.closed = true;
            self.state = ConnectionState::Closed;
            return;
        }

        self.retry_count += 1;
        self.enter_connecting();
    }

    fn handle_close_request(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        debug!(wrapper = %self.handle.id(), state = ?self.state, "Close requested");

        if let Some(timer) = self.retry_timer.take() {
            timer.abort();
        }

        match &self.socket {
            // The socket's close event finishes the teardown
            Some(socket) => socket.close(),
            None => self.state = ConnectionState::Closed,
        }
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Closes the socket if the element left the document.
    fn close_if_orphaned(&mut self) -> bool {
        let socket = self.socket.clone();
        let orphaned = self.guard.close_if_orphaned(|| {
            if let Some(socket) = socket {
                socket.close();
            }
        });

        if orphaned {
            self.closed = true;
            self.handle.shared.closing.store(true, Ordering::Release);
        }
        orphaned
    }

    fn notify_listeners(&self, event: &SocketEvent) {
        let kind = event.kind();
        for (_, listener) in self.listeners.iter().filter(|(k, _)| *k == kind) {
            listener(event, &self.handle);
        }
    }

    fn dispatch(&self, name: &str, detail: EventDetail) -> bool {
        self.bus
            .dispatch(&self.guard.element(), &Event::new(name, detail))
    }

    /// Copies task state into the shared status read by handles.
    fn publish(&self) {
        let mut status = self.handle.shared.status.lock();
        status.state = self.state;
        status.retry_count = self.retry_count;
        status.socket = self.socket.clone();
    }
}

/// Posts a retry signal after `delay`.
fn spawn_retry_timer(
    tx: mpsc::UnboundedSender<Signal>,
    generation: u64,
    delay: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        sleep(delay).await;
        let _ = tx.send(Signal::Retry { generation });
    })
}

// ============================================================================
// Tests
// ============================================================================
