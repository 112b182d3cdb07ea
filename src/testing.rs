//! In-memory host and socket doubles shared by unit tests.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::time::{sleep, timeout};
use url::Url;

use crate::error::{Error, Result};
use crate::host::{Document, EventBus};
use crate::identifiers::ElementId;
use crate::protocol::{CloseEvent, Event, EventDetail, ReadyState, SocketEvent, close_code};
use crate::transport::{BinaryType, Socket, SocketEventSink, SocketFactory};

// ============================================================================
// Polling Helpers
// ============================================================================

/// Waits until `condition` holds, failing the test after five seconds.
pub async fn eventually(condition: impl Fn() -> bool) {
    let result = timeout(Duration::from_secs(5), async {
        while !condition() {
            sleep(Duration::from_millis(2)).await;
        }
    })
    .await;

    assert!(result.is_ok(), "condition not met within 5s");
}

/// Gives spawned tasks and short timers time to run.
pub async fn settle() {
    sleep(Duration::from_millis(60)).await;
}

// ============================================================================
// TestDocument
// ============================================================================

/// Document backed by in-memory maps.
#[derive(Default)]
pub struct TestDocument {
    live: Mutex<FxHashSet<ElementId>>,
    attributes: Mutex<FxHashMap<ElementId, Vec<(String, String)>>>,
    children: Mutex<FxHashMap<ElementId, Vec<ElementId>>>,
    base_url: Mutex<Option<Url>>,
}

impl TestDocument {
    pub fn insert(&self, element: ElementId) {
        self.live.lock().insert(element);
    }

    pub fn remove(&self, element: ElementId) {
        self.live.lock().remove(&element);
    }

    pub fn set_attribute(&self, element: ElementId, name: &str, value: &str) {
        self.attributes
            .lock()
            .entry(element)
            .or_default()
            .push((name.to_owned(), value.to_owned()));
    }

    pub fn append_child(&self, parent: ElementId, child: ElementId) {
        self.children.lock().entry(parent).or_default().push(child);
    }

    pub fn set_base_url(&self, url: &str) {
        *self.base_url.lock() = Some(Url::parse(url).unwrap());
    }

    fn has_any(&self, element: &ElementId, names: &[&str]) -> bool {
        self.attributes
            .lock()
            .get(element)
            .is_some_and(|attrs| attrs.iter().any(|(n, _)| names.contains(&n.as_str())))
    }
}

impl Document for TestDocument {
    fn is_live(&self, element: &ElementId) -> bool {
        self.live.lock().contains(element)
    }

    fn attribute(&self, element: &ElementId, name: &str) -> Option<String> {
        self.attributes
            .lock()
            .get(element)?
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    fn query_attribute(&self, root: &ElementId, names: &[&str]) -> Vec<ElementId> {
        let mut found = Vec::new();
        let mut stack = vec![*root];
        while let Some(element) = stack.pop() {
            if self.has_any(&element, names) {
                found.push(element);
            }
            if let Some(children) = self.children.lock().get(&element) {
                stack.extend(children.iter().rev());
            }
        }
        found
    }

    fn base_url(&self) -> Option<Url> {
        self.base_url.lock().clone()
    }
}

// ============================================================================
// RecordingBus
// ============================================================================

/// A dispatched event as seen by the bus.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub target: ElementId,
    pub name: String,
    pub detail: EventDetail,
    pub is_error: bool,
}

/// Event bus that records everything and vetoes configured names.
#[derive(Default)]
pub struct RecordingBus {
    events: Mutex<Vec<Recorded>>,
    vetoes: Mutex<FxHashSet<String>>,
}

impl RecordingBus {
    pub fn veto(&self, name: &str) {
        self.vetoes.lock().insert(name.to_owned());
    }

    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.events.lock().iter().map(|e| e.name.clone()).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.name == name && !e.is_error)
            .count()
    }

    pub fn error_count(&self, name: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.name == name && e.is_error)
            .count()
    }

    pub fn last_detail(&self, name: &str) -> Option<EventDetail> {
        self.events
            .lock()
            .iter()
            .rev()
            .find(|e| e.name == name)
            .map(|e| e.detail.clone())
    }

    fn record(&self, target: &ElementId, event: &Event, is_error: bool) {
        self.events.lock().push(Recorded {
            target: *target,
            name: event.name.clone(),
            detail: event.detail.clone(),
            is_error,
        });
    }
}

impl EventBus for RecordingBus {
    fn dispatch(&self, target: &ElementId, event: &Event) -> bool {
        self.record(target, event, false);
        !self.vetoes.lock().contains(&event.name)
    }

    fn dispatch_error(&self, target: &ElementId, event: &Event) {
        self.record(target, event, true);
    }
}

// ============================================================================
// MockSocket
// ============================================================================

/// Socket driven by the test through [`MockFactory::emit`].
pub struct MockSocket {
    state: AtomicU8,
    sink: SocketEventSink,
    close_calls: AtomicUsize,
    sent: Mutex<Vec<String>>,
    url: Option<Url>,
}

impl MockSocket {
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    fn set_state(&self, state: ReadyState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }
}

impl Socket for MockSocket {
    fn ready_state(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn send(&self, text: &str) -> Result<()> {
        if self.ready_state() != ReadyState::Open {
            return Err(Error::NotConnected);
        }
        self.sent.lock().push(text.to_owned());
        Ok(())
    }

    /// Answers like a browser socket: a close event follows.
    fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.ready_state() == ReadyState::Closed {
            return;
        }
        self.set_state(ReadyState::Closed);
        self.sink.emit(SocketEvent::Close(CloseEvent::new(
            close_code::NO_STATUS,
            "",
            true,
        )));
    }
}

// ============================================================================
// MockFactory
// ============================================================================

/// Factory recording every socket it creates.
#[derive(Default)]
pub struct MockFactory {
    sockets: Mutex<Vec<Arc<MockSocket>>>,
}

impl MockFactory {
    pub fn create_mock(&self, sink: SocketEventSink) -> Arc<dyn Socket> {
        self.push(sink, None)
    }

    pub fn created(&self) -> usize {
        self.sockets.lock().len()
    }

    pub fn socket(&self, index: usize) -> Arc<MockSocket> {
        Arc::clone(&self.sockets.lock()[index])
    }

    /// Emits an event from socket `index`, updating its ready state.
    pub fn emit(&self, index: usize, event: SocketEvent) {
        let socket = self.socket(index);
        match &event {
            SocketEvent::Open => socket.set_state(ReadyState::Open),
            SocketEvent::Close(_) => socket.set_state(ReadyState::Closed),
            SocketEvent::Message(_) | SocketEvent::Error(_) => {}
        }
        socket.sink.emit(event);
    }

    fn push(&self, sink: SocketEventSink, url: Option<Url>) -> Arc<dyn Socket> {
        let socket = Arc::new(MockSocket {
            state: AtomicU8::new(ReadyState::Connecting as u8),
            sink,
            close_calls: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
            url,
        });
        self.sockets.lock().push(Arc::clone(&socket));
        socket
    }
}

impl SocketFactory for MockFactory {
    fn create(
        &self,
        url: &Url,
        _binary_type: BinaryType,
        events: SocketEventSink,
    ) -> Arc<dyn Socket> {
        self.push(events, Some(url.clone()))
    }
}
