//! Inbound message routing.
//!
//! Each text message becomes one or more events on the owning element:
//!
//! | Payload | Dispatched |
//! |---------|------------|
//! | `ping` | `ping` (no detail) |
//! | `{"greet":"hi","bye":1}` | `greet` `{value:"hi"}`, then `bye` `{value:1}` |
//! | `{broken` | nothing, decode error reported |
//!
//! Every routed message is bracketed by before/after notifications. The
//! before notification can veto the message.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, error, trace};

use crate::error::{Error, Result};
use crate::host::EventBus;
use crate::protocol::{Event, EventDetail, SocketEvent, names};

use super::liveness::LivenessGuard;
use super::wrapper::{Listener, WebSocketWrapper};

// ============================================================================
// RouteOutcome
// ============================================================================

/// What happened to a routed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The owning element is gone; the wrapper was closed.
    Orphaned,
    /// A before-message handler vetoed the message.
    Vetoed,
    /// Application events were dispatched.
    Dispatched {
        /// Number of application events.
        events: usize,
    },
    /// The payload looked like JSON but did not decode.
    DecodeFailed,
}

// ============================================================================
// Interpretation
// ============================================================================

/// Turns a payload into the application events it names.
///
/// A payload whose first non-whitespace character is `{` is a JSON object
/// of event name to value, dispatched in key order. Anything else is a
/// single event name. An empty payload names no event.
///
/// # Errors
///
/// Returns [`Error::Decode`] if a `{` payload is not a JSON object.
pub fn interpret(payload: &str) -> Result<Vec<Event>> {
    if payload.trim_start().starts_with('{') {
        let events: Map<String, Value> =
            serde_json::from_str(payload).map_err(|e| Error::decode(payload, &e))?;

        return Ok(events
            .into_iter()
            .map(|(name, value)| Event::new(name, EventDetail::Value(value)))
            .collect());
    }

    if payload.is_empty() {
        return Ok(Vec::new());
    }

    Ok(vec![Event::bare(payload)])
}

// ============================================================================
// MessageRouter
// ============================================================================

/// Dispatches inbound messages as events on the owning element.
#[derive(Clone)]
pub struct MessageRouter {
    /// Guard for the owning element.
    guard: LivenessGuard,
    /// Event bus.
    bus: Arc<dyn EventBus>,
}

impl MessageRouter {
    /// Creates a router for the element watched by `guard`.
    #[inline]
    #[must_use]
    pub fn new(guard: LivenessGuard, bus: Arc<dyn EventBus>) -> Self {
        Self { guard, bus }
    }

    /// Routes one text payload received by `socket`.
    pub fn route(&self, payload: &str, socket: &WebSocketWrapper) -> RouteOutcome {
        if self.guard.close_if_orphaned(|| socket.close()) {
            return RouteOutcome::Orphaned;
        }

        let element = self.guard.element();
        let message = || EventDetail::Message {
            message: payload.to_owned(),
            socket: socket.clone(),
        };

        if !self
            .bus
            .dispatch(&element, &Event::new(names::BEFORE_MESSAGE, message()))
        {
            debug!(%element, "Message vetoed");
            return RouteOutcome::Vetoed;
        }

        let outcome = match interpret(payload) {
            Ok(events) => {
                for event in &events {
                    trace!(%element, event = %event.name, "Dispatching message event");
                    self.bus.dispatch(&element, event);
                }
                RouteOutcome::Dispatched {
                    events: events.len(),
                }
            }
            Err(e) => {
                error!(%element, wrapper = %socket.id(), error = %e, "Failed to decode message");
                self.bus.dispatch_error(
                    &element,
                    &Event::new(
                        names::DECODE_ERROR,
                        EventDetail::DecodeError {
                            message: payload.to_owned(),
                            error: e.to_string(),
                            socket: socket.clone(),
                        },
                    ),
                );
                RouteOutcome::DecodeFailed
            }
        };

        self.bus
            .dispatch(&element, &Event::new(names::AFTER_MESSAGE, message()));

        outcome
    }

    /// Wraps the router as a `message` listener.
    ///
    /// Binary payloads are skipped.
    #[must_use]
    pub fn into_listener(self) -> Listener {
        Arc::new(move |event: &SocketEvent, socket: &WebSocketWrapper| {
            let SocketEvent::Message(payload) = event else {
                return;
            };

            match payload.as_text() {
                Some(text) => {
                    self.route(text, socket);
                }
                None => debug!(wrapper = %socket.id(), "Binary message not routed"),
            }
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::host::Document;
    use crate::identifiers::ElementId;
    use crate::protocol::{Payload, SocketEventKind};
    use crate::testing::{MockFactory, RecordingBus, TestDocument, eventually};

    const ELEMENT: ElementId = ElementId::new(7);

    struct Fixture {
        document: Arc<TestDocument>,
        bus: Arc<RecordingBus>,
        router: MessageRouter,
        wrapper: WebSocketWrapper,
        factory: Arc<MockFactory>,
    }

    fn fixture() -> Fixture {
        let document = Arc::new(TestDocument::default());
        document.insert(ELEMENT);
        let bus = Arc::new(RecordingBus::default());
        let factory = Arc::new(MockFactory::default());

        let connect = Arc::clone(&factory);
        let wrapper = WebSocketWrapper::builder(
            ELEMENT,
            Arc::clone(&document) as Arc<dyn Document>,
            Arc::clone(&bus) as Arc<dyn EventBus>,
        )
        .factory(move |sink| connect.create_mock(sink))
        .spawn()
        .unwrap();

        let router = MessageRouter::new(
            LivenessGuard::new(Arc::clone(&document) as Arc<dyn Document>, ELEMENT),
            Arc::clone(&bus) as Arc<dyn EventBus>,
        );

        Fixture {
            document,
            bus,
            router,
            wrapper,
            factory,
        }
    }

    /// Names dispatched after the wrapper's own connecting event.
    fn routed_names(bus: &RecordingBus) -> Vec<String> {
        bus.names()
            .into_iter()
            .filter(|n| n != names::CONNECTING)
            .collect()
    }

    #[test]
    fn test_interpret_single_event() {
        let events = interpret("ping").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name, "ping");
        assert!(matches!(events[0].detail, EventDetail::None));
    }

    #[test]
    fn test_interpret_preserves_key_order() {
        let events = interpret(r#"{"zeta":1,"alpha":2,"mid":3}"#).unwrap();
        let names: Vec<_> = events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_interpret_leading_whitespace() {
        let events = interpret("  \n{\"greet\":\"hi\"}").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].detail.value(), Some(&json!("hi")));
    }

    #[test]
    fn test_interpret_malformed() {
        let err = interpret("{malformed").unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_interpret_empty() {
        assert!(interpret("").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_route_multiple_events_in_key_order() {
        let fx = fixture();
        let outcome = fx
            .router
            .route(r#"{"greet":"hi","farewell":"bye"}"#, &fx.wrapper);

        assert_eq!(outcome, RouteOutcome::Dispatched { events: 2 });
        assert_eq!(
            routed_names(&fx.bus),
            vec![
                names::BEFORE_MESSAGE,
                "greet",
                "farewell",
                names::AFTER_MESSAGE
            ]
        );
        assert_eq!(
            fx.bus.last_detail("greet").unwrap().value(),
            Some(&json!("hi"))
        );
        assert_eq!(
            fx.bus.last_detail("farewell").unwrap().value(),
            Some(&json!("bye"))
        );
    }

    #[tokio::test]
    async fn test_route_single_event() {
        let fx = fixture();
        let outcome = fx.router.route("ping", &fx.wrapper);

        assert_eq!(outcome, RouteOutcome::Dispatched { events: 1 });
        assert_eq!(
            routed_names(&fx.bus),
            vec![names::BEFORE_MESSAGE, "ping", names::AFTER_MESSAGE]
        );
        assert!(matches!(
            fx.bus.last_detail("ping"),
            Some(EventDetail::None)
        ));
    }

    #[tokio::test]
    async fn test_route_malformed_still_emits_after_message() {
        let fx = fixture();
        let outcome = fx.router.route("{malformed", &fx.wrapper);

        assert_eq!(outcome, RouteOutcome::DecodeFailed);
        assert_eq!(fx.bus.error_count(names::DECODE_ERROR), 1);
        assert_eq!(
            routed_names(&fx.bus),
            vec![
                names::BEFORE_MESSAGE,
                names::DECODE_ERROR,
                names::AFTER_MESSAGE
            ]
        );
    }

    #[tokio::test]
    async fn test_decode_failure_does_not_affect_next_message() {
        let fx = fixture();
        fx.router.route("{malformed", &fx.wrapper);
        let outcome = fx.router.route("pong", &fx.wrapper);

        assert_eq!(outcome, RouteOutcome::Dispatched { events: 1 });
        assert_eq!(fx.bus.count("pong"), 1);
    }

    #[tokio::test]
    async fn test_veto_short_circuits() {
        let fx = fixture();
        fx.bus.veto(names::BEFORE_MESSAGE);

        let outcome = fx.router.route(r#"{"greet":"hi"}"#, &fx.wrapper);

        assert_eq!(outcome, RouteOutcome::Vetoed);
        assert_eq!(routed_names(&fx.bus), vec![names::BEFORE_MESSAGE]);
    }

    #[tokio::test]
    async fn test_orphaned_element_closes_wrapper() {
        let fx = fixture();
        fx.document.remove(ELEMENT);

        let outcome = fx.router.route("ping", &fx.wrapper);

        assert_eq!(outcome, RouteOutcome::Orphaned);
        assert!(routed_names(&fx.bus).is_empty());
        assert!(fx.wrapper.is_closed());
        eventually(|| fx.factory.socket(0).close_calls() == 1).await;
    }

    #[tokio::test]
    async fn test_before_message_carries_payload_and_handle() {
        let fx = fixture();
        fx.router.route("ping", &fx.wrapper);

        match fx.bus.last_detail(names::BEFORE_MESSAGE) {
            Some(EventDetail::Message { message, socket }) => {
                assert_eq!(message, "ping");
                assert_eq!(socket, fx.wrapper);
            }
            other => panic!("Expected message detail, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_listener_routes_socket_messages_in_order() {
        let fx = fixture();
        fx.wrapper
            .add_event_listener(SocketEventKind::Message, {
                let listener = fx.router.clone().into_listener();
                move |event, socket| listener(event, socket)
            })
            .unwrap();

        fx.factory.emit(0, SocketEvent::Open);
        fx.factory
            .emit(0, SocketEvent::Message(Payload::Text("first".into())));
        fx.factory
            .emit(0, SocketEvent::Message(Payload::Binary(vec![1, 2, 3])));
        fx.factory
            .emit(0, SocketEvent::Message(Payload::Text("second".into())));

        eventually(|| fx.bus.count("second") == 1).await;

        let app: Vec<_> = fx
            .bus
            .names()
            .into_iter()
            .filter(|n| n == "first" || n == "second")
            .collect();
        assert_eq!(app, vec!["first", "second"]);
        assert_eq!(fx.bus.count(names::AFTER_MESSAGE), 2);
    }
}
