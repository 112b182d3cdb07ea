//! Element attachment.
//!
//! The host forwards element lifecycle hooks here: [`Coordinator::process_node`]
//! when a subtree is added, [`Coordinator::cleanup_element`] when an element
//! is removed. The coordinator keeps one wrapper per element.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Coordinator                │
//! │  ┌─────────────────────────────────┐    │
//! │  │ element#1 → WebSocketWrapper    │    │
//! │  │ element#4 → WebSocketWrapper    │    │
//! │  └─────────────────────────────────┘    │
//! └─────────────────────────────────────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::connection::{LivenessGuard, MessageRouter, WebSocketWrapper};
use crate::error::Result;
use crate::host::{Document, EventBus};
use crate::identifiers::ElementId;
use crate::protocol::SocketEventKind;

use super::config::{Config, LEGACY_ATTRIBUTES};
use super::source::resolve_source;

// ============================================================================
// Coordinator
// ============================================================================

/// Creates and tracks wrappers for elements carrying the connect attribute.
pub struct Coordinator {
    /// Shared configuration.
    config: Config,
    /// Host document.
    document: Arc<dyn Document>,
    /// Host event bus.
    bus: Arc<dyn EventBus>,
    /// Wrappers by owning element.
    wrappers: RwLock<FxHashMap<ElementId, WebSocketWrapper>>,
}

// ============================================================================
// Coordinator - Constructor
// ============================================================================

impl Coordinator {
    /// Creates a coordinator.
    #[must_use]
    pub fn new(config: Config, document: Arc<dyn Document>, bus: Arc<dyn EventBus>) -> Self {
        debug!(?config, "Coordinator created");
        Self {
            config,
            document,
            bus,
            wrappers: RwLock::new(FxHashMap::default()),
        }
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }
}

// ============================================================================
// Coordinator - Lifecycle Hooks
// ============================================================================

impl Coordinator {
    /// Connects every matching element in the subtree rooted at `root`.
    ///
    /// Elements whose source cannot be resolved are logged and skipped.
    /// Wrappers that have closed on their own are forgotten first.
    /// Returns the number of elements with a wrapper afterwards.
    pub fn process_node(&self, root: &ElementId) -> usize {
        self.prune_closed();

        let data_attribute = self.config.data_attribute();
        let attributes = [
            self.config.connect_attribute.as_str(),
            data_attribute.as_str(),
            LEGACY_ATTRIBUTES[0],
            LEGACY_ATTRIBUTES[1],
        ];

        let mut connected = 0;
        for element in self.document.query_attribute(root, &attributes) {
            match self.ensure(&element) {
                Ok(Some(_)) => connected += 1,
                Ok(None) => {}
                Err(e) => warn!(%element, error = %e, "Cannot connect element"),
            }
        }
        connected
    }

    /// Returns the element's wrapper, creating one if needed.
    ///
    /// Returns `Ok(None)` if the element is not live or names no source.
    /// An existing wrapper that is still running is returned as is.
    ///
    /// The registry stays write-locked from the lookup to the insert, so
    /// concurrent calls for one element create one wrapper. The
    /// `connecting` notification is dispatched under that lock; the event
    /// bus must not call back into the coordinator while handling it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidUrl`] if the source cannot be resolved.
    pub fn ensure(&self, element: &ElementId) -> Result<Option<WebSocketWrapper>> {
        let mut wrappers = self.wrappers.write();

        if !self.document.is_live(element) {
            return Ok(None);
        }

        if let Some(existing) = wrappers.get(element) {
            if !existing.is_closed() {
                return Ok(Some(existing.clone()));
            }
            wrappers.remove(element);
        }

        let Some(source) = self.source(element) else {
            return Ok(None);
        };

        let url = resolve_source(&source, self.document.base_url().as_ref())?;

        let factory = Arc::clone(&self.config.factory);
        let binary_type = self.config.binary_type;
        let socket_url = url.clone();
        let router = MessageRouter::new(
            LivenessGuard::new(Arc::clone(&self.document), *element),
            Arc::clone(&self.bus),
        )
        .into_listener();

        let wrapper =
            WebSocketWrapper::builder(*element, Arc::clone(&self.document), Arc::clone(&self.bus))
                .factory(move |sink| factory.create(&socket_url, binary_type, sink))
                .reconnect_delay(self.config.reconnect_delay.clone())
                .listener(SocketEventKind::Message, move |event, socket| {
                    router(event, socket)
                })
                .spawn()?;

        info!(%element, %url, wrapper = %wrapper.id(), "Element connected");

        wrappers.insert(*element, wrapper.clone());
        Ok(Some(wrapper))
    }

    /// Closes and forgets the element's wrapper.
    ///
    /// Returns `true` if the element had one.
    pub fn cleanup_element(&self, element: &ElementId) -> bool {
        let Some(wrapper) = self.wrappers.write().remove(element) else {
            return false;
        };

        debug!(%element, wrapper = %wrapper.id(), "Cleaning up element");
        wrapper.close();
        true
    }

    /// Closes every wrapper.
    pub fn shutdown(&self) {
        let wrappers: Vec<_> = self.wrappers.write().drain().collect();
        let count = wrappers.len();

        for (_, wrapper) in wrappers {
            wrapper.close();
        }

        if count > 0 {
            info!(count, "Closed all wrappers");
        }
    }
}

// ============================================================================
// Coordinator - Queries
// ============================================================================

impl Coordinator {
    /// Returns the element's wrapper, if any.
    #[must_use]
    pub fn wrapper(&self, element: &ElementId) -> Option<WebSocketWrapper> {
        self.wrappers.read().get(element).cloned()
    }

    /// Returns the number of wrappers that are still running.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.wrappers
            .read()
            .values()
            .filter(|wrapper| !wrapper.is_closed())
            .count()
    }

    /// Forgets wrappers that closed without a cleanup call.
    fn prune_closed(&self) {
        let mut wrappers = self.wrappers.write();
        let before = wrappers.len();
        wrappers.retain(|_, wrapper| !wrapper.is_closed());

        let pruned = before - wrappers.len();
        if pruned > 0 {
            debug!(pruned, "Forgot closed wrappers");
        }
    }

    /// Reads the source from the connect attribute or the legacy fallback.
    fn source(&self, element: &ElementId) -> Option<String> {
        let attribute = self
            .document
            .attribute(element, &self.config.connect_attribute)
            .filter(|value| !value.is_empty())
            .or_else(|| {
                self.document
                    .attribute(element, &self.config.data_attribute())
            })
            .filter(|value| !value.is_empty());

        attribute.or_else(|| {
            let legacy = self.config.legacy_source.as_ref()?;
            legacy(element, self.document.as_ref()).filter(|value| !value.is_empty())
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
