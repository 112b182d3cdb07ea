//! Host collaborators.
//!
//! The crate never touches a document tree directly. The embedding host
//! implements these traits over whatever tree and event system it has.

// ============================================================================
// Imports
// ============================================================================

use url::Url;

use crate::identifiers::ElementId;
use crate::protocol::Event;

// ============================================================================
// Document
// ============================================================================

/// Read access to the live document.
pub trait Document: Send + Sync {
    /// Returns `true` while the element is attached to the live document.
    fn is_live(&self, element: &ElementId) -> bool;

    /// Returns the value of an attribute on the element.
    fn attribute(&self, element: &ElementId, name: &str) -> Option<String>;

    /// Returns every element in the subtree rooted at `root` that carries
    /// any of the given attributes, the root itself included when it matches.
    fn query_attribute(&self, root: &ElementId, names: &[&str]) -> Vec<ElementId>;

    /// URL of the current document, used to resolve relative sources.
    fn base_url(&self) -> Option<Url>;
}

// ============================================================================
// EventBus
// ============================================================================

/// Dispatches events on elements.
pub trait EventBus: Send + Sync {
    /// Dispatches an event. Returns `false` if a handler vetoed it.
    fn dispatch(&self, target: &ElementId, event: &Event) -> bool;

    /// Dispatches an error-kind event.
    fn dispatch_error(&self, target: &ElementId, event: &Event);
}
