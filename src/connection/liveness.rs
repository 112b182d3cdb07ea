//! Ties a connection to its owning element.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tracing::debug;

use crate::host::Document;
use crate::identifiers::ElementId;

// ============================================================================
// LivenessGuard
// ============================================================================

/// Checks whether the element that owns a connection is still in the live
/// document.
#[derive(Clone)]
pub struct LivenessGuard {
    /// Document used as ground truth.
    document: Arc<dyn Document>,
    /// Owning element.
    element: ElementId,
}

impl LivenessGuard {
    /// Creates a guard for `element`.
    #[inline]
    #[must_use]
    pub fn new(document: Arc<dyn Document>, element: ElementId) -> Self {
        Self { document, element }
    }

    /// Returns the owning element.
    #[inline]
    #[must_use]
    pub fn element(&self) -> ElementId {
        self.element
    }

    /// Returns `true` while the element is in the live document.
    #[inline]
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.document.is_live(&self.element)
    }

    /// Runs `close` and returns `true` if the element is gone.
    ///
    /// Does nothing and returns `false` while the element is live.
    pub fn close_if_orphaned(&self, close: impl FnOnce()) -> bool {
        if self.is_live() {
            return false;
        }

        debug!(element = %self.element, "Owning element left the document, closing");
        close();
        true
    }
}

// ============================================================================
// Tests
// ============================================================================
