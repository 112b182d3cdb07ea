//! Message types exchanged with sockets and with the host event bus.
//!
//! # Protocol Overview
//!
//! | Type | Direction | Purpose |
//! |------|-----------|---------|
//! | [`SocketEvent`] | Socket → Wrapper | Open, message, error and close callbacks |
//! | [`Event`] | Wrapper → Event bus | Lifecycle and application events on the element |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `event` | Socket-level events and close codes |
//! | `notify` | Events dispatched on the owning element |

// ============================================================================
// Submodules
// ============================================================================

/// Socket-level events.
pub mod event;

/// Element-level notifications.
pub mod notify;

// ============================================================================
// Re-exports
// ============================================================================

pub use event::{CloseEvent, Payload, ReadyState, SocketEvent, SocketEventKind, close_code};
pub use notify::{Event, EventDetail, names};
