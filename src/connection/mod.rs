//! Connection core: backoff, liveness, the reconnecting wrapper and the
//! message router.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `backoff` | Retry count to reconnect delay |
//! | `liveness` | Ties a connection to its element's presence |
//! | `router` | Inbound message to element events |
//! | `wrapper` | Socket lifecycle and reconnects |

// ============================================================================
// Submodules
// ============================================================================

/// Reconnect delay policy.
pub mod backoff;

/// Element liveness guard.
pub mod liveness;

/// Message-to-event routing.
pub mod router;

/// Reconnecting socket wrapper.
pub mod wrapper;

// ============================================================================
// Re-exports
// ============================================================================

pub use backoff::{DelayFn, ReconnectDelay, full_jitter, full_jitter_cap};
pub use liveness::LivenessGuard;
pub use router::{MessageRouter, RouteOutcome, interpret};
pub use wrapper::{ConnectFn, ConnectionState, Listener, WebSocketWrapper, WrapperBuilder};
