//! Element attachment.
//!
//! Connects elements carrying the connect attribute and disconnects them
//! when they are removed.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `config` | Settings shared by all wrappers |
//! | `coordinator` | Element to wrapper registry |
//! | `source` | Source to socket URL resolution |

// ============================================================================
// Submodules
// ============================================================================

/// Coordinator configuration.
pub mod config;

/// Element to wrapper registry.
pub mod coordinator;

/// Source resolution.
pub mod source;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{Config, DEFAULT_CONNECT_ATTRIBUTE, LEGACY_ATTRIBUTES, LegacySource};
pub use coordinator::Coordinator;
pub use source::resolve_source;
