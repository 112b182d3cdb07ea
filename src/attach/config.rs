//! Coordinator configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use ws_events::{BinaryType, Config, ReconnectDelay};
//!
//! let config = Config::new()
//!     .with_reconnect_delay(ReconnectDelay::custom(|n| Duration::from_secs(u64::from(n))))
//!     .with_binary_type(BinaryType::Text);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::connection::ReconnectDelay;
use crate::host::Document;
use crate::identifiers::ElementId;
use crate::transport::{BinaryType, SocketFactory, TungsteniteFactory};

// ============================================================================
// Constants
// ============================================================================

/// Default attribute naming the connection source.
pub const DEFAULT_CONNECT_ATTRIBUTE: &str = "ws-events-connect";

/// Legacy attributes still matched during discovery.
pub const LEGACY_ATTRIBUTES: [&str; 2] = ["hx-ws", "data-hx-ws"];

// ============================================================================
// Types
// ============================================================================

/// Fallback source lookup for elements without the connect attribute.
pub type LegacySource = Arc<dyn Fn(&ElementId, &dyn Document) -> Option<String> + Send + Sync>;

// ============================================================================
// Config
// ============================================================================

/// Settings shared by every wrapper a coordinator creates.
#[derive(Clone)]
pub struct Config {
    /// Reconnect delay policy. Defaults to full jitter.
    pub reconnect_delay: ReconnectDelay,

    /// How binary frames are surfaced. Defaults to [`BinaryType::Blob`].
    pub binary_type: BinaryType,

    /// Socket strategy. Defaults to [`TungsteniteFactory`].
    pub factory: Arc<dyn SocketFactory>,

    /// Attribute naming the source. Its `data-` form is also read.
    pub connect_attribute: String,

    /// Fallback used when the attribute is missing or empty. None by default.
    pub legacy_source: Option<LegacySource>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reconnect_delay: ReconnectDelay::default(),
            binary_type: BinaryType::default(),
            factory: Arc::new(TungsteniteFactory),
            connect_attribute: DEFAULT_CONNECT_ATTRIBUTE.to_owned(),
            legacy_source: None,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl Config {
    /// Creates a configuration with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reconnect delay policy.
    #[inline]
    #[must_use]
    pub fn with_reconnect_delay(mut self, policy: ReconnectDelay) -> Self {
        self.reconnect_delay = policy;
        self
    }

    /// Sets the binary type.
    #[inline]
    #[must_use]
    pub fn with_binary_type(mut self, binary_type: BinaryType) -> Self {
        self.binary_type = binary_type;
        self
    }

    /// Replaces the socket factory.
    #[inline]
    #[must_use]
    pub fn with_factory(mut self, factory: Arc<dyn SocketFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Sets the connect attribute name.
    #[inline]
    #[must_use]
    pub fn with_connect_attribute(mut self, name: impl Into<String>) -> Self {
        self.connect_attribute = name.into();
        self
    }

    /// Sets the legacy source fallback.
    #[inline]
    #[must_use]
    pub fn with_legacy_source(
        mut self,
        lookup: impl Fn(&ElementId, &dyn Document) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.legacy_source = Some(Arc::new(lookup));
        self
    }

    /// Returns the `data-` prefixed form of the connect attribute.
    #[inline]
    #[must_use]
    pub fn data_attribute(&self) -> String {
        format!("data-{}", self.connect_attribute)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("reconnect_delay", &self.reconnect_delay)
            .field("binary_type", &self.binary_type)
            .field("connect_attribute", &self.connect_attribute)
            .field("legacy_source", &self.legacy_source.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(matches!(config.reconnect_delay, ReconnectDelay::FullJitter));
        assert_eq!(config.binary_type, BinaryType::Blob);
        assert_eq!(config.connect_attribute, "ws-events-connect");
        assert!(config.legacy_source.is_none());
    }

    #[test]
    fn test_builder_methods() {
        let config = Config::new()
            .with_reconnect_delay(ReconnectDelay::custom(|_| Duration::ZERO))
            .with_binary_type(BinaryType::Text)
            .with_connect_attribute("live")
            .with_legacy_source(|_, _| Some("/legacy".into()));

        assert!(matches!(config.reconnect_delay, ReconnectDelay::Custom(_)));
        assert_eq!(config.binary_type, BinaryType::Text);
        assert_eq!(config.data_attribute(), "data-live");
        assert!(config.legacy_source.is_some());
    }

    #[test]
    fn test_debug_hides_closures() {
        let debug = format!("{:?}", Config::new());
        assert!(debug.contains("FullJitter"));
        assert!(debug.contains("ws-events-connect"));
    }
}
