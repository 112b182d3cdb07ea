//! Error types for ws-events.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use ws_events::{Result, WebSocketWrapper};
//!
//! fn greet(wrapper: &WebSocketWrapper) -> Result<()> {
//!     wrapper.send("hello")?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidUrl`] |
//! | Connection | [`Error::Connection`], [`Error::NotConnected`], [`Error::ConnectionClosed`] |
//! | Payload | [`Error::Decode`] |
//! | External | [`Error::Io`], [`Error::WebSocket`] |
//!
//! Orphaned elements are not errors: a wrapper whose element left the
//! document is closed silently.

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Every error is scoped to the wrapper that produced it; none of them
/// are meant to bring down the host process.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when a reconnect delay policy name is not recognized.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Connection source could not be turned into an absolute URL.
    #[error("Invalid URL '{source_url}': {message}")]
    InvalidUrl {
        /// The raw source value.
        source_url: String,
        /// Why resolution failed.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    ///
    /// Returned by the trigger server when an upgrade is rejected.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// No socket is currently open.
    ///
    /// Returned by `send` while connecting or waiting for a retry.
    #[error("Socket is not open")]
    NotConnected,

    /// The wrapper has been torn down.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Payload Errors
    // ========================================================================
    /// Inbound payload started with `{` but was not a JSON object.
    #[error("Failed to decode message '{payload}': {message}")]
    Decode {
        /// The raw payload.
        payload: String,
        /// Decoder message.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid URL error.
    #[inline]
    pub fn invalid_url(source_url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            source_url: source_url.into(),
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a decode error from the payload and decoder failure.
    #[inline]
    pub fn decode(payload: impl Into<String>, err: &serde_json::Error) -> Self {
        Self::Decode {
            payload: payload.into(),
            message: err.to_string(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::NotConnected
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this is a configuration error.
    #[inline]
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::InvalidUrl { .. })
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors may succeed once the wrapper reconnects.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NotConnected | Self::Connection { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
