//! Connection source resolution.

// ============================================================================
// Imports
// ============================================================================

use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// resolve_source
// ============================================================================

/// Turns a connect attribute value into an absolute socket URL.
///
/// A source starting with `/` is resolved against the document URL: `wss`
/// for `https` documents, `ws` for `http` documents, keeping host and any
/// explicit port. Other sources must already be absolute.
///
/// # Errors
///
/// Returns [`Error::InvalidUrl`] if the source cannot be resolved.
pub fn resolve_source(source: &str, base: Option<&Url>) -> Result<Url> {
    if !source.starts_with('/') {
        return Url::parse(source).map_err(|e| Error::invalid_url(source, e.to_string()));
    }

    let base = base.ok_or_else(|| Error::invalid_url(source, "no document URL to resolve against"))?;

    let scheme = match base.scheme() {
        "https" => "wss",
        "http" => "ws",
        other => {
            return Err(Error::invalid_url(
                source,
                format!("cannot derive a socket scheme from \"{other}\""),
            ));
        }
    };

    let host = base
        .host_str()
        .ok_or_else(|| Error::invalid_url(source, "document URL has no host"))?;

    let absolute = match base.port() {
        Some(port) => format!("{scheme}://{host}:{port}{source}"),
        None => format!("{scheme}://{host}{source}"),
    };

    Url::parse(&absolute).map_err(|e| Error::invalid_url(source, e.to_string()))
}

// ============================================================================
// Tests
// ============================================================================
