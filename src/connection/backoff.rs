//! Reconnect delay policy.
//!
//! The default policy is full-jitter exponential backoff: the delay for
//! retry `n` is drawn uniformly from `[0, 1s * 2^min(n, 6))`, so the longest
//! possible wait is 64 seconds.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tracing::error;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Name of the built-in policy.
pub const FULL_JITTER: &str = "full-jitter";

/// Base of the exponential ceiling.
const BASE_DELAY: Duration = Duration::from_secs(1);

/// Exponent at which the ceiling stops growing (2^6 * 1s = 64s).
const MAX_EXPONENT: u32 = 6;

// ============================================================================
// Types
// ============================================================================

/// Caller-supplied delay function: retry count to delay.
pub type DelayFn = Arc<dyn Fn(u32) -> Duration + Send + Sync>;

// ============================================================================
// ReconnectDelay
// ============================================================================

/// Policy mapping a retry count to the wait before the next attempt.
#[derive(Clone, Default)]
pub enum ReconnectDelay {
    /// Built-in full-jitter backoff.
    #[default]
    FullJitter,
    /// Caller-supplied function.
    Custom(DelayFn),
    /// Policy selected by name. Only `"full-jitter"` is recognized.
    Named(String),
}

impl ReconnectDelay {
    /// Creates a policy from a function.
    #[inline]
    #[must_use]
    pub fn custom(f: impl Fn(u32) -> Duration + Send + Sync + 'static) -> Self {
        Self::Custom(Arc::new(f))
    }

    /// Creates a policy from a name.
    ///
    /// Unknown names are accepted here and fail when a delay is computed.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        if name == FULL_JITTER {
            Self::FullJitter
        } else {
            Self::Named(name)
        }
    }

    /// Computes the delay before retry number `retry_count`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the policy names an unknown algorithm.
    pub fn delay(&self, retry_count: u32) -> Result<Duration> {
        match self {
            Self::FullJitter => Ok(full_jitter(retry_count)),
            Self::Custom(f) => Ok(f(retry_count)),
            Self::Named(name) if name == FULL_JITTER => Ok(full_jitter(retry_count)),
            Self::Named(name) => {
                let message = format!(
                    "reconnect delay must either be a function or \"{FULL_JITTER}\", got \"{name}\""
                );
                error!(policy = %name, "{message}");
                Err(Error::config(message))
            }
        }
    }
}

impl fmt::Debug for ReconnectDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullJitter => f.write_str("FullJitter"),
            Self::Custom(_) => f.write_str("Custom(..)"),
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
        }
    }
}

// ============================================================================
// Full Jitter
// ============================================================================

/// Upper bound (exclusive) of the full-jitter delay for `retry_count`.
#[inline]
#[must_use]
pub fn full_jitter_cap(retry_count: u32) -> Duration {
    BASE_DELAY * (1 << retry_count.min(MAX_EXPONENT))
}

/// Samples a full-jitter delay for `retry_count` from the thread RNG.
#[must_use]
pub fn full_jitter(retry_count: u32) -> Duration {
    full_jitter_with(&mut rand::thread_rng(), retry_count)
}

/// Samples a full-jitter delay from the given RNG.
#[must_use]
pub fn full_jitter_with<R: Rng + ?Sized>(rng: &mut R, retry_count: u32) -> Duration {
    let cap = full_jitter_cap(retry_count).as_micros() as u64;
    Duration::from_micros(rng.gen_range(0..cap))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_cap_doubles_then_stops() {
        assert_eq!(full_jitter_cap(0), Duration::from_secs(1));
        assert_eq!(full_jitter_cap(1), Duration::from_secs(2));
        assert_eq!(full_jitter_cap(5), Duration::from_secs(32));
        assert_eq!(full_jitter_cap(6), Duration::from_secs(64));
        assert_eq!(full_jitter_cap(7), Duration::from_secs(64));
        assert_eq!(full_jitter_cap(u32::MAX), Duration::from_secs(64));
    }

    #[test]
    fn test_seeded_jitter_is_deterministic() {
        let a = full_jitter_with(&mut StdRng::seed_from_u64(9), 3);
        let b = full_jitter_with(&mut StdRng::seed_from_u64(9), 3);
        assert_eq!(a, b);
    }

    #[test]
    fn test_custom_policy() {
        let policy = ReconnectDelay::custom(|n| Duration::from_millis(u64::from(n) * 10));
        assert_eq!(policy.delay(4).unwrap(), Duration::from_millis(40));
    }

    #[test]
    fn test_named_full_jitter() {
        let policy = ReconnectDelay::named("full-jitter");
        assert!(matches!(policy, ReconnectDelay::FullJitter));
        assert!(policy.delay(2).unwrap() < Duration::from_secs(4));
    }

    #[test]
    fn test_unknown_policy_is_config_error() {
        let policy = ReconnectDelay::named("linear");
        let err = policy.delay(0).unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("linear"));
    }

    #[test]
    fn test_default_is_full_jitter() {
        assert!(matches!(ReconnectDelay::default(), ReconnectDelay::FullJitter));
    }

    proptest! {
        #[test]
        fn prop_full_jitter_below_cap(retry_count in any::<u32>()) {
            let delay = full_jitter(retry_count);
            prop_assert!(delay < full_jitter_cap(retry_count));
            prop_assert!(delay < Duration::from_secs(64));
        }

        #[test]
        fn prop_cap_is_monotonic(retry_count in 0u32..64) {
            prop_assert!(full_jitter_cap(retry_count) <= full_jitter_cap(retry_count + 1));
        }
    }
}
