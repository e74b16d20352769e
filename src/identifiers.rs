//! Type-safe identifiers.
//!
//! Newtype wrappers keep connection identities from being mixed up with
//! other integers (ports, counts, lengths).

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// ConnectionId
// ============================================================================

/// Process-wide counter backing [`ConnectionId::next`]. Starts at 1.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one accepted connection.
///
/// Assigned at accept time, monotonically increasing and unique for the
/// lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(NonZeroU64);

impl ConnectionId {
    /// Allocates the next identity.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        let raw = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        // Counter starts at 1 and would need 2^64 accepts to wrap.
        Self(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u64())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;

    #[test]
    fn test_next_is_monotonic() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert!(b > a);
    }

    #[test]
    fn test_display_matches_raw_value() {
        let id = ConnectionId::next();
        assert!(id.as_u64() > 0);
        assert_eq!(id.to_string(), id.as_u64().to_string());
    }

    #[test]
    fn test_unique_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                std::thread::spawn(|| (0..100).map(|_| ConnectionId::next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().expect("thread") {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 800);
    }
}
