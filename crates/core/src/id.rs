//! Tunnel identity.
//!
//! Unlike the UUID-based ids used elsewhere in this codebase's corpus, a
//! tunnel's id is a 16-bit counter: it only needs to distinguish the
//! tunnels currently referenced from the flow-history table, not to be
//! globally unique forever.

use std::fmt;
use std::sync::atomic::{AtomicU16, Ordering};

/// Stable identity for a tunnel record, assigned once at construction and
/// never reused for the same in-memory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TunnelId(pub u16);

impl fmt::Display for TunnelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process-wide generator for [`TunnelId`]s.
///
/// Wraps on overflow, same as the original C implementation's
/// `static uint16_t id = 0; id++`. A wrapped id colliding with a still-live
/// record is only possible after 65536 tunnels have been created in one
/// process; the flow-history table is lossy anyway and tolerates it.
#[derive(Debug, Default)]
pub struct TunnelIdGen {
    next: AtomicU16,
}

impl TunnelIdGen {
    pub fn new() -> Self {
        Self {
            next: AtomicU16::new(0),
        }
    }

    pub fn next(&self) -> TunnelId {
        TunnelId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_monotonic() {
        let gen = TunnelIdGen::new();
        let a = gen.next();
        let b = gen.next();
        assert_eq!(a.0 + 1, b.0);
    }

    #[test]
    fn ids_wrap_at_u16_max() {
        let gen = TunnelIdGen {
            next: AtomicU16::new(u16::MAX),
        };
        let last = gen.next();
        let wrapped = gen.next();
        assert_eq!(last.0, u16::MAX);
        assert_eq!(wrapped.0, 0);
    }
}
