//! Tunnel lifecycle state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a tunnel record in its lifecycle.
///
/// See spec §4.3 for the full transition table. The lifecycle controller
/// and reconnect controller are the only actors allowed to move a record
/// between these states under the manager lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TunnelState {
    /// Not open, not being opened. Cache-only.
    Closed,
    /// An activate-task is attempting to open the driver session.
    Opening,
    /// Driver session established; eligible for selection from `active`.
    Open,
    /// Activation gave up after `MAX_RETRIES`; cache-only until re-added.
    Dead,
    /// Admin delete observed mid-open; activate-task will finish to Closed.
    Closing,
    /// Free requested mid-open; activate-task will finish by destroying it.
    Deleting,
}

impl TunnelState {
    /// True for states that may legitimately appear in the `active` set
    /// (open, or a pending transition started while still active).
    pub fn is_active_eligible(self) -> bool {
        matches!(self, TunnelState::Open | TunnelState::Closing | TunnelState::Deleting)
    }
}

impl fmt::Display for TunnelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TunnelState::Closed => "closed",
            TunnelState::Opening => "opening",
            TunnelState::Open => "open",
            TunnelState::Dead => "dead",
            TunnelState::Closing => "closing",
            TunnelState::Deleting => "deleting",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_lowercase_name() {
        assert_eq!(TunnelState::Opening.to_string(), "opening");
        assert_eq!(TunnelState::Dead.to_string(), "dead");
    }

    #[test]
    fn active_eligible_states() {
        assert!(TunnelState::Open.is_active_eligible());
        assert!(TunnelState::Closing.is_active_eligible());
        assert!(TunnelState::Deleting.is_active_eligible());
        assert!(!TunnelState::Closed.is_active_eligible());
        assert!(!TunnelState::Opening.is_active_eligible());
        assert!(!TunnelState::Dead.is_active_eligible());
    }
}
