//! Flow-history table used by the selector.

use crate::id::TunnelId;

/// Number of slots in the flow-history table (spec §3).
pub const HISTORY_SIZE: usize = 1024;

/// One slot of the flow-history table: the last `(hash32, tunnel_id)` pair
/// recorded for a given `hash mod HISTORY_SIZE` bucket.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistorySlot {
    pub hash: u32,
    pub id: Option<TunnelId>,
}

/// Fixed-size, lossy map from hash bucket to last-selected tunnel.
///
/// Intentionally small: two flows whose hashes collide modulo
/// [`HISTORY_SIZE`] silently overwrite each other's slot (spec §8). Only the
/// selector touches this, and only while the manager lock is held.
pub struct FlowHistory {
    slots: Box<[HistorySlot]>,
}

impl FlowHistory {
    pub fn new() -> Self {
        Self {
            slots: vec![HistorySlot::default(); HISTORY_SIZE].into_boxed_slice(),
        }
    }

    fn slot_index(hash: u64) -> usize {
        (hash % HISTORY_SIZE as u64) as usize
    }

    /// Read the slot for `hash`'s bucket.
    pub fn get(&self, hash: u64) -> HistorySlot {
        self.slots[Self::slot_index(hash)]
    }

    /// Record `(hash32, id)` into `hash`'s bucket, overwriting whatever was
    /// there.
    pub fn set(&mut self, hash: u64, hash32: u32, id: TunnelId) {
        let idx = Self::slot_index(hash);
        self.slots[idx] = HistorySlot {
            hash: hash32,
            id: Some(id),
        };
    }
}

impl Default for FlowHistory {
    fn default() -> Self {
        Self::new()
    }
}
