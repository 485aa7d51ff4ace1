//! Weighted tunnel selection with per-flow stability and punishment (spec §4.5).

use crate::manager::ManagerState;
use tunnelmgr_core::{TunnelId, HISTORY_SIZE};

/// `select(hash, repeat) -> tunnel | absent`, with the manager lock held by
/// the caller (spec §5: the selector is one of the lock-holding actors).
pub fn select<H>(state: &mut ManagerState<H>, hash: u64, repeat: u32) -> Option<TunnelId> {
    let len = state.active.len();
    if len == 0 {
        return None;
    }

    let slot = hash % HISTORY_SIZE as u64;
    let h32 = ((hash >> 32) ^ (hash & 0xffff_ffff)) as u32;
    let wh = h32.wrapping_mul(repeat.wrapping_add(1));

    let total: f64 = state.active.iter().map(|rec| rec.lock().weight).sum();
    let pick_fraction = wh as f64 / (u32::MAX as f64 + 1.0);
    let mut pick = pick_fraction * total;

    let mut candidate_idx = len - 1;
    for (idx, rec) in state.active.iter().enumerate() {
        let weight = rec.lock().weight;
        if pick < weight {
            candidate_idx = idx;
            break;
        }
        pick -= weight;
    }

    if repeat != 0 {
        let prior = state.history.get(slot);
        if prior.hash == h32 {
            if let Some(prev_id) = prior.id {
                let punished_idx = state
                    .active
                    .iter()
                    .position(|rec| rec.lock().id == prev_id);
                if let Some(punished_idx) = punished_idx {
                    state
                        .active
                        .iter()
                        .nth(punished_idx)
                        .expect("index came from this same iteration")
                        .lock()
                        .punish();
                    if punished_idx == candidate_idx {
                        candidate_idx = (candidate_idx + 1) % len;
                    }
                }
            }
        }
    }

    let candidate = state
        .active
        .iter()
        .nth(candidate_idx)
        .expect("candidate_idx is always < len")
        .clone();
    let id = {
        let mut rec = candidate.lock();
        rec.reward();
        rec.id
    };
    state.history.set(slot, h32, id);
    Some(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ManagerState;
    use tunnelmgr_core::{TunnelId, TunnelRecord, INIT_AGE};

    fn state_with(weights: &[f64]) -> ManagerState<()> {
        let mut state = ManagerState::<()> {
            cache: Default::default(),
            active: Default::default(),
            history: Default::default(),
        };
        for (i, &w) in weights.iter().enumerate() {
            let mut rec = TunnelRecord::new(format!("cktp://{i}"), TunnelId(i as u16), INIT_AGE);
            rec.weight = w;
            state.active.insert(rec);
        }
        state
    }

    #[test]
    fn empty_active_set_returns_absent() {
        let mut state = state_with(&[]);
        assert_eq!(select(&mut state, 0, 0), None);
    }

    #[test]
    fn repeated_zero_hash_zero_repeat_picks_the_same_tunnel_twice() {
        let mut state = state_with(&[1.0, 1.0]);
        let first = select(&mut state, 0, 0);
        let second = select(&mut state, 0, 0);
        assert_eq!(first, Some(TunnelId(0)));
        assert_eq!(first, second);
    }

    #[test]
    fn repeat_punishes_the_prior_pick_and_advances() {
        let mut state = state_with(&[1.0, 1.0]);
        let first = select(&mut state, 0, 0);
        assert_eq!(first, Some(TunnelId(0)));

        let second = select(&mut state, 0, 1);
        assert_eq!(second, Some(TunnelId(1)));

        let a_weight = state.active.find("cktp://0").unwrap().lock().weight;
        let b_weight = state.active.find("cktp://1").unwrap().lock().weight;
        assert_eq!(a_weight, 0.75);
        assert_eq!(b_weight, 1.0);
    }
}
