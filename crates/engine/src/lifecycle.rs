//! Activation lifecycle: the activate manager and per-tunnel activate task
//! (spec §4.3, §4.3.1, §4.3.2).

use crate::backoff::Backoff;
use crate::manager::{ManagerState, TunnelManager};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};
use tunnelmgr_adapters::TransportDriver;
use tunnelmgr_core::{Clock, TunnelRecord, TunnelState};

type SharedRecord<D> = Arc<parking_lot::Mutex<TunnelRecord<<D as TransportDriver>::Handle>>>;

/// Background task started once at startup. Repeatedly scans `cache` for
/// records ready to open and spawns an activate-task for each, until a
/// round finds nothing left to open and `active` is at capacity (spec
/// §4.3.1).
pub async fn activate_manager<D, C>(manager: TunnelManager<D, C>)
where
    D: TransportDriver,
    C: Clock,
{
    loop {
        let candidates = manager.lock_state_mut(|state| scan_for_closed(state, &manager));
        let found_any = !candidates.is_empty();

        for rec in candidates {
            spawn_activate_task(manager.clone(), rec);
        }

        let active_len = manager.lock_state(|state| state.active.len());
        if !found_any && active_len >= manager.config().max_init_open {
            return;
        }

        let stagger_secs = manager.config().activate_stagger.as_secs().max(1);
        let stagger = rand::thread_rng().gen_range(0..stagger_secs);
        sleep(manager.config().activate_scan_interval + Duration::from_secs(stagger)).await;
    }
}

fn scan_for_closed<D, C>(
    state: &mut ManagerState<D::Handle>,
    manager: &TunnelManager<D, C>,
) -> Vec<SharedRecord<D>>
where
    D: TransportDriver,
    C: Clock,
{
    let budget = manager
        .config()
        .max_init_open
        .saturating_sub(state.active.len())
        + 1;
    let mut found = Vec::new();
    for rec in state.cache.iter() {
        if found.len() >= budget {
            break;
        }
        let mut guard = rec.lock();
        if guard.state == TunnelState::Closed {
            guard.state = TunnelState::Opening;
            drop(guard);
            found.push(rec.clone());
        }
    }
    found
}

/// Spawn the per-tunnel activate task. Shared by the activate manager's scan
/// loop and by `admin::add`, which starts one immediately for a freshly
/// created record (spec §4.7).
pub(crate) fn spawn_activate_task<D, C>(manager: TunnelManager<D, C>, rec: SharedRecord<D>)
where
    D: TransportDriver,
    C: Clock,
{
    tokio::spawn(async move {
        activate_task(manager, rec).await;
    });
}

/// Per-tunnel activation: attempt to open the driver session, then resolve
/// the record's final state under lock (spec §4.3.2).
async fn activate_task<D, C>(manager: TunnelManager<D, C>, rec: SharedRecord<D>)
where
    D: TransportDriver,
    C: Clock,
{
    let url = rec.lock().url.clone();
    let opened = try_activate(&manager, &rec, &url).await;

    let init_age = manager.config().init_age;
    let to_close = manager.lock_state_mut(|state| finalize_activation(state, &rec, opened, init_age));

    if let Some(handle) = to_close {
        manager.driver().close(&handle).await;
    }

    manager.file_write();

    if opened {
        info!(url = %url, "tunnel activated");
    } else {
        warn!(url = %url, "tunnel activation gave up after max retries");
    }
}

/// Resolve an activate-task's final state under lock. Returns a driver
/// handle that must be closed unlocked by the caller, if any.
fn finalize_activation<H: Send + Sync + Clone + std::fmt::Debug>(
    state: &mut ManagerState<H>,
    rec: &Arc<parking_lot::Mutex<TunnelRecord<H>>>,
    opened: bool,
    init_age: u8,
) -> Option<H> {
    let mut guard = rec.lock();
    match guard.state {
        TunnelState::Deleting => {
            // Promote to OPEN so the generic destroy path fires, mirroring
            // `free`'s contract that DELETING-on-DELETING is a no-op (spec
            // §4.3.2: "finalises destruction").
            guard.state = TunnelState::Open;
            let handle = guard.driver.take();
            drop(guard);
            state.cache.delete_ref(rec);
            state.active.delete_ref(rec);
            handle
        }
        TunnelState::Closing => {
            let handle = guard.driver.take();
            guard.state = TunnelState::Closed;
            handle
        }
        TunnelState::Opening if opened => {
            guard.age = init_age;
            guard.state = TunnelState::Open;
            drop(guard);
            state.active.insert_shared(rec.clone());
            None
        }
        TunnelState::Opening => {
            guard.age_decay();
            guard.state = TunnelState::Dead;
            None
        }
        other => unreachable!("activate-task finalisation observed invariant-violating state {other:?}"),
    }
}

/// `free(rec)` (spec §4.3): if OPENING, defer to the owning activate-task by
/// transitioning to DELETING; if already DELETING, a free is already in
/// flight and this is a no-op; otherwise close the driver and remove the
/// record from whichever sets it's in. Returns a handle that must be
/// closed unlocked by the caller, if any.
pub(crate) fn free<H: Send + Sync + Clone + std::fmt::Debug>(
    state: &mut ManagerState<H>,
    rec: &Arc<parking_lot::Mutex<TunnelRecord<H>>>,
) -> Option<H> {
    let mut guard = rec.lock();
    match guard.state {
        TunnelState::Opening => {
            guard.state = TunnelState::Deleting;
            None
        }
        TunnelState::Deleting => None,
        _ => {
            let handle = guard.driver.take();
            drop(guard);
            state.cache.delete_ref(rec);
            state.active.delete_ref(rec);
            handle
        }
    }
}

/// Attempt to open the driver session, retrying with backoff (spec
/// §4.3.2). Returns `true` on success, or when the record's state changed
/// away from OPENING mid-loop — an admin operation cancelled this
/// activation, and the caller's finalisation switch resolves what that
/// actually means (spec §9's note on the misleading return value).
pub(crate) async fn try_activate<D, C>(
    manager: &TunnelManager<D, C>,
    rec: &SharedRecord<D>,
    url: &str,
) -> bool
where
    D: TransportDriver,
    C: Clock,
{
    let mut backoff = Backoff::new(manager.config().backoff.clone());

    for attempt in 0..manager.config().max_retries {
        if attempt > 0 {
            sleep(backoff.next()).await;
        }

        if rec.lock().state != TunnelState::Opening {
            return true;
        }

        if let Some(handle) = manager.driver().open(url).await {
            let mut guard = rec.lock();
            if guard.state == TunnelState::Opening {
                guard.driver = Some(handle);
            }
            return true;
        }
    }

    false
}
