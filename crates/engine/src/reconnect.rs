//! Reconnect controller: detects timed-out active tunnels and replaces
//! them with a freshly-opened instance (spec §4.4).

use crate::lifecycle::{free, try_activate};
use crate::manager::TunnelManager;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;
use tunnelmgr_adapters::TransportDriver;
use tunnelmgr_core::{Clock, TunnelRecord, TunnelState};

/// Background task. Loops forever, polling `active` for tunnels the driver
/// reports as timed out and spawning a reconnect task for each (spec §4.4).
pub async fn reconnect_manager<D, C>(manager: TunnelManager<D, C>)
where
    D: TransportDriver,
    C: Clock,
{
    loop {
        let stagger_ms = manager.config().reconnect_stagger.as_millis().max(1) as u64;
        let stagger = rand::thread_rng().gen_range(0..stagger_ms);
        sleep(manager.config().reconnect_poll_interval + Duration::from_millis(stagger)).await;

        let timed_out_urls = manager.lock_state_mut(|state| {
            let now = manager.clock().now();
            let driver = manager.driver();
            let mut urls = Vec::new();
            for rec in state.active.iter() {
                let mut guard = rec.lock();
                if guard.reconnect {
                    continue;
                }
                let timed_out = match &guard.driver {
                    Some(handle) => driver.timeout(handle, now),
                    None => false,
                };
                if timed_out {
                    guard.reconnect = true;
                    urls.push(guard.url.clone());
                }
            }
            urls
        });

        for url in timed_out_urls {
            let manager = manager.clone();
            tokio::spawn(async move {
                reconnect_task(manager, url).await;
            });
        }
    }
}

/// Replace the tunnel at `url` with a freshly-opened instance (spec §4.4).
///
/// The reconnect controller never retries more than once concurrently for
/// the same tunnel: the old record's `reconnect` flag is only cleared by
/// being freed here, and the new instance starts with `reconnect = false`
/// by virtue of being freshly constructed (spec §9).
async fn reconnect_task<D, C>(manager: TunnelManager<D, C>, url: String)
where
    D: TransportDriver,
    C: Clock,
{
    let id = manager.ids().next();
    let mut fresh_record = TunnelRecord::new(url.clone(), id, manager.config().init_age);
    fresh_record.state = TunnelState::Opening;
    let fresh = Arc::new(parking_lot::Mutex::new(fresh_record));

    let opened = try_activate(&manager, &fresh, &url).await;

    let to_close = manager.lock_state_mut(|state| {
        if opened {
            fresh.lock().state = TunnelState::Open;
            let active_displaced = state.active.replace(&url, fresh.clone());
            let cache_displaced = state.cache.replace(&url, fresh.clone());
            if let Some(old) = active_displaced {
                free(state, &old)
            } else if let Some(old) = cache_displaced {
                let handle = {
                    let mut guard = fresh.lock();
                    guard.state = TunnelState::Dead;
                    guard.driver.take()
                };
                free(state, &old);
                handle
            } else {
                // Neither set still names this url: an admin op deactivated
                // the tunnel while this task was opening its replacement.
                fresh.lock().driver.take()
            }
        } else {
            state.active.delete(&url);
            let mut guard = fresh.lock();
            guard.state = TunnelState::Dead;
            guard.driver.take()
        }
    });

    if let Some(handle) = to_close {
        manager.driver().close(&handle).await;
    }

    if !opened {
        warn!(url = %url, "reconnect failed, tunnel marked dead");
    }
}
