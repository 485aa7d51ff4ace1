//! Admin surface: add, delete, readiness and snapshot queries (spec §4.7).

use crate::error::EngineError;
use crate::lifecycle::{free, spawn_activate_task};
use crate::manager::TunnelManager;
use tracing::warn;
use tunnelmgr_adapters::TransportDriver;
use tunnelmgr_core::{validate_url, Clock, TunnelRecord, TunnelState};

/// Add a tunnel by URL (spec §4.7).
///
/// A url already known and currently `Open`/`Opening` is rejected with a
/// warning and no state change. Otherwise a record is created (or, if the
/// url is cached in a terminal state, reused in place) and an activate task
/// is started for it.
pub async fn add<D, C>(manager: &TunnelManager<D, C>, url: &str) -> Result<(), EngineError>
where
    D: TransportDriver,
    C: Clock,
{
    validate_url(url)?;

    let rec = manager.lock_state_mut(|state| {
        if let Some(existing) = state.cache.find(url) {
            let mut guard = existing.lock();
            if matches!(guard.state, TunnelState::Open | TunnelState::Opening) {
                return None;
            }
            guard.state = TunnelState::Opening;
            drop(guard);
            Some(existing)
        } else {
            let id = manager.ids().next();
            let mut record = TunnelRecord::new(url, id, manager.config().init_age);
            record.state = TunnelState::Opening;
            Some(state.cache.insert(record))
        }
    });

    let Some(rec) = rec else {
        warn!(url = %url, "add rejected: url already open or opening");
        return Ok(());
    };

    spawn_activate_task(manager.clone(), rec);
    manager.file_write();
    Ok(())
}

/// Remove a tunnel by URL (spec §4.7).
///
/// `active` (`Open`/`Closing`/`Deleting`) is checked first since those are
/// the only states a record can have while still a member of `active`
/// (spec §4.3's `is_active_eligible`); an `Open` record closes immediately,
/// while `Closing`/`Deleting` are already mid-transition and need no
/// further action here. Otherwise the record is looked up in `cache`: an
/// `Opening` record defers to its activate-task by moving to `Closing`,
/// anything else destroys immediately via the generic free path.
pub async fn delete<D, C>(manager: &TunnelManager<D, C>, url: &str)
where
    D: TransportDriver,
    C: Clock,
{
    enum Outcome<H> {
        NotFound,
        NoAction,
        Close(Option<H>),
    }

    let outcome = manager.lock_state_mut(|state| {
        if let Some(rec) = state.active.delete(url) {
            let mut guard = rec.lock();
            match guard.state {
                TunnelState::Open => {
                    let handle = guard.driver.take();
                    guard.state = TunnelState::Closed;
                    Outcome::Close(handle)
                }
                TunnelState::Closing | TunnelState::Deleting => Outcome::NoAction,
                other => unreachable!("admin.delete observed invariant-violating active state {other:?}"),
            }
        } else if let Some(rec) = state.cache.find(url) {
            let mut guard = rec.lock();
            if guard.state == TunnelState::Opening {
                guard.state = TunnelState::Closing;
                Outcome::NoAction
            } else {
                drop(guard);
                Outcome::Close(free(state, &rec))
            }
        } else {
            Outcome::NotFound
        }
    });

    match outcome {
        Outcome::NotFound => {
            warn!(url = %url, "delete of unknown url");
            return;
        }
        Outcome::NoAction => {}
        Outcome::Close(handle) => {
            if let Some(handle) = handle {
                manager.driver().close(&handle).await;
            }
        }
    }

    manager.file_write();
}

/// Whether at least one tunnel is currently active (spec §4.7, §6).
pub fn ready<D, C>(manager: &TunnelManager<D, C>) -> bool
where
    D: TransportDriver,
    C: Clock,
{
    manager.lock_state(|state| !state.active.is_empty())
}

/// Which set a [`snapshot`] call reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSet {
    Active,
    Cache,
}

/// URLs currently in the requested set, in set order (spec §6).
pub fn snapshot<D, C>(manager: &TunnelManager<D, C>, which: SnapshotSet) -> Vec<String>
where
    D: TransportDriver,
    C: Clock,
{
    manager.lock_state(|state| {
        let set = match which {
            SnapshotSet::Active => &state.active,
            SnapshotSet::Cache => &state.cache,
        };
        set.iter().map(|rec| rec.lock().url.clone()).collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::ManagerConfig;
    use std::time::Duration;
    use tunnelmgr_adapters::{FakeHandle, FakeTransportDriver};
    use tunnelmgr_core::{SystemClock, TunnelId, INIT_AGE};

    fn manager(name: &str) -> TunnelManager<FakeTransportDriver, SystemClock> {
        let config = ManagerConfig::new(std::env::temp_dir().join(format!("admin-test-{name}")));
        TunnelManager::new(FakeTransportDriver::new(), SystemClock, config)
    }

    #[tokio::test]
    async fn add_opens_a_new_tunnel_and_it_ends_up_active() {
        let manager = manager("add-new");
        add(&manager, "cktp://a").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(ready(&manager));
        assert_eq!(snapshot(&manager, SnapshotSet::Active), vec!["cktp://a"]);
    }

    #[tokio::test]
    async fn add_rejects_an_already_open_url() {
        let manager = manager("add-reject");
        manager.lock_state_mut(|state| {
            let mut rec = TunnelRecord::new("cktp://a", TunnelId(0), INIT_AGE);
            rec.state = TunnelState::Open;
            rec.driver = Some(FakeHandle(1));
            let shared = state.cache.insert(rec);
            state.active.insert_shared(shared);
        });
        add(&manager, "cktp://a").await.unwrap();
        assert_eq!(snapshot(&manager, SnapshotSet::Active), vec!["cktp://a"]);
        assert_eq!(snapshot(&manager, SnapshotSet::Cache), vec!["cktp://a"]);
    }

    #[tokio::test]
    async fn add_rejects_an_empty_url() {
        let manager = manager("add-empty");
        assert!(add(&manager, "").await.is_err());
    }

    #[tokio::test]
    async fn delete_closes_an_open_active_tunnel_but_keeps_it_cached() {
        let manager = manager("delete-open");
        manager.lock_state_mut(|state| {
            let mut rec = TunnelRecord::new("cktp://a", TunnelId(0), INIT_AGE);
            rec.state = TunnelState::Open;
            rec.driver = Some(FakeHandle(1));
            let shared = state.cache.insert(rec);
            state.active.insert_shared(shared);
        });
        delete(&manager, "cktp://a").await;
        assert!(snapshot(&manager, SnapshotSet::Active).is_empty());
        assert_eq!(snapshot(&manager, SnapshotSet::Cache), vec!["cktp://a"]);
        assert!(manager.driver().is_closed(FakeHandle(1)));

        let rec = manager.lock_state(|state| state.cache.find("cktp://a").unwrap());
        assert_eq!(rec.lock().state, TunnelState::Closed);
    }

    #[tokio::test]
    async fn delete_of_unknown_url_is_a_no_op() {
        let manager = manager("delete-unknown");
        delete(&manager, "cktp://nope").await;
        assert!(!ready(&manager));
    }
}
