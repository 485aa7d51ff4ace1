//! The tunnel manager: owns the cache/active sets, the flow-history table,
//! and the single lock that serialises every structural operation on them
//! (spec §5, §9).

use crate::backoff::BackoffConfig;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tunnelmgr_adapters::TransportDriver;
use tunnelmgr_core::{Clock, FlowHistory, TunnelIdGen, TunnelRecord, TunnelSet};

/// Tunable constants and file paths (spec §4.3.1, §4.3.2, §4.4, §6).
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub primary_path: PathBuf,
    /// Written into the cache file's header comment (spec §4.2 supplement).
    pub program_name: String,
    pub max_init_open: usize,
    pub max_retries: u32,
    pub init_age: u8,
    pub activate_scan_interval: Duration,
    pub activate_stagger: Duration,
    pub reconnect_poll_interval: Duration,
    pub reconnect_stagger: Duration,
    pub backoff: BackoffConfig,
}

impl ManagerConfig {
    /// Defaults matching the spec's named constants, parameterised only by
    /// where the cache file lives.
    pub fn new(primary_path: impl Into<PathBuf>) -> Self {
        Self {
            primary_path: primary_path.into(),
            program_name: "tunnelmgr".to_string(),
            max_init_open: 8,
            max_retries: 3,
            init_age: tunnelmgr_core::INIT_AGE,
            activate_scan_interval: Duration::from_secs(150),
            activate_stagger: Duration::from_secs(10),
            reconnect_poll_interval: Duration::from_secs(1),
            reconnect_stagger: Duration::from_secs(1),
            backoff: BackoffConfig::default(),
        }
    }

    pub fn backup_path(&self) -> PathBuf {
        tunnelmgr_storage::backup_path(&self.primary_path)
    }
}

/// The two tunnel sets and the flow-history table, guarded by a single lock
/// (spec §9: "bundle them into a single manager object").
pub struct ManagerState<H> {
    pub cache: TunnelSet<H>,
    pub active: TunnelSet<H>,
    pub history: FlowHistory,
}

impl<H> ManagerState<H> {
    fn new() -> Self {
        Self {
            cache: TunnelSet::new(),
            active: TunnelSet::new(),
            history: FlowHistory::new(),
        }
    }
}

struct Inner<D: TransportDriver, C: Clock> {
    driver: D,
    clock: C,
    config: ManagerConfig,
    state: Mutex<ManagerState<D::Handle>>,
    ids: TunnelIdGen,
}

/// Handle to the tunnel manager, cheap to clone and share across the
/// activate/reconnect background tasks (spec §9's "single manager object").
pub struct TunnelManager<D: TransportDriver, C: Clock> {
    inner: Arc<Inner<D, C>>,
}

impl<D: TransportDriver, C: Clock> Clone for TunnelManager<D, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D: TransportDriver, C: Clock> TunnelManager<D, C> {
    pub fn new(driver: D, clock: C, config: ManagerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                driver,
                clock,
                config,
                state: Mutex::new(ManagerState::new()),
                ids: TunnelIdGen::new(),
            }),
        }
    }

    pub fn driver(&self) -> &D {
        &self.inner.driver
    }

    pub fn clock(&self) -> &C {
        &self.inner.clock
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    pub(crate) fn ids(&self) -> &TunnelIdGen {
        &self.inner.ids
    }

    /// Run `f` with the manager lock held for reads.
    pub(crate) fn lock_state<T>(&self, f: impl FnOnce(&ManagerState<D::Handle>) -> T) -> T {
        let guard = self.inner.state.lock();
        f(&guard)
    }

    /// Run `f` with the manager lock held for structural mutation.
    pub(crate) fn lock_state_mut<T>(&self, f: impl FnOnce(&mut ManagerState<D::Handle>) -> T) -> T {
        let mut guard = self.inner.state.lock();
        f(&mut guard)
    }

    /// Test-only direct access to manager state, for seeding scenarios that
    /// can't be reached through the public admin/forward surface alone.
    #[cfg(any(test, feature = "test-support"))]
    pub fn with_state<T>(&self, f: impl FnOnce(&ManagerState<D::Handle>) -> T) -> T {
        self.lock_state(f)
    }

    /// Test-only direct mutable access to manager state.
    #[cfg(any(test, feature = "test-support"))]
    pub fn with_state_mut<T>(&self, f: impl FnOnce(&mut ManagerState<D::Handle>) -> T) -> T {
        self.lock_state_mut(f)
    }

    /// Read the cache file (falling back to its backup) and seed `cache`
    /// with the records it names (spec §4.2). Intended to run once at
    /// startup, before the activate manager and reconnect controller are
    /// spawned.
    pub fn file_read(&self) {
        let primary = self.inner.config.primary_path.clone();
        let backup = self.inner.config.backup_path();
        let entries = tunnelmgr_storage::read_cache(&primary, &backup);
        self.lock_state_mut(|state| {
            for entry in entries {
                let id = self.inner.ids.next();
                state
                    .cache
                    .insert(TunnelRecord::new(entry.url, id, entry.age));
            }
        });
    }

    /// Persist `cache` to disk (spec §4.2). Holds the manager lock for the
    /// whole operation, per spec §5's "persistence writer runs with the
    /// lock held for the whole operation".
    pub fn file_write(&self) {
        let primary = self.inner.config.primary_path.clone();
        let backup = self.inner.config.backup_path();
        self.lock_state(|state| {
            let entries: Vec<_> = state
                .cache
                .iter()
                .map(|rec| {
                    let rec = rec.lock();
                    tunnelmgr_storage::CacheEntry {
                        url: rec.url.clone(),
                        age: rec.age,
                    }
                })
                .collect();
            if let Err(e) =
                tunnelmgr_storage::write_cache(&primary, &backup, &self.inner.config.program_name, &entries)
            {
                warn!(error = %e, "cache file write failed");
            }
        });
    }
}
