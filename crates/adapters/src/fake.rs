//! Fake transport driver for testing.

use crate::transport::{TransportDriver, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FakeHandle(pub u64);

/// Recorded transport driver call.
#[derive(Debug, Clone)]
pub enum TransportCall {
    Open { url: String },
    Close { handle: FakeHandle },
    Write { handle: FakeHandle, len: usize },
    FragmentationRequired { handle: FakeHandle, mtu: u16 },
}

struct FakeState {
    next_handle: u64,
    open_outcomes: HashMap<String, VecDeque<bool>>,
    default_open_succeeds: bool,
    closed: HashSet<FakeHandle>,
    timed_out: HashSet<FakeHandle>,
    mtu: u16,
    calls: Vec<TransportCall>,
}

/// Test double for [`TransportDriver`]. Every call is recorded and outcomes
/// are fully scriptable so the engine's retry and backoff logic can be
/// exercised deterministically.
#[derive(Clone)]
pub struct FakeTransportDriver {
    inner: Arc<Mutex<FakeState>>,
}

impl Default for FakeTransportDriver {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeState {
                next_handle: 0,
                open_outcomes: HashMap::new(),
                default_open_succeeds: true,
                closed: HashSet::new(),
                timed_out: HashSet::new(),
                mtu: 1400,
                calls: Vec::new(),
            })),
        }
    }
}

impl FakeTransportDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.inner.lock().calls.clone()
    }

    /// Script the outcomes of consecutive `open(url)` calls, consumed in
    /// order; once exhausted, `open` falls back to the default outcome.
    pub fn queue_open_outcomes(&self, url: &str, outcomes: impl IntoIterator<Item = bool>) {
        self.inner
            .lock()
            .open_outcomes
            .insert(url.to_string(), outcomes.into_iter().collect());
    }

    /// What `open` does for a url with no (or no more) queued outcomes.
    pub fn set_default_open_succeeds(&self, succeeds: bool) {
        self.inner.lock().default_open_succeeds = succeeds;
    }

    pub fn set_mtu(&self, mtu: u16) {
        self.inner.lock().mtu = mtu;
    }

    pub fn mark_timed_out(&self, handle: FakeHandle) {
        self.inner.lock().timed_out.insert(handle);
    }

    pub fn is_closed(&self, handle: FakeHandle) -> bool {
        self.inner.lock().closed.contains(&handle)
    }
}

#[async_trait]
impl TransportDriver for FakeTransportDriver {
    type Handle = FakeHandle;

    async fn open(&self, url: &str) -> Option<FakeHandle> {
        let mut inner = self.inner.lock();
        inner.calls.push(TransportCall::Open {
            url: url.to_string(),
        });
        let queued = inner.open_outcomes.get_mut(url).and_then(|queue| queue.pop_front());
        let succeeds = queued.unwrap_or(inner.default_open_succeeds);
        if !succeeds {
            return None;
        }
        inner.next_handle += 1;
        Some(FakeHandle(inner.next_handle))
    }

    async fn close(&self, handle: &FakeHandle) {
        let mut inner = self.inner.lock();
        inner.calls.push(TransportCall::Close { handle: *handle });
        inner.closed.insert(*handle);
    }

    fn write(&self, handle: &FakeHandle, packet: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        inner.calls.push(TransportCall::Write {
            handle: *handle,
            len: packet.len(),
        });
        Ok(())
    }

    fn mtu(&self, _handle: &FakeHandle, _configured_mtu: u16) -> u16 {
        self.inner.lock().mtu
    }

    fn fragmentation_required(&self, handle: &FakeHandle, mtu: u16, _original_packet: &[u8]) {
        self.inner
            .lock()
            .calls
            .push(TransportCall::FragmentationRequired {
                handle: *handle,
                mtu,
            });
    }

    fn timeout(&self, handle: &FakeHandle, _now: Instant) -> bool {
        self.inner.lock().timed_out.contains(handle)
    }

    fn parse_url(&self, url: &str) -> Result<(), TransportError> {
        if url.is_empty() {
            return Err(TransportError::InvalidUrl(url.to_string()));
        }
        Ok(())
    }
}
