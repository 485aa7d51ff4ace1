//! tunnelmgr-engine: lifecycle, reconnect, selection and forwarding logic.
//!
//! This crate is the manager object itself ([`TunnelManager`]) plus the
//! background controllers and request handlers that operate on it. It knows
//! about the transport driver trait (`tunnelmgr-adapters`) and the cache
//! file format (`tunnelmgr-storage`), but neither of those crates knows
//! about it.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod admin;
pub mod backoff;
pub mod error;
pub mod forward;
pub mod lifecycle;
pub mod manager;
pub mod reconnect;
pub mod selector;

pub use admin::{add, delete, ready, snapshot, SnapshotSet};
pub use backoff::{Backoff, BackoffConfig};
pub use error::EngineError;
pub use forward::forward;
pub use lifecycle::activate_manager;
pub use manager::{ManagerConfig, ManagerState, TunnelManager};
pub use reconnect::reconnect_manager;
pub use selector::select;
