//! The transport driver boundary: the external encrypted-tunnel library the
//! engine drives, and test doubles for it.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod transport;

pub use transport::{TransportDriver, TransportError};

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeHandle, FakeTransportDriver, TransportCall};
