//! Tunnel manager daemon library: configuration and logging setup shared by
//! the `tunnelmgrd` binary and its tests.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod logging;

pub use config::{Config, ConfigError};
