//! The transport driver trait.
//!
//! This is the external boundary (spec §6): the encrypted-tunnel library
//! that actually opens sessions and moves packets. This crate does not ship
//! a production implementation of it — that library is explicitly out of
//! scope — only the trait and a fake for testing the engine above it.

use async_trait::async_trait;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("write failed: {0}")]
    WriteFailed(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

/// A pluggable transport driver.
///
/// `Handle` is the driver's opaque per-session state; [`crate::TunnelRecord`]
/// never inspects it, only stores and passes it back. `open`/`close` are the
/// blocking calls the engine must run with the manager lock released (spec
/// §5); every other method is cheap enough to call with the lock held.
#[async_trait]
pub trait TransportDriver: Send + Sync + 'static {
    type Handle: Send + Sync + Clone + std::fmt::Debug;

    /// Establish a session. Blocking; run unlocked. `None` means failure.
    async fn open(&self, url: &str) -> Option<Self::Handle>;

    /// Tear down a session. Idempotent for a handle already closed.
    async fn close(&self, handle: &Self::Handle);

    /// Send one IP packet over an established session. Synchronous: the
    /// engine calls this with the manager lock held (spec §5).
    fn write(&self, handle: &Self::Handle, packet: &[u8]) -> Result<(), TransportError>;

    /// Effective MTU given the configured value. Zero signals
    /// send-impossible (spec §4.6).
    fn mtu(&self, handle: &Self::Handle, configured_mtu: u16) -> u16;

    /// Notify the driver that `original_packet` exceeded `mtu` and must be
    /// fragmented upstream; the driver owns the downgrade response.
    fn fragmentation_required(&self, handle: &Self::Handle, mtu: u16, original_packet: &[u8]);

    /// Whether the session should be considered timed out as of `now`.
    fn timeout(&self, handle: &Self::Handle, now: Instant) -> bool;

    /// Syntactic validation only, no side effects (spec §6).
    fn parse_url(&self, url: &str) -> Result<(), TransportError>;
}
