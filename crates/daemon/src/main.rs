//! Tunnel manager daemon (`tunnelmgrd`).
//!
//! Owns the manager object and its two background controllers: the
//! activate manager (spec §4.3.1) and the reconnect controller (spec §4.4).
//! The admin surface (`add`/`delete`/`ready`/`snapshot`) and packet
//! forwarding are exposed as a library API on `tunnelmgr-engine`, not a wire
//! protocol — no IPC format is specified by the source this was built from,
//! and HTTP status pages are an explicit non-goal.
//!
//! This binary wires the manager up with [`tunnelmgr_adapters::FakeTransportDriver`]
//! since no production transport driver ships in this workspace (the
//! encrypted-tunnel library itself is out of scope, spec §1).

mod config;
mod logging;

use config::Config;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};
use tunnelmgr_adapters::FakeTransportDriver;
use tunnelmgr_core::SystemClock;
use tunnelmgr_engine::{activate_manager, reconnect_manager, ManagerConfig, TunnelManager};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    std::fs::create_dir_all(&config.state_dir)?;
    let _log_guard = logging::setup_logging(&config)?;

    info!("starting tunnelmgrd");
    warn!("using FakeTransportDriver: no production transport driver is wired into this build");

    let manager_config = ManagerConfig {
        program_name: config.program_name.clone(),
        ..ManagerConfig::new(config.primary_path.clone())
    };
    let manager = TunnelManager::new(FakeTransportDriver::new(), SystemClock, manager_config);

    manager.file_read();

    let activate_handle = tokio::spawn(activate_manager(manager.clone()));
    let reconnect_handle = tokio::spawn(reconnect_manager(manager.clone()));

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    activate_handle.abort();
    reconnect_handle.abort();
    manager.file_write();

    // Give the non-blocking log writer a moment to flush before exit.
    tokio::time::sleep(Duration::from_millis(50)).await;
    Ok(())
}
