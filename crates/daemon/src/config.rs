//! Daemon configuration (spec §O ambient stack).

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot determine state directory: neither TUNNELMGR_STATE_DIR, XDG_STATE_HOME nor HOME is set")]
    NoStateDir,
}

/// Paths and tunables loaded once at startup (spec §O, modeled on
/// `crates/daemon/src/lifecycle.rs`'s `Config::load`).
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    pub primary_path: PathBuf,
    pub log_path: PathBuf,
    pub program_name: String,
}

impl Config {
    /// Resolve the state directory: `TUNNELMGR_STATE_DIR` >
    /// `XDG_STATE_HOME/tunnelmgr` > `~/.local/state/tunnelmgr`.
    pub fn load() -> Result<Self, ConfigError> {
        let state_dir = state_dir()?;
        Ok(Self {
            primary_path: state_dir.join("tunnels"),
            log_path: state_dir.join("tunnelmgr.log"),
            program_name: "tunnelmgr".to_string(),
            state_dir,
        })
    }
}

fn state_dir() -> Result<PathBuf, ConfigError> {
    if let Ok(dir) = std::env::var("TUNNELMGR_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("tunnelmgr"));
    }
    let home = std::env::var("HOME").map_err(|_| ConfigError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/tunnelmgr"))
}
