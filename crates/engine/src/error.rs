//! Engine-level errors surfaced to the external interfaces (spec §6, §7).

use thiserror::Error;
use tunnelmgr_core::UrlError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid tunnel url: {0}")]
    Url(#[from] UrlError),
}
