//! The on-disk tunnel cache file.
//!
//! Plain text, not the JSON+zstd snapshot format used elsewhere in this
//! codebase's corpus — the format here is inherited verbatim from the
//! original C daemon's cache file (spec §6) and kept human-readable so an
//! operator can edit it by hand.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use tunnelmgr_core::record::MAX_URL_LEN;

#[derive(Debug, Error)]
pub enum CacheFileError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// One persisted `(url, age)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub url: String,
    pub age: u8,
}

/// Conventional backup path for a cache file: `<primary>.bak`.
pub fn backup_path(primary: &Path) -> PathBuf {
    sibling_path(primary, "bak")
}

/// Conventional temp path for a cache file: `<primary>.tmp`.
pub fn tmp_path(primary: &Path) -> PathBuf {
    sibling_path(primary, "tmp")
}

fn sibling_path(primary: &Path, extra_ext: &str) -> PathBuf {
    let mut s = primary.as_os_str().to_os_string();
    s.push(".");
    s.push(extra_ext);
    PathBuf::from(s)
}

/// Read the cache file, falling back to the backup on failure, returning an
/// empty cache if both are unreadable (spec §4.2).
///
/// A malformed record stops parsing but keeps every record parsed before
/// it — corruption near the end of the file should not discard an entire
/// cache's worth of tunnels.
pub fn read_cache(primary: &Path, backup: &Path) -> Vec<CacheEntry> {
    match read_one(primary) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(
                path = %primary.display(), error = %e,
                "primary cache file unreadable, falling back to backup"
            );
            match read_one(backup) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(
                        path = %backup.display(), error = %e,
                        "backup cache file unreadable, starting with an empty cache"
                    );
                    Vec::new()
                }
            }
        }
    }
}

fn read_one(path: &Path) -> Result<Vec<CacheEntry>, CacheFileError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_record(&line) {
            Some(entry) => entries.push(entry),
            None => {
                warn!(
                    path = %path.display(), line = %line,
                    "malformed cache record, aborting parse and keeping records read so far"
                );
                break;
            }
        }
    }
    Ok(entries)
}

fn parse_record(line: &str) -> Option<CacheEntry> {
    let (url, age) = line.rsplit_once(' ')?;
    if url.is_empty() || url.len() > MAX_URL_LEN {
        return None;
    }
    let age: u8 = age.trim().parse().ok()?;
    Some(CacheEntry {
        url: url.to_string(),
        age,
    })
}

/// Write the cache file atomically: rotate the backup, write a temp file,
/// then rename it into place (spec §4.2).
///
/// Records with `age == 0` are dropped — they are dead tunnels the
/// lifecycle controller has already given up on. Failures rotating the
/// backup or removing a stale primary are logged and do not abort the
/// write; only a failed final rename is returned as an error, leaving the
/// temp file on disk for forensic inspection.
pub fn write_cache(
    primary: &Path,
    backup: &Path,
    program_name: &str,
    entries: &[CacheEntry],
) -> Result<(), CacheFileError> {
    if let Err(e) = fs::remove_file(backup) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = %backup.display(), error = %e, "failed to remove stale backup cache file");
        }
    }
    if let Err(e) = fs::rename(primary, backup) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = %primary.display(), error = %e, "failed to rotate primary cache file to backup");
        }
    }

    let tmp = tmp_path(primary);
    {
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "# {program_name} tunnel cache")?;
        writeln!(writer, "# AUTOMATICALLY GENERATED, DO NOT EDIT")?;
        writeln!(writer)?;
        for entry in entries {
            if entry.age == 0 {
                continue;
            }
            writeln!(writer, "# AGE = {}", entry.age)?;
            writeln!(writer, "{} {}", entry.url, entry.age)?;
            writeln!(writer)?;
        }
        writer.flush()?;
    }

    if let Err(e) = fs::remove_file(primary) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(path = %primary.display(), error = %e, "failed to remove stale primary cache file before rename");
        }
    }

    fs::rename(&tmp, primary).map_err(|e| {
        warn!(
            path = %tmp.display(), error = %e,
            "failed to rename temp cache file into place; leaving temp file on disk"
        );
        CacheFileError::Io(e)
    })
}
