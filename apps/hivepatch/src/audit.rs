//! # Audit Files
//!
//! After an apply run the config, now carrying every captured `PrevValue`,
//! is written next to the input as
//!
//! ```text
//! <input file name>.<unix millis>.save           successful run
//! <input file name>.<unix millis>.partial.save   run that stopped on an error
//! ```
//!
//! or into a configured audit directory under the same name. An audit file is
//! never replaced: if the name is taken, `-1`, `-2`, ... is appended to the
//! timestamp until a free name is found.

use hivepatch_core::{Config, HivepatchError, encode};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::NamedTempFile;

/// Attempts at finding a free audit file name for one timestamp.
pub const MAX_AUDIT_ATTEMPTS: u32 = 1000;

/// Milliseconds since the Unix epoch, or 0 if the clock is before it.
#[must_use]
pub fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Name of the audit file for `input`. `attempt` 0 carries no counter.
pub fn audit_file_name(
    input: &Path,
    stamp: u128,
    attempt: u32,
    partial: bool,
) -> Result<String, HivepatchError> {
    let name = input.file_name().ok_or_else(|| {
        HivepatchError::Persist(format!("Input path '{}' has no file name", input.display()))
    })?;
    let suffix = if partial { "partial.save" } else { "save" };
    let stamp = match attempt {
        0 => stamp.to_string(),
        n => format!("{}-{}", stamp, n),
    };
    Ok(format!("{}.{}.{}", name.to_string_lossy(), stamp, suffix))
}

/// Directory an audit file lands in: `audit_dir` when given, otherwise the
/// directory of `input`.
#[must_use]
pub fn audit_dir_for(input: &Path, audit_dir: Option<&Path>) -> PathBuf {
    match audit_dir {
        Some(dir) => dir.to_path_buf(),
        None => match input.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        },
    }
}

/// Encode `config` into a new audit file and return its path.
///
/// Existing files are never opened for writing.
pub fn write_audit(
    config: &Config,
    input: &Path,
    audit_dir: Option<&Path>,
    stamp: u128,
    partial: bool,
) -> Result<PathBuf, HivepatchError> {
    let bytes = encode(config)?;
    let dir = audit_dir_for(input, audit_dir);

    for attempt in 0..MAX_AUDIT_ATTEMPTS {
        let path = dir.join(audit_file_name(input, stamp, attempt, partial)?);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(write_failed(&path, e)),
        };
        file.write_all(&bytes)
            .and_then(|()| file.sync_all())
            .map_err(|e| write_failed(&path, e))?;
        return Ok(path);
    }

    Err(HivepatchError::Persist(format!(
        "No free audit file name for '{}' in '{}' after {} attempts",
        input.display(),
        dir.display(),
        MAX_AUDIT_ATTEMPTS
    )))
}

/// Encode `config` and replace `path` with it.
///
/// The bytes go to a temporary file in the same directory, which is then
/// renamed over `path`, so `path` holds either the old or the new document.
pub fn persist(config: &Config, path: &Path) -> Result<(), HivepatchError> {
    let bytes = encode(config)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut staged = NamedTempFile::new_in(dir).map_err(|e| write_failed(path, e))?;
    staged
        .write_all(&bytes)
        .and_then(|()| staged.as_file().sync_all())
        .map_err(|e| write_failed(path, e))?;
    staged
        .persist(path)
        .map_err(|e| write_failed(path, e.error))?;
    Ok(())
}

fn write_failed(path: &Path, e: std::io::Error) -> HivepatchError {
    HivepatchError::Persist(format!("Cannot write '{}': {}", path.display(), e))
}

// =============================================================================
// TESTS
// =============================================================================
