//! # Settings
//!
//! Optional TOML settings file for the binary.
//!
//! ```toml
//! backend = "hive"          # "windows" or "hive"
//! hive = "lab.hive"         # hive file for the hive backend
//! save_prev = true          # overwrite the input document after apply
//! confirm = false           # skip the operator prompt
//! audit_dir = "audit"       # where audit files are written
//! ```
//!
//! The file is looked up in this order:
//! - the `--settings` flag
//! - the `HIVEPATCH_SETTINGS` environment variable
//! - `./hivepatch.toml`, only if it exists
//!
//! An explicitly named file must exist. Command-line flags always win over
//! values read here.

use clap::ValueEnum;
use hivepatch_core::HivepatchError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming a settings file.
pub const SETTINGS_ENV: &str = "HIVEPATCH_SETTINGS";

/// Settings file picked up from the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "hivepatch.toml";

/// Hive file used when neither a flag nor the settings name one.
pub const DEFAULT_HIVE_FILE: &str = "hivepatch.hive";

/// Settings files are small; anything larger is refused.
const MAX_SETTINGS_FILE_SIZE: u64 = 64 * 1024;

// =============================================================================
// BACKEND
// =============================================================================

/// Which store the binary edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// The live Windows registry.
    Windows,
    /// A redb hive file that mirrors the registry layout.
    Hive,
}

impl Backend {
    /// The live registry on Windows, a hive file everywhere else.
    #[must_use]
    pub fn platform_default() -> Self {
        if cfg!(windows) {
            Backend::Windows
        } else {
            Backend::Hive
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Windows => f.write_str("windows"),
            Backend::Hive => f.write_str("hive"),
        }
    }
}

// =============================================================================
// SETTINGS
// =============================================================================

/// Values read from a settings file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub backend: Option<Backend>,
    pub hive: Option<PathBuf>,
    pub save_prev: bool,
    pub confirm: Option<bool>,
    pub audit_dir: Option<PathBuf>,
}

impl Settings {
    /// Parse settings from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, HivepatchError> {
        toml::from_str(text).map_err(|e| HivepatchError::Settings(e.to_string()))
    }

    /// Read and parse a settings file.
    pub fn from_file(path: &Path) -> Result<Self, HivepatchError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            HivepatchError::Settings(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_SETTINGS_FILE_SIZE {
            return Err(HivepatchError::Settings(format!(
                "Settings file '{}' is {} bytes, maximum is {}",
                path.display(),
                metadata.len(),
                MAX_SETTINGS_FILE_SIZE
            )));
        }

        let text = std::fs::read_to_string(path).map_err(|e| {
            HivepatchError::Settings(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        toml::from_str(&text)
            .map_err(|e| HivepatchError::Settings(format!("{}: {}", path.display(), e)))
    }

    /// Load settings following the lookup order. No file found means defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, HivepatchError> {
        let from_env = std::env::var_os(SETTINGS_ENV).map(PathBuf::from);
        match locate(explicit, from_env, Path::new(DEFAULT_SETTINGS_FILE)) {
            Some(path) => {
                tracing::debug!("Loading settings from {}", path.display());
                Self::from_file(&path)
            }
            None => Ok(Self::default()),
        }
    }
}

/// Pick the settings file to read, if any.
///
/// The fallback is only used when it exists; the explicit and environment
/// paths are returned as given so that a typo surfaces as an error.
pub fn locate(
    explicit: Option<&Path>,
    from_env: Option<PathBuf>,
    fallback: &Path,
) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or(from_env)
        .or_else(|| fallback.is_file().then(|| fallback.to_path_buf()))
}

// =============================================================================
// TESTS
// =============================================================================
