//! # Primitives
//!
//! Fixed constants for hivepatch: root-handle values, registry size limits
//! and the hive file format version.
//!
//! These are compiled into the binary and never change at runtime.

// =============================================================================
// ROOT HANDLES
// =============================================================================

/// Predefined root handle for `HKEY_CLASSES_ROOT`.
pub const HKEY_CLASSES_ROOT: u32 = 0x8000_0000;

/// Predefined root handle for `HKEY_CURRENT_USER`.
pub const HKEY_CURRENT_USER: u32 = 0x8000_0001;

/// Predefined root handle for `HKEY_LOCAL_MACHINE`.
pub const HKEY_LOCAL_MACHINE: u32 = 0x8000_0002;

/// Predefined root handle for `HKEY_USERS`.
pub const HKEY_USERS: u32 = 0x8000_0003;

/// Predefined root handle for `HKEY_CURRENT_CONFIG`.
pub const HKEY_CURRENT_CONFIG: u32 = 0x8000_0005;

// =============================================================================
// REGISTRY LIMITS
// =============================================================================

/// Maximum length of a single key path component, in characters.
pub const MAX_KEY_NAME_LENGTH: usize = 255;

/// Maximum nesting depth of a key path.
pub const MAX_KEY_DEPTH: usize = 512;

/// Maximum length of a value name, in characters.
pub const MAX_VALUE_NAME_LENGTH: usize = 16383;

// =============================================================================
// DOCUMENT LIMITS
// =============================================================================

/// Maximum size of a configuration document (16 MB).
///
/// Checked before any parsing takes place.
pub const MAX_DOCUMENT_SIZE: usize = 16 * 1024 * 1024;

// =============================================================================
// HIVE FILE FORMAT
// =============================================================================

/// Current on-disk format version of a simulated hive file.
///
/// Increment when the table layout or value encoding changes.
pub const HIVE_FORMAT_VERSION: u64 = 1;
