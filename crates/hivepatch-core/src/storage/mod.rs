//! # Store Backends
//!
//! The `RegistryStore` trait is the seam between the apply engine and the
//! live configuration store. Three backends implement it:
//! - `MemoryStore`: in-memory simulator with an operation log and fault
//!   injection, used as the test double
//! - `HiveStore`: a portable simulated hive persisted in a redb file
//! - `WindowsRegistry`: the live OS registry (Windows only)
//!
//! ## Handles
//!
//! `open_key` returns a `KeyToken`, an opaque index into a handle table the
//! store owns. Callers should hold keys through [`OpenKey`], which closes the
//! token exactly once when it goes out of scope, on every exit path.

mod memory;
mod redb_hive;
#[cfg(windows)]
mod windows;

pub use memory::{MemoryStore, StoreOp};
pub use redb_hive::HiveStore;
#[cfg(windows)]
pub use windows::WindowsRegistry;

use crate::ValType;
use crate::primitives::{MAX_KEY_DEPTH, MAX_KEY_NAME_LENGTH};
use crate::scope::ScopeHandle;
use std::fmt;
use thiserror::Error;

// =============================================================================
// TOKENS AND ACCESS
// =============================================================================

/// Opaque identifier of an open key inside a store's handle table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyToken(pub u64);

impl fmt::Display for KeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Access requested when opening a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    ReadWrite,
}

impl Access {
    /// Whether writes are allowed through a handle opened with this access.
    #[must_use]
    pub const fn can_write(self) -> bool {
        matches!(self, Access::ReadWrite)
    }
}

// =============================================================================
// STORE ERROR
// =============================================================================

/// Failures reported by a store backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("key not found")]
    KeyNotFound,

    #[error("value not found")]
    ValueNotFound,

    #[error("access denied")]
    AccessDenied,

    /// The live value exists but has a different kind.
    #[error("stored value is {found}, expected {expected}")]
    KindMismatch { expected: ValType, found: ValType },

    /// The value handed to a writer does not have the writer's kind.
    #[error("value of kind {found} cannot be written as {expected}")]
    ShapeMismatch { expected: ValType, found: ValType },

    #[error("stale key handle {0}")]
    StaleHandle(KeyToken),

    #[error("invalid key path: {0}")]
    InvalidPath(String),

    /// The store refused the operation for a backend-specific reason.
    #[error("rejected by store: {0}")]
    Rejected(String),

    #[error("I/O error: {0}")]
    Io(String),
}

// =============================================================================
// REGISTRYSTORE TRAIT
// =============================================================================

/// Typed access to a hierarchical, scoped key/value store.
///
/// All calls block until the store answers. Getters fail with `ValueNotFound`
/// for an absent name and `KindMismatch` when the live value has another
/// kind. Setters on a key opened with `Access::Read` fail with `AccessDenied`.
pub trait RegistryStore {
    /// Open the key at `path` under `scope`.
    fn open_key(
        &mut self,
        scope: ScopeHandle,
        path: &str,
        access: Access,
    ) -> Result<KeyToken, StoreError>;

    /// Release a key. Closing an unknown token is a no-op.
    fn close_key(&mut self, key: KeyToken);

    /// Number of keys currently open.
    fn open_key_count(&self) -> usize;

    fn get_dword(&self, key: KeyToken, name: &str) -> Result<u32, StoreError>;
    fn get_qword(&self, key: KeyToken, name: &str) -> Result<u64, StoreError>;
    fn get_string(&self, key: KeyToken, name: &str) -> Result<String, StoreError>;
    fn get_strings(&self, key: KeyToken, name: &str) -> Result<Vec<String>, StoreError>;
    fn get_binary(&self, key: KeyToken, name: &str) -> Result<Vec<u8>, StoreError>;

    fn set_dword(&mut self, key: KeyToken, name: &str, value: u32) -> Result<(), StoreError>;
    fn set_qword(&mut self, key: KeyToken, name: &str, value: u64) -> Result<(), StoreError>;
    fn set_string(&mut self, key: KeyToken, name: &str, value: &str) -> Result<(), StoreError>;
    fn set_strings(
        &mut self,
        key: KeyToken,
        name: &str,
        value: &[String],
    ) -> Result<(), StoreError>;
    fn set_binary(&mut self, key: KeyToken, name: &str, value: &[u8]) -> Result<(), StoreError>;
}

// =============================================================================
// SCOPED HANDLE
// =============================================================================

/// An open key that is closed when dropped.
///
/// Holds the store mutably for its whole lifetime, so a key is used only
/// inside the block that opened it.
pub struct OpenKey<'s> {
    store: &'s mut dyn RegistryStore,
    token: KeyToken,
}

impl<'s> OpenKey<'s> {
    /// Open a key and wrap it in a guard.
    pub fn open(
        store: &'s mut dyn RegistryStore,
        scope: ScopeHandle,
        path: &str,
        access: Access,
    ) -> Result<Self, StoreError> {
        let token = store.open_key(scope, path, access)?;
        Ok(Self { store, token })
    }

    /// The token of the open key.
    #[must_use]
    pub fn token(&self) -> KeyToken {
        self.token
    }

    /// Shared access to the store.
    pub fn store(&self) -> &(dyn RegistryStore + 's) {
        &*self.store
    }

    /// Exclusive access to the store.
    pub fn store_mut(&mut self) -> &mut (dyn RegistryStore + 's) {
        &mut *self.store
    }
}

impl Drop for OpenKey<'_> {
    fn drop(&mut self) {
        self.store.close_key(self.token);
    }
}

impl fmt::Debug for OpenKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenKey")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// PATH HELPERS
// =============================================================================

/// Normalise a key path: `/` becomes `\`, empty components are dropped.
///
/// Fails when a component is longer than `MAX_KEY_NAME_LENGTH` or the path is
/// deeper than `MAX_KEY_DEPTH`.
pub fn normalize_path(path: &str) -> Result<String, StoreError> {
    let components: Vec<&str> = path
        .split(['\\', '/'])
        .filter(|c| !c.is_empty())
        .collect();

    if components.len() > MAX_KEY_DEPTH {
        return Err(StoreError::InvalidPath(format!(
            "depth {} exceeds maximum {}",
            components.len(),
            MAX_KEY_DEPTH
        )));
    }
    if let Some(long) = components
        .iter()
        .find(|c| c.chars().count() > MAX_KEY_NAME_LENGTH)
    {
        return Err(StoreError::InvalidPath(format!(
            "component of {} characters exceeds maximum {}",
            long.chars().count(),
            MAX_KEY_NAME_LENGTH
        )));
    }

    Ok(components.join("\\"))
}

/// Case-insensitive identity of a key: `ROOT\normalized\path` lowercased.
pub fn key_id(scope: ScopeHandle, path: &str) -> Result<String, StoreError> {
    let normalized = normalize_path(path)?;
    let id = if normalized.is_empty() {
        scope.root_name().to_string()
    } else {
        format!("{}\\{}", scope.root_name(), normalized)
    };
    Ok(id.to_lowercase())
}

/// Every ancestor id of a key id, root first, the key itself last.
pub(crate) fn key_lineage(id: &str) -> Vec<String> {
    let mut lineage = Vec::new();
    let mut current = String::new();
    for component in id.split('\\') {
        if !current.is_empty() {
            current.push('\\');
        }
        current.push_str(component);
        lineage.push(current.clone());
    }
    lineage
}

// =============================================================================
// TESTS
// =============================================================================
