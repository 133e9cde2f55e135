//! # hivepatch-core
//!
//! The batch-apply engine for Hivepatch.
//!
//! A `Config` is an ordered list of registry keys, each carrying an ordered
//! list of typed properties. Applying a config captures every property's live
//! value into `prev_value` and then writes the desired value, so the config
//! itself becomes the audit record of what was overwritten.
//!
//! ## Layout
//!
//! - `types`: the config data model and `HivepatchError`
//! - `scope`: scope-name resolution to root handles
//! - `storage`: the `RegistryStore` seam and its backends
//! - `dispatch`: value kind to reader/writer pair
//! - `apply`: the capture-then-write pass
//! - `formats`: the JSON document
//!
//! ## Constraints
//!
//! - NO async, NO network dependencies
//! - Keys and properties are processed strictly in config order
//! - The first failure aborts the run; nothing is rolled back
//! - Every opened key is closed on every path

// =============================================================================
// MODULES
// =============================================================================

pub mod apply;
pub mod dispatch;
pub mod formats;
pub mod primitives;
pub mod scope;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{Config, HivepatchError, Key, Property, ValType, Value};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use apply::{ApplyEngine, ApplyReport, JournalEntry, apply, validate};
pub use dispatch::{Accessors, dispatch};
pub use scope::{Scope, ScopeHandle, resolve};

// =============================================================================
// RE-EXPORTS: Storage
// =============================================================================

#[cfg(windows)]
pub use storage::WindowsRegistry;
pub use storage::{
    Access, HiveStore, KeyToken, MemoryStore, OpenKey, RegistryStore, StoreError, StoreOp,
};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{decode, encode};
