//! # redb-backed Hive
//!
//! A simulated registry hive persisted in a single redb database file.
//!
//! It behaves like the native registry for everything hivepatch needs
//! (scoped keys, case-insensitive paths and names, typed values) and runs on
//! any platform, which makes it the default target off Windows and a safe
//! place to rehearse an apply.
//!
//! ## Layout
//!
//! - `keys`: key id -> 0 (existence only)
//! - `values`: (key id, folded value name) -> postcard-encoded `Value`
//! - `metadata`: `"format_version"` -> `HIVE_FORMAT_VERSION`
//!
//! Every write commits its own transaction. There is no batching: a failure
//! part way through an apply leaves earlier writes in place, exactly like the
//! live registry.

use super::{Access, KeyToken, RegistryStore, StoreError, key_id, key_lineage};
use crate::primitives::HIVE_FORMAT_VERSION;
use crate::scope::ScopeHandle;
use crate::{ValType, Value};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::collections::BTreeMap;
use std::path::Path;

/// Table for keys: key id -> 0
const KEYS: TableDefinition<&str, u64> = TableDefinition::new("keys");

/// Table for values: (key id, folded name) -> serialized Value bytes
const VALUES: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("values");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

fn io(e: impl std::fmt::Display) -> StoreError {
    StoreError::Io(e.to_string())
}

/// A simulated hive stored in a redb file.
pub struct HiveStore {
    /// The redb database handle.
    db: Database,
    /// Handle table: token -> (key id, access)
    open: BTreeMap<KeyToken, (String, Access)>,
    next_token: u64,
}

impl std::fmt::Debug for HiveStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HiveStore")
            .field("open_keys", &self.open.len())
            .field("next_token", &self.next_token)
            .finish_non_exhaustive()
    }
}

impl HiveStore {
    /// Open or create a hive file at the given path.
    ///
    /// Fails with `Rejected` when the file was written by an incompatible
    /// format version.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref()).map_err(io)?;

        {
            let write_txn = db.begin_write().map_err(io)?;
            {
                let _ = write_txn.open_table(KEYS).map_err(io)?;
                let _ = write_txn.open_table(VALUES).map_err(io)?;
                let mut meta = write_txn.open_table(METADATA).map_err(io)?;
                let existing = meta
                    .get("format_version")
                    .map_err(io)?
                    .map(|v| v.value());
                match existing {
                    None => {
                        meta.insert("format_version", HIVE_FORMAT_VERSION)
                            .map_err(io)?;
                    }
                    Some(version) if version != HIVE_FORMAT_VERSION => {
                        return Err(StoreError::Rejected(format!(
                            "hive format version {} is not supported (expected {})",
                            version, HIVE_FORMAT_VERSION
                        )));
                    }
                    Some(_) => {}
                }
            }
            write_txn.commit().map_err(io)?;
        }

        Ok(Self {
            db,
            open: BTreeMap::new(),
            next_token: 0,
        })
    }

    /// Create a key and all of its ancestors in one transaction.
    pub fn create_key(&mut self, scope: ScopeHandle, path: &str) -> Result<(), StoreError> {
        let id = key_id(scope, path)?;
        let write_txn = self.db.begin_write().map_err(io)?;
        {
            let mut keys = write_txn.open_table(KEYS).map_err(io)?;
            for ancestor in key_lineage(&id) {
                keys.insert(ancestor.as_str(), 0).map_err(io)?;
            }
        }
        write_txn.commit().map_err(io)
    }

    /// Whether a key exists.
    pub fn contains_key(&self, scope: ScopeHandle, path: &str) -> Result<bool, StoreError> {
        let id = key_id(scope, path)?;
        self.key_exists(&id)
    }

    /// Number of values stored under all keys.
    pub fn value_count(&self) -> Result<u64, StoreError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(VALUES).map_err(io)?;
        let mut count = 0u64;
        for entry in table.iter().map_err(io)? {
            entry.map_err(io)?;
            count = count.saturating_add(1);
        }
        Ok(count)
    }

    fn key_exists(&self, id: &str) -> Result<bool, StoreError> {
        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(KEYS).map_err(io)?;
        Ok(table.get(id).map_err(io)?.is_some())
    }

    fn entry(&self, key: KeyToken) -> Result<&(String, Access), StoreError> {
        self.open.get(&key).ok_or(StoreError::StaleHandle(key))
    }

    fn read(&self, key: KeyToken, name: &str, expected: ValType) -> Result<Value, StoreError> {
        let (id, _) = self.entry(key)?;
        let folded = name.to_lowercase();

        let read_txn = self.db.begin_read().map_err(io)?;
        let table = read_txn.open_table(VALUES).map_err(io)?;
        let data = table
            .get((id.as_str(), folded.as_str()))
            .map_err(io)?
            .ok_or(StoreError::ValueNotFound)?;
        let value: Value = postcard::from_bytes(data.value())
            .map_err(|e| StoreError::Io(format!("corrupt value {:?}: {}", name, e)))?;

        if value.kind() != expected {
            return Err(StoreError::KindMismatch {
                expected,
                found: value.kind(),
            });
        }
        Ok(value)
    }

    fn write(&mut self, key: KeyToken, name: &str, value: Value) -> Result<(), StoreError> {
        let (id, access) = self.entry(key)?.clone();
        if !access.can_write() {
            return Err(StoreError::AccessDenied);
        }
        let folded = name.to_lowercase();
        let bytes = postcard::to_allocvec(&value).map_err(io)?;

        let write_txn = self.db.begin_write().map_err(io)?;
        {
            let keys = write_txn.open_table(KEYS).map_err(io)?;
            if keys.get(id.as_str()).map_err(io)?.is_none() {
                return Err(StoreError::KeyNotFound);
            }
            let mut values = write_txn.open_table(VALUES).map_err(io)?;
            values
                .insert((id.as_str(), folded.as_str()), bytes.as_slice())
                .map_err(io)?;
        }
        write_txn.commit().map_err(io)
    }
}

fn unexpected(expected: ValType, found: &Value) -> StoreError {
    StoreError::KindMismatch {
        expected,
        found: found.kind(),
    }
}

impl RegistryStore for HiveStore {
    fn open_key(
        &mut self,
        scope: ScopeHandle,
        path: &str,
        access: Access,
    ) -> Result<KeyToken, StoreError> {
        let id = key_id(scope, path)?;
        if !self.key_exists(&id)? {
            return Err(StoreError::KeyNotFound);
        }
        let token = KeyToken(self.next_token);
        self.next_token = self.next_token.saturating_add(1);
        self.open.insert(token, (id, access));
        Ok(token)
    }

    fn close_key(&mut self, key: KeyToken) {
        self.open.remove(&key);
    }

    fn open_key_count(&self) -> usize {
        self.open.len()
    }

    fn get_dword(&self, key: KeyToken, name: &str) -> Result<u32, StoreError> {
        match self.read(key, name, ValType::DWord)? {
            Value::DWord(v) => Ok(v),
            other => Err(unexpected(ValType::DWord, &other)),
        }
    }

    fn get_qword(&self, key: KeyToken, name: &str) -> Result<u64, StoreError> {
        match self.read(key, name, ValType::QWord)? {
            Value::QWord(v) => Ok(v),
            other => Err(unexpected(ValType::QWord, &other)),
        }
    }

    fn get_string(&self, key: KeyToken, name: &str) -> Result<String, StoreError> {
        match self.read(key, name, ValType::String)? {
            Value::String(v) => Ok(v),
            other => Err(unexpected(ValType::String, &other)),
        }
    }

    fn get_strings(&self, key: KeyToken, name: &str) -> Result<Vec<String>, StoreError> {
        match self.read(key, name, ValType::Strings)? {
            Value::Strings(v) => Ok(v),
            other => Err(unexpected(ValType::Strings, &other)),
        }
    }

    fn get_binary(&self, key: KeyToken, name: &str) -> Result<Vec<u8>, StoreError> {
        match self.read(key, name, ValType::Binary)? {
            Value::Binary(v) => Ok(v),
            other => Err(unexpected(ValType::Binary, &other)),
        }
    }

    fn set_dword(&mut self, key: KeyToken, name: &str, value: u32) -> Result<(), StoreError> {
        self.write(key, name, Value::DWord(value))
    }

    fn set_qword(&mut self, key: KeyToken, name: &str, value: u64) -> Result<(), StoreError> {
        self.write(key, name, Value::QWord(value))
    }

    fn set_string(&mut self, key: KeyToken, name: &str, value: &str) -> Result<(), StoreError> {
        self.write(key, name, Value::String(value.to_string()))
    }

    fn set_strings(
        &mut self,
        key: KeyToken,
        name: &str,
        value: &[String],
    ) -> Result<(), StoreError> {
        self.write(key, name, Value::Strings(value.to_vec()))
    }

    fn set_binary(&mut self, key: KeyToken, name: &str, value: &[u8]) -> Result<(), StoreError> {
        self.write(key, name, Value::Binary(value.to_vec()))
    }
}

// =============================================================================
// TESTS
// =============================================================================
