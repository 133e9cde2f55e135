//! # In-Memory Store
//!
//! A registry simulator that lives entirely in memory.
//!
//! Besides holding keys and values it records every operation performed
//! against it, counts opens and closes, and can be told to fail specific
//! opens, reads or writes. That makes it the test double for checking
//! capture order, abort-and-stop and handle release.

use super::{Access, KeyToken, RegistryStore, StoreError, key_id, key_lineage};
use crate::scope::ScopeHandle;
use crate::{ValType, Value};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

/// One operation observed by a `MemoryStore`.
///
/// Key ids and value names are recorded in their case-folded form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Open { key: String, access: Access },
    Close { key: String },
    Read { key: String, name: String },
    Write { key: String, name: String },
}

/// In-memory registry simulator.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// key id -> (folded value name -> value)
    keys: BTreeMap<String, BTreeMap<String, Value>>,
    /// Handle table: token -> (key id, access)
    open: BTreeMap<KeyToken, (String, Access)>,
    next_token: u64,
    opens: usize,
    closes: usize,
    log: RefCell<Vec<StoreOp>>,
    deny_open: BTreeSet<String>,
    deny_read: BTreeSet<String>,
    deny_write: BTreeSet<String>,
}

impl MemoryStore {
    /// Create an empty store. No keys exist, not even scope roots.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a key and all of its ancestors.
    pub fn create_key(&mut self, scope: ScopeHandle, path: &str) -> Result<(), StoreError> {
        let id = key_id(scope, path)?;
        for ancestor in key_lineage(&id) {
            self.keys.entry(ancestor).or_default();
        }
        Ok(())
    }

    /// Set a value directly, creating the key if needed. Not logged.
    pub fn insert_value(
        &mut self,
        scope: ScopeHandle,
        path: &str,
        name: &str,
        value: Value,
    ) -> Result<(), StoreError> {
        self.create_key(scope, path)?;
        let id = key_id(scope, path)?;
        self.keys
            .entry(id)
            .or_default()
            .insert(name.to_lowercase(), value);
        Ok(())
    }

    /// Peek at a value without logging.
    #[must_use]
    pub fn value(&self, scope: ScopeHandle, path: &str, name: &str) -> Option<&Value> {
        let id = key_id(scope, path).ok()?;
        self.keys.get(&id)?.get(&name.to_lowercase())
    }

    /// Whether a key exists.
    #[must_use]
    pub fn contains_key(&self, scope: ScopeHandle, path: &str) -> bool {
        key_id(scope, path).is_ok_and(|id| self.keys.contains_key(&id))
    }

    /// Make every open of this key fail with `AccessDenied`.
    pub fn deny_open(&mut self, scope: ScopeHandle, path: &str) -> Result<(), StoreError> {
        self.deny_open.insert(key_id(scope, path)?);
        Ok(())
    }

    /// Make every read of this value name fail with `AccessDenied`.
    pub fn deny_read(&mut self, name: &str) {
        self.deny_read.insert(name.to_lowercase());
    }

    /// Make every write of this value name fail with `AccessDenied`.
    pub fn deny_write(&mut self, name: &str) {
        self.deny_write.insert(name.to_lowercase());
    }

    /// Operations recorded so far, in order.
    #[must_use]
    pub fn ops(&self) -> Vec<StoreOp> {
        self.log.borrow().clone()
    }

    /// Forget recorded operations.
    pub fn clear_ops(&mut self) {
        self.log.borrow_mut().clear();
    }

    /// Number of successful opens.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.opens
    }

    /// Number of closes of open keys.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.closes
    }

    fn record(&self, op: StoreOp) {
        self.log.borrow_mut().push(op);
    }

    fn entry(&self, key: KeyToken) -> Result<&(String, Access), StoreError> {
        self.open.get(&key).ok_or(StoreError::StaleHandle(key))
    }

    fn read(&self, key: KeyToken, name: &str, expected: ValType) -> Result<Value, StoreError> {
        let (id, _) = self.entry(key)?;
        let folded = name.to_lowercase();
        self.record(StoreOp::Read {
            key: id.clone(),
            name: folded.clone(),
        });
        if self.deny_read.contains(&folded) {
            return Err(StoreError::AccessDenied);
        }
        let value = self
            .keys
            .get(id)
            .ok_or(StoreError::KeyNotFound)?
            .get(&folded)
            .ok_or(StoreError::ValueNotFound)?;
        if value.kind() != expected {
            return Err(StoreError::KindMismatch {
                expected,
                found: value.kind(),
            });
        }
        Ok(value.clone())
    }

    fn write(&mut self, key: KeyToken, name: &str, value: Value) -> Result<(), StoreError> {
        let (id, access) = self.entry(key)?.clone();
        let folded = name.to_lowercase();
        self.record(StoreOp::Write {
            key: id.clone(),
            name: folded.clone(),
        });
        if !access.can_write() || self.deny_write.contains(&folded) {
            return Err(StoreError::AccessDenied);
        }
        self.keys
            .get_mut(&id)
            .ok_or(StoreError::KeyNotFound)?
            .insert(folded, value);
        Ok(())
    }
}

fn unexpected(expected: ValType, found: &Value) -> StoreError {
    StoreError::KindMismatch {
        expected,
        found: found.kind(),
    }
}

impl RegistryStore for MemoryStore {
    fn open_key(
        &mut self,
        scope: ScopeHandle,
        path: &str,
        access: Access,
    ) -> Result<KeyToken, StoreError> {
        let id = key_id(scope, path)?;
        self.record(StoreOp::Open {
            key: id.clone(),
            access,
        });
        if self.deny_open.contains(&id) {
            return Err(StoreError::AccessDenied);
        }
        if !self.keys.contains_key(&id) {
            return Err(StoreError::KeyNotFound);
        }

        let token = KeyToken(self.next_token);
        self.next_token = self.next_token.saturating_add(1);
        self.open.insert(token, (id, access));
        self.opens += 1;
        Ok(token)
    }

    fn close_key(&mut self, key: KeyToken) {
        if let Some((id, _)) = self.open.remove(&key) {
            self.record(StoreOp::Close { key: id });
            self.closes += 1;
        }
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
