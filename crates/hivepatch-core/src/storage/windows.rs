//! # Windows Registry
//!
//! The live OS registry, reached through `winreg`.
//!
//! Open keys are kept in a token table; closing a token drops its `RegKey`,
//! which releases the native handle.

use super::{Access, KeyToken, RegistryStore, StoreError, normalize_path};
use crate::ValType;
use crate::scope::ScopeHandle;
use std::collections::BTreeMap;
use std::io;
use winreg::enums::{
    HKEY_CLASSES_ROOT, HKEY_CURRENT_CONFIG, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, HKEY_USERS,
    KEY_ALL_ACCESS, KEY_READ, RegType,
};
use winreg::types::FromRegValue;
use winreg::{RegKey, RegValue};

/// The live Windows registry.
#[derive(Default)]
pub struct WindowsRegistry {
    open: BTreeMap<KeyToken, (RegKey, Access)>,
    next_token: u64,
}

impl std::fmt::Debug for WindowsRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowsRegistry")
            .field("open_keys", &self.open.len())
            .finish_non_exhaustive()
    }
}

fn predef(scope: ScopeHandle) -> RegKey {
    RegKey::predef(match scope {
        ScopeHandle::LocalMachine => HKEY_LOCAL_MACHINE,
        ScopeHandle::CurrentUser => HKEY_CURRENT_USER,
        ScopeHandle::ClassesRoot => HKEY_CLASSES_ROOT,
        ScopeHandle::CurrentConfig => HKEY_CURRENT_CONFIG,
        ScopeHandle::Users => HKEY_USERS,
    })
}

fn kind_of(vtype: &RegType) -> Option<ValType> {
    match vtype {
        RegType::REG_DWORD => Some(ValType::DWord),
        RegType::REG_QWORD => Some(ValType::QWord),
        RegType::REG_SZ => Some(ValType::String),
        RegType::REG_MULTI_SZ => Some(ValType::Strings),
        RegType::REG_BINARY => Some(ValType::Binary),
        _ => None,
    }
}

fn map_error(e: io::Error, missing: StoreError) -> StoreError {
    match e.kind() {
        io::ErrorKind::NotFound => missing,
        io::ErrorKind::PermissionDenied => StoreError::AccessDenied,
        _ => StoreError::Rejected(e.to_string()),
    }
}

impl WindowsRegistry {
    /// Create a registry accessor with no open keys.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key(&self, key: KeyToken) -> Result<&(RegKey, Access), StoreError> {
        self.open.get(&key).ok_or(StoreError::StaleHandle(key))
    }

    fn writable(&self, key: KeyToken) -> Result<&RegKey, StoreError> {
        let (reg, access) = self.key(key)?;
        if !access.can_write() {
            return Err(StoreError::AccessDenied);
        }
        Ok(reg)
    }

    /// Read a raw value and check that it holds the expected kind.
    fn raw(&self, key: KeyToken, name: &str, expected: ValType) -> Result<RegValue, StoreError> {
        let (reg, _) = self.key(key)?;
        let raw = reg
            .get_raw_value(name)
            .map_err(|e| map_error(e, StoreError::ValueNotFound))?;
        match kind_of(&raw.vtype) {
            Some(found) if found == expected => Ok(raw),
            Some(found) => Err(StoreError::KindMismatch { expected, found }),
            None => Err(StoreError::Rejected(format!(
                "stored kind {:?} is not editable",
                raw.vtype
            ))),
        }
    }

    fn decode<T: FromRegValue>(raw: &RegValue) -> Result<T, StoreError> {
        T::from_reg_value(raw).map_err(|e| StoreError::Rejected(e.to_string()))
    }
}

impl RegistryStore for WindowsRegistry {
    fn open_key(
        &mut self,
        scope: ScopeHandle,
        path: &str,
        access: Access,
    ) -> Result<KeyToken, StoreError> {
        let normalized = normalize_path(path)?;
        let flags = match access {
            Access::Read => KEY_READ,
            Access::ReadWrite => KEY_ALL_ACCESS,
        };
        let reg = predef(scope)
            .open_subkey_with_flags(&normalized, flags)
            .map_err(|e| map_error(e, StoreError::KeyNotFound))?;

        let token = KeyToken(self.next_token);
        self.next_token = self.next_token.saturating_add(1);
        self.open.insert(token, (reg, access));
        Ok(token)
    }

    fn close_key(&mut self, key: KeyToken) {
        self.open.remove(&key);
    }

    fn open_key_count(&self) -> usize {
        self.open.len()
    }

    fn get_dword(&self, key: KeyToken, name: &str) -> Result<u32, StoreError> {
        Self::decode(&self.raw(key, name, ValType::DWord)?)
    }

    fn get_qword(&self, key: KeyToken, name: &str) -> Result<u64, StoreError> {
        Self::decode(&self.raw(key, name, ValType::QWord)?)
    }

    fn get_string(&self, key: KeyToken, name: &str) -> Result<String, StoreError> {
        Self::decode(&self.raw(key, name, ValType::String)?)
    }

    fn get_strings(&self, key: KeyToken, name: &str) -> Result<Vec<String>, StoreError> {
        Self::decode(&self.raw(key, name, ValType::Strings)?)
    }

    fn get_binary(&self, key: KeyToken, name: &str) -> Result<Vec<u8>, StoreError> {
        Ok(self.raw(key, name, ValType::Binary)?.bytes)
    }

    fn set_dword(&mut self, key: KeyToken, name: &str, value: u32) -> Result<(), StoreError> {
        self.writable(key)?
            .set_value(name, &value)
            .map_err(|e| map_error(e, StoreError::KeyNotFound))
    }

    fn set_qword(&mut self, key: KeyToken, name: &str, value: u64) -> Result<(), StoreError> {
        self.writable(key)?
            .set_value(name, &value)
            .map_err(|e| map_error(e, StoreError::KeyNotFound))
    }

    fn set_string(&mut self, key: KeyToken, name: &str, value: &str) -> Result<(), StoreError> {
        self.writable(key)?
            .set_value(name, &value)
            .map_err(|e| map_error(e, StoreError::KeyNotFound))
    }

    fn set_strings(
        &mut self,
        key: KeyToken,
        name: &str,
        value: &[String],
    ) -> Result<(), StoreError> {
        self.writable(key)?
            .set_value(name, &value.to_vec())
            .map_err(|e| map_error(e, StoreError::KeyNotFound))
    }

    fn set_binary(&mut self, key: KeyToken, name: &str, value: &[u8]) -> Result<(), StoreError> {
        let raw = RegValue {
            bytes: value.to_vec(),
            vtype: RegType::REG_BINARY,
        };
        self.writable(key)?
            .set_raw_value(name, &raw)
            .map_err(|e| map_error(e, StoreError::KeyNotFound))
    }
}
