//! # Value-Type Dispatcher
//!
//! Maps a `ValType` to the matched reader/writer pair for that kind.
//!
//! Readers return the live value wrapped in the matching `Value` variant.
//! Writers accept a `Value`, refuse any variant other than their own with
//! `StoreError::ShapeMismatch` before touching the store, and otherwise
//! forward to the typed setter.
//!
//! Dispatch is total over the closed `ValType` enum. Unknown type tags never
//! reach this point: they are rejected as `UnsupportedType` where the tag is
//! parsed (`ValType::from_tag`, `Property::from_tag`, the document decoder).

use crate::storage::{KeyToken, RegistryStore, StoreError};
use crate::{ValType, Value};

/// Reads a named value of one kind from an open key.
pub type Reader = fn(&dyn RegistryStore, KeyToken, &str) -> Result<Value, StoreError>;

/// Writes a named value of one kind to an open key.
pub type Writer = fn(&mut dyn RegistryStore, KeyToken, &str, &Value) -> Result<(), StoreError>;

/// The accessor pair for one value kind.
#[derive(Clone, Copy)]
pub struct Accessors {
    pub kind: ValType,
    pub read: Reader,
    pub write: Writer,
}

impl std::fmt::Debug for Accessors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accessors")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Select the accessor pair for a kind.
#[must_use]
pub fn dispatch(kind: ValType) -> Accessors {
    match kind {
        ValType::DWord => Accessors {
            kind,
            read: read_dword,
            write: write_dword,
        },
        ValType::QWord => Accessors {
            kind,
            read: read_qword,
            write: write_qword,
        },
        ValType::String => Accessors {
            kind,
            read: read_string,
            write: write_string,
        },
        ValType::Strings => Accessors {
            kind,
            read: read_strings,
            write: write_strings,
        },
        ValType::Binary => Accessors {
            kind,
            read: read_binary,
            write: write_binary,
        },
    }
}

fn shape(expected: ValType, value: &Value) -> StoreError {
    StoreError::ShapeMismatch {
        expected,
        found: value.kind(),
    }
}

// =============================================================================
// READERS
// =============================================================================

fn read_dword(store: &dyn RegistryStore, key: KeyToken, name: &str) -> Result<Value, StoreError> {
    store.get_dword(key, name).map(Value::DWord)
}

fn read_qword(store: &dyn RegistryStore, key: KeyToken, name: &str) -> Result<Value, StoreError> {
    store.get_qword(key, name).map(Value::QWord)
}

fn read_string(store: &dyn RegistryStore, key: KeyToken, name: &str) -> Result<Value, StoreError> {
    store.get_string(key, name).map(Value::String)
}

fn read_strings(
    store: &dyn RegistryStore,
    key: KeyToken,
    name: &str,
) -> Result<Value, StoreError> {
    store.get_strings(key, name).map(Value::Strings)
}

fn read_binary(store: &dyn RegistryStore, key: KeyToken, name: &str) -> Result<Value, StoreError> {
    store.get_binary(key, name).map(Value::Binary)
}

// =============================================================================
// WRITERS
// =============================================================================

fn write_dword(
    store: &mut dyn RegistryStore,
    key: KeyToken,
    name: &str,
    value: &Value,
) -> Result<(), StoreError> {
    match value {
        Value::DWord(v) => store.set_dword(key, name, *v),
        other => Err(shape(ValType::DWord, other)),
    }
}

fn write_qword(
    store: &mut dyn RegistryStore,
    key: KeyToken,
    name: &str,
    value: &Value,
) -> Result<(), StoreError> {
    match value {
        Value::QWord(v) => store.set_qword(key, name, *v),
        other => Err(shape(ValType::QWord, other)),
    }
}

fn write_string(
    store: &mut dyn RegistryStore,
    key: KeyToken,
    name: &str,
    value: &Value,
) -> Result<(), StoreError> {
    match value {
        Value::String(v) => store.set_string(key, name, v),
        other => Err(shape(ValType::String, other)),
    }
}

fn write_strings(
    store: &mut dyn RegistryStore,
    key: KeyToken,
    name: &str,
    value: &Value,
) -> Result<(), StoreError> {
    match value {
        Value::Strings(v) => store.set_strings(key, name, v),
        other => Err(shape(ValType::Strings, other)),
    }
}

fn write_binary(
    store: &mut dyn RegistryStore,
    key: KeyToken,
    name: &str,
    value: &Value,
) -> Result<(), StoreError> {
    match value {
        Value::Binary(v) => store.set_binary(key, name, v),
        other => Err(shape(ValType::Binary, other)),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ScopeHandle;
    use crate::storage::{Access, MemoryStore, StoreOp};

    const PATH: &str = "Software\\Dispatch";

    fn sample(kind: ValType) -> Value {
        match kind {
            ValType::DWord => Value::DWord(42),
            ValType::QWord => Value::QWord(1 << 40),
            ValType::String => Value::String("hello".into()),
            ValType::Strings => Value::Strings(vec!["a".into(), "b".into()]),
            ValType::Binary => Value::Binary(vec![0, 1, 254, 255]),
        }
    }

    #[test]
    fn accessors_match_kind() {
        for kind in ValType::ALL {
            assert_eq!(dispatch(kind).kind, kind);
        }
    }

    #[test]
    fn write_then_read_every_kind() {
        let mut store = MemoryStore::new();
        store.create_key(ScopeHandle::CurrentUser, PATH).expect("create");
        let key = store
            .open_key(ScopeHandle::CurrentUser, PATH, Access::ReadWrite)
            .expect("open");

        for kind in ValType::ALL {
            let accessors = dispatch(kind);
            let value = sample(kind);
            (accessors.write)(&mut store, key, kind.tag(), &value).expect("write");
            let read = (accessors.read)(&store, key, kind.tag()).expect("read");
            assert_eq!(read, value);
        }
    }

    #[test]
    fn writer_rejects_other_shapes_without_touching_store() {
        let mut store = MemoryStore::new();
        store.create_key(ScopeHandle::CurrentUser, PATH).expect("create");
        let key = store
            .open_key(ScopeHandle::CurrentUser, PATH, Access::ReadWrite)
            .expect("open");
        store.clear_ops();

        let result = (dispatch(ValType::DWord).write)(
            &mut store,
            key,
            "ProxyEnable",
            &Value::String("1".into()),
        );

        assert_eq!(
            result,
            Err(StoreError::ShapeMismatch {
                expected: ValType::DWord,
                found: ValType::String
            })
        );
        assert!(
            !store
                .ops()
                .iter()
                .any(|op| matches!(op, StoreOp::Write { .. }))
        );
    }

    #[test]
    fn reader_reports_kind_mismatch() {
        let mut store = MemoryStore::new();
        store
            .insert_value(ScopeHandle::CurrentUser, PATH, "Count", Value::DWord(1))
            .expect("seed");
        let key = store
            .open_key(ScopeHandle::CurrentUser, PATH, Access::Read)
            .expect("open");

        let result = (dispatch(ValType::QWord).read)(&store, key, "Count");
        assert!(matches!(result, Err(StoreError::KindMismatch { .. })));
    }
}
