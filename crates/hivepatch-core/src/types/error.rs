//! # Error Types
//!
//! Every failure aborts the current operation at the point it happens.
//! There are no retries and no compensating writes. Errors raised while
//! touching a property carry its name, declared kind and, for writes, the
//! value that was attempted, so a human can diagnose and roll back by hand.

use super::{ValType, Value};
use crate::scope::ScopeHandle;
use crate::storage::StoreError;
use thiserror::Error;

/// Errors that can occur in hivepatch.
#[derive(Debug, Error)]
pub enum HivepatchError {
    /// The document is malformed, names an unknown type, or a value does not
    /// match its declared type.
    #[error("Decode error: {0}")]
    Decode(String),

    /// A scope name could not be resolved.
    ///
    /// Not raised under the current policy: unknown scopes resolve to
    /// `HKEY_LOCAL_MACHINE`. Kept so a stricter policy has a home.
    #[error("Unknown scope: {0:?}")]
    ScopeResolution(String),

    /// A key could not be opened with the requested access.
    #[error("Cannot open {scope}\\{path}: {source}")]
    Open {
        scope: ScopeHandle,
        path: String,
        #[source]
        source: StoreError,
    },

    /// The live value of a property could not be read.
    #[error("Cannot read {name:?} ({kind}) under {path}: {source}")]
    Read {
        path: String,
        name: String,
        kind: ValType,
        #[source]
        source: StoreError,
    },

    /// The new value of a property could not be written, or its shape does
    /// not match the declared type.
    #[error("Cannot write {name:?} ({kind}) = {attempted} under {path}: {source}")]
    Write {
        path: String,
        name: String,
        kind: ValType,
        attempted: Value,
        #[source]
        source: StoreError,
    },

    /// A type tag outside the supported set.
    #[error("Unsupported value type {tag:?}{}", name.as_ref().map(|n| format!(" for {:?}", n)).unwrap_or_default())]
    UnsupportedType { name: Option<String>, tag: String },

    /// The config could not be serialized.
    #[error("Encode error: {0}")]
    Encode(String),

    /// An output document could not be written.
    #[error("Persist error: {0}")]
    Persist(String),

    /// A store failed outside of a property operation (opening a hive file,
    /// creating a key).
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The settings file is unreadable or invalid.
    #[error("Settings error: {0}")]
    Settings(String),

    /// The operator declined the change.
    #[error("Aborted: {0}")]
    Aborted(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_error_names_property_type_and_value() {
        let err = HivepatchError::Write {
            path: "Software\\Test".into(),
            name: "ProxyEnable".into(),
            kind: ValType::DWord,
            attempted: Value::DWord(1),
            source: StoreError::AccessDenied,
        };
        let msg = err.to_string();
        assert!(msg.contains("ProxyEnable"));
        assert!(msg.contains("DWord"));
        assert!(msg.contains("0x00000001"));
        assert!(msg.contains("access denied"));
    }

    #[test]
    fn unsupported_type_message_with_and_without_name() {
        let named = HivepatchError::UnsupportedType {
            name: Some("Path".into()),
            tag: "ExpandString".into(),
        };
        assert_eq!(
            named.to_string(),
            "Unsupported value type \"ExpandString\" for \"Path\""
        );

        let bare = HivepatchError::UnsupportedType {
            name: None,
            tag: "Link".into(),
        };
        assert_eq!(bare.to_string(), "Unsupported value type \"Link\"");
    }
}
