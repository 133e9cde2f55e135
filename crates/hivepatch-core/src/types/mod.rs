//! # Core Type Definitions
//!
//! The configuration model edited by hivepatch:
//! - Value kinds (`ValType`) and the tagged value union (`Value`)
//! - One named value with its captured prior state (`Property`)
//! - A scope + path node holding ordered properties (`Key`)
//! - The ordered batch of keys (`Config`)
//! - Error types (`HivepatchError`)
//!
//! ## Ownership
//!
//! Ownership is strictly tree shaped: a `Config` owns its `Key`s, a `Key`
//! owns its `Property`s. There are no back references. The apply engine only
//! ever mutates `Property::prev_value`.

mod error;

pub use error::HivepatchError;

use crate::scope::{Scope, ScopeHandle};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// VALUE TYPE
// =============================================================================

/// The closed set of value kinds hivepatch can read and write.
///
/// The document tag of each variant is its name (`"DWord"`, `"QWord"`,
/// `"String"`, `"Strings"`, `"Binary"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ValType {
    /// 32-bit unsigned integer (`REG_DWORD`).
    DWord,
    /// 64-bit unsigned integer (`REG_QWORD`).
    QWord,
    /// UTF-8 text (`REG_SZ`).
    String,
    /// Ordered list of UTF-8 text (`REG_MULTI_SZ`).
    Strings,
    /// Raw bytes (`REG_BINARY`).
    Binary,
}

impl ValType {
    /// Every supported kind, in declaration order.
    pub const ALL: [ValType; 5] = [
        ValType::DWord,
        ValType::QWord,
        ValType::String,
        ValType::Strings,
        ValType::Binary,
    ];

    /// The document tag for this kind.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            ValType::DWord => "DWord",
            ValType::QWord => "QWord",
            ValType::String => "String",
            ValType::Strings => "Strings",
            ValType::Binary => "Binary",
        }
    }

    /// Parse a document tag.
    ///
    /// Tags are matched exactly. Anything else, including registry kinds this
    /// tool does not edit such as `ExpandString`, is `UnsupportedType`.
    pub fn from_tag(tag: &str) -> Result<Self, HivepatchError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.tag() == tag)
            .ok_or_else(|| HivepatchError::UnsupportedType {
                name: None,
                tag: tag.to_string(),
            })
    }
}

impl fmt::Display for ValType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ValType {
    type Err = HivepatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s)
    }
}

// =============================================================================
// VALUE
// =============================================================================

/// A value of one of the five supported kinds.
///
/// The variant *is* the type: a `Value` can never disagree with itself about
/// what it holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    DWord(u32),
    QWord(u64),
    String(String),
    Strings(Vec<String>),
    Binary(Vec<u8>),
}

impl Value {
    /// The kind of this value.
    #[must_use]
    pub const fn kind(&self) -> ValType {
        match self {
            Value::DWord(_) => ValType::DWord,
            Value::QWord(_) => ValType::QWord,
            Value::String(_) => ValType::String,
            Value::Strings(_) => ValType::Strings,
            Value::Binary(_) => ValType::Binary,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::DWord(v) => write!(f, "{} (0x{:08x})", v, v),
            Value::QWord(v) => write!(f, "{} (0x{:016x})", v, v),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Strings(list) => write!(f, "{:?}", list),
            Value::Binary(bytes) => write!(f, "base64:{}", STANDARD.encode(bytes)),
        }
    }
}

// =============================================================================
// PROPERTY
// =============================================================================

/// One named, typed value under a key.
///
/// `value` is the desired new value. `prev_value` is empty until the apply
/// engine reads the live value, and from then on holds what the store
/// contained immediately before the write was attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Value name, unique within its key. Empty names the key's default value.
    pub name: String,
    /// Declared kind.
    pub kind: ValType,
    /// Desired value.
    pub value: Value,
    /// Value observed before the write.
    pub prev_value: Option<Value>,
}

impl Property {
    /// Create a property whose kind is taken from the value.
    #[must_use]
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            kind: value.kind(),
            value,
            prev_value: None,
        }
    }

    /// Create a property from a document-style type tag.
    ///
    /// Fails with `UnsupportedType` for an unknown tag and with `Decode` when
    /// the value does not have the declared shape.
    pub fn from_tag(
        name: impl Into<String>,
        tag: &str,
        value: Value,
    ) -> Result<Self, HivepatchError> {
        let name = name.into();
        let kind = ValType::from_tag(tag).map_err(|_| HivepatchError::UnsupportedType {
            name: Some(name.clone()),
            tag: tag.to_string(),
        })?;
        if value.kind() != kind {
            return Err(HivepatchError::Decode(format!(
                "property '{}' is declared {} but holds a {} value",
                name,
                kind,
                value.kind()
            )));
        }
        Ok(Self {
            name,
            kind,
            value,
            prev_value: None,
        })
    }

    /// Attach a previously captured value.
    #[must_use]
    pub fn with_prev(mut self, prev: Value) -> Self {
        self.prev_value = Some(prev);
        self
    }

    /// Whether the desired value matches the declared kind.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.value.kind() == self.kind
            && self
                .prev_value
                .as_ref()
                .is_none_or(|prev| prev.kind() == self.kind)
    }
}

// =============================================================================
// KEY
// =============================================================================

/// A node in the store: a scope, a path under it, and the properties to edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    /// Symbolic scope as written in the document.
    pub scope: Scope,
    /// Path under the scope, `/` or `\` delimited.
    pub path: String,
    /// Properties in application order.
    pub properties: Vec<Property>,
}

impl Key {
    /// Create a key with no properties.
    #[must_use]
    pub fn new(scope: Scope, path: impl Into<String>) -> Self {
        Self {
            scope,
            path: path.into(),
            properties: Vec::new(),
        }
    }

    /// Builder-style property append.
    #[must_use]
    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    /// The root handle this key opens under.
    #[must_use]
    pub fn handle(&self) -> ScopeHandle {
        self.scope.handle()
    }

    /// Find a property by name (case-insensitive, like the registry).
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|p| p.name.to_lowercase() == name.to_lowercase())
    }
}

// =============================================================================
// CONFIG
// =============================================================================

/// An ordered batch of keys: the unit of (de)serialization and of apply.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Config {
    /// Keys in application order. Duplicates are processed independently.
    pub keys: Vec<Key>,
}

impl Config {
    /// Create an empty config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config from keys.
    #[must_use]
    pub fn from_keys(keys: Vec<Key>) -> Self {
        Self { keys }
    }

    /// Number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the config has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Total number of properties across all keys.
    #[must_use]
    pub fn property_count(&self) -> usize {
        self.keys.iter().map(|k| k.properties.len()).sum()
    }

    /// Number of properties whose previous value has been captured.
    #[must_use]
    pub fn captured_count(&self) -> usize {
        self.keys
            .iter()
            .flat_map(|k| &k.properties)
            .filter(|p| p.prev_value.is_some())
            .count()
    }

    /// Keys whose scope silently resolves to the local-machine default.
    pub fn fallback_keys(&self) -> impl Iterator<Item = (usize, &Key)> {
        self.keys
            .iter()
            .enumerate()
            .filter(|(_, key)| key.scope.is_fallback())
    }

    /// Build the inverse document of an applied config.
    ///
    /// Every captured `prev_value` becomes the new `value`. Keys and properties
    /// are emitted in reverse order so that, when a name was written more than
    /// once, the earliest captured value is restored last. Properties without a
    /// captured value are skipped, and keys left empty are dropped.
    ///
    /// This only builds data. Nothing applies it automatically.
    #[must_use]
    pub fn rollback_plan(&self) -> Config {
        let keys = self
            .keys
            .iter()
            .rev()
            .filter_map(|key| {
                let properties: Vec<Property> = key
                    .properties
                    .iter()
                    .rev()
                    .filter_map(|p| {
                        p.prev_value
                            .clone()
                            .map(|prev| Property::new(p.name.clone(), prev))
                    })
                    .collect();
                (!properties.is_empty()).then(|| Key {
                    scope: key.scope.clone(),
                    path: key.path.clone(),
                    properties,
                })
            })
            .collect();
        Config { keys }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_match_document_literals() {
        let tags: Vec<_> = ValType::ALL.iter().map(|k| k.tag()).collect();
        assert_eq!(tags, vec!["DWord", "QWord", "String", "Strings", "Binary"]);
    }

    #[test]
    fn from_tag_accepts_every_kind() {
        for kind in ValType::ALL {
            assert_eq!(ValType::from_tag(kind.tag()).expect("known tag"), kind);
        }
    }

    #[test]
    fn from_tag_is_case_sensitive() {
        assert!(matches!(
            ValType::from_tag("dword"),
            Err(HivepatchError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn property_from_unknown_tag_is_unsupported() {
        let result = Property::from_tag("Path", "ExpandString", Value::String("%TEMP%".into()));
        match result {
            Err(HivepatchError::UnsupportedType { name, tag }) => {
                assert_eq!(name.as_deref(), Some("Path"));
                assert_eq!(tag, "ExpandString");
            }
            other => unreachable!("expected UnsupportedType, got {:?}", other),
        }
    }

    #[test]
    fn property_from_tag_rejects_shape_mismatch() {
        let result = Property::from_tag("ProxyEnable", "DWord", Value::String("1".into()));
        assert!(matches!(result, Err(HivepatchError::Decode(_))));
    }

    #[test]
    fn property_new_takes_kind_from_value() {
        let p = Property::new("Items", Value::Strings(vec!["a".into()]));
        assert_eq!(p.kind, ValType::Strings);
        assert!(p.prev_value.is_none());
        assert!(p.is_well_formed());
    }

    #[test]
    fn mismatched_property_is_not_well_formed() {
        let mut p = Property::new("ProxyEnable", Value::DWord(1));
        p.kind = ValType::QWord;
        assert!(!p.is_well_formed());
    }

    #[test]
    fn value_display_includes_hex_for_integers() {
        assert_eq!(Value::DWord(255).to_string(), "255 (0x000000ff)");
        assert_eq!(Value::Binary(vec![1, 2, 3]).to_string(), "base64:AQID");
    }

    #[test]
    fn key_property_lookup_ignores_case() {
        let key = Key::new(Scope::CurrentUser, "Software\\Test")
            .with_property(Property::new("ProxyEnable", Value::DWord(1)));
        assert!(key.property("proxyenable").is_some());
        assert!(key.property("Missing").is_none());
    }

    #[test]
    fn rollback_plan_reverses_and_skips_uncaptured() {
        let config = Config::from_keys(vec![
            Key::new(Scope::CurrentUser, "A")
                .with_property(Property::new("x", Value::DWord(1)).with_prev(Value::DWord(0)))
                .with_property(Property::new("y", Value::DWord(2))),
            Key::new(Scope::LocalMachine, "B").with_property(
                Property::new("z", Value::String("new".into()))
                    .with_prev(Value::String("old".into())),
            ),
        ]);

        let plan = config.rollback_plan();

        assert_eq!(plan.len(), 2);
        assert_eq!(plan.keys[0].path, "B");
        assert_eq!(plan.keys[0].properties[0].value, Value::String("old".into()));
        assert_eq!(plan.keys[1].path, "A");
        assert_eq!(plan.keys[1].properties.len(), 1);
        assert_eq!(plan.keys[1].properties[0].name, "x");
        assert_eq!(plan.keys[1].properties[0].value, Value::DWord(0));
        assert_eq!(plan.captured_count(), 0);
    }

    #[test]
    fn rollback_plan_drops_keys_without_captures() {
        let config = Config::from_keys(vec![
            Key::new(Scope::Users, "A").with_property(Property::new("x", Value::QWord(9))),
        ]);
        assert!(config.rollback_plan().is_empty());
    }

    #[test]
    fn fallback_keys_lists_unspecified_and_unrecognized() {
        let config = Config::from_keys(vec![
            Key::new(Scope::Unspecified, "A"),
            Key::new(Scope::CurrentUser, "B"),
            Key::new(Scope::Unrecognized("HKLM".into()), "C"),
        ]);
        let indices: Vec<_> = config.fallback_keys().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![0, 2]);
    }
}
