//! # Document Format
//!
//! JSON (de)serialization of a `Config`.
//!
//! ```text
//! [ { "Path": "Software\\...", "Scope": "CURRENT_USER",
//!     "Properties": [ { "Name": "ProxyEnable", "Type": "DWord",
//!                       "Value": 1, "PrevValue": 0 } ] } ]
//! ```
//!
//! - `Scope` may be absent, empty or unrecognised (see `scope`).
//! - `PrevValue` may be absent or `null`; both decode as "not captured" and
//!   an uncaptured value is omitted on encode.
//! - `Binary` values are base64 strings. Arrays of byte values are accepted on
//!   input.
//! - Every `Value`/`PrevValue` is checked against its `Type` here, so a config
//!   that decodes cleanly never carries a mismatched pair.
//! - Property names are unique within a key, compared without case.

use crate::primitives::{MAX_DOCUMENT_SIZE, MAX_VALUE_NAME_LENGTH};
use crate::scope::Scope;
use crate::storage::normalize_path;
use crate::{Config, HivepatchError, Key, Property, ValType, Value};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct KeyDocument {
    #[serde(rename = "Path")]
    path: String,
    #[serde(rename = "Scope", default, skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
    #[serde(rename = "Properties", default)]
    properties: Vec<PropertyDocument>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PropertyDocument {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "Value")]
    value: Json,
    #[serde(rename = "PrevValue", default, skip_serializing_if = "Option::is_none")]
    prev_value: Option<Json>,
}

// =============================================================================
// DECODE
// =============================================================================

/// Decode a JSON document into a `Config`.
///
/// Fails with `Decode` on malformed JSON, a missing field, an unknown type
/// tag, a value that does not fit its type, or a path or name beyond the
/// registry limits. The size limit is checked before parsing.
pub fn decode(bytes: &[u8]) -> Result<Config, HivepatchError> {
    if bytes.len() > MAX_DOCUMENT_SIZE {
        return Err(HivepatchError::Decode(format!(
            "document size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_DOCUMENT_SIZE
        )));
    }

    let documents: Vec<KeyDocument> =
        serde_json::from_slice(bytes).map_err(|e| HivepatchError::Decode(e.to_string()))?;

    let keys = documents
        .into_iter()
        .enumerate()
        .map(|(index, doc)| decode_key(index, doc))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Config { keys })
}

fn decode_key(index: usize, doc: KeyDocument) -> Result<Key, HivepatchError> {
    normalize_path(&doc.path)
        .map_err(|e| HivepatchError::Decode(format!("key {}: {}", index, e)))?;

    let scope = doc.scope.as_deref().map(Scope::parse).unwrap_or_default();
    let mut key = Key::new(scope, doc.path);

    for prop in doc.properties {
        let property = decode_property(index, prop)?;
        if let Some(earlier) = key.property(&property.name) {
            return Err(HivepatchError::Decode(format!(
                "key {} property {:?}: name already used by {:?} in this key",
                index, property.name, earlier.name
            )));
        }
        key.properties.push(property);
    }

    Ok(key)
}

fn decode_property(index: usize, doc: PropertyDocument) -> Result<Property, HivepatchError> {
    let context = |detail: String| {
        HivepatchError::Decode(format!("key {} property {:?}: {}", index, doc.name, detail))
    };

    if doc.name.chars().count() > MAX_VALUE_NAME_LENGTH {
        return Err(context(format!(
            "name exceeds maximum length {}",
            MAX_VALUE_NAME_LENGTH
        )));
    }

    let kind: ValType = doc.kind.parse().map_err(|e: HivepatchError| context(e.to_string()))?;
    let value = value_from_json(kind, &doc.value).map_err(|e| context(format!("Value {}", e)))?;
    let prev_value = doc
        .prev_value
        .as_ref()
        .map(|json| value_from_json(kind, json))
        .transpose()
        .map_err(|e| context(format!("PrevValue {}", e)))?;

    Ok(Property {
        name: doc.name,
        kind,
        value,
        prev_value,
    })
}

fn value_from_json(kind: ValType, json: &Json) -> Result<Value, String> {
    let found = || format!("does not fit {}: found {}", kind, json);
    match kind {
        ValType::DWord => json
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Value::DWord)
            .ok_or_else(found),
        ValType::QWord => json.as_u64().map(Value::QWord).ok_or_else(found),
        ValType::String => json
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(found),
        ValType::Strings => json
            .as_array()
            .and_then(|items| {
                items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
            })
            .map(Value::Strings)
            .ok_or_else(found),
        ValType::Binary => match json {
            Json::String(text) => STANDARD
                .decode(text)
                .map(Value::Binary)
                .map_err(|e| format!("is not valid base64: {}", e)),
            Json::Array(items) => items
                .iter()
                .map(|item| item.as_u64().and_then(|n| u8::try_from(n).ok()))
                .collect::<Option<Vec<_>>>()
                .map(Value::Binary)
                .ok_or_else(found),
            _ => Err(found()),
        },
    }
}

// =============================================================================
// ENCODE
// =============================================================================

/// Encode a `Config` as a pretty-printed JSON document.
///
/// Key and property order is preserved exactly. Uncaptured previous values
/// and unspecified scopes are omitted.
pub fn encode(config: &Config) -> Result<Vec<u8>, HivepatchError> {
    let documents: Vec<KeyDocument> = config
        .keys
        .iter()
        .map(|key| KeyDocument {
            path: key.path.clone(),
            scope: key.scope.as_document_str().map(str::to_string),
            properties: key
                .properties
                .iter()
                .map(|p| PropertyDocument {
                    name: p.name.clone(),
                    kind: p.kind.tag().to_string(),
                    value: value_to_json(&p.value),
                    prev_value: p.prev_value.as_ref().map(value_to_json),
                })
                .collect(),
        })
        .collect();

    serde_json::to_vec_pretty(&documents).map_err(|e| HivepatchError::Encode(e.to_string()))
}

fn value_to_json(value: &Value) -> Json {
    match value {
        Value::DWord(v) => Json::from(*v),
        Value::QWord(v) => Json::from(*v),
        Value::String(s) => Json::from(s.as_str()),
        Value::Strings(list) => Json::from(list.clone()),
        Value::Binary(bytes) => Json::from(STANDARD.encode(bytes)),
    }
}

// =============================================================================
// TESTS
// =============================================================================
