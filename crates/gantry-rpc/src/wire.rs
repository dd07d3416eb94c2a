//! The transmissible structured value.
//!
//! [`WireValue`] mirrors the generic structured value of the RPC layer: null,
//! booleans, doubles, strings, lists, and string-keyed maps. It deliberately
//! knows nothing about secrets, unknowns, or resources; those are recovered
//! by the decoder from sentinel strings and signature keys.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A string-keyed map of wire values, iterated in sorted key order.
pub type WireStruct = BTreeMap<String, WireValue>;

/// A structured value as it crosses the process boundary.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireValue {
    /// JSON `null`.
    #[default]
    Null,
    /// A boolean.
    Bool(bool),
    /// A double-precision number.
    Number(f64),
    /// A string, possibly an unknown sentinel.
    String(String),
    /// An ordered list.
    List(Vec<WireValue>),
    /// A map, possibly carrying a signature key.
    Struct(WireStruct),
}

impl WireValue {
    /// Names the wire kind for error messages.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Struct(_) => "struct",
        }
    }

    /// Returns the string, if this is one.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Returns the map, if this is one.
    #[must_use]
    pub const fn as_struct(&self) -> Option<&WireStruct> {
        match self {
            Self::Struct(fields) => Some(fields),
            _ => None,
        }
    }
}

impl From<&str> for WireValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for WireValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<WireStruct> for WireValue {
    fn from(fields: WireStruct) -> Self {
        Self::Struct(fields)
    }
}

impl From<WireValue> for serde_json::Value {
    fn from(value: WireValue) -> Self {
        match value {
            WireValue::Null => Self::Null,
            WireValue::Bool(flag) => Self::Bool(flag),
            WireValue::Number(number) => {
                serde_json::Number::from_f64(number).map_or(Self::Null, Self::Number)
            }
            WireValue::String(text) => Self::String(text),
            WireValue::List(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            WireValue::Struct(fields) => Self::Object(
                fields
                    .into_iter()
                    .map(|(key, field)| (key, Self::from(field)))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for WireValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(flag) => Self::Bool(flag),
            serde_json::Value::Number(number) => number.as_f64().map_or(Self::Null, Self::Number),
            serde_json::Value::String(text) => Self::String(text),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(fields) => Self::Struct(
                fields
                    .into_iter()
                    .map(|(key, field)| (key, Self::from(field)))
                    .collect(),
            ),
        }
    }
}
