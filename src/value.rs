//! Backend-neutral tagged values.
//!
//! [`SqlValue`] is the interchange representation used for parameter binding
//! and row decoding: independent of any backend's native type system, always
//! owned, never aliasing caller memory. [`ParameterKind`] is the binding hint
//! handed to drivers alongside each value.

use serde::{Deserialize, Serialize};

/// A backend-neutral database value.
///
/// The closed set of variants covers the types every supported backend can
/// represent. Extension types (date/time, UUID, JSON) ride on the stack the
/// crate already carries; decimals travel as [`SqlValue::Text`] to preserve
/// precision.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    /// SQL NULL.
    #[default]
    Null,
    Bool(bool),
    /// 32-bit integer.
    I32(i32),
    /// 64-bit integer (BIGINT).
    I64(i64),
    /// Double-precision float.
    F64(f64),
    /// Text (VARCHAR, TEXT, and anything the backend renders as text).
    Text(String),
    /// Binary data, base64-encoded in JSON.
    #[serde(with = "base64_bytes")]
    Bytes(Vec<u8>),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    DateTime(chrono::NaiveDateTime),
    Uuid(uuid::Uuid),
    Json(serde_json::Value),
}

/// Parameter binding hint for driver-level type selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    Null,
    Boolean,
    Integer,
    Float,
    #[default]
    Text,
    Binary,
}

impl SqlValue {
    /// Check if this value is NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The tag name of this variant, used in conversion diagnostics.
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::F64(_) => "f64",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::DateTime(_) => "datetime",
            Self::Uuid(_) => "uuid",
            Self::Json(_) => "json",
        }
    }

    /// The binding kind drivers should use for this value.
    pub const fn kind(&self) -> ParameterKind {
        match self {
            Self::Null => ParameterKind::Null,
            Self::Bool(_) => ParameterKind::Boolean,
            Self::I32(_) | Self::I64(_) => ParameterKind::Integer,
            Self::F64(_) => ParameterKind::Float,
            Self::Bytes(_) => ParameterKind::Binary,
            // Extension types bind as text; the backend parses its own
            // rendering.
            Self::Text(_) | Self::Date(_) | Self::Time(_) | Self::DateTime(_) | Self::Uuid(_)
            | Self::Json(_) => ParameterKind::Text,
        }
    }
}

impl std::fmt::Display for SqlValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::I32(i) => write!(f, "{i}"),
            Self::I64(i) => write!(f, "{i}"),
            Self::F64(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            Self::Date(d) => write!(f, "'{d}'"),
            Self::Time(t) => write!(f, "'{t}'"),
            Self::DateTime(dt) => write!(f, "'{dt}'"),
            Self::Uuid(u) => write!(f, "'{u}'"),
            Self::Json(j) => write!(f, "'{j}'"),
        }
    }
}

/// Binary data serialized as base64 in JSON contexts.
mod base64_bytes {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &Vec<u8>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        STANDARD.encode(bytes).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        Self::I32(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::I64(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::F64(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for SqlValue {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl From<chrono::NaiveDate> for SqlValue {
    fn from(value: chrono::NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl From<chrono::NaiveTime> for SqlValue {
    fn from(value: chrono::NaiveTime) -> Self {
        Self::Time(value)
    }
}

impl From<chrono::NaiveDateTime> for SqlValue {
    fn from(value: chrono::NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl From<uuid::Uuid> for SqlValue {
    fn from(value: uuid::Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl From<serde_json::Value> for SqlValue {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl<T> From<Option<T>> for SqlValue
where
    T: Into<Self>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}
