//! Conversion between Rust types and backend-neutral values.
//!
//! [`ToSql`] is total: every supported application type has a tagged-value
//! representation, and absent `Option` values map to the null tag. [`FromSql`]
//! is partial and fails with a [`ConversionError`](crate::error::ConversionError)
//! naming the source tag and target type.
//!
//! Custom mappings live in an explicit [`TypeRegistry`] handed to the
//! connection at construction time, so conversions stay isolated per
//! coordinator instead of hiding in process-wide state.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::value::{ParameterKind, SqlValue};

/// Types that can be converted into a [`SqlValue`].
pub trait ToSql {
    fn to_sql(&self) -> SqlValue;
}

/// Types that can be produced from a [`SqlValue`].
pub trait FromSql: Sized {
    /// Convert from a tagged value.
    ///
    /// # Errors
    ///
    /// Returns a conversion error naming the source tag and target type when
    /// the value cannot represent `Self`.
    fn from_sql(value: SqlValue) -> Result<Self>;
}

impl<T: Into<SqlValue> + Clone> ToSql for T {
    fn to_sql(&self) -> SqlValue {
        self.clone().into()
    }
}

impl FromSql for bool {
    fn from_sql(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Bool(b) => Ok(b),
            SqlValue::I32(i) => Ok(i != 0),
            SqlValue::I64(i) => Ok(i != 0),
            other => Err(Error::conversion(other.tag(), "bool", "not a boolean")),
        }
    }
}

impl FromSql for i32 {
    fn from_sql(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::I32(i) => Ok(i),
            SqlValue::I64(i) => i
                .try_into()
                .map_err(|_| Error::conversion("i64", "i32", "value out of range")),
            SqlValue::Text(s) => s
                .parse()
                .map_err(|_| Error::conversion("text", "i32", format!("invalid integer: {s}"))),
            other => Err(Error::conversion(other.tag(), "i32", "not an integer")),
        }
    }
}

impl FromSql for i64 {
    fn from_sql(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::I32(i) => Ok(Self::from(i)),
            SqlValue::I64(i) => Ok(i),
            SqlValue::Text(s) => s
                .parse()
                .map_err(|_| Error::conversion("text", "i64", format!("invalid integer: {s}"))),
            other => Err(Error::conversion(other.tag(), "i64", "not an integer")),
        }
    }
}

impl FromSql for f64 {
    fn from_sql(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::F64(f) => Ok(f),
            SqlValue::I32(i) => Ok(Self::from(i)),
            SqlValue::I64(i) => Ok(i as Self),
            SqlValue::Text(s) => s
                .parse()
                .map_err(|_| Error::conversion("text", "f64", format!("invalid float: {s}"))),
            other => Err(Error::conversion(other.tag(), "f64", "not a number")),
        }
    }
}

impl FromSql for String {
    fn from_sql(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Text(s) => Ok(s),
            SqlValue::I32(i) => Ok(i.to_string()),
            SqlValue::I64(i) => Ok(i.to_string()),
            SqlValue::F64(f) => Ok(f.to_string()),
            SqlValue::Bool(b) => Ok(b.to_string()),
            SqlValue::Uuid(u) => Ok(u.to_string()),
            SqlValue::Json(j) => Ok(j.to_string()),
            other => Err(Error::conversion(other.tag(), "String", "not text")),
        }
    }
}

impl FromSql for Vec<u8> {
    fn from_sql(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Bytes(b) => Ok(b),
            SqlValue::Text(s) => Ok(s.into_bytes()),
            other => Err(Error::conversion(other.tag(), "Vec<u8>", "not binary data")),
        }
    }
}

impl FromSql for chrono::NaiveDate {
    fn from_sql(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Date(d) => Ok(d),
            SqlValue::DateTime(dt) => Ok(dt.date()),
            SqlValue::Text(s) => s
                .parse()
                .map_err(|_| Error::conversion("text", "NaiveDate", format!("not a date: {s}"))),
            other => Err(Error::conversion(other.tag(), "NaiveDate", "not a date")),
        }
    }
}

impl FromSql for chrono::NaiveTime {
    fn from_sql(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Time(t) => Ok(t),
            SqlValue::Text(s) => s
                .parse()
                .map_err(|_| Error::conversion("text", "NaiveTime", format!("not a time: {s}"))),
            other => Err(Error::conversion(other.tag(), "NaiveTime", "not a time")),
        }
    }
}

impl FromSql for chrono::NaiveDateTime {
    fn from_sql(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::DateTime(dt) => Ok(dt),
            SqlValue::Text(s) => {
                // Accept both the ISO "T" separator and the SQL space form.
                s.parse().or_else(|_| {
                    chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S%.f")
                }).map_err(|_| {
                    Error::conversion("text", "NaiveDateTime", format!("not a timestamp: {s}"))
                })
            }
            other => Err(Error::conversion(
                other.tag(),
                "NaiveDateTime",
                "not a timestamp",
            )),
        }
    }
}

impl FromSql for uuid::Uuid {
    fn from_sql(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Uuid(u) => Ok(u),
            SqlValue::Text(s) => s
                .parse()
                .map_err(|_| Error::conversion("text", "Uuid", format!("not a UUID: {s}"))),
            SqlValue::Bytes(b) => Self::from_slice(&b)
                .map_err(|_| Error::conversion("bytes", "Uuid", "expected 16 bytes")),
            other => Err(Error::conversion(other.tag(), "Uuid", "not a UUID")),
        }
    }
}

impl FromSql for serde_json::Value {
    fn from_sql(value: SqlValue) -> Result<Self> {
        match value {
            SqlValue::Json(j) => Ok(j),
            SqlValue::Text(s) => serde_json::from_str(&s)
                .map_err(|e| Error::conversion("text", "Json", e.to_string())),
            other => Err(Error::conversion(other.tag(), "Json", "not JSON")),
        }
    }
}

/// Null maps to `None`; everything else delegates to the inner conversion.
impl<T: FromSql> FromSql for Option<T> {
    fn from_sql(value: SqlValue) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_sql(value).map(Some)
        }
    }
}

/// A named custom conversion between application values and their database
/// representation.
pub trait ValueMapper: Send + Sync {
    /// Registry key, e.g. `"money"`.
    fn name(&self) -> &'static str;

    /// Binding kind for the database-side representation.
    fn binding_kind(&self) -> ParameterKind {
        ParameterKind::Text
    }

    /// Map an application value to its database representation.
    fn to_database(&self, value: &SqlValue) -> Result<SqlValue>;

    /// Map a database value back to the application representation.
    fn from_database(&self, value: SqlValue) -> Result<SqlValue>;
}

/// Registry of custom value mappers.
///
/// Constructed by the caller and passed into the connection; there is no
/// process-global registry.
#[derive(Default, Clone)]
pub struct TypeRegistry {
    mappers: HashMap<&'static str, Arc<dyn ValueMapper>>,
}

impl TypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mapper under its name.
    ///
    /// # Errors
    ///
    /// Fails with a configuration error if the name is already taken.
    pub fn register(&mut self, mapper: Arc<dyn ValueMapper>) -> Result<()> {
        let name = mapper.name();
        if self.mappers.contains_key(name) {
            return Err(Error::configuration(format!(
                "value mapper already registered: {name}"
            )));
        }
        self.mappers.insert(name, mapper);
        Ok(())
    }

    /// Look up a mapper by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ValueMapper>> {
        self.mappers.get(name)
    }

    /// Apply the named mapper in the application-to-database direction.
    pub fn to_database(&self, name: &str, value: &SqlValue) -> Result<SqlValue> {
        match self.get(name) {
            Some(mapper) => mapper.to_database(value),
            None => Err(Error::configuration(format!("unknown value mapper: {name}"))),
        }
    }

    /// Apply the named mapper in the database-to-application direction.
    pub fn from_database(&self, name: &str, value: SqlValue) -> Result<SqlValue> {
        match self.get(name) {
            Some(mapper) => mapper.from_database(value),
            None => Err(Error::configuration(format!("unknown value mapper: {name}"))),
        }
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("mappers", &self.mappers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_primitives() {
        assert_eq!(i64::from_sql(42i64.to_sql()).unwrap(), 42);
        assert_eq!(bool::from_sql(true.to_sql()).unwrap(), true);
        assert_eq!(String::from_sql("x".to_sql()).unwrap(), "x");
    }

    #[test]
    fn test_widening_and_narrowing() {
        assert_eq!(i64::from_sql(SqlValue::I32(7)).unwrap(), 7);
        assert_eq!(i32::from_sql(SqlValue::I64(7)).unwrap(), 7);
        assert!(i32::from_sql(SqlValue::I64(i64::MAX)).is_err());
    }

    #[test]
    fn test_mismatch_names_source_and_target() {
        let err = i64::from_sql(SqlValue::Bool(true)).unwrap_err();
        assert_eq!(err.to_string(), "cannot convert bool to i64: not an integer");
    }

    #[test]
    fn test_malformed_timestamp_text() {
        let err = chrono::NaiveDateTime::from_sql(SqlValue::Text("yesterday".into())).unwrap_err();
        assert!(err.to_string().contains("NaiveDateTime"));
    }

    #[test]
    fn test_sql_space_separated_timestamp() {
        let dt = chrono::NaiveDateTime::from_sql(SqlValue::Text("2024-05-01 12:30:00".into()))
            .unwrap();
        assert_eq!(dt.to_string(), "2024-05-01 12:30:00");
    }

    #[test]
    fn test_null_to_option_is_absent_not_error() {
        let absent: Option<i64> = Option::from_sql(SqlValue::Null).unwrap();
        assert_eq!(absent, None);
        let present: Option<i64> = Option::from_sql(SqlValue::I64(1)).unwrap();
        assert_eq!(present, Some(1));
    }

    struct Cents;

    impl ValueMapper for Cents {
        fn name(&self) -> &'static str {
            "cents"
        }

        fn binding_kind(&self) -> ParameterKind {
            ParameterKind::Integer
        }

        fn to_database(&self, value: &SqlValue) -> Result<SqlValue> {
            match value {
                SqlValue::F64(dollars) => Ok(SqlValue::I64((dollars * 100.0).round() as i64)),
                other => Err(Error::conversion(other.tag(), "cents", "expected f64")),
            }
        }

        fn from_database(&self, value: SqlValue) -> Result<SqlValue> {
            match value {
                SqlValue::I64(cents) => Ok(SqlValue::F64(cents as f64 / 100.0)),
                other => Err(Error::conversion(other.tag(), "cents", "expected i64")),
            }
        }
    }

    #[test]
    fn test_registry_roundtrip() {
        let mut registry = TypeRegistry::new();
        registry.register(Arc::new(Cents)).unwrap();

        let stored = registry.to_database("cents", &SqlValue::F64(12.5)).unwrap();
        assert_eq!(stored, SqlValue::I64(1250));
        let loaded = registry.from_database("cents", stored).unwrap();
        assert_eq!(loaded, SqlValue::F64(12.5));
    }

    #[test]
    fn test_registry_rejects_duplicates_and_unknowns() {
        let mut registry = TypeRegistry::new();
        registry.register(Arc::new(Cents)).unwrap();
        assert!(registry.register(Arc::new(Cents)).is_err());
        assert!(registry.to_database("missing", &SqlValue::Null).is_err());
    }
}
