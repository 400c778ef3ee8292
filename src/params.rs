//! Bound parameters and statement expansion.
//!
//! Application code binds values positionally or by name into a
//! [`ParameterSet`]. Before dispatch, [`expand_statement`] rewrites the SQL in
//! a single left-to-right pass:
//! - `:name` tokens become positional placeholders in first-encountered
//!   order, with the mapping recorded so out-of-order binds resolve
//! - a bound array destined for one placeholder (the `IN (...)` case) expands
//!   into one placeholder per element before any placeholder counting; the
//!   empty array renders `NULL` so the statement stays syntactically valid
//!   and matches no rows
//! - placeholders render in the style the backend's capability snapshot
//!   reports (`?` or `$n`)
//!
//! String literals, quoted identifiers, comments, and `::` casts are never
//! rewritten.

use crate::capabilities::PlaceholderStyle;
use crate::convert::{ToSql, TypeRegistry};
use crate::error::{Error, QueryError, Result};
use crate::value::{ParameterKind, SqlValue};

/// A single translated value ready for driver-level binding.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundValue {
    pub value: SqlValue,
    pub kind: ParameterKind,
}

impl BoundValue {
    pub fn new(value: SqlValue) -> Self {
        let kind = value.kind();
        Self { value, kind }
    }
}

/// A value bound into a parameter set.
#[derive(Debug, Clone)]
enum ParamValue {
    /// One value for one placeholder.
    Scalar(BoundValue),
    /// A sequence destined for a single placeholder.
    Array(Vec<SqlValue>),
    /// A value routed through a named [`TypeRegistry`] mapper.
    Mapped { mapper: String, value: SqlValue },
}

/// Positional and named parameters for one statement.
///
/// Positional order is significant and preserved. Binding the same name twice
/// is an error.
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    positional: Vec<ParamValue>,
    named: Vec<(String, ParamValue)>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// Bind the next positional value.
    pub fn bind(mut self, value: impl ToSql) -> Self {
        self.positional
            .push(ParamValue::Scalar(BoundValue::new(value.to_sql())));
        self
    }

    /// Bind the next positional value with an explicit binding kind.
    pub fn bind_with_kind(mut self, value: impl ToSql, kind: ParameterKind) -> Self {
        self.positional.push(ParamValue::Scalar(BoundValue {
            value: value.to_sql(),
            kind,
        }));
        self
    }

    /// Bind an array to the next positional placeholder.
    pub fn bind_array<T: ToSql>(mut self, values: impl IntoIterator<Item = T>) -> Self {
        self.positional.push(ParamValue::Array(
            values.into_iter().map(|v| v.to_sql()).collect(),
        ));
        self
    }

    /// Bind the next positional value through a registered mapper.
    pub fn bind_mapped(mut self, mapper: impl Into<String>, value: impl ToSql) -> Self {
        self.positional.push(ParamValue::Mapped {
            mapper: mapper.into(),
            value: value.to_sql(),
        });
        self
    }

    /// Bind a value by name.
    ///
    /// # Errors
    ///
    /// Fails with [`QueryError::DuplicateParameter`] if the name is already
    /// bound.
    pub fn bind_named(mut self, name: impl Into<String>, value: impl ToSql) -> Result<Self> {
        let name = name.into();
        self.check_name(&name)?;
        self.named
            .push((name, ParamValue::Scalar(BoundValue::new(value.to_sql()))));
        Ok(self)
    }

    /// Bind an array by name.
    ///
    /// # Errors
    ///
    /// Fails with [`QueryError::DuplicateParameter`] if the name is already
    /// bound.
    pub fn bind_named_array<T: ToSql>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = T>,
    ) -> Result<Self> {
        let name = name.into();
        self.check_name(&name)?;
        self.named.push((
            name,
            ParamValue::Array(values.into_iter().map(|v| v.to_sql()).collect()),
        ));
        Ok(self)
    }

    fn check_name(&self, name: &str) -> Result<()> {
        if self.named.iter().any(|(n, _)| n == name) {
            return Err(Error::Query(QueryError::DuplicateParameter(
                name.to_string(),
            )));
        }
        Ok(())
    }

    fn named_value(&self, name: &str) -> Option<&ParamValue> {
        self.named
            .iter()
            .find_map(|(n, v)| (n == name).then_some(v))
    }
}

/// Build a positional [`ParameterSet`] from a list of values.
///
/// ```
/// use sqlbridge::params;
/// let set = params![1i64, "alice", None::<i64>];
/// assert!(!set.is_empty());
/// ```
#[macro_export]
macro_rules! params {
    () => { $crate::params::ParameterSet::new() };
    ($($value:expr),+ $(,)?) => {{
        let set = $crate::params::ParameterSet::new();
        $(let set = set.bind($value);)+
        set
    }};
}

/// One placeholder site found while scanning the SQL text.
enum Slot {
    Positional,
    Named(String),
}

enum Segment {
    Sql(String),
    Param(Slot),
}

/// Expand a statement against its parameter set.
///
/// Returns the rewritten SQL and the flattened positional value list, in
/// placeholder order.
pub fn expand_statement(
    sql: &str,
    params: &ParameterSet,
    registry: &TypeRegistry,
    style: PlaceholderStyle,
) -> Result<(String, Vec<BoundValue>)> {
    let segments = scan(sql);

    let mut out = String::with_capacity(sql.len());
    let mut values = Vec::new();
    let mut next_positional = 0usize;
    let mut placeholder_index = 0usize;

    let mut write_placeholder = |out: &mut String, index: &mut usize| {
        match style {
            PlaceholderStyle::Question => out.push('?'),
            PlaceholderStyle::Numbered => {
                out.push('$');
                out.push_str(&(*index + 1).to_string());
            }
        }
        *index += 1;
    };

    for segment in segments {
        match segment {
            Segment::Sql(text) => out.push_str(&text),
            Segment::Param(slot) => {
                let param = match &slot {
                    Slot::Positional => {
                        let value = params.positional.get(next_positional).ok_or_else(|| {
                            Error::Query(QueryError::MissingParameter(format!(
                                "position {}",
                                next_positional + 1
                            )))
                        })?;
                        next_positional += 1;
                        value
                    }
                    Slot::Named(name) => params.named_value(name).ok_or_else(|| {
                        Error::Query(QueryError::MissingParameter(name.clone()))
                    })?,
                };

                match param {
                    ParamValue::Scalar(bound) => {
                        write_placeholder(&mut out, &mut placeholder_index);
                        values.push(bound.clone());
                    }
                    ParamValue::Mapped { mapper, value } => {
                        let converted = registry.to_database(mapper, value)?;
                        let kind = registry
                            .get(mapper)
                            .map(|m| m.binding_kind())
                            .unwrap_or_default();
                        write_placeholder(&mut out, &mut placeholder_index);
                        values.push(BoundValue {
                            value: converted,
                            kind,
                        });
                    }
                    ParamValue::Array(items) => {
                        if items.is_empty() {
                            // IN (NULL) is valid SQL and matches no rows.
                            out.push_str("NULL");
                        } else {
                            for (i, item) in items.iter().enumerate() {
                                if i > 0 {
                                    out.push_str(", ");
                                }
                                write_placeholder(&mut out, &mut placeholder_index);
                                values.push(BoundValue::new(item.clone()));
                            }
                        }
                    }
                }
            }
        }
    }

    Ok((out, values))
}

/// Redacted parameter summary for diagnostics: type tags only, never values.
pub fn parameter_summary(values: &[BoundValue]) -> String {
    let tags: Vec<&str> = values.iter().map(|b| b.value.tag()).collect();
    format!("[{}]", tags.join(", "))
}

/// Single left-to-right scan splitting SQL into literal text and placeholder
/// sites. Quote-aware: literals, identifiers, and comments pass through
/// untouched, and `::` casts are not named parameters.
fn scan(sql: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = sql.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' | '`' => {
                // Copy the whole quoted region, honoring doubled-quote
                // escapes.
                current.push(c);
                i += 1;
                while i < chars.len() {
                    current.push(chars[i]);
                    if chars[i] == c {
                        if i + 1 < chars.len() && chars[i + 1] == c {
                            current.push(chars[i + 1]);
                            i += 2;
                            continue;
                        }
                        i += 1;
                        break;
                    }
                    i += 1;
                }
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    current.push(chars[i]);
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                current.push_str("/*");
                i += 2;
                while i < chars.len() {
                    if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                        current.push_str("*/");
                        i += 2;
                        break;
                    }
                    current.push(chars[i]);
                    i += 1;
                }
            }
            '?' => {
                segments.push(Segment::Sql(std::mem::take(&mut current)));
                segments.push(Segment::Param(Slot::Positional));
                i += 1;
            }
            ':' => {
                if chars.get(i + 1) == Some(&':') {
                    // PostgreSQL cast.
                    current.push_str("::");
                    i += 2;
                } else if chars
                    .get(i + 1)
                    .is_some_and(|n| n.is_ascii_alphabetic() || *n == '_')
                {
                    let start = i + 1;
                    let mut end = start;
                    while end < chars.len()
                        && (chars[end].is_ascii_alphanumeric() || chars[end] == '_')
                    {
                        end += 1;
                    }
                    let name: String = chars[start..end].iter().collect();
                    segments.push(Segment::Sql(std::mem::take(&mut current)));
                    segments.push(Segment::Param(Slot::Named(name)));
                    i = end;
                } else {
                    current.push(':');
                    i += 1;
                }
            }
            _ => {
                current.push(c);
                i += 1;
            }
        }
    }

    if !current.is_empty() {
        segments.push(Segment::Sql(current));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(sql: &str, params: ParameterSet) -> (String, Vec<BoundValue>) {
        expand_statement(sql, &params, &TypeRegistry::new(), PlaceholderStyle::Question).unwrap()
    }

    #[test]
    fn test_positional_passthrough() {
        let (sql, values) = expand("SELECT * FROM t WHERE a = ? AND b = ?", params![1i64, "x"]);
        assert_eq!(sql, "SELECT * FROM t WHERE a = ? AND b = ?");
        assert_eq!(values.len(), 2);
        assert_eq!(values[0].value, SqlValue::I64(1));
        assert_eq!(values[1].value, SqlValue::Text("x".to_string()));
    }

    #[test]
    fn test_named_resolution_out_of_order() {
        let params = ParameterSet::new()
            .bind_named("b", "beta")
            .unwrap()
            .bind_named("a", 1i64)
            .unwrap();
        let (sql, values) = expand("SELECT * FROM t WHERE a = :a AND b = :b", params);
        assert_eq!(sql, "SELECT * FROM t WHERE a = ? AND b = ?");
        // First-encountered order wins, not bind order.
        assert_eq!(values[0].value, SqlValue::I64(1));
        assert_eq!(values[1].value, SqlValue::Text("beta".to_string()));
    }

    #[test]
    fn test_named_reuse_binds_same_value_twice() {
        let params = ParameterSet::new().bind_named("id", 7i64).unwrap();
        let (sql, values) = expand("SELECT ? FROM t WHERE x = :id OR y = :id", params.bind(0i64));
        assert_eq!(sql, "SELECT ? FROM t WHERE x = ? OR y = ?");
        assert_eq!(values[1].value, SqlValue::I64(7));
        assert_eq!(values[2].value, SqlValue::I64(7));
    }

    #[test]
    fn test_duplicate_name_is_an_error() {
        let err = ParameterSet::new()
            .bind_named("id", 1i64)
            .unwrap()
            .bind_named("id", 2i64)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Query(QueryError::DuplicateParameter(name)) if name == "id"
        ));
    }

    #[test]
    fn test_missing_named_parameter() {
        let err = expand_statement(
            "SELECT :missing",
            &ParameterSet::new(),
            &TypeRegistry::new(),
            PlaceholderStyle::Question,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::Query(QueryError::MissingParameter(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_array_expansion_in_list() {
        let params = ParameterSet::new().bind_array([1i64, 2, 3]);
        let (sql, values) = expand("SELECT * FROM t WHERE id IN (?)", params);
        assert_eq!(sql, "SELECT * FROM t WHERE id IN (?, ?, ?)");
        assert_eq!(
            values.iter().map(|b| b.value.clone()).collect::<Vec<_>>(),
            vec![SqlValue::I64(1), SqlValue::I64(2), SqlValue::I64(3)]
        );
    }

    #[test]
    fn test_empty_array_stays_valid_and_matches_nothing() {
        let params = ParameterSet::new().bind_array(Vec::<i64>::new());
        let (sql, values) = expand("SELECT * FROM t WHERE id IN (?)", params);
        assert_eq!(sql, "SELECT * FROM t WHERE id IN (NULL)");
        assert!(values.is_empty());
    }

    #[test]
    fn test_array_expansion_before_placeholder_counting() {
        let params = ParameterSet::new().bind_array([10i64, 20]).bind("tail");
        let (sql, values) = expand("SELECT * FROM t WHERE id IN (?) AND name = ?", params);
        assert_eq!(sql, "SELECT * FROM t WHERE id IN (?, ?) AND name = ?");
        assert_eq!(values[2].value, SqlValue::Text("tail".to_string()));
    }

    #[test]
    fn test_numbered_style_renders_dollar_placeholders() {
        let params = ParameterSet::new().bind_array([1i64, 2]).bind("x");
        let (sql, _) = expand_statement(
            "SELECT * FROM t WHERE id IN (?) AND name = ?",
            &params,
            &TypeRegistry::new(),
            PlaceholderStyle::Numbered,
        )
        .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE id IN ($1, $2) AND name = $3");
    }

    #[test]
    fn test_literals_casts_and_comments_untouched() {
        let params = ParameterSet::new().bind_named("id", 1i64).unwrap();
        let (sql, values) = expand(
            "SELECT ':fake', x::int -- :also_fake\nFROM t WHERE id = :id",
            params,
        );
        assert_eq!(
            sql,
            "SELECT ':fake', x::int -- :also_fake\nFROM t WHERE id = ?"
        );
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn test_doubled_quote_escape_inside_literal() {
        let (sql, values) = expand("SELECT 'it''s :not a param', ?", params![1i64]);
        assert_eq!(sql, "SELECT 'it''s :not a param', ?");
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn test_parameter_summary_is_redacted() {
        let values = vec![
            BoundValue::new(SqlValue::I64(42)),
            BoundValue::new(SqlValue::Text("secret".to_string())),
            BoundValue::new(SqlValue::Null),
        ];
        assert_eq!(parameter_summary(&values), "[i64, text, null]");
    }
}
