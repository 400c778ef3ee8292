//! Error types for sqlbridge.
//!
//! All failures surface as typed results built with `thiserror`. The taxonomy
//! mirrors the layers of the crate:
//! - [`ConnectionError`]: establishing or keeping the backend connection
//! - [`TransactionError`]: precondition violations detected before any command
//!   is sent to the backend
//! - [`QueryError`]: backend execution failures, carrying the SQL text and a
//!   redacted parameter summary for diagnostics
//! - [`ConversionError`]: value could not be mapped between a Rust type and
//!   its backend-neutral representation
//!
//! The crate never retries backend errors internally; retry policy belongs to
//! the caller.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("query error: {0}")]
    Query(#[from] QueryError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("configuration error: {0}")]
    Configuration(String),

    /// A `run_scoped` body failed and the subsequent rollback also failed.
    /// Both errors are preserved so the rollback failure cannot mask the
    /// original cause.
    #[error("scoped transaction failed: {cause}; rollback also failed: {rollback}")]
    ScopedRollback {
        cause: Box<Error>,
        rollback: Box<Error>,
    },
}

/// Connection-level errors.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// The server refused the connection attempt.
    #[error("connection refused: {0}")]
    Refused(String),

    /// The connection was lost mid-operation.
    #[error("connection lost: {0}")]
    Lost(String),

    /// Authentication was rejected by the server.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Operation attempted on a closed coordinator.
    #[error("connection is closed")]
    Closed,

    /// Connection URL could not be parsed.
    #[error("invalid connection URL: {0}")]
    InvalidUrl(String),
}

/// Transaction precondition violations.
///
/// Every variant is detected before any command reaches the backend.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransactionError {
    /// Commit or rollback was requested at nesting depth 0.
    #[error("no active transaction")]
    NoActiveTransaction,

    /// Commit was requested while the transaction is marked rollback-only.
    #[error("transaction is marked rollback-only")]
    RollbackOnly,

    /// A nested begin was requested on a backend without savepoint support.
    #[error("savepoints are not supported by this backend")]
    SavepointsNotSupported,
}

/// Classification of a constraint violation reported by the backend.
///
/// Lets callers branch on the violation kind without matching error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    ForeignKey,
    NotNull,
    Check,
    Other,
}

impl std::fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unique => write!(f, "unique"),
            Self::ForeignKey => write!(f, "foreign key"),
            Self::NotNull => write!(f, "not null"),
            Self::Check => write!(f, "check"),
            Self::Other => write!(f, "constraint"),
        }
    }
}

/// Query execution errors.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The backend reported an execution failure.
    #[error("execution failed: {message}")]
    Execution {
        message: String,
        /// Five-character SQLSTATE code when the backend provides one.
        sqlstate: Option<String>,
        /// The SQL text as sent to the backend. Empty until attached by the
        /// coordinator.
        sql: String,
        /// Redacted parameter summary (type tags only, never values).
        params: String,
    },

    /// The backend signalled a uniqueness/foreign-key/not-null/check
    /// violation.
    #[error("{kind} constraint violation: {message}")]
    ConstraintViolation {
        kind: ConstraintKind,
        /// Constraint name when the backend reports one.
        constraint: Option<String>,
        message: String,
        sql: String,
        params: String,
    },

    /// A placeholder had no bound value.
    #[error("missing parameter: {0}")]
    MissingParameter(String),

    /// The same name was bound twice.
    #[error("duplicate parameter: {0}")]
    DuplicateParameter(String),
}

/// A value could not be mapped between representations.
///
/// Always names the source tag and the target type so mismatches are
/// diagnosable without reproducing the data.
#[derive(Error, Debug)]
#[error("cannot convert {from_tag} to {target}: {message}")]
pub struct ConversionError {
    /// Tag of the source value (e.g. `"text"`, `"i64"`).
    pub from_tag: &'static str,
    /// Name of the target type or tag.
    pub target: &'static str,
    pub message: String,
}

impl Error {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a conversion error.
    pub fn conversion(
        from_tag: &'static str,
        target: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::Conversion(ConversionError {
            from_tag,
            target,
            message: message.into(),
        })
    }

    /// Check if this error is a constraint violation.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::Query(QueryError::ConstraintViolation { .. }))
    }

    /// The constraint kind, when this is a constraint violation.
    pub fn constraint_kind(&self) -> Option<ConstraintKind> {
        match self {
            Self::Query(QueryError::ConstraintViolation { kind, .. }) => Some(*kind),
            _ => None,
        }
    }

    /// Attach statement context to a query error.
    ///
    /// Backend ports produce query errors without knowing the logical SQL
    /// text; the coordinator fills it in before propagating.
    pub(crate) fn with_statement(mut self, sql_text: &str, param_summary: &str) -> Self {
        if let Self::Query(
            QueryError::Execution { sql, params, .. }
            | QueryError::ConstraintViolation { sql, params, .. },
        ) = &mut self
        {
            if sql.is_empty() {
                *sql = sql_text.to_string();
            }
            if params.is_empty() {
                *params = param_summary.to_string();
            }
        }
        self
    }
}

/// Convert sqlx errors into the crate taxonomy.
///
/// This is the only place driver errors are classified; constraint kinds come
/// from `sqlx::error::ErrorKind`, not from matching message text.
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;

        match err {
            sqlx::Error::Configuration(msg) => {
                Error::Connection(ConnectionError::InvalidUrl(msg.to_string()))
            }
            sqlx::Error::Database(db_err) => {
                let kind = match db_err.kind() {
                    ErrorKind::UniqueViolation => Some(ConstraintKind::Unique),
                    ErrorKind::ForeignKeyViolation => Some(ConstraintKind::ForeignKey),
                    ErrorKind::NotNullViolation => Some(ConstraintKind::NotNull),
                    ErrorKind::CheckViolation => Some(ConstraintKind::Check),
                    _ => None,
                };
                match kind {
                    Some(kind) => Error::Query(QueryError::ConstraintViolation {
                        kind,
                        constraint: db_err.constraint().map(str::to_string),
                        message: db_err.message().to_string(),
                        sql: String::new(),
                        params: String::new(),
                    }),
                    None => Error::Query(QueryError::Execution {
                        message: db_err.message().to_string(),
                        sqlstate: db_err.code().map(|c| c.to_string()),
                        sql: String::new(),
                        params: String::new(),
                    }),
                }
            }
            sqlx::Error::Io(io_err) => Error::Connection(ConnectionError::Lost(io_err.to_string())),
            sqlx::Error::Tls(tls_err) => {
                Error::Connection(ConnectionError::Refused(format!("TLS error: {tls_err}")))
            }
            sqlx::Error::Protocol(msg) => {
                Error::Connection(ConnectionError::Lost(format!("protocol error: {msg}")))
            }
            sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
                Error::Connection(ConnectionError::Closed)
            }
            sqlx::Error::ColumnNotFound(col) => Error::Query(QueryError::Execution {
                message: format!("column not found: {col}"),
                sqlstate: None,
                sql: String::new(),
                params: String::new(),
            }),
            sqlx::Error::ColumnDecode { index, source } => Error::Conversion(ConversionError {
                from_tag: "column",
                target: "value",
                message: format!("failed to decode column {index}: {source}"),
            }),
            sqlx::Error::Decode(source) => Error::Conversion(ConversionError {
                from_tag: "column",
                target: "value",
                message: source.to_string(),
            }),
            other => Error::Query(QueryError::Execution {
                message: other.to_string(),
                sqlstate: None,
                sql: String::new(),
                params: String::new(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Transaction(TransactionError::NoActiveTransaction);
        assert_eq!(err.to_string(), "transaction error: no active transaction");

        let err = Error::conversion("text", "i64", "not a number");
        assert_eq!(err.to_string(), "cannot convert text to i64: not a number");
    }

    #[test]
    fn test_constraint_classification() {
        let err = Error::Query(QueryError::ConstraintViolation {
            kind: ConstraintKind::Unique,
            constraint: Some("users_email_key".to_string()),
            message: "duplicate key".to_string(),
            sql: String::new(),
            params: String::new(),
        });
        assert!(err.is_constraint_violation());
        assert_eq!(err.constraint_kind(), Some(ConstraintKind::Unique));
    }

    #[test]
    fn test_with_statement_fills_context() {
        let err = Error::Query(QueryError::Execution {
            message: "boom".to_string(),
            sqlstate: None,
            sql: String::new(),
            params: String::new(),
        });
        let err = err.with_statement("SELECT 1", "[i64]");
        match err {
            Error::Query(QueryError::Execution { sql, params, .. }) => {
                assert_eq!(sql, "SELECT 1");
                assert_eq!(params, "[i64]");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_with_statement_ignores_non_query_errors() {
        let err = Error::Transaction(TransactionError::RollbackOnly);
        let err = err.with_statement("COMMIT", "[]");
        assert!(matches!(
            err,
            Error::Transaction(TransactionError::RollbackOnly)
        ));
    }

    #[test]
    fn test_scoped_rollback_preserves_both_errors() {
        let err = Error::ScopedRollback {
            cause: Box::new(Error::configuration("bad body")),
            rollback: Box::new(Error::Connection(ConnectionError::Closed)),
        };
        let text = err.to_string();
        assert!(text.contains("bad body"));
        assert!(text.contains("closed"));
    }
}
