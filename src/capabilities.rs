//! Backend capability providers.
//!
//! A [`Capabilities`] implementation answers "what SQL text and behavior does
//! this backend use for transaction control" without performing any I/O. The
//! transaction coordinator obtains every piece of backend-specific SQL through
//! this trait; backend differences are data differences, never code-path
//! differences inside the coordinator.

/// Transaction isolation levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// Standard SQL spelling of this level.
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

/// Placeholder rendering style for positional parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `?` for every parameter (SQLite, MySQL).
    Question,
    /// `$1`, `$2`, ... (PostgreSQL).
    Numbered,
}

/// Backend-specific transaction facts and SQL text.
///
/// Implementations are pure functions of backend identity; defaults cover the
/// common SQL spelling and individual backends override what differs.
pub trait Capabilities: Send + Sync {
    /// The backend this snapshot describes.
    fn backend_name(&self) -> &'static str;

    /// Whether nested transactions can be realized as savepoints.
    fn supports_savepoints(&self) -> bool {
        true
    }

    /// Whether a savepoint can be explicitly released.
    ///
    /// When false, a depth>1 commit is a successful no-op; the savepoint
    /// commit is implicit.
    fn supports_release_savepoint(&self) -> bool {
        true
    }

    fn create_savepoint_sql(&self, name: &str) -> String {
        format!("SAVEPOINT {name}")
    }

    fn release_savepoint_sql(&self, name: &str) -> String {
        format!("RELEASE SAVEPOINT {name}")
    }

    fn rollback_to_savepoint_sql(&self, name: &str) -> String {
        format!("ROLLBACK TO SAVEPOINT {name}")
    }

    fn begin_sql(&self) -> &'static str {
        "BEGIN"
    }

    fn commit_sql(&self) -> &'static str {
        "COMMIT"
    }

    fn rollback_sql(&self) -> &'static str {
        "ROLLBACK"
    }

    /// Statement establishing the given isolation level for the current
    /// transaction.
    fn isolation_sql(&self, level: IsolationLevel) -> String {
        format!("SET TRANSACTION ISOLATION LEVEL {}", level.as_sql())
    }

    /// Whether the isolation statement must precede the real begin.
    ///
    /// MySQL's `SET TRANSACTION` applies to the next transaction and is
    /// rejected inside one; PostgreSQL and SQLite accept theirs after the
    /// begin.
    fn isolation_before_begin(&self) -> bool {
        false
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Question
    }
}

/// SQLite capability snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteCapabilities;

impl Capabilities for SqliteCapabilities {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn isolation_sql(&self, level: IsolationLevel) -> String {
        // SQLite has no SET TRANSACTION; serializable is the default and
        // read-uncommitted is a pragma.
        match level {
            IsolationLevel::ReadUncommitted => "PRAGMA read_uncommitted = 1".to_string(),
            _ => "PRAGMA read_uncommitted = 0".to_string(),
        }
    }
}

/// PostgreSQL capability snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresCapabilities;

impl Capabilities for PostgresCapabilities {
    fn backend_name(&self) -> &'static str {
        "postgresql"
    }

    fn placeholder_style(&self) -> PlaceholderStyle {
        PlaceholderStyle::Numbered
    }
}

/// MySQL / MariaDB capability snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct MySqlCapabilities;

impl Capabilities for MySqlCapabilities {
    fn backend_name(&self) -> &'static str {
        "mysql"
    }

    fn isolation_sql(&self, level: IsolationLevel) -> String {
        // Applies to the next transaction only.
        format!("SET TRANSACTION ISOLATION LEVEL {}", level.as_sql())
    }

    fn isolation_before_begin(&self) -> bool {
        true
    }
}
