//! Connection and transaction coordination over pluggable SQL backends.
//!
//! The crate sits between application code and a database driver: a
//! [`Connection`] is created cheaply from a [`backend::Backend`] and
//! [`ConnectionParams`], connects lazily on first use, and from then on
//! coordinates statement expansion, value mapping, and transaction nesting
//! over a single physical connection.
//!
//! Nested transactions are realized as savepoints. Only the outermost level
//! maps to a real database transaction; inner levels create savepoints named
//! by depth, and a transaction marked rollback-only refuses every commit
//! until the outermost level is rolled back.
//!
//! ```no_run
//! use sqlbridge::backend::sqlite::SqliteBackend;
//! use sqlbridge::{params, Connection, ConnectionParams};
//!
//! # async fn demo() -> sqlbridge::Result<()> {
//! let mut conn = Connection::new(SqliteBackend, ConnectionParams::sqlite_memory());
//!
//! conn.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)", &params![])
//!     .await?;
//!
//! conn.run_scoped(|c| {
//!     Box::pin(async move {
//!         c.execute("INSERT INTO users (name) VALUES (?)", &params!["alice"])
//!             .await?;
//!         Ok(())
//!     })
//! })
//! .await?;
//!
//! let name: Option<String> = conn
//!     .query_one("SELECT name FROM users WHERE id = ?", &params![1i64])
//!     .await?
//!     .map(|row| row.get("name"))
//!     .transpose()?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod capabilities;
pub mod config;
pub mod connection;
pub mod convert;
pub mod error;
pub mod params;
pub mod row;
pub mod transaction;
pub mod value;

pub use capabilities::{Capabilities, IsolationLevel, PlaceholderStyle};
pub use config::ConnectionParams;
pub use connection::Connection;
pub use convert::{FromSql, ToSql, TypeRegistry, ValueMapper};
pub use error::{
    ConnectionError, ConstraintKind, ConversionError, Error, QueryError, Result,
    TransactionError,
};
pub use params::{BoundValue, ParameterSet};
pub use row::{Row, Rows};
pub use value::{ParameterKind, SqlValue};
