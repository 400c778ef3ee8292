//! SQLite backend on a single `sqlx` connection.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column, Connection as _, Executor as _, Row as _, Statement as _, TypeInfo, ValueRef};

use crate::capabilities::{Capabilities, SqliteCapabilities};
use crate::config::ConnectionParams;
use crate::error::{ConnectionError, Error, Result};
use crate::params::BoundValue;
use crate::row::Rows;
use crate::value::SqlValue;

use super::{Backend, BackendConnection};

/// Backend for SQLite databases.
#[derive(Debug, Default)]
pub struct SqliteBackend;

pub struct SqliteBackendConn {
    conn: SqliteConnection,
}

#[async_trait]
impl Backend for SqliteBackend {
    type Conn = SqliteBackendConn;

    async fn connect(&self, params: &ConnectionParams) -> Result<Self::Conn> {
        let path = params
            .path
            .as_deref()
            .or(params.database.as_deref())
            .unwrap_or(":memory:");

        let options = if path == ":memory:" {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| Error::Connection(ConnectionError::InvalidUrl(e.to_string())))?
        } else {
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
        };

        let conn = SqliteConnection::connect_with(&options)
            .await
            .map_err(|e| Error::Connection(ConnectionError::Refused(e.to_string())))?;

        Ok(SqliteBackendConn { conn })
    }

    fn capabilities(&self, _server_identity: &str) -> Arc<dyn Capabilities> {
        Arc::new(SqliteCapabilities)
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }
}

#[async_trait]
impl BackendConnection for SqliteBackendConn {
    async fn execute_raw(&mut self, sql: &str, params: &[BoundValue]) -> Result<u64> {
        let query = bind_all(sqlx::query(sql), params);
        let result = query.execute(&mut self.conn).await?;
        Ok(result.rows_affected())
    }

    async fn query_raw(&mut self, sql: &str, params: &[BoundValue]) -> Result<Rows> {
        // Statement metadata carries the column list even when no row comes
        // back.
        let statement = self.conn.prepare(sql).await?;
        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let query = bind_all(sqlx::query(sql), params);
        let rows = query.fetch_all(&mut self.conn).await?;
        let values = rows
            .iter()
            .map(decode_row)
            .collect::<Result<Vec<_>>>()?;

        Ok(Rows::new(columns, values))
    }

    async fn begin_real(&mut self) -> Result<()> {
        sqlx::query("BEGIN").execute(&mut self.conn).await?;
        Ok(())
    }

    async fn commit_real(&mut self) -> Result<()> {
        sqlx::query("COMMIT").execute(&mut self.conn).await?;
        Ok(())
    }

    async fn rollback_real(&mut self) -> Result<()> {
        sqlx::query("ROLLBACK").execute(&mut self.conn).await?;
        Ok(())
    }

    async fn server_identity(&mut self) -> Result<String> {
        let row = sqlx::query("SELECT sqlite_version()")
            .fetch_one(&mut self.conn)
            .await?;
        let version: String = row.try_get(0)?;
        Ok(format!("SQLite {version}"))
    }
}

type SqliteQuery<'q> =
    sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

fn bind_all<'q>(mut query: SqliteQuery<'q>, params: &[BoundValue]) -> SqliteQuery<'q> {
    for param in params {
        query = match &param.value {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(v) => query.bind(*v),
            SqlValue::I32(v) => query.bind(*v),
            SqlValue::I64(v) => query.bind(*v),
            SqlValue::F64(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.clone()),
            SqlValue::Bytes(v) => query.bind(v.clone()),
            SqlValue::Date(v) => query.bind(v.to_string()),
            SqlValue::Time(v) => query.bind(v.to_string()),
            SqlValue::DateTime(v) => query.bind(v.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            SqlValue::Uuid(v) => query.bind(v.to_string()),
            SqlValue::Json(v) => query.bind(v.to_string()),
        };
    }
    query
}

/// Materialize a row into tagged values by the storage class SQLite reports.
fn decode_row(row: &SqliteRow) -> Result<Vec<SqlValue>> {
    let mut values = Vec::with_capacity(row.len());
    for index in 0..row.len() {
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            values.push(SqlValue::Null);
            continue;
        }
        let value = match raw.type_info().name() {
            "INTEGER" | "BOOLEAN" => SqlValue::I64(row.try_get::<i64, _>(index)?),
            "REAL" => SqlValue::F64(row.try_get::<f64, _>(index)?),
            "BLOB" => SqlValue::Bytes(row.try_get::<Vec<u8>, _>(index)?),
            _ => SqlValue::Text(row.try_get::<String, _>(index)?),
        };
        values.push(value);
    }
    Ok(values)
}
