//! Backend connection port.
//!
//! The coordinator talks to database servers through the [`Backend`] and
//! [`BackendConnection`] traits. A backend knows how to establish a
//! connection and which [`Capabilities`] snapshot matches a given server
//! identity; a connection executes already-translated statements. The real
//! transaction verbs exist only for nesting depth 1 — savepoints travel as
//! ordinary statements.
//!
//! One reference implementation ships with the crate: [`sqlite`], a single
//! `sqlx` SQLite connection. Other backends implement the same contract out
//! of tree.

use std::sync::Arc;

use async_trait::async_trait;

use crate::capabilities::Capabilities;
use crate::config::ConnectionParams;
use crate::error::Result;
use crate::params::BoundValue;
use crate::row::Rows;

pub mod sqlite;

/// A backend that can establish connections.
#[async_trait]
pub trait Backend: Send + Sync {
    type Conn: BackendConnection;

    /// Establish a new physical connection.
    ///
    /// # Errors
    ///
    /// Returns a connection error on failure; never retries.
    async fn connect(&self, params: &ConnectionParams) -> Result<Self::Conn>;

    /// The capability snapshot for the given server identity.
    ///
    /// Pure; capability can depend on the detected server version.
    fn capabilities(&self, server_identity: &str) -> Arc<dyn Capabilities>;

    fn name(&self) -> &'static str;
}

/// A single physical connection.
///
/// All methods take `&mut self`: one command in flight at a time.
#[async_trait]
pub trait BackendConnection: Send {
    /// Execute a statement-shaped command; returns the affected row count.
    async fn execute_raw(&mut self, sql: &str, params: &[BoundValue]) -> Result<u64>;

    /// Execute a query-shaped command; returns the row sequence.
    async fn query_raw(&mut self, sql: &str, params: &[BoundValue]) -> Result<Rows>;

    /// Begin the real (depth 1) transaction.
    async fn begin_real(&mut self) -> Result<()>;

    /// Commit the real (depth 1) transaction.
    async fn commit_real(&mut self) -> Result<()>;

    /// Roll back the real (depth 1) transaction.
    async fn rollback_real(&mut self) -> Result<()>;

    /// Server identity string, used to select the capability snapshot.
    async fn server_identity(&mut self) -> Result<String>;
}
