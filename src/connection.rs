//! Connection coordinator.
//!
//! [`Connection`] owns at most one physical backend connection, established
//! lazily on first use, and mediates every statement and transaction verb
//! through it. Transaction nesting, rollback-only semantics, statement
//! expansion, and value mapping all live here; the backend only ever sees
//! fully translated commands.
//!
//! All operations take `&mut self`: one operation in flight per coordinator,
//! which is why no internal locking exists.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use tracing::{debug, info, warn};

use crate::backend::{Backend, BackendConnection};
use crate::capabilities::{Capabilities, IsolationLevel};
use crate::config::ConnectionParams;
use crate::convert::TypeRegistry;
use crate::error::{ConnectionError, Error, Result, TransactionError};
use crate::params::{expand_statement, parameter_summary, ParameterSet};
use crate::row::{Row, Rows};
use crate::transaction::{TransactionState, TxCommand, TxPlan};

struct Live<C> {
    conn: C,
    caps: Arc<dyn Capabilities>,
    server_identity: String,
}

/// Stateful coordinator between application code and one backend connection.
pub struct Connection<B: Backend> {
    backend: B,
    params: ConnectionParams,
    auto_commit: bool,
    isolation: Option<IsolationLevel>,
    registry: TypeRegistry,
    live: Option<Live<B::Conn>>,
    tx: TransactionState,
}

impl<B: Backend> Connection<B> {
    /// Create a coordinator. No connection is established until first use.
    pub fn new(backend: B, params: ConnectionParams) -> Self {
        Self {
            backend,
            params,
            auto_commit: true,
            isolation: None,
            registry: TypeRegistry::new(),
            live: None,
            tx: TransactionState::new(),
        }
    }

    /// Disable or enable auto-commit.
    ///
    /// With auto-commit off the coordinator opens a transaction as soon as
    /// the connection is established and reopens one after every outermost
    /// commit or rollback. Must be chosen before the first command.
    pub fn with_auto_commit(mut self, auto_commit: bool) -> Self {
        self.auto_commit = auto_commit;
        self
    }

    /// Request an isolation level, re-established for every outermost
    /// transaction.
    pub fn with_isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = Some(level);
        self
    }

    /// Seed the value-mapper registry.
    pub fn with_registry(mut self, registry: TypeRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn type_registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn type_registry_mut(&mut self) -> &mut TypeRegistry {
        &mut self.registry
    }

    pub fn is_connected(&self) -> bool {
        self.live.is_some()
    }

    pub fn transaction_nesting_level(&self) -> u32 {
        self.tx.depth()
    }

    pub fn is_transaction_active(&self) -> bool {
        self.tx.is_active()
    }

    pub fn is_rollback_only(&self) -> bool {
        self.tx.is_rollback_only()
    }

    /// Mark the current transaction as doomed: every later commit attempt
    /// fails until the outermost level is rolled back.
    pub fn set_rollback_only(&mut self) -> Result<()> {
        self.tx.set_rollback_only()?;
        debug!(depth = self.tx.depth(), "transaction marked rollback-only");
        Ok(())
    }

    /// The backend's server identity, connecting first if necessary.
    pub async fn server_identity(&mut self) -> Result<&str> {
        self.ensure_connected().await?;
        let live = self.live_mut()?;
        Ok(live.server_identity.as_str())
    }

    /// Expand and execute a statement; returns the affected row count.
    pub async fn execute(&mut self, sql: &str, params: &ParameterSet) -> Result<u64> {
        self.ensure_connected().await?;
        let style = self.caps()?.placeholder_style();
        let (expanded, values) = expand_statement(sql, params, &self.registry, style)?;
        let summary = parameter_summary(&values);
        debug!(sql = %expanded, params = %summary, "execute");
        let live = self.live_mut()?;
        live.conn
            .execute_raw(&expanded, &values)
            .await
            .map_err(|e| e.with_statement(&expanded, &summary))
    }

    /// Expand and execute a query; returns the result rows.
    pub async fn query(&mut self, sql: &str, params: &ParameterSet) -> Result<Rows> {
        self.ensure_connected().await?;
        let style = self.caps()?.placeholder_style();
        let (expanded, values) = expand_statement(sql, params, &self.registry, style)?;
        let summary = parameter_summary(&values);
        debug!(sql = %expanded, params = %summary, "query");
        let live = self.live_mut()?;
        live.conn
            .query_raw(&expanded, &values)
            .await
            .map_err(|e| e.with_statement(&expanded, &summary))
    }

    /// Execute a query expected to yield at most one row.
    pub async fn query_one(&mut self, sql: &str, params: &ParameterSet) -> Result<Option<Row>> {
        let mut rows = self.query(sql, params).await?;
        Ok(rows.next())
    }

    /// Open a transaction, or a savepoint when one is already open.
    pub async fn begin(&mut self) -> Result<()> {
        self.ensure_connected().await?;
        self.begin_internal().await
    }

    async fn begin_internal(&mut self) -> Result<()> {
        let caps = self.caps()?;
        let plan = self.tx.plan_begin(caps.as_ref())?;

        // The isolation level is re-established for every outermost
        // transaction, before or after the real begin as the backend
        // requires.
        let isolation = match (&plan.command, self.isolation) {
            (TxCommand::BeginReal, Some(level)) => Some(caps.isolation_sql(level)),
            _ => None,
        };
        if let Some(sql) = &isolation {
            if caps.isolation_before_begin() {
                self.live_mut()?.conn.execute_raw(sql, &[]).await?;
            }
        }
        self.issue(&plan).await?;
        self.tx.apply(&plan);
        if let Some(sql) = &isolation {
            if !caps.isolation_before_begin() {
                self.live_mut()?.conn.execute_raw(sql, &[]).await?;
            }
        }
        debug!(depth = self.tx.depth(), "transaction begun");
        Ok(())
    }

    /// Commit the innermost transaction level.
    ///
    /// # Errors
    ///
    /// Fails without issuing any backend command when no transaction is
    /// active or the transaction is rollback-only.
    pub async fn commit(&mut self) -> Result<()> {
        if !self.tx.is_active() {
            return Err(TransactionError::NoActiveTransaction.into());
        }
        let plan = self.tx.plan_commit(self.caps()?.as_ref())?;
        self.issue(&plan).await?;
        self.tx.apply(&plan);
        debug!(depth = self.tx.depth(), "transaction committed");
        if self.tx.depth() == 0 && !self.auto_commit {
            self.begin_internal().await?;
        }
        Ok(())
    }

    /// Roll back the innermost transaction level.
    ///
    /// The outermost rollback clears the rollback-only flag; an inner
    /// rollback leaves it in place.
    pub async fn rollback(&mut self) -> Result<()> {
        if !self.tx.is_active() {
            return Err(TransactionError::NoActiveTransaction.into());
        }
        let plan = self.tx.plan_rollback(self.caps()?.as_ref())?;
        self.issue(&plan).await?;
        self.tx.apply(&plan);
        debug!(depth = self.tx.depth(), "transaction rolled back");
        if self.tx.depth() == 0 && !self.auto_commit {
            self.begin_internal().await?;
        }
        Ok(())
    }

    /// Run `body` inside its own transaction level.
    ///
    /// Commits on success and rolls back exactly once on failure. A commit
    /// failure also triggers the rollback. When the rollback itself fails,
    /// both errors are preserved in [`Error::ScopedRollback`].
    pub async fn run_scoped<T, F>(&mut self, body: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c mut Self) -> BoxFuture<'c, Result<T>>,
    {
        self.begin().await?;
        let outcome = body(self).await;
        match outcome {
            Ok(value) => match self.commit().await {
                Ok(()) => Ok(value),
                Err(commit_error) => Err(self.rollback_after(commit_error).await),
            },
            Err(cause) => Err(self.rollback_after(cause).await),
        }
    }

    async fn rollback_after(&mut self, cause: Error) -> Error {
        match self.rollback().await {
            Ok(()) => cause,
            Err(rollback) => Error::ScopedRollback {
                cause: Box::new(cause),
                rollback: Box::new(rollback),
            },
        }
    }

    /// Close the physical connection, rolling back any open transaction.
    ///
    /// Best-effort and idempotent; this is the recovery path after a
    /// panicked or cancelled operation left the coordinator mid-transaction.
    pub async fn close(&mut self) {
        if let Some(mut live) = self.live.take() {
            if self.tx.is_active() {
                warn!(
                    depth = self.tx.depth(),
                    "closing with an open transaction; rolling back"
                );
                if let Err(error) = live.conn.rollback_real().await {
                    warn!(%error, "rollback on close failed");
                }
            }
            info!(backend = self.backend.name(), "connection closed");
        }
        self.tx.reset();
    }

    async fn ensure_connected(&mut self) -> Result<()> {
        if self.live.is_some() {
            return Ok(());
        }

        let mut conn = self.backend.connect(&self.params).await?;
        let server_identity = conn.server_identity().await?;
        let caps = self.backend.capabilities(&server_identity);
        info!(
            backend = self.backend.name(),
            url = %self.params.redacted_url(),
            server = %server_identity,
            "connection established"
        );

        self.live = Some(Live {
            conn,
            caps,
            server_identity,
        });

        if !self.auto_commit {
            self.begin_internal().await?;
        }
        Ok(())
    }

    fn caps(&self) -> Result<Arc<dyn Capabilities>> {
        self.live
            .as_ref()
            .map(|live| Arc::clone(&live.caps))
            .ok_or(Error::Connection(ConnectionError::Closed))
    }

    fn live_mut(&mut self) -> Result<&mut Live<B::Conn>> {
        self.live
            .as_mut()
            .ok_or(Error::Connection(ConnectionError::Closed))
    }

    async fn issue(&mut self, plan: &TxPlan) -> Result<()> {
        let live = self.live_mut()?;
        match &plan.command {
            TxCommand::BeginReal => live.conn.begin_real().await,
            TxCommand::CommitReal => live.conn.commit_real().await,
            TxCommand::RollbackReal => live.conn.rollback_real().await,
            TxCommand::Statement(sql) => {
                live.conn.execute_raw(sql, &[]).await?;
                Ok(())
            }
            TxCommand::NoOp => Ok(()),
        }
    }
}

impl<B: Backend> Drop for Connection<B> {
    fn drop(&mut self) {
        if self.live.is_some() && self.tx.is_active() {
            warn!(
                depth = self.tx.depth(),
                "connection dropped with an open transaction"
            );
        }
    }
}
