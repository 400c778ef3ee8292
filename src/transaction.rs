//! Transaction nesting state machine.
//!
//! [`TransactionState`] tracks nesting depth and the rollback-only flag, and
//! plans which backend command each transaction verb must issue. Planning is
//! pure and fallible; state mutates only through [`TransactionState::apply`]
//! after the planned command succeeded on the wire. A failed backend command
//! therefore leaves depth and the flag exactly as they were.
//!
//! Only the outermost level maps to a real transaction. Inner levels map to
//! savepoints named `LEVEL_<n>`, where `n` is the depth the savepoint guards.

use crate::capabilities::Capabilities;
use crate::error::TransactionError;

/// Backend command a transaction verb resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxCommand {
    /// Real BEGIN through the backend's transaction verb.
    BeginReal,
    /// Real COMMIT through the backend's transaction verb.
    CommitReal,
    /// Real ROLLBACK through the backend's transaction verb.
    RollbackReal,
    /// Savepoint manipulation as an ordinary statement.
    Statement(String),
    /// Nothing to send; the verb still succeeds and adjusts depth.
    NoOp,
}

/// Planned effect of a transaction verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxPlan {
    pub command: TxCommand,
    next_depth: u32,
    clear_rollback_only: bool,
}

/// Nesting depth and rollback-only flag for one connection.
#[derive(Debug, Default)]
pub struct TransactionState {
    depth: u32,
    rollback_only: bool,
}

impl TransactionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn is_active(&self) -> bool {
        self.depth > 0
    }

    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }

    /// Plan a begin.
    ///
    /// Depth 0 plans the real BEGIN; deeper levels plan a savepoint, failing
    /// with [`TransactionError::SavepointsNotSupported`] when the backend has
    /// none.
    pub fn plan_begin(&self, caps: &dyn Capabilities) -> Result<TxPlan, TransactionError> {
        if self.depth == 0 {
            return Ok(TxPlan {
                command: TxCommand::BeginReal,
                next_depth: 1,
                clear_rollback_only: false,
            });
        }
        if !caps.supports_savepoints() {
            return Err(TransactionError::SavepointsNotSupported);
        }
        let next_depth = self.depth + 1;
        Ok(TxPlan {
            command: TxCommand::Statement(
                caps.create_savepoint_sql(&savepoint_name(next_depth)),
            ),
            next_depth,
            clear_rollback_only: false,
        })
    }

    /// Plan a commit.
    ///
    /// Refuses before any command is sent when no transaction is active or
    /// the transaction is rollback-only. Depth 1 plans the real COMMIT;
    /// deeper levels release their savepoint, or succeed as a no-op when the
    /// backend cannot release.
    pub fn plan_commit(&self, caps: &dyn Capabilities) -> Result<TxPlan, TransactionError> {
        if self.depth == 0 {
            return Err(TransactionError::NoActiveTransaction);
        }
        if self.rollback_only {
            return Err(TransactionError::RollbackOnly);
        }
        if self.depth == 1 {
            return Ok(TxPlan {
                command: TxCommand::CommitReal,
                next_depth: 0,
                clear_rollback_only: false,
            });
        }
        let command = if caps.supports_release_savepoint() {
            TxCommand::Statement(caps.release_savepoint_sql(&savepoint_name(self.depth)))
        } else {
            TxCommand::NoOp
        };
        Ok(TxPlan {
            command,
            next_depth: self.depth - 1,
            clear_rollback_only: false,
        })
    }

    /// Plan a rollback.
    ///
    /// Depth 1 plans the real ROLLBACK and clears rollback-only; deeper
    /// levels roll back to their savepoint and leave the flag untouched.
    pub fn plan_rollback(&self, caps: &dyn Capabilities) -> Result<TxPlan, TransactionError> {
        if self.depth == 0 {
            return Err(TransactionError::NoActiveTransaction);
        }
        if self.depth == 1 {
            return Ok(TxPlan {
                command: TxCommand::RollbackReal,
                next_depth: 0,
                clear_rollback_only: true,
            });
        }
        if !caps.supports_savepoints() {
            return Err(TransactionError::SavepointsNotSupported);
        }
        Ok(TxPlan {
            command: TxCommand::Statement(
                caps.rollback_to_savepoint_sql(&savepoint_name(self.depth)),
            ),
            next_depth: self.depth - 1,
            clear_rollback_only: false,
        })
    }

    /// Record that the planned command succeeded.
    pub fn apply(&mut self, plan: &TxPlan) {
        self.depth = plan.next_depth;
        if plan.clear_rollback_only || self.depth == 0 {
            self.rollback_only = false;
        }
    }

    /// Mark the current transaction as doomed.
    ///
    /// # Errors
    ///
    /// Fails when no transaction is active.
    pub fn set_rollback_only(&mut self) -> Result<(), TransactionError> {
        if self.depth == 0 {
            return Err(TransactionError::NoActiveTransaction);
        }
        self.rollback_only = true;
        Ok(())
    }

    /// Forget all transaction state, as on close or connection loss.
    pub fn reset(&mut self) {
        self.depth = 0;
        self.rollback_only = false;
    }
}

fn savepoint_name(depth: u32) -> String {
    format!("LEVEL_{depth}")
}
