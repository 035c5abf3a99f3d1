//! # Transactions
//!
//! Transactions always run on the primary, and the scope that opened one is
//! marked before the transaction begins.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    run_in_transaction(scope, work)                      │
//! │                                                                         │
//! │   Idle ──begin──► Active ──work Ok──► commit ──► Committed             │
//! │                     │                                                   │
//! │                     ├──work Err──► rollback ──► RolledBack             │
//! │                     │                  └─ rollback Err: RollbackFailed │
//! │                     │                     (original kept as cause)     │
//! │                     │                                                   │
//! │                     └──work panics──► rollback ──► panic resumes       │
//! │                                                                         │
//! │   commit(self) / rollback(self) consume the handle: terminal states    │
//! │   cannot be left. A dropped handle is rolled back by the backend.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Statements and commit are bounded by the scope's deadline. Rollback is
//! not: work that overran the deadline still gets its transaction undone.

use std::panic::AssertUnwindSafe;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tracing::{debug, error};

use crate::connection::{Connection, Transaction};
use crate::database::RoutedDatabase;
use crate::error::{DbError, DbResult, Operation};
use crate::scope::RequestScope;
use crate::value::{ExecResult, Row, Value};

/// An open transaction on the primary.
pub struct RoutedTransaction<C: Connection> {
    tx: C::Transaction,
    scope: RequestScope,
}

impl<C: Connection> RoutedTransaction<C> {
    pub(crate) fn new(tx: C::Transaction, scope: RequestScope) -> Self {
        RoutedTransaction { tx, scope }
    }

    /// The scope that opened this transaction. Always marked.
    pub fn scope(&self) -> &RequestScope {
        &self.scope
    }

    pub async fn execute(&mut self, sql: &str, args: &[Value]) -> DbResult<ExecResult> {
        self.scope
            .bound(self.tx.execute(sql, args))
            .await
            .map_err(|e| e.during(Operation::Write))
    }

    pub async fn query(&mut self, sql: &str, args: &[Value]) -> DbResult<Vec<Row>> {
        self.scope
            .bound(self.tx.query(sql, args))
            .await
            .map_err(|e| e.during(Operation::Read))
    }

    pub async fn query_row(&mut self, sql: &str, args: &[Value]) -> DbResult<Option<Row>> {
        Ok(self.query(sql, args).await?.into_iter().next())
    }

    pub async fn commit(self) -> DbResult<()> {
        let RoutedTransaction { tx, scope } = self;
        scope.bound(tx.commit()).await
    }

    /// Rolls back without the scope's deadline.
    pub async fn rollback(self) -> DbResult<()> {
        self.tx.rollback().await
    }
}

impl<C: Connection> RoutedDatabase<C> {
    /// Runs `work` inside a transaction on the primary.
    ///
    /// Commits if `work` succeeds, otherwise rolls back and returns the error
    /// from `work`. If the rollback fails too, both are returned in
    /// [`DbError::RollbackFailed`] with the original as `cause`.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let id = db
    ///     .run_in_transaction(&scope, move |tx| {
    ///         Box::pin(async move {
    ///             let result = tx.execute("INSERT INTO users (name) VALUES (?)", &[name.into()]).await?;
    ///             Ok(result.last_insert_id)
    ///         })
    ///     })
    ///     .await?;
    /// ```
    pub async fn run_in_transaction<T, F>(&self, scope: &RequestScope, work: F) -> DbResult<T>
    where
        F: for<'t> FnOnce(&'t mut RoutedTransaction<C>) -> BoxFuture<'t, DbResult<T>>,
    {
        let mut tx = self.begin(scope).await?;

        let outcome = AssertUnwindSafe(work(&mut tx)).catch_unwind().await;

        match outcome {
            Ok(Ok(value)) => {
                tx.commit().await?;
                debug!("Transaction committed");
                Ok(value)
            }
            Ok(Err(cause)) => match tx.rollback().await {
                Ok(()) => {
                    debug!(error = %cause, "Transaction rolled back");
                    Err(cause)
                }
                Err(rollback) => {
                    error!(error = %cause, rollback_error = %rollback, "Rollback failed");
                    Err(DbError::RollbackFailed {
                        cause: Box::new(cause),
                        rollback: Box::new(rollback),
                    })
                }
            },
            Err(panic) => {
                if let Err(rollback) = tx.rollback().await {
                    error!(rollback_error = %rollback, "Rollback after panic failed");
                }
                std::panic::resume_unwind(panic)
            }
        }
    }
}

// =============================================================================
// Unit of Work
// =============================================================================

/// Transaction boundary handed to services that should not see the database
/// handle itself.
///
/// ## Usage
/// ```rust,ignore
/// let uow = UnitOfWork::new(db.clone());
/// uow.run(&scope, |tx| Box::pin(async move {
///     tx.execute("DELETE FROM city WHERE country_id = ?", &[id.into()]).await?;
///     tx.execute("DELETE FROM country WHERE country_id = ?", &[id.into()]).await?;
///     Ok(())
/// }))
/// .await?;
/// ```
pub struct UnitOfWork<C: Connection> {
    db: RoutedDatabase<C>,
}

impl<C: Connection> Clone for UnitOfWork<C> {
    fn clone(&self) -> Self {
        UnitOfWork {
            db: self.db.clone(),
        }
    }
}

impl<C: Connection> UnitOfWork<C> {
    pub fn new(db: RoutedDatabase<C>) -> Self {
        UnitOfWork { db }
    }

    /// See [`RoutedDatabase::run_in_transaction`].
    pub async fn run<T, F>(&self, scope: &RequestScope, work: F) -> DbResult<T>
    where
        F: for<'t> FnOnce(&'t mut RoutedTransaction<C>) -> BoxFuture<'t, DbResult<T>>,
    {
        self.db.run_in_transaction(scope, work).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
