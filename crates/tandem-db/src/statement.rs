//! # Routed Prepared Statements
//!
//! A statement prepared on every endpoint, dispatched with the same policy as
//! the database that prepared it.
//!
//! ```text
//! prepare(scope, sql)
//!   scope marked    → [primary]                       (one handle)
//!   scope unmarked  → [primary, replica 1, replica 2] (scatter)
//!
//! execute(args)  → handle 0, scope marked
//! query(args)    → handle 0 if marked, else next replica handle
//! close()        → scatter over every handle
//! ```

use tracing::debug;

use crate::connection::{Connection, Statement};
use crate::database::RoutedDatabase;
use crate::error::{DbResult, Operation};
use crate::scatter::scatter;
use crate::scope::RequestScope;
use crate::value::{ExecResult, Row, Value};

/// A prepared statement bound to the scope it was prepared in.
///
/// ## Example
/// ```rust,ignore
/// let stmt = db.prepare(&scope, "SELECT * FROM city WHERE country_id = ?").await?;
/// for id in country_ids {
///     let cities = stmt.query(&[Value::from(id)]).await?;
/// }
/// stmt.close().await?;
/// ```
pub struct RoutedStatement<C: Connection> {
    db: RoutedDatabase<C>,
    statements: Vec<C::Statement>,
    scope: RequestScope,
}

impl<C: Connection> RoutedStatement<C> {
    pub(crate) async fn prepare(
        db: RoutedDatabase<C>,
        scope: &RequestScope,
        sql: &str,
    ) -> DbResult<Self> {
        let statements = if scope.is_modified() {
            debug!(sql, "Preparing on primary only");
            let stmt = scope
                .bound(db.primary().prepare(sql))
                .await
                .map_err(|e| e.during(Operation::Prepare))?;
            vec![stmt]
        } else {
            debug!(sql, endpoints = db.len(), "Preparing on every endpoint");
            let conns = &db.inner.connections;
            scatter(conns.len(), |i| scope.bound(conns[i].prepare(sql)))
                .await
                .map_err(|e| e.during(Operation::Prepare))?
        };

        Ok(RoutedStatement {
            db,
            statements,
            scope: scope.clone(),
        })
    }

    /// Number of underlying handles (1 when prepared on the primary only).
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// The scope this statement was prepared in.
    pub fn scope(&self) -> &RequestScope {
        &self.scope
    }

    /// Runs the statement as a write on the primary and marks the scope.
    pub async fn execute(&self, args: &[Value]) -> DbResult<ExecResult> {
        self.scope.mark_modified();
        self.scope
            .bound(self.statements[0].execute(args))
            .await
            .map_err(|e| e.during(Operation::Write))
    }

    /// Runs the statement as a read.
    pub async fn query(&self, args: &[Value]) -> DbResult<Vec<Row>> {
        let index = if self.scope.is_modified() {
            0
        } else {
            self.db.inner.rotator.next_index(self.statements.len())
        };
        debug!(index, "Routing prepared read");
        self.scope
            .bound(self.statements[index].query(args))
            .await
            .map_err(|e| e.during(Operation::Read))
    }

    /// Runs the statement as a read and returns the first row, if any.
    pub async fn query_row(&self, args: &[Value]) -> DbResult<Option<Row>> {
        Ok(self.query(args).await?.into_iter().next())
    }

    /// Closes every underlying handle. All are attempted even if one fails.
    pub async fn close(&self) -> DbResult<()> {
        let statements = &self.statements;
        scatter(statements.len(), |i| statements[i].close()).await?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::testing::{sqlite_cluster, stub_set, StubOp};

    #[tokio::test]
    async fn test_prepare_on_fresh_scope_covers_every_endpoint() {
        let (db, _stubs, log) = stub_set(3);
        let stmt = db.prepare(&RequestScope::new(), "SELECT").await.unwrap();

        assert_eq!(stmt.len(), 3);
        assert_eq!(log.count(StubOp::Prepare), 3);
    }

    #[tokio::test]
    async fn test_prepare_on_marked_scope_uses_primary_only() {
        let (db, _stubs, log) = stub_set(3);
        let scope = RequestScope::new();
        scope.mark_modified();

        let stmt = db.prepare(&scope, "SELECT").await.unwrap();
        stmt.query(&[]).await.unwrap();

        assert_eq!(stmt.len(), 1);
        assert_eq!(log.indices(StubOp::Prepare), vec![0]);
        assert_eq!(log.indices(StubOp::StatementQuery), vec![0]);
    }

    #[tokio::test]
    async fn test_statement_reads_rotate_then_pin_after_write() {
        let (db, _stubs, log) = stub_set(3);
        let scope = RequestScope::new();
        let stmt = db.prepare(&scope, "SQL").await.unwrap();

        stmt.query(&[]).await.unwrap();
        stmt.query(&[]).await.unwrap();
        let mut before = log.indices(StubOp::StatementQuery);
        before.sort_unstable();
        assert_eq!(before, vec![1, 2]);

        stmt.execute(&[Value::from("Chile")]).await.unwrap();
        assert!(scope.is_modified());
        assert_eq!(log.indices(StubOp::StatementExecute), vec![0]);

        let rows = stmt.query(&[]).await.unwrap();
        assert_eq!(rows[0].get::<String>("value").unwrap(), "Chile");
        assert_eq!(log.indices(StubOp::StatementQuery).last(), Some(&0));
    }

    #[tokio::test]
    async fn test_prepare_failure_on_one_endpoint_fails_whole_prepare() {
        let (db, stubs, log) = stub_set(3);
        stubs[2].fail(StubOp::Prepare);

        let err = db.prepare(&RequestScope::new(), "SQL").await.err().unwrap();
        assert_eq!(err.operation(), Some(Operation::Prepare));
        assert_eq!(log.count(StubOp::Prepare), 3);
    }

    #[tokio::test]
    async fn test_close_attempts_every_handle() {
        let (db, stubs, log) = stub_set(3);
        stubs[0].fail(StubOp::StatementClose);
        let stmt = db.prepare(&RequestScope::new(), "SQL").await.unwrap();

        assert!(stmt.close().await.is_err());
        assert_eq!(log.count(StubOp::StatementClose), 3);
    }

    #[tokio::test]
    async fn test_sqlite_statement_routing() {
        let (_dir, db) = sqlite_cluster(2).await;
        let scope = RequestScope::new();
        let stmt = db.prepare(&scope, "SELECT idx FROM node").await.unwrap();

        let row = stmt.query_row(&[]).await.unwrap().unwrap();
        assert_eq!(row.get::<i64>("idx").unwrap(), 1);
        stmt.close().await.unwrap();

        assert!(matches!(stmt.query(&[]).await, Err(DbError::StatementClosed)));
    }
}
