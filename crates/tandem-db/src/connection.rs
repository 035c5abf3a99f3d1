//! # Connection Seam
//!
//! The single-endpoint capability the routing layer is built on. One
//! implementation talks to SQLite through sqlx ([`crate::sqlite`]); tests plug
//! in instrumented stubs.
//!
//! ```text
//! RoutedDatabase<C: Connection>
//!   ├── C            (index 0, primary)
//!   ├── C            (index 1, replica)
//!   └── C            (index 2, replica)
//!
//! C::Statement    one prepared handle per endpoint
//! C::Transaction  only ever opened on the primary
//! ```
//!
//! Implementations must be safe to use from many tasks at once.

use async_trait::async_trait;

use crate::config::PoolLimits;
use crate::error::DbResult;
use crate::value::{ExecResult, Row, Value};

/// An opened handle to one database endpoint.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    type Statement: Statement;
    type Transaction: Transaction;

    /// Checks the endpoint is reachable.
    async fn ping(&self) -> DbResult<()>;

    /// Closes the endpoint. Later calls fail.
    async fn close(&self) -> DbResult<()>;

    /// Runs a write statement.
    async fn execute(&self, sql: &str, args: &[Value]) -> DbResult<ExecResult>;

    /// Runs a read statement and returns every row.
    async fn query(&self, sql: &str, args: &[Value]) -> DbResult<Vec<Row>>;

    /// Prepares `sql` on this endpoint.
    async fn prepare(&self, sql: &str) -> DbResult<Self::Statement>;

    /// Opens a transaction on this endpoint.
    async fn begin(&self) -> DbResult<Self::Transaction>;

    /// Applies pool limits. Performs no I/O.
    fn set_pool_limits(&self, limits: &PoolLimits);
}

/// A statement prepared on one endpoint.
#[async_trait]
pub trait Statement: Send + Sync + 'static {
    async fn execute(&self, args: &[Value]) -> DbResult<ExecResult>;

    async fn query(&self, args: &[Value]) -> DbResult<Vec<Row>>;

    /// Releases the statement. Later calls fail with `StatementClosed`.
    async fn close(&self) -> DbResult<()>;
}

/// An open transaction on one endpoint.
///
/// `commit` and `rollback` consume the handle. Dropping it without either
/// rolls the transaction back.
#[async_trait]
pub trait Transaction: Send + 'static {
    async fn execute(&mut self, sql: &str, args: &[Value]) -> DbResult<ExecResult>;

    async fn query(&mut self, sql: &str, args: &[Value]) -> DbResult<Vec<Row>>;

    async fn commit(self) -> DbResult<()>;

    async fn rollback(self) -> DbResult<()>;
}
