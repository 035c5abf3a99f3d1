//! # SQLite Endpoint
//!
//! [`Connection`] implementation over a sqlx `SqlitePool`, one pool per
//! endpoint URL.
//!
//! ## Connection Options
//! Every endpoint is opened with:
//! - WAL journal (readers don't block writers)
//! - NORMAL synchronous
//! - Foreign keys enabled
//! - File created if missing
//!
//! ## Pool Limits
//! sqlx pools cannot be resized in place. [`SqliteEndpoint::set_pool_limits`]
//! builds a new lazy pool with the new limits and swaps it in. The old pool is
//! retired, not closed: statements prepared earlier keep using it until the
//! endpoint is closed, which closes every retired pool too. Must be called from
//! within a Tokio runtime.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow,
    SqliteSynchronous,
};
use sqlx::{Column as _, Row as _, Sqlite, SqlitePool, TypeInfo as _, ValueRef as _};
use tracing::{debug, info, warn};

use crate::config::PoolLimits;
use crate::connection::{Connection, Statement, Transaction};
use crate::error::{DbError, DbResult};
use crate::value::{ExecResult, Row, Value};

// =============================================================================
// Endpoint
// =============================================================================

/// One SQLite database file behind a connection pool.
#[derive(Debug)]
pub struct SqliteEndpoint {
    url: String,
    options: SqliteConnectOptions,
    pool: RwLock<SqlitePool>,
    retired: Mutex<Vec<SqlitePool>>,
}

impl SqliteEndpoint {
    /// Opens the endpoint and establishes its first connection.
    ///
    /// ## Example
    /// ```rust,ignore
    /// let endpoint = SqliteEndpoint::connect("sqlite://data/primary.db", &PoolLimits::default()).await?;
    /// ```
    pub async fn connect(url: &str, limits: &PoolLimits) -> DbResult<Self> {
        debug!(url, "Opening SQLite endpoint");

        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| DbError::InvalidConfig(format!("{}: {}", url, e)))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .create_if_missing(true);

        let pool = pool_options(limits)
            .connect_with(options.clone())
            .await
            .map_err(|e| DbError::ConnectionFailed(format!("{}: {}", url, e)))?;

        info!(url, max_connections = limits.max_connections, "SQLite endpoint opened");

        Ok(SqliteEndpoint {
            url: url.to_string(),
            options,
            pool: RwLock::new(pool),
            retired: Mutex::new(Vec::new()),
        })
    }

    /// The URL this endpoint was opened with.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the current pool (for queries outside the routing layer).
    pub fn pool(&self) -> SqlitePool {
        self.pool
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

fn pool_options(limits: &PoolLimits) -> SqlitePoolOptions {
    SqlitePoolOptions::new()
        .max_connections(limits.max_connections)
        .min_connections(limits.min_connections)
        .acquire_timeout(limits.acquire_timeout())
        .idle_timeout(limits.idle_timeout())
        .max_lifetime(limits.max_lifetime())
}

#[async_trait]
impl Connection for SqliteEndpoint {
    type Statement = SqliteStatement;
    type Transaction = SqliteTransaction;

    async fn ping(&self) -> DbResult<()> {
        let pool = self.pool();
        let mut conn = pool.acquire().await?;
        sqlx::Connection::ping(&mut *conn).await?;
        Ok(())
    }

    async fn close(&self) -> DbResult<()> {
        let retired = std::mem::take(
            &mut *self
                .retired
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        for old in retired {
            old.close().await;
        }

        let pool = self.pool();
        if !pool.is_closed() {
            pool.close().await;
            info!(url = %self.url, "SQLite endpoint closed");
        }
        Ok(())
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> DbResult<ExecResult> {
        let pool = self.pool();
        let result = bind_values(sqlx::query(sql), args).execute(&pool).await?;
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: Some(result.last_insert_rowid()),
        })
    }

    async fn query(&self, sql: &str, args: &[Value]) -> DbResult<Vec<Row>> {
        let pool = self.pool();
        let rows = bind_values(sqlx::query(sql), args).fetch_all(&pool).await?;
        decode_rows(&rows)
    }

    async fn prepare(&self, sql: &str) -> DbResult<SqliteStatement> {
        let pool = self.pool();
        // Validates the SQL and warms sqlx's per-connection statement cache
        sqlx::Executor::prepare(&pool, sql).await?;
        Ok(SqliteStatement {
            pool,
            sql: Arc::from(sql),
            closed: AtomicBool::new(false),
        })
    }

    async fn begin(&self) -> DbResult<SqliteTransaction> {
        let tx = self
            .pool()
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;
        Ok(SqliteTransaction { inner: tx })
    }

    fn set_pool_limits(&self, limits: &PoolLimits) {
        if let Err(err) = limits.validate() {
            warn!(url = %self.url, error = %err, "Ignoring invalid pool limits");
            return;
        }

        let mut pool = self
            .pool
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if pool.is_closed() {
            debug!(url = %self.url, "Pool closed, limits not applied");
            return;
        }

        let old = std::mem::replace(
            &mut *pool,
            pool_options(limits).connect_lazy_with(self.options.clone()),
        );
        self.retired
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(old);
        debug!(
            url = %self.url,
            max_connections = limits.max_connections,
            min_connections = limits.min_connections,
            "Pool rebuilt with new limits"
        );
    }
}

// =============================================================================
// Prepared Statement
// =============================================================================

/// A statement prepared on one endpoint.
#[derive(Debug)]
pub struct SqliteStatement {
    pool: SqlitePool,
    sql: Arc<str>,
    closed: AtomicBool,
}

impl SqliteStatement {
    pub fn sql(&self) -> &str {
        &self.sql
    }

    fn ensure_open(&self) -> DbResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(DbError::StatementClosed);
        }
        Ok(())
    }
}

#[async_trait]
impl Statement for SqliteStatement {
    async fn execute(&self, args: &[Value]) -> DbResult<ExecResult> {
        self.ensure_open()?;
        let result = bind_values(sqlx::query(&self.sql), args)
            .execute(&self.pool)
            .await?;
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: Some(result.last_insert_rowid()),
        })
    }

    async fn query(&self, args: &[Value]) -> DbResult<Vec<Row>> {
        self.ensure_open()?;
        let rows = bind_values(sqlx::query(&self.sql), args)
            .fetch_all(&self.pool)
            .await?;
        decode_rows(&rows)
    }

    async fn close(&self) -> DbResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(DbError::StatementClosed);
        }
        Ok(())
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// An open transaction on one endpoint. Rolled back if dropped.
pub struct SqliteTransaction {
    inner: sqlx::Transaction<'static, Sqlite>,
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn execute(&mut self, sql: &str, args: &[Value]) -> DbResult<ExecResult> {
        let result = bind_values(sqlx::query(sql), args)
            .execute(&mut *self.inner)
            .await?;
        Ok(ExecResult {
            rows_affected: result.rows_affected(),
            last_insert_id: Some(result.last_insert_rowid()),
        })
    }

    async fn query(&mut self, sql: &str, args: &[Value]) -> DbResult<Vec<Row>> {
        let rows = bind_values(sqlx::query(sql), args)
            .fetch_all(&mut *self.inner)
            .await?;
        decode_rows(&rows)
    }

    async fn commit(self) -> DbResult<()> {
        self.inner
            .commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))
    }

    async fn rollback(self) -> DbResult<()> {
        self.inner
            .rollback()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))
    }
}

// =============================================================================
// Binding and Decoding
// =============================================================================

/// Binds positional arguments in order.
fn bind_values<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    args: &[Value],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in args {
        query = match value {
            Value::Null => query.bind(None::<i64>),
            Value::Integer(v) => query.bind(*v),
            Value::Real(v) => query.bind(*v),
            Value::Text(v) => query.bind(v.clone()),
            Value::Blob(v) => query.bind(v.clone()),
        };
    }
    query
}

/// Decodes rows by each value's storage class.
fn decode_rows(rows: &[SqliteRow]) -> DbResult<Vec<Row>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };

    let columns: Arc<[String]> = first
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    rows.iter()
        .map(|row| {
            let values = (0..columns.len())
                .map(|i| decode_value(row, i))
                .collect::<DbResult<Vec<_>>>()?;
            Ok(Row::new(Arc::clone(&columns), values))
        })
        .collect()
}

fn decode_value(row: &SqliteRow, index: usize) -> DbResult<Value> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let storage = raw.type_info().name().to_string();
    let value = match storage.as_str() {
        "INTEGER" => Value::Integer(row.try_get_unchecked::<i64, _>(index)?),
        "REAL" => Value::Real(row.try_get_unchecked::<f64, _>(index)?),
        "BLOB" => Value::Blob(row.try_get_unchecked::<Vec<u8>, _>(index)?),
        _ => Value::Text(row.try_get_unchecked::<String, _>(index)?),
    };
    Ok(value)
}

// =============================================================================
// Unit Tests
// =============================================================================
