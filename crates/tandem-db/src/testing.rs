//! Test doubles: an instrumented in-memory connection and on-disk SQLite
//! clusters.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use crate::config::{DbConfig, PoolLimits};
use crate::connection::{Connection, Statement, Transaction};
use crate::database::{Database, RoutedDatabase};
use crate::error::{DbError, DbResult};
use crate::value::{ExecResult, Row, Value};

/// Calls recorded by stub connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum StubOp {
    Ping,
    Close,
    Execute,
    Query,
    Prepare,
    Begin,
    StatementExecute,
    StatementQuery,
    StatementClose,
    TxExecute,
    TxQuery,
    Commit,
    Rollback,
}

/// Shared record of `(endpoint index, op)` in call order.
#[derive(Debug, Clone, Default)]
pub(crate) struct CallLog(Arc<Mutex<Vec<(usize, StubOp)>>>);

impl CallLog {
    fn record(&self, index: usize, op: StubOp) {
        self.0.lock().unwrap().push((index, op));
    }

    /// Indices that served `op`, in call order.
    pub(crate) fn indices(&self, op: StubOp) -> Vec<usize> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, o)| *o == op)
            .map(|(i, _)| *i)
            .collect()
    }

    pub(crate) fn count(&self, op: StubOp) -> usize {
        self.indices(op).len()
    }
}

#[derive(Debug, Default)]
struct StubState {
    data: Mutex<Vec<Value>>,
    failing: Mutex<HashSet<StubOp>>,
    delay: Mutex<Option<Duration>>,
    limits: Mutex<Option<PoolLimits>>,
    closed: AtomicBool,
}

/// In-memory connection that keeps its own rows and logs every call.
///
/// Writes store their first argument; reads return one row per stored value
/// with columns `node` and `value`. Clones share state.
#[derive(Debug, Clone)]
pub(crate) struct StubConnection {
    index: usize,
    log: CallLog,
    state: Arc<StubState>,
}

impl StubConnection {
    /// A stub with a private call log.
    pub(crate) fn detached(index: usize) -> Self {
        StubConnection {
            index,
            log: CallLog::default(),
            state: Arc::default(),
        }
    }

    /// Makes every later `op` on this endpoint fail.
    pub(crate) fn fail(&self, op: StubOp) {
        self.state.failing.lock().unwrap().insert(op);
    }

    /// Delays every later call on this endpoint.
    pub(crate) fn delay(&self, delay: Duration) {
        *self.state.delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn stored(&self) -> Vec<Value> {
        self.state.data.lock().unwrap().clone()
    }

    pub(crate) fn limits(&self) -> Option<PoolLimits> {
        self.state.limits.lock().unwrap().clone()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }

    async fn enter(&self, op: StubOp) -> DbResult<()> {
        enter(self.index, &self.log, &self.state, op).await
    }

    fn rows(&self) -> Vec<Row> {
        rows_for(self.index, &self.state)
    }
}

async fn enter(index: usize, log: &CallLog, state: &StubState, op: StubOp) -> DbResult<()> {
    log.record(index, op);
    let delay = *state.delay.lock().unwrap();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    if state.failing.lock().unwrap().contains(&op) {
        return Err(match op {
            StubOp::Begin | StubOp::Commit | StubOp::Rollback => {
                DbError::TransactionFailed("stub transaction failure".into())
            }
            StubOp::Ping | StubOp::Close => DbError::ConnectionFailed("stub endpoint down".into()),
            _ => DbError::QueryFailed("stub statement failure".into()),
        });
    }
    Ok(())
}

fn rows_for(index: usize, state: &StubState) -> Vec<Row> {
    let columns: Arc<[String]> = vec!["node".to_string(), "value".to_string()].into();
    state
        .data
        .lock()
        .unwrap()
        .iter()
        .map(|v| Row::new(Arc::clone(&columns), vec![Value::Integer(index as i64), v.clone()]))
        .collect()
}

fn store_first(state: &StubState, args: &[Value]) -> ExecResult {
    let mut data = state.data.lock().unwrap();
    if let Some(value) = args.first() {
        data.push(value.clone());
    }
    ExecResult {
        rows_affected: args.len().min(1) as u64,
        last_insert_id: Some(data.len() as i64),
    }
}

#[async_trait]
impl Connection for StubConnection {
    type Statement = StubStatement;
    type Transaction = StubTransaction;

    async fn ping(&self) -> DbResult<()> {
        self.enter(StubOp::Ping).await
    }

    async fn close(&self) -> DbResult<()> {
        self.enter(StubOp::Close).await?;
        if self.state.closed.swap(true, Ordering::SeqCst) {
            return Err(DbError::ConnectionFailed("already closed".into()));
        }
        Ok(())
    }

    async fn execute(&self, _sql: &str, args: &[Value]) -> DbResult<ExecResult> {
        self.enter(StubOp::Execute).await?;
        Ok(store_first(&self.state, args))
    }

    async fn query(&self, _sql: &str, _args: &[Value]) -> DbResult<Vec<Row>> {
        self.enter(StubOp::Query).await?;
        Ok(self.rows())
    }

    async fn prepare(&self, _sql: &str) -> DbResult<StubStatement> {
        self.enter(StubOp::Prepare).await?;
        Ok(StubStatement {
            conn: self.clone(),
            closed: AtomicBool::new(false),
        })
    }

    async fn begin(&self) -> DbResult<StubTransaction> {
        self.enter(StubOp::Begin).await?;
        Ok(StubTransaction {
            conn: self.clone(),
            pending: Vec::new(),
        })
    }

    fn set_pool_limits(&self, limits: &PoolLimits) {
        *self.state.limits.lock().unwrap() = Some(limits.clone());
    }
}

#[derive(Debug)]
pub(crate) struct StubStatement {
    conn: StubConnection,
    closed: AtomicBool,
}

#[async_trait]
impl Statement for StubStatement {
    async fn execute(&self, args: &[Value]) -> DbResult<ExecResult> {
        self.conn.enter(StubOp::StatementExecute).await?;
        Ok(store_first(&self.conn.state, args))
    }

    async fn query(&self, _args: &[Value]) -> DbResult<Vec<Row>> {
        self.conn.enter(StubOp::StatementQuery).await?;
        if self.closed.load(Ordering::SeqCst) {
            return Err(DbError::StatementClosed);
        }
        Ok(self.conn.rows())
    }

    async fn close(&self) -> DbResult<()> {
        self.conn.enter(StubOp::StatementClose).await?;
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Buffers writes until commit.
#[derive(Debug)]
pub(crate) struct StubTransaction {
    conn: StubConnection,
    pending: Vec<Value>,
}

#[async_trait]
impl Transaction for StubTransaction {
    async fn execute(&mut self, _sql: &str, args: &[Value]) -> DbResult<ExecResult> {
        self.conn.enter(StubOp::TxExecute).await?;
        self.pending.extend(args.first().cloned());
        Ok(ExecResult {
            rows_affected: 1,
            last_insert_id: None,
        })
    }

    async fn query(&mut self, _sql: &str, _args: &[Value]) -> DbResult<Vec<Row>> {
        self.conn.enter(StubOp::TxQuery).await?;
        let mut rows = self.conn.rows();
        let columns: Arc<[String]> = vec!["node".to_string(), "value".to_string()].into();
        rows.extend(self.pending.iter().map(|v| {
            Row::new(
                Arc::clone(&columns),
                vec![Value::Integer(self.conn.index as i64), v.clone()],
            )
        }));
        Ok(rows)
    }

    async fn commit(self) -> DbResult<()> {
        self.conn.enter(StubOp::Commit).await?;
        self.conn.state.data.lock().unwrap().extend(self.pending);
        Ok(())
    }

    async fn rollback(self) -> DbResult<()> {
        self.conn.enter(StubOp::Rollback).await
    }
}

/// Builds a database over `n` stubs sharing one call log.
///
/// The returned stubs share state with the ones inside the database.
pub(crate) fn stub_set(n: usize) -> (RoutedDatabase<StubConnection>, Vec<StubConnection>, CallLog) {
    let log = CallLog::default();
    let stubs: Vec<StubConnection> = (0..n)
        .map(|index| StubConnection {
            index,
            log: log.clone(),
            state: Arc::default(),
        })
        .collect();
    let db = RoutedDatabase::from_connections(stubs.clone()).unwrap();
    (db, stubs, log)
}

const SCHEMA: &[&str] = &[
    "CREATE TABLE node (idx INTEGER NOT NULL)",
    "CREATE TABLE country (
        country_id INTEGER PRIMARY KEY AUTOINCREMENT,
        country TEXT NOT NULL,
        last_update TEXT NOT NULL
    )",
    "CREATE TABLE city (
        city_id INTEGER PRIMARY KEY AUTOINCREMENT,
        city TEXT NOT NULL,
        country_id INTEGER NOT NULL REFERENCES country (country_id),
        last_update TEXT NOT NULL
    )",
    "CREATE TABLE users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL
    )",
];

/// Opens `n` SQLite files as one database, primary first.
///
/// Each file gets the schema and a `node` row holding its own index, so
/// `SELECT idx FROM node` reveals which endpoint served a read. Files are not
/// replicated: rows written through the database exist on the primary only.
pub(crate) async fn sqlite_cluster(n: usize) -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let endpoints: Vec<String> = (0..n)
        .map(|i| format!("sqlite://{}", dir.path().join(format!("node{i}.db")).display()))
        .collect();

    let config = DbConfig {
        endpoints,
        pool: PoolLimits::default(),
    };
    let db = Database::connect(&config).await.unwrap();

    for (index, conn) in db.inner.connections.iter().enumerate() {
        for ddl in SCHEMA {
            conn.execute(ddl, &[]).await.unwrap();
        }
        conn.execute("INSERT INTO node (idx) VALUES (?)", &[Value::from(index as i64)])
            .await
            .unwrap();
    }

    (dir, db)
}
