//! # Routing Database
//!
//! A drop-in database handle over one primary and any number of replicas.
//!
//! ## Routing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        RoutedDatabase                                   │
//! │                                                                         │
//! │  execute(scope, ..)  ──► primary, scope marked                         │
//! │  begin(scope)        ──► primary, scope marked before begin            │
//! │  query(scope, ..)    ──► primary   if scope.is_modified()              │
//! │                      ──► replica   otherwise (round-robin, 1..n)       │
//! │  prepare(scope, ..)  ──► primary only if marked, else every endpoint   │
//! │                                                                         │
//! │  ping / close        ──► scatter over every endpoint                   │
//! │  set_pool_limits     ──► every endpoint, directly (no I/O)             │
//! │                                                                         │
//! │  ┌──────────┐  ┌──────────┐  ┌──────────┐                              │
//! │  │ [0]      │  │ [1]      │  │ [2]      │                              │
//! │  │ primary  │  │ replica  │  │ replica  │   fixed after open           │
//! │  └──────────┘  └──────────┘  └──────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! With a single endpoint every call goes to index 0.
//!
//! ## Usage
//! ```rust,ignore
//! let db = Database::connect(&DbConfig::from_dsn_list(urls)?).await?;
//!
//! let scope = RequestScope::new();
//! let before = db.query(&scope, "SELECT * FROM country", &[]).await?;  // replica
//! db.execute(&scope, "INSERT INTO country (country, last_update) VALUES (?, ?)", &args).await?;
//! let after = db.query(&scope, "SELECT * FROM country", &[]).await?;   // primary
//! ```

use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::{debug, info};

use crate::config::{DbConfig, PoolLimits};
use crate::connection::Connection;
use crate::error::{DbError, DbResult, Operation};
use crate::rotation::ReplicaRotator;
use crate::scatter::scatter;
use crate::scope::RequestScope;
use crate::sqlite::SqliteEndpoint;
use crate::statement::RoutedStatement;
use crate::transaction::RoutedTransaction;
use crate::value::{ExecResult, Row, Value};

/// Routing database over SQLite endpoints.
pub type Database = RoutedDatabase<SqliteEndpoint>;

/// Database handle that routes each call to the primary or a replica.
///
/// Cloning is cheap and shares the connection set and rotation counter.
pub struct RoutedDatabase<C: Connection> {
    pub(crate) inner: Arc<DbInner<C>>,
}

pub(crate) struct DbInner<C> {
    pub(crate) connections: Vec<C>,
    pub(crate) rotator: ReplicaRotator,
    limits: RwLock<PoolLimits>,
}

impl<C: Connection> Clone for RoutedDatabase<C> {
    fn clone(&self) -> Self {
        RoutedDatabase {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connection> std::fmt::Debug for RoutedDatabase<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoutedDatabase")
            .field("endpoints", &self.inner.connections.len())
            .finish()
    }
}

impl Database {
    /// Opens every endpoint in `config` concurrently with its pool limits.
    ///
    /// Fails if any endpoint fails to open.
    pub async fn connect(config: &DbConfig) -> DbResult<Self> {
        config.validate()?;
        let limits = &config.pool;
        let db = Self::open(&config.endpoints, |url| SqliteEndpoint::connect(url, limits)).await?;
        *db.limits_mut() = limits.clone();
        Ok(db)
    }
}

impl<C: Connection> RoutedDatabase<C> {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Opens one connection per endpoint through `connect`, concurrently.
    ///
    /// Index 0 of `endpoints` becomes the primary. Fails if the list is empty
    /// or any endpoint fails to open.
    pub async fn open<'a, F, Fut>(endpoints: &'a [String], connect: F) -> DbResult<Self>
    where
        F: Fn(&'a str) -> Fut,
        Fut: Future<Output = DbResult<C>>,
    {
        if endpoints.is_empty() {
            return Err(DbError::InvalidConfig(
                "at least one endpoint (the primary) is required".into(),
            ));
        }

        info!(endpoints = endpoints.len(), "Opening database endpoints");
        let connections = scatter(endpoints.len(), move |i| connect(endpoints[i].as_str())).await?;
        Self::from_connections(connections)
    }

    /// Builds a database from already-opened connections, primary first.
    pub fn from_connections(connections: Vec<C>) -> DbResult<Self> {
        if connections.is_empty() {
            return Err(DbError::InvalidConfig(
                "at least one connection (the primary) is required".into(),
            ));
        }

        info!(
            replicas = connections.len() - 1,
            "Routing database ready"
        );

        Ok(RoutedDatabase {
            inner: Arc::new(DbInner {
                connections,
                rotator: ReplicaRotator::new(),
                limits: RwLock::new(PoolLimits::default()),
            }),
        })
    }

    // =========================================================================
    // Connection Set
    // =========================================================================

    /// Number of endpoints, primary included.
    pub fn len(&self) -> usize {
        self.inner.connections.len()
    }

    /// Always false; a database has at least its primary.
    pub fn is_empty(&self) -> bool {
        self.inner.connections.is_empty()
    }

    pub fn replica_count(&self) -> usize {
        self.len() - 1
    }

    /// The primary connection.
    pub fn primary(&self) -> &C {
        &self.inner.connections[0]
    }

    /// The next replica in rotation, or the primary when there are none.
    pub fn read_replica(&self) -> &C {
        &self.inner.connections[self.replica_index()]
    }

    pub(crate) fn replica_index(&self) -> usize {
        self.inner.rotator.next_index(self.len())
    }

    /// Picks the connection a read in `scope` goes to.
    fn route_read(&self, scope: &RequestScope) -> &C {
        let index = if scope.is_modified() {
            0
        } else {
            self.replica_index()
        };
        debug!(index, modified = scope.is_modified(), "Routing read");
        &self.inner.connections[index]
    }

    // =========================================================================
    // Administrative Fan-Out
    // =========================================================================

    /// Pings every endpoint concurrently.
    pub async fn ping(&self, scope: &RequestScope) -> DbResult<()> {
        let conns = &self.inner.connections;
        scatter(conns.len(), |i| scope.bound(conns[i].ping())).await?;
        Ok(())
    }

    /// Closes every endpoint concurrently. All are attempted even if one fails.
    pub async fn close(&self) -> DbResult<()> {
        info!("Closing database endpoints");
        let conns = &self.inner.connections;
        scatter(conns.len(), |i| conns[i].close()).await?;
        Ok(())
    }

    /// Applies `limits` to every endpoint.
    ///
    /// Invalid limits are rejected before any endpoint is touched.
    pub fn set_pool_limits(&self, limits: PoolLimits) -> DbResult<()> {
        limits.validate()?;
        for conn in &self.inner.connections {
            conn.set_pool_limits(&limits);
        }
        info!(
            max_connections = limits.max_connections,
            min_connections = limits.min_connections,
            "Pool limits applied"
        );
        *self.limits_mut() = limits;
        Ok(())
    }

    /// The limits most recently applied.
    pub fn pool_limits(&self) -> PoolLimits {
        self.inner
            .limits
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set_max_connections(&self, max: u32) -> DbResult<()> {
        let mut limits = self.pool_limits();
        limits.max_connections = max;
        self.set_pool_limits(limits)
    }

    pub fn set_min_connections(&self, min: u32) -> DbResult<()> {
        let mut limits = self.pool_limits();
        limits.min_connections = min;
        self.set_pool_limits(limits)
    }

    pub fn set_idle_timeout(&self, timeout: Option<Duration>) -> DbResult<()> {
        let mut limits = self.pool_limits();
        limits.idle_timeout_secs = timeout.map(|d| d.as_secs());
        self.set_pool_limits(limits)
    }

    pub fn set_max_lifetime(&self, lifetime: Option<Duration>) -> DbResult<()> {
        let mut limits = self.pool_limits();
        limits.max_lifetime_secs = lifetime.map(|d| d.as_secs());
        self.set_pool_limits(limits)
    }

    fn limits_mut(&self) -> std::sync::RwLockWriteGuard<'_, PoolLimits> {
        self.inner
            .limits
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // =========================================================================
    // Routed Operations
    // =========================================================================

    /// Runs a write on the primary and marks `scope` modified.
    ///
    /// The scope is marked before the write is issued, so it stays pinned to
    /// the primary even if the write fails or is cancelled.
    pub async fn execute(
        &self,
        scope: &RequestScope,
        sql: &str,
        args: &[Value],
    ) -> DbResult<ExecResult> {
        scope.mark_modified();
        debug!(sql, "Routing write to primary");
        scope
            .bound(self.primary().execute(sql, args))
            .await
            .map_err(|e| e.during(Operation::Write))
    }

    /// Runs a read on a replica, or on the primary once `scope` is marked.
    pub async fn query(
        &self,
        scope: &RequestScope,
        sql: &str,
        args: &[Value],
    ) -> DbResult<Vec<Row>> {
        let conn = self.route_read(scope);
        scope
            .bound(conn.query(sql, args))
            .await
            .map_err(|e| e.during(Operation::Read))
    }

    /// Runs a read and returns its first row, if any.
    pub async fn query_row(
        &self,
        scope: &RequestScope,
        sql: &str,
        args: &[Value],
    ) -> DbResult<Option<Row>> {
        Ok(self.query(scope, sql, args).await?.into_iter().next())
    }

    /// Opens a transaction on the primary.
    ///
    /// `scope` is marked before the transaction is opened.
    pub async fn begin(&self, scope: &RequestScope) -> DbResult<RoutedTransaction<C>> {
        scope.mark_modified();
        debug!("Opening transaction on primary");
        let tx = scope.bound(self.primary().begin()).await?;
        Ok(RoutedTransaction::new(tx, scope.clone()))
    }

    /// Prepares `sql` for repeated use with the same routing as this handle.
    ///
    /// If `scope` is already marked, only the primary prepares it. Otherwise
    /// every endpoint does.
    pub async fn prepare(&self, scope: &RequestScope, sql: &str) -> DbResult<RoutedStatement<C>> {
        RoutedStatement::prepare(self.clone(), scope, sql).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
