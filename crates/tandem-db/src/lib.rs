//! # tandem-db: Consistency-Aware Routing Database
//!
//! One database handle over a primary and N replicas. Writes go to the
//! primary, reads are spread across replicas, and a request that has written
//! reads from the primary for the rest of its life.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tandem Data Flow                                 │
//! │                                                                         │
//! │  Handler / service (one RequestScope per inbound request)              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    tandem-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────┐   ┌────────────────┐   ┌────────────────┐   │   │
//! │  │   │ Repositories │──►│ RoutedDatabase │──►│   Connection   │   │   │
//! │  │   │ Country      │   │ scope routing  │   │  (SQLite/sqlx) │   │   │
//! │  │   │ City, User   │   │ scatter, rota- │   │  one per       │   │   │
//! │  │   │              │   │ tion, tx, stmt │   │  endpoint      │   │   │
//! │  │   └──────────────┘   └────────────────┘   └────────────────┘   │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌──────────┐   ┌──────────┐   ┌──────────┐                           │
//! │  │ primary  │   │ replica  │   │ replica  │                           │
//! │  └──────────┘   └──────────┘   └──────────┘                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`database`] - The routing handle
//! - [`scope`] - Per-request consistency marker and deadline
//! - [`statement`] - Routed prepared statements
//! - [`transaction`] - Transactions and the unit-of-work helper
//! - [`scatter`] - Concurrent fan-out
//! - [`rotation`] - Replica round-robin
//! - [`connection`] - The single-endpoint trait seam
//! - [`sqlite`] - SQLite endpoint over sqlx
//! - [`config`] - Endpoint list and pool limits
//! - [`value`] - Arguments, rows, results
//! - [`error`] - Database error types
//! - [`repository`] - Country, city and user repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tandem_db::{Database, DbConfig, RequestScope};
//!
//! let config = DbConfig::from_dsn_list("sqlite://p.db;sqlite://r1.db;sqlite://r2.db")?;
//! let db = Database::connect(&config).await?;
//!
//! let scope = RequestScope::new();
//! let peru = db.countries().insert(&scope, "Peru").await?;
//! let same = db.countries().get_by_id(&scope, peru.country_id).await?; // primary
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod connection;
pub mod database;
pub mod error;
pub mod repository;
pub mod rotation;
pub mod scatter;
pub mod scope;
pub mod sqlite;
pub mod statement;
pub mod transaction;
pub mod value;

#[cfg(test)]
pub(crate) mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{DbConfig, PoolLimits};
pub use database::{Database, RoutedDatabase};
pub use error::{DbError, DbResult, Operation};
pub use scope::{RequestScope, RECORD_MODIFIED_HEADER};
pub use statement::RoutedStatement;
pub use transaction::{RoutedTransaction, UnitOfWork};
pub use value::{ExecResult, Row, Value};

// Repository re-exports for convenience
pub use repository::{CityRepository, CountryRepository, UserRepository};
