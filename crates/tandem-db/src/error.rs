//! # Database Error Types
//!
//! Error types for the routing database layer.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  Backend error (sqlx::Error / stub)                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← categorized: connection, query, transaction   │
//! │       │                                                                 │
//! │       ├── scatter (ping/close/open/prepare-all): first error by index  │
//! │       │                                                                 │
//! │       └── routed single target: wrapped as Execution { op, source }    │
//! │               op = read | write | prepare, never the endpoint index    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Repository / service caller                                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! There are no retries in this crate. Every failure is reported immediately.

use std::fmt;

use tandem_core::ValidationError;
use thiserror::Error;

/// The class of a routed single-target operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// A query, routed to a replica or to the primary once the scope is marked.
    Read,
    /// An insert/update/delete, always routed to the primary.
    Write,
    /// Statement preparation.
    Prepare,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Read => write!(f, "read"),
            Operation::Write => write!(f, "write"),
            Operation::Prepare => write!(f, "prepare"),
        }
    }
}

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    // =========================================================================
    // Connection Errors
    // =========================================================================
    /// Opening, pinging or closing a connection failed.
    ///
    /// ## When This Occurs
    /// - Endpoint unreachable or file not creatable
    /// - Pool already closed
    /// - Any member of a scatter (fan-out) failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    // =========================================================================
    // Statement Errors
    // =========================================================================
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Query execution failed inside the backend.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A routed operation failed on the connection it was sent to.
    #[error("{op} failed: {source}")]
    Execution {
        op: Operation,
        #[source]
        source: Box<DbError>,
    },

    /// A prepared statement was used after it was closed.
    #[error("Statement is closed")]
    StatementClosed,

    /// A column could not be decoded into the requested type.
    #[error("Decode failed: {0}")]
    Decode(String),

    // =========================================================================
    // Transaction Errors
    // =========================================================================
    /// Begin, commit or rollback failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// The unit of work failed and the rollback that followed failed too.
    ///
    /// `cause` is the original failure and is what `source()` reports.
    #[error("{cause} (rollback also failed: {rollback})")]
    RollbackFailed {
        #[source]
        cause: Box<DbError>,
        rollback: Box<DbError>,
    },

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Malformed configuration (e.g. empty endpoint list).
    #[error("Invalid database configuration: {0}")]
    InvalidConfig(String),

    /// Config file could not be read or parsed.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    // =========================================================================
    // Other
    // =========================================================================
    /// The request scope's deadline elapsed.
    #[error("Operation timed out")]
    Timeout,

    /// Entity validation failed before reaching the database.
    #[error("Validation error: {0}")]
    Invalid(#[from] ValidationError),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Wraps a backend failure with the class of operation that caused it.
    pub(crate) fn during(self, op: Operation) -> Self {
        match self {
            // Timeouts and closed statements are already specific enough
            DbError::Timeout | DbError::StatementClosed => self,
            other => DbError::Execution {
                op,
                source: Box::new(other),
            },
        }
    }

    /// Returns the operation class for routed failures.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            DbError::Execution { op, .. } => Some(*op),
            _ => None,
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::PoolClosed     → DbError::ConnectionFailed
/// sqlx::Error::Io / Tls       → DbError::ConnectionFailed
/// sqlx::Error::ColumnDecode   → DbError::Decode
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite constraint messages:
                // "UNIQUE constraint failed: <table>.<column>"
                // "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::Io(e) => DbError::ConnectionFailed(e.to_string()),

            sqlx::Error::Tls(e) => DbError::ConnectionFailed(e.to_string()),

            sqlx::Error::Configuration(e) => DbError::InvalidConfig(e.to_string()),

            sqlx::Error::ColumnDecode { index, source } => {
                DbError::Decode(format!("column {}: {}", index, source))
            }

            _ => DbError::Internal(err.to_string()),
        }
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================
