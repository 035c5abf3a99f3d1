//! # Request Scope
//!
//! The per-request consistency marker, passed explicitly to every routed call.
//!
//! ## Read-Your-Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   One request, one marker                               │
//! │                                                                         │
//! │  RequestScope::new()            marker = unmodified                    │
//! │       │                                                                 │
//! │       ├── query(...)     ──────► replica (rotated)                     │
//! │       │                                                                 │
//! │       ├── execute(...)   ──────► primary, marker = modified            │
//! │       │                                                                 │
//! │       ├── query(...)     ──────► primary  (sees its own write)         │
//! │       │                                                                 │
//! │       └── child()        ──────► shares the marker, also primary       │
//! │                                                                         │
//! │  The marker only moves false → true. It is never reset.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lineage
//! Scopes derived with [`RequestScope::child`], [`RequestScope::with_timeout`]
//! or [`RequestScope::with_deadline`] share one marker with their parent. A
//! write through any member pins the whole lineage, including children derived
//! before the write. [`RequestScope::new`] always starts a fresh lineage.
//!
//! ## Deadlines
//! A scope may carry a deadline. Every network-bound call made with the scope
//! fails with [`DbError::Timeout`] once it elapses. Dropping a call's future
//! cancels it.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::{DbError, DbResult};

/// Inbound header that lets a client ask for primary reads from the start.
pub const RECORD_MODIFIED_HEADER: &str = "X-Record-Modified";

/// Shared write flag for one logical unit of work.
#[derive(Debug, Default)]
struct ConsistencyMarker {
    modified: AtomicBool,
}

/// Request-scoped routing state: the consistency marker plus an optional deadline.
///
/// Cloning a scope shares its marker.
#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    marker: Arc<ConsistencyMarker>,
    deadline: Option<Instant>,
}

impl RequestScope {
    /// Starts a fresh, unmodified scope for an inbound request.
    pub fn new() -> Self {
        RequestScope::default()
    }

    /// Starts a scope from the value of the [`RECORD_MODIFIED_HEADER`] header.
    ///
    /// A value of `on` starts the scope already marked, so every read goes to
    /// the primary.
    ///
    /// ```rust
    /// use tandem_db::RequestScope;
    ///
    /// assert!(RequestScope::from_header(Some("on")).is_modified());
    /// assert!(!RequestScope::from_header(Some("off")).is_modified());
    /// assert!(!RequestScope::from_header(None).is_modified());
    /// ```
    pub fn from_header(value: Option<&str>) -> Self {
        let scope = RequestScope::new();
        if value == Some("on") {
            scope.mark_modified();
        }
        scope
    }

    /// Derives a scope in the same lineage (shared marker, same deadline).
    pub fn child(&self) -> Self {
        self.clone()
    }

    /// Derives a scope in the same lineage that expires after `timeout`.
    ///
    /// An earlier deadline inherited from the parent is kept.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derives a scope in the same lineage that expires at `deadline`.
    ///
    /// An earlier deadline inherited from the parent is kept.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current <= deadline => current,
            _ => deadline,
        };
        RequestScope {
            marker: Arc::clone(&self.marker),
            deadline: Some(deadline),
        }
    }

    /// Records that a write happened in this lineage. Idempotent.
    pub fn mark_modified(&self) {
        self.marker.modified.store(true, Ordering::Release);
    }

    /// Returns true once any write has happened in this lineage.
    pub fn is_modified(&self) -> bool {
        self.marker.modified.load(Ordering::Acquire)
    }

    /// Returns the deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns true if `other` shares this scope's marker.
    pub fn same_lineage(&self, other: &RequestScope) -> bool {
        Arc::ptr_eq(&self.marker, &other.marker)
    }

    /// Runs a network-bound future under this scope's deadline.
    pub(crate) async fn bound<T, F>(&self, fut: F) -> DbResult<T>
    where
        F: Future<Output = DbResult<T>>,
    {
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fut)
                .await
                .map_err(|_| DbError::Timeout)?,
            None => fut.await,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
