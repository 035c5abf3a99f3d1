//! # Scatter (Fan-Out)
//!
//! Runs one operation against every member of a connection set and joins on all
//! of them.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          scatter(n, f)                                  │
//! │                                                                         │
//! │       f(0) ──► primary   ─┐                                            │
//! │       f(1) ──► replica 1 ─┼──► join ALL ──► Ok(vec) or first Err       │
//! │       f(2) ──► replica 2 ─┘     (no short-circuit)                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every task is attempted and awaited even when a sibling fails. The caller
//! gets exactly one error (the lowest failing index) and cannot tell which
//! members failed; work already applied on members that succeeded is not
//! undone.

use std::future::Future;

use futures_util::future::join_all;
use tracing::warn;

use crate::error::DbResult;

/// Invokes `f(i)` for every `i` in `0..n` concurrently and waits for all of them.
///
/// Returns the per-index results in order, or the first error by index.
///
/// ## Example
/// ```rust,ignore
/// let squares = scatter(4, |i| async move { Ok(i * i) }).await?;
/// assert_eq!(squares, vec![0, 1, 4, 9]);
/// ```
pub async fn scatter<T, F, Fut>(n: usize, f: F) -> DbResult<Vec<T>>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    let results = join_all((0..n).map(&f)).await;

    let mut values = Vec::with_capacity(n);
    let mut first_error = None;

    for (index, result) in results.into_iter().enumerate() {
        match result {
            Ok(value) => values.push(value),
            Err(err) => {
                warn!(index, error = %err, "Scatter member failed");
                first_error.get_or_insert(err);
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(values),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
