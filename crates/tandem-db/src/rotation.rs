//! # Replica Rotation
//!
//! Round-robin selection of a read replica, lock-free.
//!
//! ```text
//! n = 4 (primary + 3 replicas)
//!
//!   counter:  1  2  3  4  5  6  7 ...
//!   index:    2  3  1  2  3  1  2 ...   = 1 + (counter mod 3)
//! ```
//!
//! The counter belongs to one database instance. It may wrap; only the
//! remainder matters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Replica index generator shared by every caller of one database.
#[derive(Debug, Default)]
pub struct ReplicaRotator {
    counter: AtomicU64,
}

impl ReplicaRotator {
    pub fn new() -> Self {
        ReplicaRotator::default()
    }

    /// Returns the next index to read from in a set of `n` connections.
    ///
    /// With `n <= 1` the primary (index 0) is the only option. Otherwise the
    /// result is always in `1..n`, never the primary.
    pub fn next_index(&self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        let ticket = self.counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
        1 + (ticket % (n as u64 - 1)) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_single_connection_always_primary() {
        let rotator = ReplicaRotator::new();
        for _ in 0..10 {
            assert_eq!(rotator.next_index(1), 0);
            assert_eq!(rotator.next_index(0), 0);
        }
    }

    #[test]
    fn test_each_window_visits_every_replica_once() {
        for n in 2..=6 {
            let rotator = ReplicaRotator::new();
            // Skip an arbitrary prefix; any window of n-1 calls must be a permutation
            for _ in 0..(n * 3 + 1) {
                rotator.next_index(n);
            }
            let window: Vec<usize> = (0..n - 1).map(|_| rotator.next_index(n)).collect();
            let distinct: HashSet<usize> = window.iter().copied().collect();
            assert_eq!(distinct.len(), n - 1, "n = {}", n);
            assert!(window.iter().all(|&i| (1..n).contains(&i)));
        }
    }

    #[test]
    fn test_counter_wraps_without_leaving_range() {
        let rotator = ReplicaRotator {
            counter: AtomicU64::new(u64::MAX - 1),
        };
        for _ in 0..4 {
            let index = rotator.next_index(3);
            assert!((1..3).contains(&index));
        }
    }

    #[test]
    fn test_concurrent_calls_spread_evenly() {
        let rotator = Arc::new(ReplicaRotator::new());
        let n = 4;
        let per_thread = 300;

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let rotator = Arc::clone(&rotator);
                std::thread::spawn(move || {
                    (0..per_thread)
                        .map(|_| rotator.next_index(n))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut counts = [0usize; 4];
        for handle in handles {
            for index in handle.join().unwrap() {
                counts[index] += 1;
            }
        }

        assert_eq!(counts[0], 0);
        // 1200 calls over 3 replicas, one atomic ticket each
        assert_eq!(counts[1..].iter().sum::<usize>(), 1200);
        assert!(counts[1..].iter().all(|&c| c == 400));
    }
}
