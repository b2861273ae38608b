//! Bounded concurrent execution
//!
//! Runs independent asynchronous units with a fixed concurrency ceiling.
//! Used by the reasoning engine's decomposition fan-out and by the
//! orchestrator's parallel pipeline.

use std::future::Future;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::Semaphore;

use crate::error::MetisError;

/// Executes batches of futures with at most `limit` in flight.
///
/// Guarantees: every unit runs to completion regardless of its siblings,
/// and results come back in input order regardless of completion order.
/// The semaphore gates admission only; units share no result state.
#[derive(Debug, Clone)]
pub struct BoundedExecutor {
    limit: usize,
}

impl BoundedExecutor {
    /// Create an executor. A zero limit is a configuration error.
    pub fn new(limit: usize) -> Result<Self, MetisError> {
        if limit == 0 {
            return Err(MetisError::Config(
                "concurrency limit must be at least 1".to_string(),
            ));
        }
        Ok(Self { limit })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Run all units, returning one result per unit in input order.
    pub async fn run_all<T, F>(&self, units: Vec<F>) -> Vec<T>
    where
        F: Future<Output = T> + Send,
        T: Send,
    {
        let semaphore = Arc::new(Semaphore::new(self.limit));
        let gated = units.into_iter().map(|unit| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                // Never closed while we hold the Arc; ok() keeps this panic-free.
                let _permit = semaphore.acquire().await.ok();
                unit.await
            }
        });
        join_all(gated).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_zero_limit_rejected() {
        assert!(matches!(
            BoundedExecutor::new(0),
            Err(MetisError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_results_preserve_input_order() {
        let executor = BoundedExecutor::new(4).unwrap();
        // Later units finish first; order must still match the input.
        let units: Vec<_> = (0..6u64)
            .map(|i| async move {
                tokio::time::sleep(Duration::from_millis(60 - i * 10)).await;
                i
            })
            .collect();
        let results = executor.run_all(units).await;
        assert_eq!(results, vec![0, 1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_concurrency_ceiling_respected() {
        let limit = 2;
        let executor = BoundedExecutor::new(limit).unwrap();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let units: Vec<_> = (0..8)
            .map(|_| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                }
            })
            .collect();

        executor.run_all(units).await;
        assert!(peak.load(Ordering::SeqCst) <= limit);
    }

    #[tokio::test]
    async fn test_failures_do_not_abort_siblings() {
        let executor = BoundedExecutor::new(2).unwrap();
        let units: Vec<_> = (0..4)
            .map(|i| async move {
                if i % 2 == 0 {
                    Err::<u32, _>(format!("unit {} failed", i))
                } else {
                    Ok(i)
                }
            })
            .collect();
        let results = executor.run_all(units).await;
        assert_eq!(results.len(), 4);
        assert!(results[0].is_err());
        assert_eq!(results[1], Ok(1));
        assert!(results[2].is_err());
        assert_eq!(results[3], Ok(3));
    }
}
