//! Fixed-size batch scheduling with response reconciliation.
//!
//! Work items are sliced into consecutive chunks and handed to an async
//! worker one chunk at a time. Whatever the worker returns is reconciled to
//! the chunk's exact cardinality: excess results are truncated, missing ones
//! are backfilled from a per-stage fallback. A worker error is caught,
//! logged, and converted into fallbacks for that chunk only, so one bad
//! batch never aborts the run.

use std::future::Future;
use tracing::warn;

/// Drive `worker` over `items` in chunks of `batch_size`, concatenating the
/// reconciled chunk results in order. The output length always equals
/// `items.len()`.
///
/// # Panics
/// Panics if `batch_size` is zero (programming error).
pub async fn run_batches<T, R, W, Fut, F>(
    items: &[T],
    batch_size: usize,
    worker: W,
    fallback: F,
) -> Vec<R>
where
    T: Clone,
    W: Fn(Vec<T>) -> Fut,
    Fut: Future<Output = anyhow::Result<Vec<R>>>,
    F: Fn(&T) -> R,
{
    assert!(batch_size >= 1, "batch_size must be >= 1");

    let mut out = Vec::with_capacity(items.len());
    for chunk in items.chunks(batch_size) {
        let results = match worker(chunk.to_vec()).await {
            Ok(results) => results,
            Err(e) => {
                warn!("batch worker failed, substituting fallbacks: {e:#}");
                chunk.iter().map(&fallback).collect()
            }
        };
        out.extend(reconcile(chunk, results, &fallback));
    }
    out
}

/// Normalize a worker response to the expected cardinality.
pub fn reconcile<T, R>(expected: &[T], mut got: Vec<R>, fallback: impl Fn(&T) -> R) -> Vec<R> {
    if got.len() > expected.len() {
        warn!(
            "worker returned {} results for {} items, truncating",
            got.len(),
            expected.len()
        );
        got.truncate(expected.len());
    } else if got.len() < expected.len() {
        warn!(
            "worker returned {} results for {} items, backfilling",
            got.len(),
            expected.len()
        );
        for item in &expected[got.len()..] {
            got.push(fallback(item));
        }
    }
    got
}
