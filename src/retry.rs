//! Named retry policies for consistent backoff behavior.
//!
//! Retryable conditions in the core (`ResourceExhausted`,
//! `RebalanceInProgress`, `AssignmentConflict`) are expected to clear after
//! a short wait; these policies standardize that wait with the `backon`
//! crate instead of ad-hoc sleep loops.
//!
//! | Policy            | Min Delay | Max Delay | Retries | Use Case                |
//! |-------------------|-----------|-----------|---------|-------------------------|
//! | `producer_policy` | 10ms      | 1s        | 5       | full-partition produces |
//! | `commit_policy`   | 20ms      | 2s        | 8       | commits mid-rebalance   |
//! | `fast_policy`     | 5ms       | 100ms     | 3       | hot path retries        |
//!
//! All policies include jitter to prevent retry stampedes.
//!
//! # Example
//!
//! ```rust,no_run
//! use backon::Retryable;
//! use samsa::retry;
//!
//! async fn example() -> Result<(), std::io::Error> {
//!     let result = (|| async {
//!         // your fallible operation
//!         Ok::<_, std::io::Error>(())
//!     })
//!     .retry(retry::fast_policy())
//!     .when(|e| e.kind() == std::io::ErrorKind::TimedOut)
//!     .await?;
//!     Ok(result)
//! }
//! ```

use std::time::Duration;

use backon::ExponentialBuilder;

/// Policy for produce retries against a full partition.
///
/// Space only frees up when an operator raises the budget, so back off
/// generously and give up after five attempts rather than spinning.
pub fn producer_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(10))
        .with_max_delay(Duration::from_secs(1))
        .with_max_times(5)
        .with_jitter()
}

/// Policy for commit and sync retries during a group rebalance.
///
/// Rebalances settle once every member re-acknowledges, which can take a
/// few poll cycles; allow more attempts with a longer ceiling.
pub fn commit_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(20))
        .with_max_delay(Duration::from_secs(2))
        .with_max_times(8)
        .with_jitter()
}

/// Policy for hot path retries (minimal delay).
pub fn fast_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(5))
        .with_max_delay(Duration::from_millis(100))
        .with_max_times(3)
        .with_jitter()
}
