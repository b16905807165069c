//! Best-effort cleanup
//!
//! Teardown must try every item and must never fail the run: one record
//! that refuses to go away cannot be allowed to hide the others or mask the
//! real test results. [`attempt_all`] runs every operation, records each
//! failure, and returns a report instead of an error.

use futures::future::join_all;
use std::fmt::Display;
use std::future::Future;
use tracing::{debug, warn};

/// One item that could not be cleaned up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupFailure {
    pub item: String,
    pub reason: String,
}

/// Outcome of a cleanup pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub attempted: usize,
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    pub fn succeeded(&self) -> usize {
        self.attempted - self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Record a single operation's outcome
    pub fn record<E: Display>(&mut self, item: impl Into<String>, outcome: Result<(), E>) {
        self.attempted += 1;
        let item = item.into();
        match outcome {
            Ok(()) => debug!(item = %item, "Cleaned up"),
            Err(e) => {
                warn!(item = %item, error = %e, "Cleanup failed; continuing");
                self.failures.push(CleanupFailure {
                    item,
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: CleanupReport) {
        self.attempted += other.attempted;
        self.failures.extend(other.failures);
    }
}

/// Run `op` for every item concurrently and collect failures.
///
/// Never returns an error; inspect the report instead.
pub async fn attempt_all<I, K, F, Fut, E>(items: I, op: F) -> CleanupReport
where
    I: IntoIterator<Item = K>,
    K: Display,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    let pending = items.into_iter().map(|item| {
        let label = item.to_string();
        let fut = op(item);
        async move { (label, fut.await) }
    });

    let mut report = CleanupReport::default();
    for (label, outcome) in join_all(pending).await {
        report.record(label, outcome);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::BTreeSet;

    #[tokio::test]
    async fn test_failures_do_not_stop_remaining_items() {
        let seen = Mutex::new(BTreeSet::new());

        let report = attempt_all(["a", "b", "c", "d"], |id| {
            seen.lock().insert(id.to_string());
            async move {
                if id == "b" || id == "d" {
                    Err(format!("{id} is locked"))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert_eq!(seen.lock().len(), 4);
        assert_eq!(report.attempted, 4);
        assert_eq!(report.succeeded(), 2);
        assert!(!report.is_clean());

        let failed: Vec<_> = report.failures.iter().map(|f| f.item.as_str()).collect();
        assert_eq!(failed, vec!["b", "d"]);
        assert_eq!(report.failures[0].reason, "b is locked");
    }

    #[tokio::test]
    async fn test_empty_input_is_clean() {
        let report = attempt_all(Vec::<String>::new(), |_| async { Ok::<(), String>(()) }).await;
        assert_eq!(report, CleanupReport::default());
        assert!(report.is_clean());
    }

    #[test]
    fn test_merge_accumulates() {
        let mut report = CleanupReport::default();
        report.record("perk-1", Ok::<(), String>(()));

        let mut other = CleanupReport::default();
        other.record("user@example.com", Err::<(), _>("connection reset"));

        report.merge(other);
        assert_eq!(report.attempted, 2);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failures[0].item, "user@example.com");
    }
}
