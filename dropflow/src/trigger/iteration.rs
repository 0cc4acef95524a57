//! Per-pipeline run counters.

use dashmap::DashMap;

/// Monotonic run counters keyed by pipeline tag (case-insensitive).
#[derive(Debug, Default)]
pub struct IterationStore {
    counters: DashMap<String, u64>,
}

impl IterationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments and returns the counter for `tag`. The first call yields 1.
    pub fn next(&self, tag: &str) -> u64 {
        let mut counter = self
            .counters
            .entry(tag.to_ascii_lowercase())
            .or_insert(0);
        *counter += 1;
        *counter
    }

    /// Last value handed out for `tag`, or 0 before the first run.
    #[must_use]
    pub fn current(&self, tag: &str) -> u64 {
        self.counters
            .get(&tag.to_ascii_lowercase())
            .map_or(0, |c| *c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    #[test]
    fn test_counts_per_tag() {
        let store = IterationStore::new();
        assert_eq!(store.current("orders"), 0);
        assert_eq!(store.next("orders"), 1);
        assert_eq!(store.next("ORDERS"), 2);
        assert_eq!(store.next("invoices"), 1);
        assert_eq!(store.current("Orders"), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_distinct() {
        let store = Arc::new(IterationStore::new());
        let tasks: Vec<_> = (0..200)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.next("orders") })
            })
            .collect();

        let mut seen = BTreeSet::new();
        for task in futures::future::join_all(tasks).await {
            assert!(seen.insert(task.unwrap()));
        }
        assert_eq!(seen, (1..=200).collect::<BTreeSet<u64>>());
    }
}
