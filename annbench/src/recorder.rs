use std::sync::Arc;

use tokio::sync::Mutex;

use crate::metric::QueryOutcome;

/// Shared, append-only sink for [`QueryOutcome`]s.
///
/// Workers call [`OutcomeRecorder::record`] concurrently while the run is going;
/// [`OutcomeRecorder::drain`] is meant to be called once after every worker has
/// been joined. Clones share the same buffer.
#[derive(Clone, Debug, Default)]
pub struct OutcomeRecorder {
    outcomes: Arc<Mutex<Vec<QueryOutcome>>>,
}

impl OutcomeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(Vec::with_capacity(capacity))),
        }
    }

    pub async fn record(&self, outcome: QueryOutcome) {
        self.outcomes.lock().await.push(outcome);
    }

    /// Take every recorded outcome, sorted by query index.
    pub async fn drain(&self) -> Vec<QueryOutcome> {
        let mut outcomes = std::mem::take(&mut *self.outcomes.lock().await);
        outcomes.sort_by_key(|o| o.index);
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_are_all_kept() {
        let recorder = OutcomeRecorder::new();
        let handles: Vec<_> = (0..64)
            .map(|i| {
                let recorder = recorder.clone();
                tokio::spawn(async move {
                    recorder
                        .record(QueryOutcome::succeeded(i, Duration::from_millis(1), None))
                        .await;
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let drained = recorder.drain().await;
        let indices: Vec<usize> = drained.iter().map(|o| o.index).collect();
        assert_eq!(indices, (0..64).collect::<Vec<_>>());
        assert!(recorder.drain().await.is_empty());
    }
}
