use std::panic::AssertUnwindSafe;
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use futures::FutureExt;
use futures::future::join_all;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use typed_builder::TypedBuilder;

use super::rate::{bucket_capacity, token_governor_task};
use super::{Execution, Executor};
use crate::config::Config;
use crate::error::BenchError;
use crate::metric::QueryOutcome;
use crate::recall;
use crate::recorder::OutcomeRecorder;
use crate::scenario::{Generator, Scenario};
use crate::transmit::Transmitter;

/// Fixed-size pool of worker tasks that together dispatch exactly
/// `config.queries` queries.
///
/// - Workers pull work: each one claims the next index from a shared atomic
///   counter (`fetch_add`), so no index is handed out twice and a slow worker
///   simply claims fewer indices.
/// - Each transmit call is bounded by `query_timeout`. Timeouts, transport errors
///   and panics become failed outcomes; the run always completes.
/// - With `rate` set, a governor task paces dispatch through a token bucket
///   (see [`super::rate`]).
///
/// Run it on a multi-threaded Tokio runtime to get real parallelism.
#[derive(Clone, Debug, TypedBuilder)]
pub struct PoolExecutor {
    pub parallelism: usize,
    #[builder(default = Duration::from_secs(30))]
    pub query_timeout: Duration,
    #[builder(default, setter(strip_option))]
    pub rate: Option<f64>,
    #[builder(default = Duration::from_millis(50))]
    pub tick: Duration,
}

impl PoolExecutor {
    pub fn from_config(config: &Config) -> Self {
        Self {
            parallelism: config.parallel,
            query_timeout: config.query_timeout,
            rate: config.rate,
            tick: Duration::from_millis(50),
        }
    }
}

impl Executor for PoolExecutor {
    async fn exec<G, T>(&self, scenario: &Scenario<G, T>) -> Result<Execution, BenchError>
    where
        G: Generator,
        T: Transmitter,
    {
        let query_count = scenario.config.queries;
        let recorder = OutcomeRecorder::with_capacity(query_count);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let start = Instant::now();

        let (tokens, governor) = match self.rate {
            Some(rate) => {
                tracing::info!(rate, "Spawning token governor task...");
                let tokens = Arc::new(Semaphore::new(0));
                let capacity = bucket_capacity(rate, self.tick, self.parallelism);
                let governor = tokio::spawn(token_governor_task(
                    tokens.clone(),
                    rate,
                    self.tick,
                    capacity,
                    shutdown_rx,
                ));
                (Some(tokens), Some(governor))
            }
            None => (None, None),
        };

        let ctx = WorkerContext {
            next: Arc::new(AtomicUsize::new(0)),
            query_count,
            endpoint: Arc::from(scenario.config.origin.as_str()),
            query_timeout: self.query_timeout,
            tokens,
            recorder: recorder.clone(),
        };

        tracing::info!(
            workers = self.parallelism,
            queries = query_count,
            "Spawning workers..."
        );
        let handles = spawn_workers(
            ctx,
            self.parallelism,
            scenario.generator.clone(),
            scenario.transmitter.clone(),
        );
        let joined = join_all(handles).await;
        let elapsed = start.elapsed();

        // the receiver is gone when no governor was spawned
        let _ = shutdown_tx.send(true);
        if let Some(governor) = governor {
            governor.await?;
        }
        for handled in joined {
            let handled = handled?;
            tracing::debug!(handled, "worker finished");
        }

        tracing::info!("Collecting outcomes...");
        let outcomes = recorder.drain().await;
        if outcomes.len() != query_count {
            return Err(BenchError::IncompleteRun {
                expected: query_count,
                recorded: outcomes.len(),
            });
        }

        tracing::info!("Done running scenario: {}!", scenario.name);
        Ok(Execution { outcomes, elapsed })
    }
}

/// State shared by every worker of one run. Only `next` and `recorder` are
/// mutated during the run.
#[derive(Clone)]
pub struct WorkerContext {
    pub next: Arc<AtomicUsize>,
    pub query_count: usize,
    pub endpoint: Arc<str>,
    pub query_timeout: Duration,
    pub tokens: Option<Arc<Semaphore>>,
    pub recorder: OutcomeRecorder,
}

impl WorkerContext {
    /// Claim the next unclaimed index, or `None` once all are taken.
    pub fn claim(&self) -> Option<usize> {
        let index = self.next.fetch_add(1, Ordering::Relaxed);
        (index < self.query_count).then_some(index)
    }
}

/// Spawn `workers` Tokio tasks. Each returns how many queries it dispatched.
pub fn spawn_workers<G, T>(
    ctx: WorkerContext,
    workers: usize,
    generator: G,
    transmitter: T,
) -> Vec<JoinHandle<usize>>
where
    G: Generator,
    T: Transmitter,
{
    (0..workers)
        .map(|_| {
            let ctx = ctx.clone();
            let generator = generator.clone();
            let transmitter = transmitter.clone();
            tokio::spawn(async move {
                let mut handled = 0;
                while let Some(index) = ctx.claim() {
                    if let Some(tokens) = &ctx.tokens {
                        if let Ok(permit) = tokens.acquire().await {
                            permit.forget();
                        }
                    }
                    let outcome = dispatch(
                        index,
                        &generator,
                        &transmitter,
                        &ctx.endpoint,
                        ctx.query_timeout,
                    )
                    .await;
                    ctx.recorder.record(outcome).await;
                    handled += 1;
                }
                handled
            })
        })
        .collect()
}

/// Run one query: generate, transmit under `timeout`, score recall.
///
/// Never fails and never unwinds; every problem becomes a failed outcome whose
/// latency is the time spent until the problem surfaced.
pub async fn dispatch<G, T>(
    index: usize,
    generator: &G,
    transmitter: &T,
    endpoint: &str,
    timeout: Duration,
) -> QueryOutcome
where
    G: Generator,
    T: Transmitter,
{
    let start = Instant::now();

    let query = match std::panic::catch_unwind(AssertUnwindSafe(|| generator(index))) {
        Ok(query) => query,
        Err(_) => {
            tracing::warn!(index, "generator panicked");
            return QueryOutcome::failed(index, start.elapsed());
        }
    };

    // the synchronous part of `transmit` may panic too
    let call =
        AssertUnwindSafe(async { transmitter.transmit(&query, endpoint).await }).catch_unwind();
    let result = tokio::time::timeout(timeout, call).await;
    let latency = start.elapsed();

    match result {
        Ok(Ok(Ok(returned))) => {
            QueryOutcome::succeeded(index, latency, recall::score(&returned, &query.neighbors))
        }
        Ok(Ok(Err(error))) => {
            tracing::debug!(index, %error, "query failed");
            QueryOutcome::failed(index, latency).with_recall(recall::score(&[], &query.neighbors))
        }
        Ok(Err(_)) => {
            tracing::warn!(index, "transmitter panicked");
            QueryOutcome::failed(index, latency).with_recall(recall::score(&[], &query.neighbors))
        }
        Err(_) => {
            tracing::debug!(index, ?timeout, "query timed out");
            QueryOutcome::failed(index, latency).with_recall(recall::score(&[], &query.neighbors))
        }
    }
}
