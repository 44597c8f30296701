//! Executor: how a [`Scenario`] actually runs.
//!
//! The built-in [`PoolExecutor`] spawns a fixed number of worker tasks that pull
//! query indices from a shared counter until all `config.queries` indices are
//! claimed, then joins them and hands back every outcome.
//!
//! # High-level flow
//! 1. If a target rate is configured, spawn a governor task feeding a token bucket.
//! 2. Spawn `parallelism` worker tasks. Each worker repeatedly:
//!    - claims the next index (`fetch_add` on a shared `AtomicUsize`), stopping
//!      once the counter passes the query count,
//!    - takes a token when pacing is on,
//!    - runs generate + transmit under the per-query timeout and records a
//!      [`QueryOutcome`] into the shared recorder.
//! 3. Join every worker, stop the governor, drain the recorder and check that the
//!    number of outcomes equals the query count.
//!
//! # Failure isolation
//! A failing, hanging or panicking query only ever produces a failed outcome.
//! Errors that escape an executor are pool-level: a worker task that could not be
//! joined, or an outcome count that does not add up.
pub mod pool;
pub mod rate;
pub use pool::PoolExecutor;

use std::future::Future;
use std::time::Duration;

use crate::aggregate::aggregate;
use crate::error::BenchError;
use crate::metric::QueryOutcome;
use crate::report::Results;
use crate::scenario::{Generator, Scenario};
use crate::transmit::Transmitter;

/// Everything a finished run produced, before aggregation.
#[derive(Clone, Debug, PartialEq)]
pub struct Execution {
    /// One outcome per query, sorted by index.
    pub outcomes: Vec<QueryOutcome>,
    /// Wall-clock time from first dispatch until every worker had joined.
    pub elapsed: Duration,
}

impl Execution {
    pub fn results(&self) -> Results {
        aggregate(&self.outcomes, self.elapsed)
    }
}

/// The runtime hook that executes a [`Scenario`].
pub trait Executor
where
    Self: Send + Sync + Sized,
{
    /// Run every query of the scenario and return the recorded outcomes.
    fn exec<G, T>(
        &self,
        scenario: &Scenario<G, T>,
    ) -> impl Future<Output = Result<Execution, BenchError>> + Send
    where
        G: Generator,
        T: Transmitter;
}
