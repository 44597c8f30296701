use typed_builder::TypedBuilder;

use crate::config::Config;
use crate::error::BenchError;
use crate::executor::{Execution, Executor, PoolExecutor};
use crate::query::QueryDescriptor;
use crate::report::Results;
use crate::transmit::Transmitter;

/// Builds the query for a 0-based index.
///
/// Called concurrently from every worker with distinct indices. Ground-truth
/// workloads must be deterministic in the index; random workloads may ignore it.
pub trait Generator: Fn(usize) -> QueryDescriptor + Send + Sync + Clone + 'static {}

impl<F> Generator for F where F: Fn(usize) -> QueryDescriptor + Send + Sync + Clone + 'static {}

/// Glue for one benchmark: the run parameters, how queries are built and how they
/// are sent.
#[derive(Clone, Debug, TypedBuilder)]
pub struct Scenario<G, T> {
    #[builder(setter(into))]
    pub name: String,
    pub config: Config,
    pub generator: G,
    pub transmitter: T,
}

impl<G, T> Scenario<G, T>
where
    G: Generator,
    T: Transmitter,
{
    /// Validate the config, run it on a [`PoolExecutor`] and aggregate.
    pub async fn run(&self) -> Result<Results, BenchError> {
        Ok(self
            .execute()
            .await?
            .results()
            .with_run_context(&self.config))
    }

    /// Like [`Scenario::run`] but hands back the raw outcomes.
    pub async fn execute(&self) -> Result<Execution, BenchError> {
        self.config.validate()?;
        PoolExecutor::from_config(&self.config).exec(self).await
    }

    /// Validate the config and run on a caller-supplied executor.
    pub async fn run_with<E: Executor>(&self, executor: &E) -> Result<Results, BenchError> {
        self.config.validate()?;
        Ok(executor
            .exec(self)
            .await?
            .results()
            .with_run_context(&self.config))
    }
}
