//! annbench: load generation and result-quality measurement for nearest-neighbor
//! search services.
//!
//! Given a run configuration, a query generator and a transmitter, annbench sends
//! a fixed number of search requests through a bounded pool of concurrent workers,
//! times every request, scores recall against known neighbors when the query
//! carries them, and reduces everything into a statistical summary.
//!
//! The engine does not know any wire protocol. Callers (or the helpers in
//! [`workload`]) build opaque request payloads; a [`Transmitter`] puts them on the
//! wire and decodes the returned ids.
//!
//! # Architecture
//!
//! - [`Scenario`]: glue that ties a [`Config`], a [`Generator`] and a
//!   [`Transmitter`] together.
//! - [`Executor`]: runs the scenario. The built-in [`PoolExecutor`] spawns
//!   `config.parallel` workers that pull query indices from a shared counter.
//! - [`Metric`]: one sample; here a [`QueryOutcome`] per dispatched query.
//! - [`Aggregate`]: raw collector of metrics.
//! - [`Results`]: final statistics derived from an aggregate.
//! - [`Reporter`]: writes results somewhere (text or JSON).
//!
//! # Example
//!
//! ```rust,no_run
//! use annbench::{
//!     Config, QueryDescriptor, ResultId, TransmitError, Transmitter, report::OutputFormat,
//!     run_benchmark, workload::random_vectors,
//! };
//!
//! #[derive(Clone)]
//! struct Noop;
//!
//! impl Transmitter for Noop {
//!     async fn transmit(
//!         &self,
//!         _query: &QueryDescriptor,
//!         _endpoint: &str,
//!     ) -> Result<Vec<ResultId>, TransmitError> {
//!         Ok(Vec::new())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::builder().queries(1_000).parallel(16).dimensions(128).build();
//!     let results = run_benchmark(&config, random_vectors(&config), Noop).await?;
//!     annbench::report::write_results(&results, tokio::io::stdout(), OutputFormat::Text).await?;
//!     Ok(())
//! }
//! ```

/// Metric aggregators
pub mod aggregate;
/// Run parameters and their validation
pub mod config;
pub mod error;
/// Orchestrators that define how queries actually run
pub mod executor;
/// Single metrics
pub mod metric;
pub mod query;
pub mod recall;
pub mod recorder;
/// Reports and Reporters
pub mod report;
/// Main module of the framework that glues everything together
pub mod scenario;
pub mod transmit;
/// Query generators for random-vector and ground-truth modes
pub mod workload;

pub use aggregate::{Aggregate, OutcomeAggregate, aggregate};
pub use config::{Api, Config};
pub use error::{BenchError, ConfigError, ReportError, TransmitError};
pub use executor::{Execution, Executor, PoolExecutor};
pub use metric::{Metric, QueryOutcome};
pub use query::{QueryDescriptor, ResultId};
pub use recorder::OutcomeRecorder;
pub use report::{OutputFormat, Reporter, Results};
pub use scenario::{Generator, Scenario};
pub use transmit::Transmitter;
pub use workload::{GroundTruth, GrpcSearch, RequestBuilder};

/// Procedural macros to reduce boilerplate
pub mod macros {
    pub use annbench_macros::*;
}

/// Validate `config`, dispatch `config.queries` queries built by `generator` and
/// return the aggregated results.
///
/// Only configuration errors and pool-level failures are returned as errors;
/// individual failed queries show up in [`Results::failed`].
pub async fn run_benchmark<G, T>(
    config: &Config,
    generator: G,
    transmitter: T,
) -> Result<Results, BenchError>
where
    G: Generator,
    T: Transmitter,
{
    Scenario::builder()
        .name(format!("{} {}", config.api, config.class_name))
        .config(config.clone())
        .generator(generator)
        .transmitter(transmitter)
        .build()
        .run()
        .await
}

/// Run every query of `ground_truth` once and score recall against its neighbors.
///
/// The query count is taken from the ground truth; `config.queries` is ignored.
pub async fn run_ground_truth<T>(
    config: &Config,
    ground_truth: GroundTruth,
    transmitter: T,
) -> Result<Results, BenchError>
where
    T: Transmitter,
{
    let config = Config {
        queries: ground_truth.len(),
        ..config.clone()
    };
    config.validate()?;
    let generator = ground_truth.into_generator(RequestBuilder::from_config(&config));
    run_benchmark(&config, generator, transmitter).await
}
