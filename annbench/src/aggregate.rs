use std::fmt::Debug;
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};

use crate::Metric;
use crate::macros::aggregate;
use crate::metric::QueryOutcome;
use crate::report::Results;

/// Collects raw [`Metric`] values into an intermediate representation.
///
/// Aggregates keep the information needed for later analysis (counts, sums, raw
/// samples). Final statistics such as means and percentiles are derived from the
/// aggregate once the run is over, see [`Results`].
///
/// # Example
/// ```rust
/// use annbench::{Aggregate, QueryOutcome, macros::aggregate};
///
/// #[aggregate]
/// struct Failures {
///     failed: u64,
/// }
///
/// impl Aggregate for Failures {
///     type Metric = QueryOutcome;
///
///     fn new() -> Self {
///         Self::default()
///     }
///
///     fn consume(&mut self, metric: &Self::Metric) {
///         self.failed += u64::from(!metric.success);
///     }
/// }
/// ```
pub trait Aggregate
where
    Self: Serialize + DeserializeOwned + PartialOrd + PartialEq + Send + Sync + Debug + Clone,
{
    /// The metric type this aggregate summarizes.
    type Metric: Metric;

    /// Create a new, empty instance of the aggregate.
    fn new() -> Self;

    /// Calls [`Aggregate::consume`] for each metric.
    fn aggregate(&mut self, metrics: &[Self::Metric]) {
        metrics.iter().for_each(|m| self.consume(m));
    }

    /// Incorporate a single metric into the aggregate.
    fn consume(&mut self, metric: &Self::Metric);
}

/// Raw material for [`Results`]: every latency and every recall sample.
///
/// Samples are kept unsorted; [`Results`] sorts them, so the derived statistics do
/// not depend on the order in which workers recorded outcomes.
#[aggregate]
pub struct OutcomeAggregate {
    pub count: usize,
    pub failed: usize,
    pub latencies: Vec<Duration>,
    /// One entry per outcome that carried ground truth.
    pub recalls: Vec<f64>,
    /// Wall-clock time from first dispatch to the last worker joining.
    pub elapsed: Duration,
}

impl Aggregate for OutcomeAggregate {
    type Metric = QueryOutcome;

    fn new() -> Self {
        OutcomeAggregate::default()
    }

    fn consume(&mut self, metric: &Self::Metric) {
        self.count += 1;
        self.failed += if metric.success { 0 } else { 1 };
        self.latencies.push(metric.latency);
        if let Some(recall) = metric.recall {
            self.recalls.push(recall);
        }
    }
}

/// Reduce recorded outcomes of a run that took `run_duration` into [`Results`].
pub fn aggregate(outcomes: &[QueryOutcome], run_duration: Duration) -> Results {
    let mut agg = OutcomeAggregate::new();
    agg.aggregate(outcomes);
    agg.elapsed = run_duration;
    Results::from(agg)
}
