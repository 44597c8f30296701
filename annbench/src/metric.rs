use std::fmt::Debug;
use std::time::Duration;

use serde::{Serialize, de::DeserializeOwned};

use crate::macros::metric;

/// A single observed measurement produced by one dispatched query.
///
/// Metrics are collected by an [`crate::Aggregate`] and turned into derived
/// statistics ([`crate::Results`]).
///
/// ## Example
/// ```rust
/// use annbench::{Metric, macros::metric};
/// use std::time::Duration;
///
/// #[metric]
/// struct ServerTime {
///     took: Duration,
/// }
/// ```
pub trait Metric
where
    Self: Serialize + DeserializeOwned + PartialOrd + PartialEq + Send + Sync + Debug + Clone,
{
}

/// Outcome of one query, created exactly once by the worker that ran it.
///
/// `latency` covers the whole generate + transmit cycle, including failed and
/// timed-out attempts. `recall` is `None` when the query carried no ground truth;
/// a failed query that did carry ground truth scores `Some(0.0)`.
#[metric]
pub struct QueryOutcome {
    pub index: usize,
    pub latency: Duration,
    pub success: bool,
    pub recall: Option<f64>,
}

impl QueryOutcome {
    pub fn succeeded(index: usize, latency: Duration, recall: Option<f64>) -> Self {
        Self {
            index,
            latency,
            success: true,
            recall,
        }
    }

    pub fn failed(index: usize, latency: Duration) -> Self {
        Self {
            index,
            latency,
            success: false,
            recall: None,
        }
    }

    pub fn with_recall(mut self, recall: Option<f64>) -> Self {
        self.recall = recall;
        self
    }
}
