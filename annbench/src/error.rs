use thiserror::Error;
use tokio::task::JoinError;

use crate::config::Api;

/// Rejections raised while validating a [`crate::Config`], before any worker starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parallel must be at least 1, got {0}")]
    Parallelism(usize),
    #[error("limit must be at least 1")]
    ZeroLimit,
    #[error("dimensions must be at least 1")]
    ZeroDimensions,
    #[error("class name must not be empty")]
    MissingClassName,
    #[error("origin must not be empty")]
    MissingOrigin,
    #[error("query timeout must be greater than zero")]
    ZeroTimeout,
    #[error("rate must be a finite number above zero, got {0}")]
    InvalidRate(f64),
    #[error("the {api} api does not support {parameter}")]
    Unsupported { api: Api, parameter: &'static str },
    #[error("ground truth has {queries} queries but {neighbors} neighbor sets")]
    GroundTruthMismatch { queries: usize, neighbors: usize },
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Failure of a single request. The pool turns these into failed outcomes,
/// they never abort a run.
#[derive(Debug, Clone, Error)]
pub enum TransmitError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("service answered with status {0}")]
    Status(u16),
    #[error("could not decode response: {0}")]
    Decode(String),
}

/// Errors that abort a whole benchmark run.
#[derive(Debug, Error)]
pub enum BenchError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("worker task failed: {0}")]
    Worker(#[from] JoinError),
    #[error("expected {expected} outcomes, recorded {recorded}")]
    IncompleteRun { expected: usize, recorded: usize },
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("could not format results: {0}")]
    Format(#[from] std::fmt::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
