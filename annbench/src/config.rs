use std::{fmt, path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::error::ConfigError;

/// Wire protocol used to reach the search service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Api {
    #[default]
    Graphql,
    Rest,
    Grpc,
}

impl fmt::Display for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Api::Graphql => "graphql",
            Api::Rest => "rest",
            Api::Grpc => "grpc",
        };
        f.write_str(name)
    }
}

/// Immutable run parameters.
///
/// Build one with [`Config::builder`] or load it from TOML, then call
/// [`Config::validate`]. [`crate::Scenario::run`] validates again before spawning
/// anything, so an invalid config never reaches the worker pool.
///
/// ```toml
/// queries = 1000
/// parallel = 16
/// limit = 10
/// api = "grpc"
/// origin = "localhost:50051"
/// class_name = "Vector"
/// query_timeout = 2.5
/// rate = 500.0
/// ```
#[derive(Clone, Debug, PartialEq, TypedBuilder, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of queries to dispatch.
    #[builder(default = 100)]
    pub queries: usize,
    /// Number of concurrent workers.
    #[builder(default = 8)]
    pub parallel: usize,
    /// Top-k requested per query.
    #[builder(default = 10)]
    pub limit: usize,
    #[builder(default = String::from("http://localhost:8080"), setter(into))]
    pub origin: String,
    #[builder(default)]
    pub api: Api,
    #[builder(default = String::from("Vector"), setter(into))]
    pub class_name: String,
    /// Vector dimensionality for random-vector workloads.
    #[builder(default = 768)]
    pub dimensions: usize,
    /// Raw GraphQL `where` clause, without the surrounding braces.
    #[builder(default, setter(strip_option, into))]
    pub where_filter: Option<String>,
    #[builder(default, setter(strip_option, into))]
    pub tenant: Option<String>,
    /// Upper bound for one transmit call.
    #[builder(default = Duration::from_secs(30))]
    #[serde(with = "seconds")]
    pub query_timeout: Duration,
    /// Target queries per second. `None` dispatches as fast as the workers allow.
    #[builder(default, setter(strip_option))]
    pub rate: Option<f64>,
}

impl Default for Config {
    fn default() -> Self {
        Config::builder().build()
    }
}

impl Config {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Check every parameter combination. Nothing is started here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parallel < 1 {
            return Err(ConfigError::Parallelism(self.parallel));
        }
        if self.limit < 1 {
            return Err(ConfigError::ZeroLimit);
        }
        if self.dimensions < 1 {
            return Err(ConfigError::ZeroDimensions);
        }
        if self.class_name.trim().is_empty() {
            return Err(ConfigError::MissingClassName);
        }
        if self.origin.trim().is_empty() {
            return Err(ConfigError::MissingOrigin);
        }
        if self.query_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if let Some(rate) = self.rate {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(ConfigError::InvalidRate(rate));
            }
        }
        if self.where_filter.is_some() && self.api != Api::Graphql {
            return Err(ConfigError::Unsupported {
                api: self.api,
                parameter: "a where filter",
            });
        }
        if self.tenant.is_some() && self.api != Api::Grpc {
            return Err(ConfigError::Unsupported {
                api: self.api,
                parameter: "a tenant",
            });
        }
        Ok(())
    }
}

/// Durations travel as fractional seconds in config files.
mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}
