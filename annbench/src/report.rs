use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::aggregate::OutcomeAggregate;
use crate::config::{Api, Config};
use crate::error::ReportError;

/// A [`Reporter`] consumes a report and writes it somewhere.
///
/// Reporters are the I/O boundary. They only read the report.
pub trait Reporter<R: Sync> {
    fn report(&mut self, report: &R) -> impl Future<Output = Result<(), ReportError>> + Send;
}

/// Percentiles use the nearest-rank method on latencies sorted ascending:
/// the value at rank `ceil(p * n)`, clamped to `1..=n`.
pub fn percentile(sorted: &[Duration], p: f64) -> Option<Duration> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (p * sorted.len() as f64).ceil() as usize;
    let index = rank.clamp(1, sorted.len()) - 1;
    Some(sorted[index])
}

/// Summary of one benchmark run.
///
/// Derived from an [`OutcomeAggregate`]: plain data, no I/O, deterministic for a
/// given set of outcomes. Presentation is the job of a [`Reporter`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Results {
    pub total: usize,
    pub failed: usize,
    pub run_duration: Duration,
    /// `total / run_duration`; zero when nothing ran.
    pub queries_per_second: f64,
    /// Mean over all outcomes, failed ones included. `None` for an empty run.
    pub mean_latency: Option<Duration>,
    pub min_latency: Option<Duration>,
    pub max_latency: Option<Duration>,
    pub p50_latency: Option<Duration>,
    pub p90_latency: Option<Duration>,
    pub p99_latency: Option<Duration>,
    /// Mean recall over outcomes that carried ground truth, `None` if none did.
    pub recall: Option<f64>,
    pub recall_samples: usize,
    /// Protocol the run used, once stamped by [`Results::with_run_context`].
    pub api: Option<Api>,
    /// Configured worker count, once stamped by [`Results::with_run_context`].
    pub parallelization: Option<usize>,
}

impl Results {
    /// Record which configuration produced these numbers.
    pub fn with_run_context(mut self, config: &Config) -> Self {
        self.api = Some(config.api);
        self.parallelization = Some(config.parallel);
        self
    }
}

impl From<OutcomeAggregate> for Results {
    fn from(value: OutcomeAggregate) -> Self {
        let mut latencies = value.latencies;
        latencies.sort_unstable();

        let mean_latency = if latencies.is_empty() {
            None
        } else {
            let sum: u128 = latencies.iter().map(Duration::as_nanos).sum();
            let mean = sum / latencies.len() as u128;
            Some(Duration::from_nanos(u64::try_from(mean).unwrap_or(u64::MAX)))
        };

        let mut recalls = value.recalls;
        recalls.sort_unstable_by(f64::total_cmp);
        let recall = if recalls.is_empty() {
            None
        } else {
            Some(recalls.iter().sum::<f64>() / recalls.len() as f64)
        };

        let secs = value.elapsed.as_secs_f64();
        let queries_per_second = if secs > 0.0 {
            value.count as f64 / secs
        } else {
            0.0
        };

        Self {
            total: value.count,
            failed: value.failed,
            run_duration: value.elapsed,
            queries_per_second,
            mean_latency,
            min_latency: latencies.first().copied(),
            max_latency: latencies.last().copied(),
            p50_latency: percentile(&latencies, 0.50),
            p90_latency: percentile(&latencies, 0.90),
            p99_latency: percentile(&latencies, 0.99),
            recall,
            recall_samples: recalls.len(),
            api: None,
            parallelization: None,
        }
    }
}

/// The machine-readable record. Field names are consumed by dashboards and must
/// not change.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructuredResults {
    pub queries_per_second: f64,
    pub mean_latency_seconds: Option<f64>,
    pub recall: Option<f64>,
    pub total: usize,
    pub failed: usize,
    pub p50_latency_seconds: Option<f64>,
    pub p90_latency_seconds: Option<f64>,
    pub p99_latency_seconds: Option<f64>,
    pub run_duration_seconds: f64,
    pub api: Option<Api>,
    pub parallelization: Option<usize>,
}

impl From<&Results> for StructuredResults {
    fn from(value: &Results) -> Self {
        let secs = |d: Option<Duration>| d.map(|d| d.as_secs_f64());
        Self {
            queries_per_second: value.queries_per_second,
            mean_latency_seconds: secs(value.mean_latency),
            recall: value.recall,
            total: value.total,
            failed: value.failed,
            p50_latency_seconds: secs(value.p50_latency),
            p90_latency_seconds: secs(value.p90_latency),
            p99_latency_seconds: secs(value.p99_latency),
            run_duration_seconds: value.run_duration.as_secs_f64(),
            api: value.api,
            parallelization: value.parallelization,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// One metric per line, for humans.
pub struct TextReporter<W> {
    out: W,
}

impl<W> TextReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn render_text(results: &Results) -> Result<String, fmt::Error> {
    let latency = |d: Option<Duration>| match d {
        Some(d) => format!("{d:?}"),
        None => "n/a".to_string(),
    };
    let mut text = String::new();
    writeln!(text, "Results")?;
    if let Some(api) = results.api {
        writeln!(text, "api: {api}")?;
    }
    if let Some(parallelization) = results.parallelization {
        writeln!(text, "parallelization: {parallelization}")?;
    }
    writeln!(text, "total: {}", results.total)?;
    writeln!(text, "failed: {}", results.failed)?;
    writeln!(text, "run duration: {:?}", results.run_duration)?;
    writeln!(text, "queries per second: {:.2}", results.queries_per_second)?;
    writeln!(text, "mean latency: {}", latency(results.mean_latency))?;
    writeln!(text, "p50 latency: {}", latency(results.p50_latency))?;
    writeln!(text, "p90 latency: {}", latency(results.p90_latency))?;
    writeln!(text, "p99 latency: {}", latency(results.p99_latency))?;
    writeln!(text, "min latency: {}", latency(results.min_latency))?;
    writeln!(text, "max latency: {}", latency(results.max_latency))?;
    match results.recall {
        Some(recall) => writeln!(
            text,
            "recall: {recall:.4} ({} queries with ground truth)",
            results.recall_samples
        )?,
        None => writeln!(text, "recall: n/a")?,
    }
    Ok(text)
}

impl<W> Reporter<Results> for TextReporter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn report(&mut self, report: &Results) -> Result<(), ReportError> {
        let text = render_text(report)?;
        self.out.write_all(text.as_bytes()).await?;
        self.out.flush().await?;
        Ok(())
    }
}

/// Pretty-printed [`StructuredResults`] followed by a newline.
pub struct JsonReporter<W> {
    out: W,
}

impl<W> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W> Reporter<Results> for JsonReporter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn report(&mut self, report: &Results) -> Result<(), ReportError> {
        let mut value = serde_json::to_vec_pretty(&StructuredResults::from(report))?;
        value.push(b'\n');
        self.out.write_all(&value).await?;
        self.out.flush().await?;
        Ok(())
    }
}

/// Write `results` to `destination` in the chosen format.
pub async fn write_results<W>(
    results: &Results,
    destination: W,
    format: OutputFormat,
) -> Result<(), ReportError>
where
    W: AsyncWrite + Unpin + Send,
{
    match format {
        OutputFormat::Text => TextReporter::new(destination).report(results).await,
        OutputFormat::Json => JsonReporter::new(destination).report(results).await,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::aggregate::aggregate;
    use crate::metric::QueryOutcome;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn sample() -> Vec<QueryOutcome> {
        vec![
            QueryOutcome::succeeded(0, ms(10), Some(1.0)),
            QueryOutcome::succeeded(1, ms(20), Some(0.5)),
            QueryOutcome::failed(2, ms(30)).with_recall(Some(0.0)),
            QueryOutcome::succeeded(3, ms(40), None),
        ]
    }

    #[test]
    fn nearest_rank_percentiles() {
        let sorted: Vec<Duration> = (1..=10).map(ms).collect();
        assert_eq!(percentile(&sorted, 0.5), Some(ms(5)));
        assert_eq!(percentile(&sorted, 0.9), Some(ms(9)));
        assert_eq!(percentile(&sorted, 0.99), Some(ms(10)));
        assert_eq!(percentile(&sorted, 0.0), Some(ms(1)));
        assert_eq!(percentile(&[], 0.5), None);
    }

    #[test]
    fn results_from_outcomes() {
        let results = aggregate(&sample(), Duration::from_secs(2));

        assert_eq!(results.total, 4);
        assert_eq!(results.failed, 1);
        assert_eq!(results.mean_latency, Some(ms(25)));
        assert_eq!(results.min_latency, Some(ms(10)));
        assert_eq!(results.max_latency, Some(ms(40)));
        assert_eq!(results.p50_latency, Some(ms(20)));
        assert_eq!(results.queries_per_second, 2.0);
        assert_eq!(results.recall_samples, 3);
        assert!((results.recall.unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn order_of_outcomes_does_not_matter() {
        let outcomes: Vec<QueryOutcome> = (0..50)
            .map(|i| {
                QueryOutcome::succeeded(i, ms((i as u64 * 37) % 23), Some((i % 7) as f64 / 7.0))
            })
            .collect();
        let mut reversed = outcomes.clone();
        reversed.reverse();
        let mut shuffled = outcomes.clone();
        shuffled.rotate_left(17);
        shuffled.swap(3, 40);

        let base = aggregate(&outcomes, Duration::from_secs(1));
        assert_eq!(aggregate(&reversed, Duration::from_secs(1)), base);
        assert_eq!(aggregate(&shuffled, Duration::from_secs(1)), base);
    }

    #[test]
    fn empty_run_reports_not_applicable() {
        let results = aggregate(&[], Duration::ZERO);
        assert_eq!(results.total, 0);
        assert_eq!(results.failed, 0);
        assert_eq!(results.mean_latency, None);
        assert_eq!(results.p99_latency, None);
        assert_eq!(results.recall, None);
        assert_eq!(results.queries_per_second, 0.0);
    }

    #[test]
    fn zero_recall_is_not_missing_recall() {
        let results = aggregate(
            &[QueryOutcome::succeeded(0, ms(1), Some(0.0))],
            Duration::from_secs(1),
        );
        assert_eq!(results.recall, Some(0.0));

        let results = aggregate(
            &[QueryOutcome::succeeded(0, ms(1), None)],
            Duration::from_secs(1),
        );
        assert_eq!(results.recall, None);
    }

    #[tokio::test]
    async fn json_has_stable_field_names() {
        let results = aggregate(&sample(), Duration::from_secs(2));
        let mut out = Vec::new();
        write_results(&results, &mut out, OutputFormat::Json)
            .await
            .unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["queries_per_second"], 2.0);
        assert_eq!(value["mean_latency_seconds"], 0.025);
        assert_eq!(value["total"], 4);
        assert_eq!(value["failed"], 1);
        assert!(value["recall"].is_number());
        assert!(value["api"].is_null());
    }

    #[tokio::test]
    async fn run_context_is_written_when_stamped() {
        let config = Config::builder().api(Api::Grpc).parallel(12).build();
        let results = aggregate(&sample(), Duration::from_secs(2)).with_run_context(&config);

        let mut out = Vec::new();
        JsonReporter::new(&mut out).report(&results).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["api"], "grpc");
        assert_eq!(value["parallelization"], 12);
        assert_eq!(value["total"], 4);

        let text = render_text(&results).unwrap();
        assert!(text.contains("api: grpc\n"));
        assert!(text.contains("parallelization: 12\n"));
    }

    #[tokio::test]
    async fn json_recall_is_null_without_ground_truth() {
        let results = aggregate(
            &[QueryOutcome::succeeded(0, ms(1), None)],
            Duration::from_secs(1),
        );
        let mut out = Vec::new();
        JsonReporter::new(&mut out).report(&results).await.unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert!(value["recall"].is_null());
    }

    #[tokio::test]
    async fn text_lists_one_metric_per_line() {
        let results = aggregate(&sample(), Duration::from_secs(2));
        let mut reporter = TextReporter::new(Vec::new());
        reporter.report(&results).await.unwrap();
        let text = String::from_utf8(reporter.into_inner()).unwrap();

        assert!(text.starts_with("Results\n"));
        assert!(text.contains("total: 4\n"));
        assert!(text.contains("failed: 1\n"));
        assert!(text.contains("queries per second: 2.00\n"));
        assert!(text.contains("mean latency: 25ms\n"));
        assert!(text.contains("recall: 0.5000 (3 queries with ground truth)\n"));
    }

    #[tokio::test]
    async fn text_marks_missing_values() {
        let results = aggregate(&[], Duration::ZERO);
        let mut out = Vec::new();
        write_results(&results, &mut out, OutputFormat::Text)
            .await
            .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("mean latency: n/a\n"));
        assert!(text.contains("recall: n/a\n"));
    }
}
