use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use annbench::{
    Api, BenchError, Config, ConfigError, GroundTruth, GrpcSearch, PoolExecutor, QueryDescriptor,
    ResultId, Scenario, TransmitError, Transmitter, run_benchmark, run_ground_truth,
};
use pretty_assertions::assert_eq;

fn index_query(index: usize) -> QueryDescriptor {
    QueryDescriptor::new((index as u64).to_le_bytes().to_vec())
}

fn index_of(query: &QueryDescriptor) -> usize {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&query.request[..8]);
    u64::from_le_bytes(bytes) as usize
}

/// Succeeds for every index except the ones `fail` selects.
#[derive(Clone)]
struct Scripted {
    fail: fn(usize) -> bool,
}

impl Transmitter for Scripted {
    async fn transmit(
        &self,
        query: &QueryDescriptor,
        _endpoint: &str,
    ) -> Result<Vec<ResultId>, TransmitError> {
        let index = index_of(query);
        tokio::task::yield_now().await;
        if (self.fail)(index) {
            Err(TransmitError::Status(503))
        } else {
            Ok(vec![index as ResultId])
        }
    }
}

#[derive(Clone)]
struct PanicsOn(usize);

impl Transmitter for PanicsOn {
    async fn transmit(
        &self,
        query: &QueryDescriptor,
        _endpoint: &str,
    ) -> Result<Vec<ResultId>, TransmitError> {
        if index_of(query) == self.0 {
            panic!("transmitter blew up");
        }
        Ok(Vec::new())
    }
}

#[derive(Clone)]
struct HangsOn(usize);

impl Transmitter for HangsOn {
    async fn transmit(
        &self,
        query: &QueryDescriptor,
        _endpoint: &str,
    ) -> Result<Vec<ResultId>, TransmitError> {
        if index_of(query) == self.0 {
            std::future::pending::<()>().await;
        }
        Ok(Vec::new())
    }
}

fn config(queries: usize, parallel: usize) -> Config {
    Config::builder()
        .queries(queries)
        .parallel(parallel)
        .query_timeout(Duration::from_secs(5))
        .build()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_index_is_dispatched_exactly_once() {
    for queries in [1, 7, 32] {
        for parallel in 1..=queries.min(12) {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let generator = {
                let seen = seen.clone();
                move |index: usize| {
                    seen.lock().unwrap().push(index);
                    index_query(index)
                }
            };
            let scenario = Scenario::builder()
                .name("dispatch")
                .config(config(queries, parallel))
                .generator(generator)
                .transmitter(Scripted { fail: |_| false })
                .build();
            let execution = scenario.execute().await.unwrap();

            let mut seen = seen.lock().unwrap().clone();
            seen.sort_unstable();
            assert_eq!(seen, (0..queries).collect::<Vec<_>>());

            let indices: Vec<usize> = execution.outcomes.iter().map(|o| o.index).collect();
            assert_eq!(indices, (0..queries).collect::<Vec<_>>());
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn more_workers_than_queries() {
    let results = run_benchmark(&config(3, 16), index_query, Scripted { fail: |_| false })
        .await
        .unwrap();
    assert_eq!(results.total, 3);
    assert_eq!(results.failed, 0);
    assert_eq!(results.parallelization, Some(16));
    assert_eq!(results.api, Some(Api::Graphql));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failures_are_recorded_not_dropped() {
    let results = run_benchmark(&config(30, 4), index_query, Scripted {
        fail: |i| i % 3 == 0,
    })
    .await
    .unwrap();

    assert_eq!(results.total, 30);
    assert_eq!(results.failed, 10);
    assert!(results.mean_latency.is_some());
    assert_eq!(results.recall, None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn all_failures_still_produce_results() {
    let results = run_benchmark(&config(12, 3), index_query, Scripted { fail: |_| true })
        .await
        .unwrap();
    assert_eq!(results.total, 12);
    assert_eq!(results.failed, 12);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn transmitter_panic_is_isolated() {
    let results = run_benchmark(&config(20, 4), index_query, PanicsOn(5))
        .await
        .unwrap();
    assert_eq!(results.total, 20);
    assert_eq!(results.failed, 1);
}

/// Panics while encoding, before any future exists.
#[derive(Clone)]
struct PanicsBeforeSending(usize);

impl Transmitter for PanicsBeforeSending {
    fn transmit(
        &self,
        query: &QueryDescriptor,
        _endpoint: &str,
    ) -> impl Future<Output = Result<Vec<ResultId>, TransmitError>> + Send {
        if index_of(query) == self.0 {
            panic!("could not encode request");
        }
        async { Ok(Vec::new()) }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn eager_transmitter_panic_is_isolated() {
    let results = run_benchmark(&config(6, 2), index_query, PanicsBeforeSending(3))
        .await
        .unwrap();
    assert_eq!(results.total, 6);
    assert_eq!(results.failed, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn generator_panic_is_isolated() {
    let generator = |index: usize| {
        if index == 2 {
            panic!("generator blew up");
        }
        index_query(index)
    };
    let results = run_benchmark(&config(8, 2), generator, Scripted { fail: |_| false })
        .await
        .unwrap();
    assert_eq!(results.total, 8);
    assert_eq!(results.failed, 1);
}

#[tokio::test(start_paused = true)]
async fn stuck_query_times_out() {
    let config = Config::builder()
        .queries(6)
        .parallel(2)
        .query_timeout(Duration::from_millis(300))
        .build();
    let results = run_benchmark(&config, index_query, HangsOn(4))
        .await
        .unwrap();

    assert_eq!(results.total, 6);
    assert_eq!(results.failed, 1);
    assert!(results.max_latency.unwrap() >= Duration::from_millis(300));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn recall_over_mixed_results() {
    #[derive(Clone)]
    struct HalfRight;

    impl Transmitter for HalfRight {
        async fn transmit(
            &self,
            query: &QueryDescriptor,
            _endpoint: &str,
        ) -> Result<Vec<ResultId>, TransmitError> {
            if index_of(query) < 5 {
                Ok(vec![0, 1])
            } else {
                Ok(vec![9])
            }
        }
    }

    let generator = |index: usize| index_query(index).with_neighbors(vec![0, 1, 2]);
    let results = run_benchmark(&config(10, 4), generator, HalfRight)
        .await
        .unwrap();

    assert_eq!(results.total, 10);
    assert_eq!(results.failed, 0);
    assert_eq!(results.recall_samples, 10);
    assert!((results.recall.unwrap() - 1.0 / 3.0).abs() < 1e-9);
    assert!(results.queries_per_second > 0.0);
}

#[tokio::test]
async fn invalid_config_never_starts() {
    let called = Arc::new(Mutex::new(false));
    let generator = {
        let called = called.clone();
        move |index: usize| {
            *called.lock().unwrap() = true;
            index_query(index)
        }
    };
    let err = run_benchmark(&config(5, 0), generator, Scripted { fail: |_| false })
        .await
        .unwrap_err();

    assert!(matches!(err, BenchError::Config(ConfigError::Parallelism(0))));
    assert!(!*called.lock().unwrap());
}

#[tokio::test]
async fn empty_run() {
    let results = run_benchmark(&config(0, 4), index_query, Scripted { fail: |_| false })
        .await
        .unwrap();
    assert_eq!(results.total, 0);
    assert_eq!(results.mean_latency, None);
    assert_eq!(results.recall, None);
}

#[tokio::test(start_paused = true)]
async fn rate_paces_dispatch() {
    let config = Config::builder()
        .queries(20)
        .parallel(4)
        .rate(100.0)
        .build();
    let results = run_benchmark(&config, index_query, Scripted { fail: |_| false })
        .await
        .unwrap();

    assert_eq!(results.total, 20);
    // 5 tokens per 50ms tick, the first tick fires immediately
    assert!(results.run_duration >= Duration::from_millis(150));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn custom_executor() {
    let scenario = Scenario::builder()
        .name("custom")
        .config(config(9, 1))
        .generator(index_query)
        .transmitter(Scripted { fail: |i| i == 8 })
        .build();
    let executor = PoolExecutor::builder().parallelism(3).build();
    let results = scenario.run_with(&executor).await.unwrap();

    assert_eq!(results.total, 9);
    assert_eq!(results.failed, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ground_truth_mode_uses_dataset_size() {
    #[derive(Clone)]
    struct FirstComponent;

    impl Transmitter for FirstComponent {
        async fn transmit(
            &self,
            query: &QueryDescriptor,
            _endpoint: &str,
        ) -> Result<Vec<ResultId>, TransmitError> {
            let search = GrpcSearch::decode(&query.request)?;
            assert_eq!(search.limit, 2);
            Ok(vec![search.vector[0] as ResultId])
        }
    }

    let queries: Vec<Vec<f32>> = (0..6).map(|i| vec![i as f32, 0.0]).collect();
    let neighbors: Vec<Vec<ResultId>> = (0..6)
        .map(|i| if i % 2 == 0 { vec![i] } else { vec![i, 100] })
        .collect();
    let truth = GroundTruth::new(queries, neighbors).unwrap();
    let config = Config::builder().api(Api::Grpc).queries(1).limit(2).build();

    let results = run_ground_truth(&config, truth, FirstComponent)
        .await
        .unwrap();

    assert_eq!(results.total, 6);
    assert_eq!(results.recall_samples, 6);
    assert!((results.recall.unwrap() - 0.75).abs() < 1e-9);
}
