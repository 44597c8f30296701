use std::sync::Arc;
use std::time::Duration;

use annbench::{
    Api, Config, GroundTruth, GrpcSearch, QueryDescriptor, ResultId, TransmitError, Transmitter,
    report::{OutputFormat, write_results},
    run_benchmark, run_ground_truth,
    workload::{random_vector, random_vectors},
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing_subscriber::EnvFilter;

const DIMENSIONS: usize = 32;
const LIMIT: usize = 10;

/// In-process stand-in for a vector database: exact search over a fixed set of
/// vectors, with a bit of latency and an occasional dropped hit.
#[derive(Clone)]
struct FakeService {
    vectors: Arc<Vec<Vec<f32>>>,
}

impl FakeService {
    fn nearest(&self, query: &[f32], k: usize) -> Vec<ResultId> {
        let mut scored: Vec<(f32, ResultId)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(id, v)| {
                let dist = v.iter().zip(query).map(|(a, b)| (a - b).powi(2)).sum();
                (dist, id as ResultId)
            })
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.into_iter().take(k).map(|(_, id)| id).collect()
    }
}

impl Transmitter for FakeService {
    async fn transmit(
        &self,
        query: &QueryDescriptor,
        _endpoint: &str,
    ) -> Result<Vec<ResultId>, TransmitError> {
        let search = GrpcSearch::decode(&query.request)?;

        let (delay, drop_last) = {
            let mut rng = rand::thread_rng();
            (rng.gen_range(1..5), rng.gen_bool(0.2))
        };
        tokio::time::sleep(Duration::from_millis(delay)).await;

        let mut ids = self.nearest(&search.vector, search.limit);
        if drop_last {
            ids.pop();
        }
        Ok(ids)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut rng = StdRng::seed_from_u64(42);
    let vectors: Vec<Vec<f32>> = (0..2_000)
        .map(|_| random_vector(DIMENSIONS, &mut rng))
        .collect();
    let service = FakeService {
        vectors: Arc::new(vectors),
    };

    let config = Config::builder()
        .queries(500)
        .parallel(16)
        .limit(LIMIT)
        .dimensions(DIMENSIONS)
        .api(Api::Grpc)
        .origin("localhost:50051")
        .tenant("demo")
        .query_timeout(Duration::from_secs(1))
        .build();

    let results = run_benchmark(&config, random_vectors(&config), service.clone()).await?;
    write_results(&results, tokio::io::stdout(), OutputFormat::Text).await?;

    let queries: Vec<Vec<f32>> = (0..200)
        .map(|_| random_vector(DIMENSIONS, &mut rng))
        .collect();
    let neighbors = queries.iter().map(|q| service.nearest(q, LIMIT)).collect();
    let truth = GroundTruth::new(queries, neighbors)?;

    let paced = Config {
        rate: Some(400.0),
        ..config
    };
    let results = run_ground_truth(&paced, truth, service).await?;
    write_results(&results, tokio::io::stdout(), OutputFormat::Json).await?;

    Ok(())
}
