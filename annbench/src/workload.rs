//! Ready-made query generators for the two benchmark modes: random vectors and
//! ground-truth datasets.
use std::sync::Arc;

use rand::Rng;
use serde_json::{Value, json};

use crate::config::{Api, Config};
use crate::error::{ConfigError, TransmitError};
use crate::query::{QueryDescriptor, ResultId};
use crate::scenario::Generator;

/// A vector with every component drawn uniformly from `[-1, 1)`.
pub fn random_vector<R: Rng + ?Sized>(dimensions: usize, rng: &mut R) -> Vec<f32> {
    (0..dimensions).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
}

/// Little-endian f32 encoding, the layout binary vector fields expect.
pub fn encode_vector_le(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Turns a query vector into a request body for one API.
///
/// Random and ground-truth workloads both go through [`RequestBuilder::build`], so
/// limit, filter and tenant are applied the same way in every mode.
///
/// - `graphql`: JSON body with a `Get { Class(limit, nearVector, where) }` query.
/// - `rest`: JSON body with `nearVector` and `limit`.
/// - `grpc`: a [`GrpcSearch`] in its binary layout. The transmitter decodes it
///   and maps it onto the service's search message.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestBuilder {
    pub api: Api,
    pub class_name: String,
    pub limit: usize,
    pub where_filter: Option<String>,
    pub tenant: Option<String>,
}

impl RequestBuilder {
    pub fn from_config(config: &Config) -> Self {
        Self {
            api: config.api,
            class_name: config.class_name.clone(),
            limit: config.limit,
            where_filter: config.where_filter.clone(),
            tenant: config.tenant.clone(),
        }
    }

    pub fn build(&self, vector: &[f32]) -> Vec<u8> {
        match self.api {
            Api::Graphql => self.graphql(vector).to_string().into_bytes(),
            Api::Rest => self.rest(vector).to_string().into_bytes(),
            Api::Grpc => {
                encode_grpc_search(&self.class_name, self.limit, self.tenant.as_deref(), vector)
            }
        }
    }

    fn graphql(&self, vector: &[f32]) -> Value {
        let filter = match &self.where_filter {
            Some(filter) => format!(", where: {{ {filter} }}"),
            None => String::new(),
        };
        let query = format!(
            "{{ Get {{ {}(limit: {}, nearVector: {{vector:{}}}{}) {{ _additional {{ id }} }} }} }}",
            self.class_name,
            self.limit,
            Value::from(vector.to_vec()),
            filter
        );
        json!({ "query": query })
    }

    fn rest(&self, vector: &[f32]) -> Value {
        json!({
            "nearVector": { "vector": Value::from(vector.to_vec()) },
            "limit": self.limit,
        })
    }
}

/// Everything a gRPC search needs, carried in the request payload.
///
/// Layout, integers little-endian:
///
/// ```text
/// u32 class name length | class name (utf-8)
/// u32 limit
/// u32 tenant length (0 = no tenant) | tenant (utf-8)
/// f32 * n vector
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct GrpcSearch {
    pub class_name: String,
    pub limit: usize,
    pub tenant: Option<String>,
    pub vector: Vec<f32>,
}

impl GrpcSearch {
    pub fn encode(&self) -> Vec<u8> {
        encode_grpc_search(
            &self.class_name,
            self.limit,
            self.tenant.as_deref(),
            &self.vector,
        )
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, TransmitError> {
        let mut rest = bytes;
        let class_name = take_str(&mut rest)?;
        let limit = take_u32(&mut rest)? as usize;
        let tenant = Some(take_str(&mut rest)?).filter(|t| !t.is_empty());
        if rest.len() % 4 != 0 {
            return Err(TransmitError::Decode(format!(
                "{} trailing bytes do not form f32 values",
                rest.len()
            )));
        }
        let vector = rest
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Ok(Self {
            class_name,
            limit,
            tenant,
            vector,
        })
    }
}

fn encode_grpc_search(
    class_name: &str,
    limit: usize,
    tenant: Option<&str>,
    vector: &[f32],
) -> Vec<u8> {
    let tenant = tenant.unwrap_or_default();
    let mut out = Vec::with_capacity(12 + class_name.len() + tenant.len() + vector.len() * 4);
    put_str(&mut out, class_name);
    out.extend_from_slice(&u32::try_from(limit).unwrap_or(u32::MAX).to_le_bytes());
    put_str(&mut out, tenant);
    out.extend(encode_vector_le(vector));
    out
}

fn put_str(out: &mut Vec<u8>, value: &str) {
    let len = u32::try_from(value.len()).unwrap_or(u32::MAX);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&value.as_bytes()[..len as usize]);
}

fn take_u32(rest: &mut &[u8]) -> Result<u32, TransmitError> {
    let bytes: &[u8] = *rest;
    let Some((head, tail)) = bytes.split_first_chunk::<4>() else {
        return Err(TransmitError::Decode("payload ends inside a length".into()));
    };
    *rest = tail;
    Ok(u32::from_le_bytes(*head))
}

fn take_str(rest: &mut &[u8]) -> Result<String, TransmitError> {
    let len = take_u32(rest)? as usize;
    let bytes: &[u8] = *rest;
    if bytes.len() < len {
        return Err(TransmitError::Decode("payload ends inside a string".into()));
    }
    let (head, tail) = bytes.split_at(len);
    *rest = tail;
    String::from_utf8(head.to_vec()).map_err(|e| TransmitError::Decode(e.to_string()))
}

/// Generator for random-vector mode. The index is ignored and no ground truth
/// is attached.
pub fn random_vectors(config: &Config) -> impl Generator + use<> {
    let builder = RequestBuilder::from_config(config);
    let dimensions = config.dimensions;
    move |_index: usize| {
        let vector = random_vector(dimensions, &mut rand::thread_rng());
        QueryDescriptor::new(builder.build(&vector))
    }
}

/// Index-aligned test queries and their known nearest neighbors:
/// `neighbors[i]` is the ground truth for `queries[i]`.
#[derive(Clone, Debug, PartialEq)]
pub struct GroundTruth {
    queries: Vec<Vec<f32>>,
    neighbors: Vec<Vec<ResultId>>,
}

impl GroundTruth {
    pub fn new(queries: Vec<Vec<f32>>, neighbors: Vec<Vec<ResultId>>) -> Result<Self, ConfigError> {
        if queries.len() != neighbors.len() {
            return Err(ConfigError::GroundTruthMismatch {
                queries: queries.len(),
                neighbors: neighbors.len(),
            });
        }
        Ok(Self { queries, neighbors })
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn query(&self, index: usize) -> Option<&[f32]> {
        self.queries.get(index).map(Vec::as_slice)
    }

    pub fn neighbors(&self, index: usize) -> Option<&[ResultId]> {
        self.neighbors.get(index).map(Vec::as_slice)
    }

    /// Deterministic generator: index `i` always yields `queries[i]` with
    /// `neighbors[i]`. Indices must stay below [`GroundTruth::len`].
    pub fn into_generator(self, builder: RequestBuilder) -> impl Generator {
        let data = Arc::new(self);
        move |index: usize| {
            QueryDescriptor::new(builder.build(&data.queries[index]))
                .with_neighbors(data.neighbors[index].clone())
        }
    }
}
