/// Identifier of one object returned by the search service.
pub type ResultId = u64;

/// One unit of work handed from a generator to a transmitter.
///
/// `request` is opaque to the engine; only the transmitter knows how to put it on
/// the wire. An empty `neighbors` list means no recall is scored for this query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryDescriptor {
    pub request: Vec<u8>,
    pub neighbors: Vec<ResultId>,
}

impl QueryDescriptor {
    pub fn new(request: Vec<u8>) -> Self {
        Self {
            request,
            neighbors: Vec::new(),
        }
    }

    pub fn with_neighbors(mut self, neighbors: Vec<ResultId>) -> Self {
        self.neighbors = neighbors;
        self
    }

    pub fn has_ground_truth(&self) -> bool {
        !self.neighbors.is_empty()
    }
}
