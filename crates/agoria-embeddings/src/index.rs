//! Thread-safe capability index: agents register a capability vector and
//! are discoverable by approximate nearest-neighbor search over it.

use std::collections::HashMap;

use parking_lot::RwLock;
use thiserror::Error;

use crate::graph::{HnswGraph, NodeId};
use crate::metric::{CosineDistance, DistanceMetric, Vector};
use crate::vector::{vectorize_capabilities, DEFAULT_DIM};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("entry {0} is not present in the index")]
    NotFound(String),
}

const DEFAULT_M: usize = 16;
const DEFAULT_EF_CONSTRUCTION: usize = 64;

/// An agent capability index keyed by an opaque external id (a DID or card
/// hash). Wraps an [`HnswGraph`] behind a lock so it can be shared across
/// orchestrator workers.
pub struct CapabilityIndex<M: DistanceMetric = CosineDistance> {
    dim: usize,
    inner: RwLock<Inner<M>>,
}

struct Inner<M: DistanceMetric> {
    graph: HnswGraph<M>,
    ids_by_key: HashMap<String, NodeId>,
}

impl CapabilityIndex<CosineDistance> {
    pub fn new() -> Self {
        Self::with_metric(CosineDistance, DEFAULT_DIM)
    }
}

impl Default for CapabilityIndex<CosineDistance> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: DistanceMetric> CapabilityIndex<M> {
    pub fn with_metric(metric: M, dim: usize) -> Self {
        Self {
            dim,
            inner: RwLock::new(Inner {
                graph: HnswGraph::new(metric, DEFAULT_M, DEFAULT_EF_CONSTRUCTION),
                ids_by_key: HashMap::new(),
            }),
        }
    }

    /// Register (or re-register) an agent's capability list under `key`
    /// (typically its DID). Re-registering tombstones the prior entry.
    pub fn upsert_capabilities(&self, key: &str, capabilities: &[String]) {
        let vector = vectorize_capabilities(capabilities, self.dim);
        self.upsert_vector(key, vector);
    }

    pub fn upsert_vector(&self, key: &str, vector: Vector) {
        let mut inner = self.inner.write();
        if let Some(&old_id) = inner.ids_by_key.get(key) {
            inner.graph.delete(old_id);
        }
        let new_id = inner.graph.insert(vector, key.as_bytes().to_vec());
        inner.ids_by_key.insert(key.to_string(), new_id);
    }

    pub fn remove(&self, key: &str) -> Result<(), IndexError> {
        let mut inner = self.inner.write();
        match inner.ids_by_key.remove(key) {
            Some(id) => {
                inner.graph.delete(id);
                Ok(())
            }
            None => Err(IndexError::NotFound(key.to_string())),
        }
    }

    /// Find the `k` keys whose capability vectors are closest to a query
    /// built from `capabilities`, nearest first.
    pub fn query_capabilities(&self, capabilities: &[String], k: usize) -> Vec<(String, f32)> {
        let vector = vectorize_capabilities(capabilities, self.dim);
        self.query_vector(&vector, k)
    }

    pub fn query_vector(&self, vector: &Vector, k: usize) -> Vec<(String, f32)> {
        let inner = self.inner.read();
        inner
            .graph
            .query(vector, k)
            .into_iter()
            .map(|(_, payload, dist)| (String::from_utf8_lossy(&payload).to_string(), dist))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
