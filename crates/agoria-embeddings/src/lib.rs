pub mod graph;
pub mod index;
pub mod metric;
pub mod vector;

pub use graph::{HnswGraph, NodeId};
pub use index::{CapabilityIndex, IndexError};
pub use metric::{CosineDistance, DistanceMetric, Euclidean, Vector};
pub use vector::{vectorize_capabilities, vectorize_text, vectorize_tokens, DEFAULT_DIM};
