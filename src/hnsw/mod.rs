//! Hierarchical Navigable Small World index: a layered proximity graph over
//! integer node ids referencing vectors in the quantized store.

mod graph;
mod types;

pub use graph::{GraphSnapshot, HNSWGraph, NodeSnapshot};
pub use types::{Candidate, DistanceFunction, HNSWParams, IndexStats, SearchResult};
