//! HNSW parameters and small supporting types

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// HNSW construction/search parameters.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct HNSWParams {
    /// Max bidirectional links per node per layer.
    pub m: usize,
    /// Candidate list size during insert.
    pub ef_construction: usize,
    /// Candidate list size at query time.
    pub ef_search: usize,
    /// Maximum level a node may be assigned (the geometric draw is capped here).
    pub max_level_cap: u8,
}

impl Default for HNSWParams {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 50,
            max_level_cap: 16,
        }
    }
}

/// Distance function used by the graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceFunction {
    /// `1 - innerProduct`, for unit-norm vectors.
    Cosine,
    Euclidean,
}

impl DistanceFunction {
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceFunction::Cosine => 1.0 - dot_product(a, b),
            DistanceFunction::Euclidean => l2_distance(a, b),
        }
    }
}

pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// A candidate during search: node id + distance to the query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Candidate {
    pub distance: OrderedFloat<f32>,
    pub node_id: u32,
}

impl Candidate {
    pub fn new(node_id: u32, distance: f32) -> Self {
        Self {
            distance: OrderedFloat(distance),
            node_id,
        }
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.distance.cmp(&other.distance)
    }
}

/// A finished search result: node id + distance to the query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SearchResult {
    pub id: u32,
    pub distance: f32,
}

impl SearchResult {
    pub fn new(id: u32, distance: f32) -> Self {
        Self { id, distance }
    }
}

/// Snapshot of graph-level statistics, for `Engine::get_index_info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    pub num_vectors: usize,
    pub dimensions: usize,
    pub entry_point: Option<u32>,
    pub max_level: u8,
    pub level_distribution: Vec<usize>,
    pub avg_neighbors_l0: f32,
    pub max_neighbors_l0: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_ordering() {
        let c1 = Candidate::new(1, 0.5);
        let c2 = Candidate::new(2, 0.3);
        let c3 = Candidate::new(3, 0.7);
        assert!(c2 < c1);
        assert!(c1 < c3);
    }

    #[test]
    fn test_cosine_distance_identical() {
        let a = vec![1.0, 0.0, 0.0];
        let dist = DistanceFunction::Cosine.distance(&a, &a);
        assert!(dist.abs() < 1e-6);
    }

    #[test]
    fn test_l2_distance() {
        let a = vec![0.0, 0.0];
        let b = vec![3.0, 4.0];
        assert!((l2_distance(&a, &b) - 5.0).abs() < 1e-6);
    }
}
