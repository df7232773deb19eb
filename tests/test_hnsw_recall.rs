//! HNSW approximate recall against brute-force search (spec §8 scenario 6).

use hybrid_search_core::hnsw::{DistanceFunction, HNSWGraph, HNSWParams};
use rand::{Rng, SeedableRng};

fn random_unit_vector(rng: &mut impl Rng, dim: usize) -> Vec<f32> {
    let raw: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
    let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    raw.iter().map(|x| x / norm.max(1e-9)).collect()
}

fn brute_force_topk(query: &[f32], vectors: &[Vec<f32>], k: usize) -> Vec<usize> {
    let mut distances: Vec<(usize, f32)> = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| (i, DistanceFunction::Cosine.distance(query, v)))
        .collect();
    distances.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());
    distances.into_iter().take(k).map(|(i, _)| i).collect()
}

#[test]
fn test_hnsw_recall_at_10_against_brute_force() {
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);

    let dim = 32;
    let n = 10_000;
    let num_queries = 100;
    let k = 10;

    let vectors: Vec<Vec<f32>> = (0..n).map(|_| random_unit_vector(&mut rng, dim)).collect();

    let mut graph = HNSWGraph::new(dim, HNSWParams::default(), DistanceFunction::Cosine);
    let mut node_id_to_index = std::collections::HashMap::with_capacity(n);
    for (i, v) in vectors.iter().enumerate() {
        let node_id = graph.insert(v.clone()).unwrap();
        node_id_to_index.insert(node_id, i);
    }

    let queries: Vec<Vec<f32>> = (0..num_queries).map(|_| random_unit_vector(&mut rng, dim)).collect();

    let mut total_hits = 0usize;
    let mut total_expected = 0usize;

    for query in &queries {
        let truth: std::collections::HashSet<usize> =
            brute_force_topk(query, &vectors, k).into_iter().collect();
        let approx = graph.search(query, k).unwrap();
        let approx_indices: std::collections::HashSet<usize> = approx
            .iter()
            .filter_map(|r| node_id_to_index.get(&r.id).copied())
            .collect();

        total_hits += truth.intersection(&approx_indices).count();
        total_expected += truth.len();
    }

    let recall = total_hits as f64 / total_expected as f64;
    assert!(recall >= 0.9, "recall@10 was {recall}, expected >= 0.9");
}

#[test]
fn test_hnsw_recall_empty_and_tiny_graphs() {
    let graph = HNSWGraph::new(8, HNSWParams::default(), DistanceFunction::Cosine);
    assert!(graph.search(&vec![0.0; 8], 5).unwrap().is_empty());
}
