//! HNSW graph: arena of nodes addressed by integer id, per-level adjacency
//! sets. No owning pointers between nodes, only ids — this removes all
//! cycle-ownership questions and makes serialization trivial.

use std::collections::{BinaryHeap, HashSet};
use std::cmp::Reverse;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{CoreError, Result};
use crate::quantization::{Quantization, StoredVector};

use super::types::{Candidate, DistanceFunction, HNSWParams, IndexStats, SearchResult};

#[derive(Clone, Debug)]
struct HNSWNode {
    id: u32,
    level: u8,
    vector: Vec<f32>,
    /// `neighbors[level]` — length is always `level + 1`.
    neighbors: Vec<Vec<u32>>,
}

#[derive(Clone, Debug)]
pub struct HNSWGraph {
    nodes: Vec<Option<HNSWNode>>,
    entry_point: Option<u32>,
    max_level: u8,
    dimensions: usize,
    params: HNSWParams,
    distance_fn: DistanceFunction,
}

impl HNSWGraph {
    pub fn new(dimensions: usize, params: HNSWParams, distance_fn: DistanceFunction) -> Self {
        Self {
            nodes: Vec::new(),
            entry_point: None,
            max_level: 0,
            dimensions,
            params,
            distance_fn,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn entry_point(&self) -> Option<u32> {
        self.entry_point
    }

    pub fn max_level(&self) -> u8 {
        self.max_level
    }

    pub fn params(&self) -> HNSWParams {
        self.params
    }

    fn node(&self, id: u32) -> Option<&HNSWNode> {
        self.nodes.get(id as usize).and_then(|n| n.as_ref())
    }

    fn neighbors_at(&self, id: u32, level: u8) -> &[u32] {
        self.node(id)
            .and_then(|n| n.neighbors.get(level as usize))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    fn distance_to(&self, query: &[f32], id: u32) -> f32 {
        let vector = &self.node(id).expect("node must exist").vector;
        self.distance_fn.distance(query, vector)
    }

    /// Geometric level draw: `while random() < 1/M and L < cap, L += 1`.
    fn random_level(&self) -> u8 {
        let mut rng = rand::thread_rng();
        let mut level = 0u8;
        let p = 1.0 / self.params.m as f32;
        while rng.gen::<f32>() < p && level < self.params.max_level_cap {
            level += 1;
        }
        level
    }

    fn allocate_slot(&mut self, node: HNSWNode) -> u32 {
        let id = node.id;
        if (id as usize) < self.nodes.len() {
            self.nodes[id as usize] = Some(node);
        } else {
            self.nodes.push(Some(node));
        }
        id
    }

    fn next_id(&self) -> u32 {
        // Reuse a tombstoned slot if one exists, else append.
        self.nodes
            .iter()
            .position(|n| n.is_none())
            .map(|i| i as u32)
            .unwrap_or(self.nodes.len() as u32)
    }

    /// Insert a vector into the graph, following Malkov & Yashunin (2018).
    #[instrument(skip(self, vector), fields(dimensions = vector.len(), graph_size = self.len()))]
    pub fn insert(&mut self, vector: Vec<f32>) -> Result<u32> {
        if vector.len() != self.dimensions {
            return Err(CoreError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }

        let level = self.random_level();
        let id = self.next_id();
        let node = HNSWNode {
            id,
            level,
            vector: vector.clone(),
            neighbors: vec![Vec::new(); level as usize + 1],
        };
        self.allocate_slot(node);

        let Some(entry_point) = self.entry_point else {
            self.entry_point = Some(id);
            self.max_level = level;
            return Ok(id);
        };

        // Greedy-descent from maxLevel down to level+1.
        let mut cur = entry_point;
        for lc in ((level + 1)..=self.max_level).rev() {
            cur = self.greedy_descend(&vector, cur, lc);
        }

        let mut nearest = vec![cur];
        let top = level.min(self.max_level);
        for lc in (0..=top).rev() {
            let candidates = self.search_layer(&vector, &nearest, self.params.ef_construction, lc);
            let selected: Vec<u32> = candidates.iter().take(self.params.m).cloned().collect();

            for &nb in &selected {
                self.add_bidirectional_edge(id, nb, lc);
            }

            for &nb in &selected {
                self.prune_if_over_capacity(nb, lc);
            }

            nearest = candidates;
        }

        if level > self.max_level {
            self.entry_point = Some(id);
            self.max_level = level;
            debug!(new_entry = id, new_level = level, "updated entry point");
        }

        Ok(id)
    }

    fn add_bidirectional_edge(&mut self, a: u32, b: u32, level: u8) {
        if let Some(node) = self.nodes[a as usize].as_mut() {
            if !node.neighbors[level as usize].contains(&b) {
                node.neighbors[level as usize].push(b);
            }
        }
        if let Some(node) = self.nodes[b as usize].as_mut() {
            if !node.neighbors[level as usize].contains(&a) {
                node.neighbors[level as usize].push(a);
            }
        }
    }

    fn remove_edge(&mut self, from: u32, to: u32, level: u8) {
        if let Some(node) = self.nodes[from as usize].as_mut() {
            if let Some(list) = node.neighbors.get_mut(level as usize) {
                list.retain(|&n| n != to);
            }
        }
    }

    /// Keep only the `M` closest neighbors of `id` at `level`, dropping the
    /// rest symmetrically.
    fn prune_if_over_capacity(&mut self, id: u32, level: u8) {
        let neighbors = self.neighbors_at(id, level).to_vec();
        if neighbors.len() <= self.params.m {
            return;
        }

        let vector = self.node(id).expect("node must exist").vector.clone();
        let mut dists: Vec<(u32, f32)> = neighbors
            .iter()
            .map(|&n| (n, self.distance_to(&vector, n)))
            .collect();
        dists.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());

        let kept: Vec<u32> = dists.iter().take(self.params.m).map(|(n, _)| *n).collect();
        let dropped: Vec<u32> = neighbors.into_iter().filter(|n| !kept.contains(n)).collect();

        if let Some(node) = self.nodes[id as usize].as_mut() {
            node.neighbors[level as usize] = kept;
        }
        for dropped_id in dropped {
            self.remove_edge(dropped_id, id, level);
        }
    }

    fn greedy_descend(&self, query: &[f32], start: u32, level: u8) -> u32 {
        let mut current = start;
        let mut current_dist = self.distance_to(query, current);
        loop {
            let mut improved = false;
            for &nb in self.neighbors_at(current, level) {
                let d = self.distance_to(query, nb);
                if d < current_dist {
                    current_dist = d;
                    current = nb;
                    improved = true;
                }
            }
            if !improved {
                break;
            }
        }
        current
    }

    /// ef-bounded layer search, returning node ids sorted ascending by distance.
    fn search_layer(&self, query: &[f32], entry_points: &[u32], ef: usize, level: u8) -> Vec<u32> {
        let mut visited: HashSet<u32> = HashSet::new();
        let mut candidates: BinaryHeap<Reverse<Candidate>> = BinaryHeap::new();
        let mut working: BinaryHeap<Candidate> = BinaryHeap::new();

        for &ep in entry_points {
            let d = self.distance_to(query, ep);
            let c = Candidate::new(ep, d);
            candidates.push(Reverse(c));
            working.push(c);
            visited.insert(ep);
        }

        while let Some(Reverse(current)) = candidates.pop() {
            if let Some(&furthest) = working.peek() {
                if current.distance > furthest.distance && working.len() >= ef {
                    break;
                }
            }

            for &nb in self.neighbors_at(current.node_id, level) {
                if visited.contains(&nb) {
                    continue;
                }
                visited.insert(nb);

                let d = self.distance_to(query, nb);
                let candidate = Candidate::new(nb, d);
                let room = working.len() < ef;
                let closer = working.peek().map_or(true, |f| candidate.distance < f.distance);

                if room || closer {
                    candidates.push(Reverse(candidate));
                    working.push(candidate);
                    if working.len() > ef {
                        working.pop();
                    }
                }
            }
        }

        let mut results: Vec<Candidate> = working.into_vec();
        results.sort();
        results.into_iter().map(|c| c.node_id).collect()
    }

    #[instrument(skip(self, query), fields(k, graph_size = self.len()))]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if query.len() != self.dimensions {
            return Err(CoreError::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
            });
        }

        if self.is_empty() {
            return Ok(Vec::new());
        }

        let entry_point = self.entry_point.expect("non-empty graph has an entry point");
        let mut cur = entry_point;
        for lc in (1..=self.max_level).rev() {
            cur = self.greedy_descend(query, cur, lc);
        }

        let ef = self.params.ef_search.max(k);
        let candidates = self.search_layer(query, &[cur], ef, 0);

        let mut results: Vec<SearchResult> = candidates
            .iter()
            .map(|&id| SearchResult::new(id, self.distance_to(query, id)))
            .collect();
        results.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap());
        results.truncate(k);

        Ok(results)
    }

    /// Unlink `id` from every neighbor's adjacency and delete the node.
    /// No-op (returns `false`) if `id` does not exist.
    pub fn remove(&mut self, id: u32) -> bool {
        let Some(node) = self.node(id).cloned() else {
            return false;
        };

        for level in 0..=node.level {
            for &nb in &node.neighbors[level as usize] {
                self.remove_edge(nb, id, level);
            }
        }

        self.nodes[id as usize] = None;

        if self.entry_point == Some(id) {
            self.entry_point = self
                .nodes
                .iter()
                .filter_map(|n| n.as_ref())
                .max_by_key(|n| n.level)
                .map(|n| n.id);
            self.max_level = self
                .entry_point
                .and_then(|ep| self.node(ep))
                .map(|n| n.level)
                .unwrap_or(0);
        }

        true
    }

    pub fn stats(&self) -> IndexStats {
        let live: Vec<&HNSWNode> = self.nodes.iter().filter_map(|n| n.as_ref()).collect();
        let max_level = live.iter().map(|n| n.level).max().unwrap_or(0);

        let mut level_distribution = vec![0usize; max_level as usize + 1];
        for n in &live {
            level_distribution[n.level as usize] += 1;
        }

        let l0_counts: Vec<usize> = live.iter().map(|n| n.neighbors[0].len()).collect();
        let avg_neighbors_l0 = if l0_counts.is_empty() {
            0.0
        } else {
            l0_counts.iter().sum::<usize>() as f32 / l0_counts.len() as f32
        };
        let max_neighbors_l0 = l0_counts.into_iter().max().unwrap_or(0);

        IndexStats {
            num_vectors: live.len(),
            dimensions: self.dimensions,
            entry_point: self.entry_point,
            max_level,
            level_distribution,
            avg_neighbors_l0,
            max_neighbors_l0,
        }
    }

    pub fn to_snapshot(&self) -> Result<GraphSnapshot> {
        let mut nodes = Vec::new();
        for node in self.nodes.iter().flatten() {
            let vector = StoredVector::Float32(node.vector.clone()).to_base64()?;
            nodes.push(NodeSnapshot {
                id: node.id,
                vector,
                connections: node.neighbors.clone(),
            });
        }

        Ok(GraphSnapshot {
            dimensions: self.dimensions,
            config: self.params,
            nodes,
            entry_point: self.entry_point,
            max_level: self.max_level,
        })
    }

    pub fn from_snapshot(snapshot: GraphSnapshot, distance_fn: DistanceFunction) -> Result<Self> {
        let mut nodes: Vec<Option<HNSWNode>> = Vec::new();
        for n in snapshot.nodes {
            let vector = StoredVector::from_base64(&n.vector, Quantization::Float32, snapshot.dimensions)?
                .decode();
            let level = (n.connections.len().max(1) - 1) as u8;
            let node = HNSWNode {
                id: n.id,
                level,
                vector,
                neighbors: n.connections,
            };
            while nodes.len() <= n.id as usize {
                nodes.push(None);
            }
            nodes[n.id as usize] = Some(node);
        }

        Ok(Self {
            nodes,
            entry_point: snapshot.entry_point,
            max_level: snapshot.max_level,
            dimensions: snapshot.dimensions,
            params: snapshot.config,
            distance_fn,
        })
    }
}

/// On-disk representation: `{dimensions, config, nodes, entryPoint, maxLevel}`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    pub dimensions: usize,
    pub config: HNSWParams,
    pub nodes: Vec<NodeSnapshot>,
    pub entry_point: Option<u32>,
    pub max_level: u8,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: u32,
    pub vector: String,
    pub connections: Vec<Vec<u32>>,
}
