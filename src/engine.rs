//! Engine façade
//!
//! Owns the item table, the quantized vector store, the HNSW index, and the
//! embedding cache. Every mutating operation takes `&mut self` — mutation is
//! understood to be single-writer (§5), enforced structurally rather than by
//! internal locking, the same split the teacher draws between its
//! single-writer `VectorStore` and its deliberately-shared `RowCache`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::cache::{CacheStats, EmbeddingCache};
use crate::config::{EngineConfig, SearchOptions, Weights};
use crate::embedder::Embedder;
use crate::error::{CoreError, Result};
use crate::hnsw::{DistanceFunction, HNSWGraph, IndexStats};
use crate::item::{Item, MetadataFilter};
use crate::quantization::{Quantization, StoredVector};
use crate::ranker::{self, RawScores};
use crate::similarity;
use crate::vector::Vector;

/// On-disk snapshot format (§6). Field names follow the spec's
/// `camelCase` JSON.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub version: String,
    pub model: String,
    pub items: Vec<Item>,
    pub vectors: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_paths: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantization: Option<Quantization>,
}

const SNAPSHOT_VERSION: &str = "1";

/// `getIndexInfo`'s return value: whether ANN is active and why, plus a
/// snapshot of the embedding cache's hit rate. Not named in spec.md itself,
/// but present in the richer source variant the spec follows (§4.6
/// supplement in SPEC_FULL.md).
#[derive(Debug, Clone)]
pub struct IndexInfo {
    pub ann_active: bool,
    pub ann_threshold: usize,
    pub hnsw: Option<IndexStats>,
    pub cache_hit_rate: f64,
}

/// One ranked result from `Engine::search`.
#[derive(Debug, Clone)]
pub struct SearchResultItem {
    pub id: String,
    pub score: f32,
    pub raw: RawScores,
    pub normalized: Option<RawScores>,
}

pub struct Engine<E: Embedder> {
    config: EngineConfig,
    embedder: E,
    items: Vec<Item>,
    id_index: HashMap<String, usize>,
    vectors: Vec<StoredVector>,
    hnsw: Option<HNSWGraph>,
    /// `hnsw_ids[i]` is the HNSW node id backing `items[i]`, when ANN is active.
    hnsw_ids: Vec<Option<u32>>,
    /// Reverse of `hnsw_ids`, for mapping search results back to item indices.
    hnsw_id_to_index: HashMap<u32, usize>,
    cache: EmbeddingCache,
}

impl<E: Embedder> Engine<E> {
    /// Embed item texts (using the cache) and construct the vector store,
    /// plus the HNSW index when requested or once `annThreshold` is crossed.
    #[instrument(skip(items, embedder, config), fields(count = items.len()))]
    pub async fn build(items: Vec<Item>, config: EngineConfig, embedder: E) -> Result<Self> {
        let mut engine = Self {
            cache: EmbeddingCache::new(config.cache_capacity),
            embedder,
            items: Vec::new(),
            id_index: HashMap::new(),
            vectors: Vec::new(),
            hnsw: None,
            hnsw_ids: Vec::new(),
            hnsw_id_to_index: HashMap::new(),
            config,
        };

        for item in items {
            engine.push_item(item).await?;
        }

        if engine.should_enable_ann() {
            engine.build_hnsw_from_scratch()?;
        }

        info!(size = engine.size(), ann_active = engine.hnsw.is_some(), "engine built");
        Ok(engine)
    }

    /// Restore items and vectors from a snapshot without calling the
    /// embedder, then rebuild HNSW if warranted.
    pub fn load(snapshot: EngineSnapshot, mut config: EngineConfig, embedder: E) -> Result<Self> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(CoreError::Snapshot(format!(
                "unsupported snapshot version {:?}",
                snapshot.version
            )));
        }
        if snapshot.items.len() != snapshot.vectors.len() {
            return Err(CoreError::Snapshot(format!(
                "item/vector count mismatch: {} items, {} vectors",
                snapshot.items.len(),
                snapshot.vectors.len()
            )));
        }

        let quantization = snapshot.quantization.unwrap_or(Quantization::Float32);
        config.model = snapshot.model;
        config.quantization = quantization;

        let mut id_index = HashMap::new();
        let mut vectors = Vec::with_capacity(snapshot.vectors.len());
        for (i, (item, b64)) in snapshot.items.iter().zip(snapshot.vectors.iter()).enumerate() {
            let stored = StoredVector::from_base64(b64, quantization, config.dimensions)?;
            vectors.push(stored);
            id_index.insert(item.id.clone(), i);
        }

        let mut engine = Self {
            cache: EmbeddingCache::new(config.cache_capacity),
            embedder,
            items: snapshot.items,
            id_index,
            vectors,
            hnsw: None,
            hnsw_ids: Vec::new(),
            hnsw_id_to_index: HashMap::new(),
            config,
        };

        if engine.should_enable_ann() {
            engine.build_hnsw_from_scratch()?;
        }

        Ok(engine)
    }

    /// Emit a snapshot: items, base64-quantized vectors, and metadata.
    /// `created_at` is stamped by the caller-visible clock at call time.
    pub fn save(&self) -> Result<EngineSnapshot> {
        let vectors = self
            .vectors
            .iter()
            .map(|v| v.to_base64())
            .collect::<Result<Vec<_>>>()?;

        Ok(EngineSnapshot {
            version: SNAPSHOT_VERSION.to_string(),
            model: self.config.model.clone(),
            items: self.items.clone(),
            vectors,
            created_at: Utc::now(),
            text_paths: None,
            quantization: Some(self.config.quantization),
        })
    }

    fn should_enable_ann(&self) -> bool {
        self.config.force_ann || self.items.len() >= self.config.ann_threshold
    }

    async fn get_or_embed(&mut self, text: &str) -> Result<Vec<f32>> {
        if let Some(v) = self.cache.get(text, &self.config.model) {
            return Ok(v);
        }
        let v = self
            .embedder
            .embed(text, &self.config.model)
            .await
            .map_err(|e| CoreError::Embedding(e.0))?;
        self.cache.set(text, &self.config.model, v.clone());
        Ok(v)
    }

    /// Embed `item.text`, quantize it, and append to the item/vector tables.
    /// Does not touch the HNSW graph — callers insert separately once they
    /// know whether ANN is (becoming) active.
    async fn push_item(&mut self, item: Item) -> Result<usize> {
        let vector = self.get_or_embed(&item.text).await?;
        if vector.len() != self.config.dimensions {
            return Err(CoreError::DimensionMismatch {
                expected: self.config.dimensions,
                actual: vector.len(),
            });
        }
        let stored = StoredVector::encode(&vector, self.config.quantization);
        let index = self.items.len();
        self.id_index.insert(item.id.clone(), index);
        self.items.push(item);
        self.vectors.push(stored);
        self.hnsw_ids.push(None);
        Ok(index)
    }

    fn ensure_hnsw(&mut self) -> &mut HNSWGraph {
        self.hnsw.get_or_insert_with(|| {
            HNSWGraph::new(self.config.dimensions, self.config.hnsw, DistanceFunction::Cosine)
        })
    }

    fn build_hnsw_from_scratch(&mut self) -> Result<()> {
        let mut graph = HNSWGraph::new(self.config.dimensions, self.config.hnsw, DistanceFunction::Cosine);
        self.hnsw_ids = vec![None; self.items.len()];
        self.hnsw_id_to_index.clear();

        for i in 0..self.items.len() {
            let vector = self.vectors[i].decode();
            let node_id = graph.insert(vector)?;
            self.hnsw_ids[i] = Some(node_id);
            self.hnsw_id_to_index.insert(node_id, i);
        }

        self.hnsw = Some(graph);
        Ok(())
    }

    fn insert_into_hnsw(&mut self, index: usize) -> Result<()> {
        if self.hnsw.is_none() {
            return Ok(());
        }
        let vector = self.vectors[index].decode();
        let node_id = self.ensure_hnsw().insert(vector)?;
        self.hnsw_ids[index] = Some(node_id);
        self.hnsw_id_to_index.insert(node_id, index);
        Ok(())
    }

    /// For each item: embed-or-fetch, then replace (existing id) or append
    /// (new id). Auto-builds HNSW the moment the item count crosses
    /// `ann_threshold`.
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn add(&mut self, items: Vec<Item>) -> Result<()> {
        for item in items {
            match self.id_index.get(&item.id).copied() {
                Some(index) => {
                    let vector = self.get_or_embed(&item.text).await?;
                    if vector.len() != self.config.dimensions {
                        return Err(CoreError::DimensionMismatch {
                            expected: self.config.dimensions,
                            actual: vector.len(),
                        });
                    }
                    self.items[index] = item;
                    self.vectors[index] = StoredVector::encode(&vector, self.config.quantization);

                    if let Some(graph) = self.hnsw.as_mut() {
                        if let Some(old_node) = self.hnsw_ids[index].take() {
                            graph.remove(old_node);
                            self.hnsw_id_to_index.remove(&old_node);
                        }
                    }
                    self.insert_into_hnsw(index)?;
                }
                None => {
                    let index = self.push_item(item).await?;
                    if self.hnsw.is_some() {
                        self.insert_into_hnsw(index)?;
                    } else if self.should_enable_ann() {
                        self.build_hnsw_from_scratch()?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Compact the item and vector tables, dropping every listed id. A
    /// missing id is a silent no-op. Rebuilds HNSW from scratch if it was
    /// active, per §4.4's Open Questions resolution.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub fn remove(&mut self, ids: &[String]) -> usize {
        let to_remove: std::collections::HashSet<usize> = ids
            .iter()
            .filter_map(|id| self.id_index.get(id).copied())
            .collect();

        if to_remove.is_empty() {
            return 0;
        }

        let mut new_items = Vec::with_capacity(self.items.len() - to_remove.len());
        let mut new_vectors = Vec::with_capacity(self.vectors.len() - to_remove.len());
        let mut new_id_index = HashMap::new();

        for (i, (item, vector)) in self.items.drain(..).zip(self.vectors.drain(..)).enumerate() {
            if to_remove.contains(&i) {
                continue;
            }
            new_id_index.insert(item.id.clone(), new_items.len());
            new_items.push(item);
            new_vectors.push(vector);
        }

        self.items = new_items;
        self.vectors = new_vectors;
        self.id_index = new_id_index;

        if self.hnsw.is_some() {
            if let Err(e) = self.build_hnsw_from_scratch() {
                warn!(error = %e, "failed to rebuild HNSW after remove");
            }
        } else {
            self.hnsw_ids = vec![None; self.items.len()];
        }

        to_remove.len()
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.id_index.get(id).map(|&i| &self.items[i])
    }

    pub fn get_all(&self) -> &[Item] {
        &self.items
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn set_weights(&mut self, weights: Weights) {
        self.config.weights = weights;
    }

    pub fn get_index_info(&self) -> IndexInfo {
        IndexInfo {
            ann_active: self.hnsw.is_some(),
            ann_threshold: self.config.ann_threshold,
            hnsw: self.hnsw.as_ref().map(|g| g.stats()),
            cache_hit_rate: self.cache.stats().hit_rate(),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// §4.6 search control flow.
    #[instrument(skip(self, query, filter), fields(query_len = query.len()))]
    pub async fn search(
        &mut self,
        query: &str,
        options: &SearchOptions,
        filter: Option<&dyn MetadataFilter>,
    ) -> Result<Vec<SearchResultItem>> {
        if query.chars().count() < options.min_length {
            return Ok(Vec::new());
        }

        let query_vector = self.get_or_embed(query).await?;
        if query_vector.len() != self.config.dimensions {
            return Err(CoreError::DimensionMismatch {
                expected: self.config.dimensions,
                actual: query_vector.len(),
            });
        }

        // (item index, semantic score)
        let mut candidates: Vec<(usize, f32)> = if self.hnsw.is_some() && options.use_ann {
            let want = (options.top_k * 2).max(options.top_k);
            self.hnsw
                .as_ref()
                .unwrap()
                .search(&query_vector, want)?
                .into_iter()
                .filter_map(|r| self.hnsw_id_to_index.get(&r.id).map(|&idx| (idx, 1.0 - r.distance)))
                .collect()
        } else {
            let query_vec = Vector::new(query_vector.clone());
            self.vectors
                .iter()
                .enumerate()
                .map(|(i, stored)| {
                    let decoded = Vector::new(stored.decode());
                    let cos = similarity::cosine(&query_vec, &decoded).unwrap_or(0.0);
                    (i, cos)
                })
                .collect()
        };

        if let Some(filter) = filter {
            candidates.retain(|(i, _)| filter.keep(self.items[*i].metadata.as_ref()));
        }

        let raw_scores: Vec<RawScores> = candidates
            .iter()
            .map(|&(i, semantic)| {
                let text = &self.items[i].text;
                RawScores {
                    semantic,
                    fuzzy: similarity::fuzzy(query, text),
                    keyword: similarity::keyword(query, text),
                }
            })
            .collect();

        let mut ranked = ranker::rank(&raw_scores, self.config.weights, true);
        ranked.retain(|r| r.score >= options.threshold);
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(options.top_k);

        Ok(ranked
            .into_iter()
            .map(|r| {
                let item_index = candidates[r.index].0;
                SearchResultItem {
                    id: self.items[item_index].id.clone(),
                    score: r.score,
                    raw: r.raw,
                    normalized: if options.explain { r.normalized } else { None },
                }
            })
            .collect())
    }
}
