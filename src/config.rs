//! Engine-wide configuration
//!
//! A plain struct with a `Default` impl carrying the spec's defaults, following
//! the same preference for explicit config structs (rather than a generic
//! config-file loader) seen in `HNSWParams`/`LogConfig`.

use crate::hnsw::HNSWParams;
use crate::quantization::Quantization;

/// Ranker weights `(semantic, fuzzy, keyword)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub semantic: f32,
    pub fuzzy: f32,
    pub keyword: f32,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            semantic: 0.7,
            fuzzy: 0.15,
            keyword: 0.15,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Embedding/vector dimensionality.
    pub dimensions: usize,

    /// Model identifier passed to the embedder and used as a cache-key component.
    pub model: String,

    /// Ranker weights.
    pub weights: Weights,

    /// Number of items at or above which HNSW is built automatically.
    pub ann_threshold: usize,

    /// Build HNSW regardless of `ann_threshold` ("the user requests it").
    pub force_ann: bool,

    /// HNSW construction/search parameters.
    pub hnsw: HNSWParams,

    /// Vector encoding used by the quantized store.
    pub quantization: Quantization,

    /// Embedding cache capacity (entries).
    pub cache_capacity: usize,
}

impl EngineConfig {
    pub fn new(dimensions: usize, model: impl Into<String>) -> Self {
        Self {
            dimensions,
            model: model.into(),
            weights: Weights::default(),
            ann_threshold: 1000,
            force_ann: false,
            hnsw: HNSWParams::default(),
            quantization: Quantization::Float32,
            cache_capacity: 10_000,
        }
    }
}

/// Per-search overrides. Defaults match the spec's documented defaults.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub top_k: usize,
    pub threshold: f32,
    pub min_length: usize,
    pub explain: bool,
    pub use_ann: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            threshold: 0.0,
            min_length: 1,
            explain: false,
            use_ann: true,
        }
    }
}
