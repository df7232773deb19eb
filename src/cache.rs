//! LRU embedding cache
//!
//! A fixed-capacity mapping from (text, model) to an embedding vector, keyed
//! by an 8-hex-digit MurmurHash3 of the text concatenated with an 8-hex-digit
//! MurmurHash3 of the model identifier (seed 0, seed 1 respectively). Mirrors
//! the teacher's `RowCache`, but owned (not `Arc<RwLock<..>>`-shared) per
//! `Engine`'s single-writer model.

use std::io::Cursor;
use std::num::NonZeroUsize;

use base64::Engine as _;
use lru::LruCache;

use crate::quantization::{Quantization, StoredVector};

fn murmur_hash(bytes: &[u8], seed: u32) -> u32 {
    murmur3::murmur3_32(&mut Cursor::new(bytes), seed).expect("hashing an in-memory buffer cannot fail")
}

/// Cache key: `{text_hash:08x}_{model_hash:08x}`.
fn cache_key(text: &str, model: &str) -> String {
    let text_hash = murmur_hash(text.as_bytes(), 0);
    let model_hash = murmur_hash(model.as_bytes(), 1);
    format!("{:08x}_{:08x}", text_hash, model_hash)
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

pub struct EmbeddingCache {
    cache: LruCache<String, Vec<f32>>,
    hits: u64,
    misses: u64,
    capacity: usize,
}

impl EmbeddingCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity.max(1)).unwrap()),
            hits: 0,
            misses: 0,
            capacity,
        }
    }

    /// Get the cached embedding, promoting it to most-recently-used on hit.
    pub fn get(&mut self, text: &str, model: &str) -> Option<Vec<f32>> {
        let key = cache_key(text, model);
        if let Some(v) = self.cache.get(&key) {
            self.hits += 1;
            Some(v.clone())
        } else {
            self.misses += 1;
            None
        }
    }

    pub fn has(&mut self, text: &str, model: &str) -> bool {
        let key = cache_key(text, model);
        self.cache.contains(&key)
    }

    /// Insert or replace an entry, evicting the least-recently-used entry if
    /// the cache is at capacity.
    pub fn set(&mut self, text: &str, model: &str, vector: Vec<f32>) {
        let key = cache_key(text, model);
        self.cache.put(key, vector);
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            size: self.cache.len(),
            capacity: self.capacity,
        }
    }

    /// (key, base64-encoded float32 vector) pairs, most-recently-used first.
    pub fn to_entries(&self) -> Vec<(String, String)> {
        self.cache
            .iter()
            .filter_map(|(k, v)| {
                StoredVector::Float32(v.clone())
                    .to_base64()
                    .ok()
                    .map(|b64| (k.clone(), b64))
            })
            .collect()
    }

    /// Rebuild a cache from (key, base64-vector) pairs, e.g. loaded from a
    /// snapshot. Entries are inserted oldest-first so iteration order is
    /// preserved as most-recently-used-first afterwards.
    pub fn from_entries(capacity: usize, entries: Vec<(String, String)>, dimensions: usize) -> Self {
        let mut cache = Self::new(capacity);
        for (key, b64) in entries.into_iter().rev() {
            if let Ok(stored) = StoredVector::from_base64(&b64, Quantization::Float32, dimensions) {
                cache.cache.put(key, stored.decode());
            }
        }
        cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_hit() {
        let mut cache = EmbeddingCache::new(10);
        cache.set("hello", "model-a", vec![1.0, 2.0, 3.0]);

        assert_eq!(cache.get("hello", "model-a"), Some(vec![1.0, 2.0, 3.0]));
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 0);
    }

    #[test]
    fn test_cache_miss() {
        let mut cache = EmbeddingCache::new(10);
        assert_eq!(cache.get("hello", "model-a"), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_distinct_models_distinct_keys() {
        let mut cache = EmbeddingCache::new(10);
        cache.set("hello", "model-a", vec![1.0]);
        cache.set("hello", "model-b", vec![2.0]);
        assert_eq!(cache.get("hello", "model-a"), Some(vec![1.0]));
        assert_eq!(cache.get("hello", "model-b"), Some(vec![2.0]));
    }

    #[test]
    fn test_lru_eviction() {
        let mut cache = EmbeddingCache::new(2);
        cache.set("a", "m", vec![1.0]);
        cache.set("b", "m", vec![2.0]);
        cache.set("c", "m", vec![3.0]);

        assert_eq!(cache.get("a", "m"), None); // evicted
        assert_eq!(cache.get("b", "m"), Some(vec![2.0]));
        assert_eq!(cache.get("c", "m"), Some(vec![3.0]));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_recency_promotion() {
        let mut cache = EmbeddingCache::new(2);
        cache.set("a", "m", vec![1.0]);
        cache.set("b", "m", vec![2.0]);

        // touch "a" so "b" becomes LRU
        let _ = cache.get("a", "m");
        cache.set("c", "m", vec![3.0]);

        assert_eq!(cache.get("b", "m"), None); // evicted
        assert_eq!(cache.get("a", "m"), Some(vec![1.0]));
    }

    #[test]
    fn test_clear() {
        let mut cache = EmbeddingCache::new(10);
        cache.set("a", "m", vec![1.0]);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_entries_roundtrip() {
        let mut cache = EmbeddingCache::new(10);
        cache.set("a", "m", vec![1.0, 2.0]);
        cache.set("b", "m", vec![3.0, 4.0]);

        let entries = cache.to_entries();
        let restored = EmbeddingCache::from_entries(10, entries, 2);

        assert_eq!(restored.get("a", "m"), Some(vec![1.0, 2.0]));
        assert_eq!(restored.get("b", "m"), Some(vec![3.0, 4.0]));
    }
}
