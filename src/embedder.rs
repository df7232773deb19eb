//! Embedder contract
//!
//! The embedding model itself is out of scope (§1 of the spec): the engine
//! only ever talks to it through this trait, treating it as a pure,
//! idempotent function of `(text, model)` for cache-keying purposes. Mirrors
//! the teacher's `async_trait`-based external-service boundaries
//! (`postgres::auth::OmenDbAuthSource`, `AuthSource`).

use async_trait::async_trait;
use thiserror::Error;

/// Error surfaced by an `Embedder`. Propagated unchanged into
/// [`crate::error::CoreError::Embedding`] — the engine never mutates state
/// when this is returned.
#[derive(Error, Debug, Clone)]
#[error("{0}")]
pub struct EmbedError(pub String);

impl EmbedError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// A pure function `embed(text, model) -> unit-norm vector of fixed dim`.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str, model: &str) -> Result<Vec<f32>, EmbedError>;

    /// Default implementation embeds one at a time; implementors with a
    /// batched backend should override this.
    async fn embed_batch(&self, texts: &[String], model: &str) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text, model).await?);
        }
        Ok(out)
    }
}

/// Deterministic in-memory embedder for tests and examples. Hashes the text
/// into a pseudo-random unit-norm vector of the configured dimensionality —
/// not semantically meaningful, but stable and idempotent, which is all the
/// cache-keying contract requires.
#[cfg(feature = "test-util")]
pub struct TestEmbedder {
    pub dimensions: usize,
}

#[cfg(feature = "test-util")]
#[async_trait]
impl Embedder for TestEmbedder {
    async fn embed(&self, text: &str, _model: &str) -> Result<Vec<f32>, EmbedError> {
        Ok(deterministic_unit_vector(text, self.dimensions))
    }
}

#[cfg(feature = "test-util")]
fn deterministic_unit_vector(text: &str, dimensions: usize) -> Vec<f32> {
    use std::io::Cursor;

    let mut raw = Vec::with_capacity(dimensions);
    for i in 0..dimensions {
        let seed = format!("{text}:{i}");
        let h = murmur3::murmur3_32(&mut Cursor::new(seed.as_bytes()), 0)
            .expect("hashing an in-memory buffer cannot fail");
        raw.push((h % 2000) as f32 / 1000.0 - 1.0);
    }

    let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm == 0.0 {
        let mut v = vec![0.0; dimensions];
        v[0] = 1.0;
        v
    } else {
        raw.iter().map(|x| x / norm).collect()
    }
}
