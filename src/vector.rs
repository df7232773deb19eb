//! Vector type
//!
//! A dense, fixed-dimension float32 vector. Embeddings are expected to be
//! unit-norm; `normalize` is provided for callers (tests, the quantization
//! round-trip) that need to construct one from raw components.

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Vector {
    pub data: Vec<f32>,
}

impl Vector {
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    pub fn dim(&self) -> usize {
        self.data.len()
    }

    pub fn l2_norm(&self) -> f32 {
        self.data.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// `true` within a small epsilon of unit length.
    pub fn is_unit_norm(&self) -> bool {
        (self.l2_norm() - 1.0).abs() < 1e-3
    }

    pub fn normalize(&self) -> Result<Vector> {
        let norm = self.l2_norm();
        if norm == 0.0 {
            return Err(CoreError::Embedding("cannot normalize zero vector".into()));
        }
        Ok(Vector::new(self.data.iter().map(|x| x / norm).collect()))
    }

    pub fn dot(&self, other: &Vector) -> Result<f32> {
        if self.dim() != other.dim() {
            return Err(CoreError::DimensionMismatch {
                expected: self.dim(),
                actual: other.dim(),
            });
        }
        Ok(self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| a * b)
            .sum())
    }
}
