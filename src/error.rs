//! Error types for the hybrid search core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("engine is closed")]
    EngineClosed,

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("invalid quantization: {0}")]
    InvalidQuantization(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
