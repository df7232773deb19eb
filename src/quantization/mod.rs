//! Quantized vector store
//!
//! Three encodings back a stored vector: float32 (native), float16 (IEEE-754
//! binary16, round-to-nearest-even), and int8 (affine per-vector
//! quantization). Mirrors the teacher's `QuantizationModel`/`QuantizedVector`
//! split of "encoding policy" from "per-vector payload", adapted from the
//! teacher's per-collection-trained binary scheme to this crate's per-vector
//! affine scheme.

mod float16;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Which encoding `Engine::build` picks for a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quantization {
    Float32,
    Float16,
    Int8,
}

impl Default for Quantization {
    fn default() -> Self {
        Quantization::Float32
    }
}

/// A single metadata header written ahead of non-float32 base64 payloads.
#[derive(Debug, Serialize, Deserialize)]
struct StoredVectorMeta {
    #[serde(rename = "type")]
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scale: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<f32>,
}

/// A vector stored in one of the three encodings.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredVector {
    Float32(Vec<f32>),
    Float16(Vec<u16>),
    Int8 {
        data: Vec<i8>,
        scale: f32,
        offset: f32,
    },
}

impl StoredVector {
    pub fn dimensions(&self) -> usize {
        match self {
            StoredVector::Float32(v) => v.len(),
            StoredVector::Float16(v) => v.len(),
            StoredVector::Int8 { data, .. } => data.len(),
        }
    }

    pub fn quantization(&self) -> Quantization {
        match self {
            StoredVector::Float32(_) => Quantization::Float32,
            StoredVector::Float16(_) => Quantization::Float16,
            StoredVector::Int8 { .. } => Quantization::Int8,
        }
    }

    /// Encode a float32 vector using the requested encoding.
    pub fn encode(vector: &[f32], quantization: Quantization) -> StoredVector {
        match quantization {
            Quantization::Float32 => StoredVector::Float32(vector.to_vec()),
            Quantization::Float16 => {
                StoredVector::Float16(vector.iter().map(|&x| float16::f32_to_f16(x)).collect())
            }
            Quantization::Int8 => {
                let min = vector.iter().cloned().fold(f32::INFINITY, f32::min);
                let max = vector.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
                let scale = if max > min { (max - min) / 255.0 } else { 1.0 };
                let offset = min;

                let data = vector
                    .iter()
                    .map(|&x| {
                        let q = ((x - offset) / scale).round() - 128.0;
                        q.clamp(-128.0, 127.0) as i8
                    })
                    .collect();

                StoredVector::Int8 {
                    data,
                    scale,
                    offset,
                }
            }
        }
    }

    /// Decode back to a float32 vector.
    pub fn decode(&self) -> Vec<f32> {
        match self {
            StoredVector::Float32(v) => v.clone(),
            StoredVector::Float16(v) => v.iter().map(|&x| float16::f16_to_f32(x)).collect(),
            StoredVector::Int8 {
                data,
                scale,
                offset,
            } => data
                .iter()
                .map(|&q| (q as f32 + 128.0) * scale + offset)
                .collect(),
        }
    }

    /// Inner product. Requires matching encodings, falling back to
    /// decode-then-dot for anything other than float32-float32.
    pub fn dot(&self, other: &StoredVector) -> Result<f32> {
        if self.dimensions() != other.dimensions() {
            return Err(CoreError::DimensionMismatch {
                expected: self.dimensions(),
                actual: other.dimensions(),
            });
        }

        match (self, other) {
            (StoredVector::Float32(a), StoredVector::Float32(b)) => {
                Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
            }
            _ => {
                let a = self.decode();
                let b = other.decode();
                Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
            }
        }
    }

    /// Base64-encode with the metadata header described in the snapshot format:
    /// float32 is raw bytes; float16/int8 prepend a 2-byte little-endian
    /// length-prefixed JSON metadata blob.
    pub fn to_base64(&self) -> Result<String> {
        let engine = base64::engine::general_purpose::STANDARD;

        match self {
            StoredVector::Float32(v) => {
                let mut bytes = Vec::with_capacity(v.len() * 4);
                for x in v {
                    bytes.extend_from_slice(&x.to_le_bytes());
                }
                Ok(engine.encode(bytes))
            }
            StoredVector::Float16(v) => {
                let meta = StoredVectorMeta {
                    kind: "float16".to_string(),
                    scale: None,
                    offset: None,
                };
                let meta_bytes = serde_json::to_vec(&meta)
                    .map_err(|e| CoreError::Snapshot(e.to_string()))?;

                let mut bytes = Vec::with_capacity(2 + meta_bytes.len() + v.len() * 2);
                bytes.extend_from_slice(&(meta_bytes.len() as u16).to_le_bytes());
                bytes.extend_from_slice(&meta_bytes);
                for x in v {
                    bytes.extend_from_slice(&x.to_le_bytes());
                }
                Ok(engine.encode(bytes))
            }
            StoredVector::Int8 {
                data,
                scale,
                offset,
            } => {
                let meta = StoredVectorMeta {
                    kind: "int8".to_string(),
                    scale: Some(*scale),
                    offset: Some(*offset),
                };
                let meta_bytes = serde_json::to_vec(&meta)
                    .map_err(|e| CoreError::Snapshot(e.to_string()))?;

                let mut bytes = Vec::with_capacity(2 + meta_bytes.len() + data.len());
                bytes.extend_from_slice(&(meta_bytes.len() as u16).to_le_bytes());
                bytes.extend_from_slice(&meta_bytes);
                bytes.extend(data.iter().map(|&q| q as u8));
                Ok(engine.encode(bytes))
            }
        }
    }

    /// Decode a base64 payload, given the dimensionality the engine expects.
    pub fn from_base64(encoded: &str, quantization: Quantization, dimensions: usize) -> Result<StoredVector> {
        let engine = base64::engine::general_purpose::STANDARD;
        let bytes = engine
            .decode(encoded)
            .map_err(|e| CoreError::Snapshot(e.to_string()))?;

        match quantization {
            Quantization::Float32 => {
                if bytes.len() != dimensions * 4 {
                    return Err(CoreError::Snapshot(format!(
                        "expected {} bytes for {} float32 dims, got {}",
                        dimensions * 4,
                        dimensions,
                        bytes.len()
                    )));
                }
                let data = bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                Ok(StoredVector::Float32(data))
            }
            Quantization::Float16 => {
                let (_meta, payload) = split_header(&bytes)?;
                if payload.len() != dimensions * 2 {
                    return Err(CoreError::Snapshot(format!(
                        "expected {} bytes for {} float16 dims, got {}",
                        dimensions * 2,
                        dimensions,
                        payload.len()
                    )));
                }
                let data = payload
                    .chunks_exact(2)
                    .map(|c| u16::from_le_bytes([c[0], c[1]]))
                    .collect();
                Ok(StoredVector::Float16(data))
            }
            Quantization::Int8 => {
                let (meta, payload) = split_header(&bytes)?;
                if payload.len() != dimensions {
                    return Err(CoreError::Snapshot(format!(
                        "expected {} bytes for {} int8 dims, got {}",
                        dimensions,
                        dimensions,
                        payload.len()
                    )));
                }
                let scale = meta.scale.ok_or_else(|| {
                    CoreError::InvalidQuantization("int8 payload missing scale".into())
                })?;
                let offset = meta.offset.ok_or_else(|| {
                    CoreError::InvalidQuantization("int8 payload missing offset".into())
                })?;
                let data = payload.iter().map(|&b| b as i8).collect();
                Ok(StoredVector::Int8 {
                    data,
                    scale,
                    offset,
                })
            }
        }
    }
}

fn split_header(bytes: &[u8]) -> Result<(StoredVectorMeta, &[u8])> {
    if bytes.len() < 2 {
        return Err(CoreError::Snapshot("payload too short for header".into()));
    }
    let meta_len = u16::from_le_bytes([bytes[0], bytes[1]]) as usize;
    if bytes.len() < 2 + meta_len {
        return Err(CoreError::Snapshot("payload too short for metadata blob".into()));
    }
    let meta: StoredVectorMeta = serde_json::from_slice(&bytes[2..2 + meta_len])
        .map_err(|e| CoreError::Snapshot(e.to_string()))?;
    Ok((meta, &bytes[2 + meta_len..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_vector(n: usize) -> Vec<f32> {
        let raw: Vec<f32> = (0..n).map(|i| (i as f32 - n as f32 / 2.0).sin()).collect();
        let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
        raw.iter().map(|x| x / norm).collect()
    }

    #[test]
    fn test_float32_roundtrip_exact() {
        let v = unit_vector(16);
        let stored = StoredVector::encode(&v, Quantization::Float32);
        assert_eq!(stored.decode(), v);
    }

    #[test]
    fn test_float16_roundtrip_close() {
        let v = unit_vector(32);
        let stored = StoredVector::encode(&v, Quantization::Float16);
        let decoded = stored.decode();
        for (a, b) in v.iter().zip(decoded.iter()) {
            assert!((a - b).abs() < 1e-2, "a={a} b={b}");
        }
    }

    #[test]
    fn test_int8_roundtrip_bounded_error() {
        let v = unit_vector(64);
        let stored = StoredVector::encode(&v, Quantization::Int8);
        let decoded = stored.decode();
        let dot: f32 = v.iter().zip(decoded.iter()).map(|(a, b)| a * b).sum();
        let norm_v: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_d: f32 = decoded.iter().map(|x| x * x).sum::<f32>().sqrt();
        let cosine = dot / (norm_v * norm_d);
        assert!(cosine >= 1.0 - 5e-2);
    }

    #[test]
    fn test_base64_roundtrip_float32() {
        let v = vec![1.0, -1.0, 0.5, -0.5];
        let stored = StoredVector::encode(&v, Quantization::Float32);
        let encoded = stored.to_base64().unwrap();
        let decoded = StoredVector::from_base64(&encoded, Quantization::Float32, 4).unwrap();
        assert_eq!(decoded.decode(), v);
    }

    #[test]
    fn test_base64_roundtrip_int8() {
        let v = unit_vector(8);
        let stored = StoredVector::encode(&v, Quantization::Int8);
        let encoded = stored.to_base64().unwrap();
        let decoded = StoredVector::from_base64(&encoded, Quantization::Int8, 8).unwrap();
        assert_eq!(decoded, stored);
    }

    #[test]
    fn test_dimension_mismatch_dot() {
        let a = StoredVector::Float32(vec![1.0, 2.0]);
        let b = StoredVector::Float32(vec![1.0, 2.0, 3.0]);
        assert!(a.dot(&b).is_err());
    }

    #[test]
    fn test_constant_vector_int8_roundtrip() {
        let v = vec![0.5; 8];
        let stored = StoredVector::encode(&v, Quantization::Int8);
        assert_eq!(stored.decode(), v);
    }
}
