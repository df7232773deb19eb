//! Hybrid ranker
//!
//! Combines the three similarity kernels' raw scores under configurable
//! weights, with optional per-batch min-max normalization. Candidate-batch
//! normalization makes scores comparable across heterogeneous kernels
//! without global calibration; weights are the user's policy.

use crate::config::Weights;

/// Raw `(semantic, fuzzy, keyword)` scores for one candidate, plus the item
/// id they belong to.
#[derive(Debug, Clone)]
pub struct RawScores {
    pub semantic: f32,
    pub fuzzy: f32,
    pub keyword: f32,
}

/// A candidate after ranking: its final combined score, and — when
/// `explain` is requested — the raw and normalized component scores.
#[derive(Debug, Clone)]
pub struct RankedCandidate {
    pub index: usize,
    pub score: f32,
    pub raw: RawScores,
    pub normalized: Option<RawScores>,
}

/// Normalize weights to sum to 1. All-zero weights fall back to the spec's
/// defaults (0.7, 0.15, 0.15).
pub fn normalize_weights(weights: Weights) -> Weights {
    let total = weights.semantic + weights.fuzzy + weights.keyword;
    if total <= 0.0 {
        return Weights::default();
    }
    Weights {
        semantic: weights.semantic / total,
        fuzzy: weights.fuzzy / total,
        keyword: weights.keyword / total,
    }
}

fn min_max(values: impl Iterator<Item = f32> + Clone) -> (f32, f32) {
    let min = values.clone().fold(f32::INFINITY, f32::min);
    let max = values.fold(f32::NEG_INFINITY, f32::max);
    (min, max)
}

/// Scale a single value into `[0, 1]` given a batch's `(min, max)`. When
/// `max <= min` (a degenerate, constant batch), a positive value maps to 1
/// and anything else to 0.
fn scale(value: f32, min: f32, max: f32) -> f32 {
    if max <= min {
        if value > 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        (value - min) / (max - min)
    }
}

/// Rank a batch of raw scores: normalize weights, optionally min-max
/// normalize each component across the batch, then combine under the
/// weights. Results are NOT sorted or filtered here — that's the façade's
/// job, since it also needs to apply `threshold` and `topK`.
pub fn rank(raw_scores: &[RawScores], weights: Weights, normalize: bool) -> Vec<RankedCandidate> {
    let w = normalize_weights(weights);

    let normalized: Vec<Option<RawScores>> = if normalize && !raw_scores.is_empty() {
        let (s_min, s_max) = min_max(raw_scores.iter().map(|r| r.semantic));
        let (f_min, f_max) = min_max(raw_scores.iter().map(|r| r.fuzzy));
        let (k_min, k_max) = min_max(raw_scores.iter().map(|r| r.keyword));

        raw_scores
            .iter()
            .map(|r| {
                Some(RawScores {
                    semantic: scale(r.semantic, s_min, s_max),
                    fuzzy: scale(r.fuzzy, f_min, f_max),
                    keyword: scale(r.keyword, k_min, k_max),
                })
            })
            .collect()
    } else {
        raw_scores.iter().map(|_| None).collect()
    };

    raw_scores
        .iter()
        .zip(normalized)
        .enumerate()
        .map(|(index, (raw, norm))| {
            let components = norm.as_ref().unwrap_or(raw);
            let score = w.semantic * components.semantic
                + w.fuzzy * components.fuzzy
                + w.keyword * components.keyword;
            RankedCandidate {
                index,
                score,
                raw: raw.clone(),
                normalized: norm,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_weights_sums_to_one() {
        let w = normalize_weights(Weights {
            semantic: 2.0,
            fuzzy: 1.0,
            keyword: 1.0,
        });
        let total = w.semantic + w.fuzzy + w.keyword;
        assert!((total - 1.0).abs() < 1e-6);
        assert!((w.semantic - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_all_zero_weights_uses_defaults() {
        let w = normalize_weights(Weights {
            semantic: 0.0,
            fuzzy: 0.0,
            keyword: 0.0,
        });
        assert_eq!(w, Weights::default());
    }

    #[test]
    fn test_min_max_normalization_bounds() {
        let raw = vec![
            RawScores { semantic: 0.1, fuzzy: 0.5, keyword: 1.0 },
            RawScores { semantic: 0.9, fuzzy: 0.5, keyword: 0.0 },
        ];
        let ranked = rank(&raw, Weights::default(), true);
        for r in &ranked {
            let n = r.normalized.as_ref().unwrap();
            assert!(n.semantic >= 0.0 && n.semantic <= 1.0);
            assert!(n.fuzzy >= 0.0 && n.fuzzy <= 1.0);
            assert!(n.keyword >= 0.0 && n.keyword <= 1.0);
        }
    }

    #[test]
    fn test_min_max_degenerate_batch() {
        // every candidate has identical fuzzy score -> max == min
        let raw = vec![
            RawScores { semantic: 0.0, fuzzy: 0.3, keyword: 0.0 },
            RawScores { semantic: 1.0, fuzzy: 0.3, keyword: 0.0 },
        ];
        let ranked = rank(&raw, Weights::default(), true);
        // positive value maps to 1, zero maps to 0
        assert_eq!(ranked[0].normalized.as_ref().unwrap().fuzzy, 1.0);
        assert_eq!(ranked[1].normalized.as_ref().unwrap().fuzzy, 1.0);

        let raw_zero = vec![
            RawScores { semantic: 0.0, fuzzy: 0.0, keyword: 0.0 },
            RawScores { semantic: 0.0, fuzzy: 0.0, keyword: 0.0 },
        ];
        let ranked_zero = rank(&raw_zero, Weights::default(), true);
        assert_eq!(ranked_zero[0].normalized.as_ref().unwrap().semantic, 0.0);
    }

    #[test]
    fn test_rank_without_normalization_uses_raw() {
        let raw = vec![RawScores { semantic: 0.4, fuzzy: 0.2, keyword: 0.6 }];
        let ranked = rank(&raw, Weights::default(), false);
        assert!(ranked[0].normalized.is_none());
        let expected = 0.7 * 0.4 + 0.15 * 0.2 + 0.15 * 0.6;
        assert!((ranked[0].score - expected).abs() < 1e-6);
    }

    #[test]
    fn test_rank_empty_batch() {
        let ranked = rank(&[], Weights::default(), true);
        assert!(ranked.is_empty());
    }
}
