//! Similarity kernels: cosine (pre-normalized inner product), fuzzy
//! (Levenshtein), and keyword (substring-containment).

use crate::error::Result;
use crate::vector::Vector;

/// Inner product of two unit-norm vectors. Returns a value in `[-1, 1]`.
pub fn cosine(a: &Vector, b: &Vector) -> Result<f32> {
    a.dot(b)
}

/// `1 - levenshtein(lowercase(a), lowercase(b)) / max(|a|, |b|)`.
/// Two empty strings are considered identical (returns 1.0).
pub fn fuzzy(a: &str, b: &str) -> f32 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();

    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }

    let dist = strsim::levenshtein(&a, &b) as f32;
    1.0 - dist / max_len as f32
}

/// Fraction of non-empty, lowercased query words occurring as substrings of
/// lowercased `text`. Returns 0 when `query` has no non-empty words.
pub fn keyword(query: &str, text: &str) -> f32 {
    let text = text.to_lowercase();
    let words: Vec<&str> = query
        .to_lowercase()
        .split_whitespace()
        .filter(|w| !w.is_empty())
        .collect();

    if words.is_empty() {
        return 0.0;
    }

    let hits = words.iter().filter(|w| text.contains(*w)).count();
    hits as f32 / words.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_identical() {
        let v = Vector::new(vec![1.0, 0.0, 0.0]);
        assert!((cosine(&v, &v).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_fuzzy_empty_strings() {
        assert_eq!(fuzzy("", ""), 1.0);
    }

    #[test]
    fn test_fuzzy_identical() {
        assert_eq!(fuzzy("charger", "Charger"), 1.0);
    }

    #[test]
    fn test_fuzzy_partial() {
        let score = fuzzy("charger", "chargr");
        assert!(score > 0.0 && score < 1.0);
    }

    #[test]
    fn test_keyword_no_words() {
        assert_eq!(keyword("   ", "phone charger"), 0.0);
    }

    #[test]
    fn test_keyword_full_match() {
        assert_eq!(keyword("phone charger", "USB-C phone charger cable"), 1.0);
    }

    #[test]
    fn test_keyword_partial_match() {
        let score = keyword("phone charger", "iPhone Charger");
        assert!(score > 0.0);
    }
}
