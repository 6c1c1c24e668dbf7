//! Deterministic feature hashing: turn free-text capability descriptions
//! into fixed-dimension unit vectors without a learned embedding model.
//!
//! Each token is hashed twice: once to pick a bucket in `[0, dim)`, once to
//! pick a sign. This is the standard "hashing trick" (Weinberger et al.) —
//! collisions are accepted as noise rather than resolved, which keeps the
//! vectorizer a pure function with no vocabulary to persist or version.

use crate::metric::Vector;

pub const DEFAULT_DIM: usize = 256;

fn fnv1a_64(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;
    let mut hash = OFFSET;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

/// Hash a sequence of tokens into a unit-norm vector of dimension `dim`.
pub fn vectorize_tokens<S: AsRef<str>>(tokens: &[S], dim: usize) -> Vector {
    let mut buckets = vec![0f32; dim];
    for token in tokens {
        let bytes = token.as_ref().as_bytes();
        let bucket_hash = fnv1a_64(bytes);
        let sign_hash = fnv1a_64(&[bytes, b"#sign"].concat());
        let bucket = (bucket_hash as usize) % dim;
        let sign = if sign_hash % 2 == 0 { 1.0 } else { -1.0 };
        buckets[bucket] += sign;
    }
    let mut v = Vector(buckets);
    v.normalize();
    v
}

/// Vectorize free-form text (e.g. an agent's description field).
pub fn vectorize_text(text: &str, dim: usize) -> Vector {
    let tokens = tokenize(text);
    vectorize_tokens(&tokens, dim)
}

/// Vectorize a capability list, where each capability contributes its
/// whole identifier as a single token (not split further) so that
/// `"image.generate"` and `"image.classify"` land in different buckets.
pub fn vectorize_capabilities(capabilities: &[String], dim: usize) -> Vector {
    let lowered: Vec<String> = capabilities.iter().map(|c| c.to_lowercase()).collect();
    vectorize_tokens(&lowered, dim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_same_vector() {
        let a = vectorize_text("search the web and summarize", DEFAULT_DIM);
        let b = vectorize_text("search the web and summarize", DEFAULT_DIM);
        assert_eq!(a, b);
    }

    #[test]
    fn vector_is_unit_norm() {
        let v = vectorize_text("translate text between languages", DEFAULT_DIM);
        assert!((v.norm() - 1.0).abs() < 1e-5 || v.norm() == 0.0);
    }

    #[test]
    fn distinct_capabilities_differ() {
        let a = vectorize_capabilities(&["image.generate".to_string()], DEFAULT_DIM);
        let b = vectorize_capabilities(&["image.classify".to_string()], DEFAULT_DIM);
        assert_ne!(a, b);
    }

    #[test]
    fn empty_input_is_zero_vector() {
        let v = vectorize_text("", DEFAULT_DIM);
        assert_eq!(v.norm(), 0.0);
    }
}
