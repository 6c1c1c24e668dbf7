use sha2::{Digest, Sha256};

/// Compute the SHA-256 digest of `data`, returned as a raw 32-byte array.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

/// Compute the SHA-256 digest and format it the way the wire protocol
/// expects binary/card hashes: `sha256:<hex>`.
pub fn sha256_tagged(data: &[u8]) -> String {
    format!("sha256:{}", hex::encode(sha256(data)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_hash_has_expected_shape() {
        let tagged = sha256_tagged(b"hello");
        assert!(tagged.starts_with("sha256:"));
        assert_eq!(tagged.len(), "sha256:".len() + 64);
    }

    #[test]
    fn same_input_same_hash() {
        assert_eq!(sha256(b"agoria"), sha256(b"agoria"));
        assert_ne!(sha256(b"agoria"), sha256(b"agoriax"));
    }
}
