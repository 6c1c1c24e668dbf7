//! Content-addressed cache for blobs resolved from the DHT. Every `put` is
//! keyed by its own `sha256:<hex>` digest, so a `get` can always re-verify
//! the bytes it returns against the key the caller asked for.

use agoria_core::AgoriaError;
use agoria_crypto::sha256_tagged;

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("content hash mismatch: key {key} does not match digest {digest}")]
    HashMismatch { key: String, digest: String },
}

pub struct ContentStore {
    tree: sled::Tree,
}

impl ContentStore {
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self, AgoriaError> {
        let db = sled::open(path).map_err(|e| AgoriaError::Storage(e.to_string()))?;
        let tree = db
            .open_tree("overlay_blobs")
            .map_err(|e| AgoriaError::Storage(e.to_string()))?;
        Ok(Self { tree })
    }

    pub fn open_in_memory() -> Result<Self, AgoriaError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| AgoriaError::Storage(e.to_string()))?;
        let tree = db
            .open_tree("overlay_blobs")
            .map_err(|e| AgoriaError::Storage(e.to_string()))?;
        Ok(Self { tree })
    }

    /// Store `bytes` and return its content key.
    pub fn put(&self, bytes: &[u8]) -> Result<String, AgoriaError> {
        let key = sha256_tagged(bytes);
        self.tree
            .insert(key.as_bytes(), bytes)
            .map_err(|e| AgoriaError::Storage(e.to_string()))?;
        Ok(key)
    }

    /// Fetch bytes previously stored under `key`, re-verifying the digest.
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AgoriaError> {
        match self
            .tree
            .get(key.as_bytes())
            .map_err(|e| AgoriaError::Storage(e.to_string()))?
        {
            Some(bytes) => {
                verify_digest(key, &bytes)?;
                Ok(Some(bytes.to_vec()))
            }
            None => Ok(None),
        }
    }

    /// Accept a blob fetched from a remote peer: verifies it before
    /// caching. Callers should blacklist the source peer when this errors.
    pub fn accept_remote(&self, key: &str, bytes: &[u8]) -> Result<(), AgoriaError> {
        verify_digest(key, bytes)?;
        self.tree
            .insert(key.as_bytes(), bytes)
            .map_err(|e| AgoriaError::Storage(e.to_string()))?;
        Ok(())
    }
}

fn verify_digest(key: &str, bytes: &[u8]) -> Result<(), AgoriaError> {
    let digest = sha256_tagged(bytes);
    if digest != key {
        return Err(AgoriaError::InvalidField(
            ContentError::HashMismatch {
                key: key.to_string(),
                digest,
            }
            .to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let store = ContentStore::open_in_memory().unwrap();
        let key = store.put(b"agent card bytes").unwrap();
        let fetched = store.get(&key).unwrap().unwrap();
        assert_eq!(fetched, b"agent card bytes");
    }

    #[test]
    fn accept_remote_rejects_mismatched_digest() {
        let store = ContentStore::open_in_memory().unwrap();
        let result = store.accept_remote("sha256:deadbeef", b"other bytes");
        assert!(result.is_err());
    }

    #[test]
    fn get_missing_key_returns_none() {
        let store = ContentStore::open_in_memory().unwrap();
        assert!(store.get("sha256:0000").unwrap().is_none());
    }
}
