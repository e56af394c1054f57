use std::collections::HashMap;

use async_trait::async_trait;
use bdaybot_core::BlobStore;
use bdaybot_domain::Result;
use parking_lot::RwLock;

use super::validate_key;

/// Process-local store; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        validate_key(key)?;
        Ok(self.blobs.read().get(key).cloned())
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        validate_key(key)?;
        self.blobs.write().insert(key.to_string(), bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_replaces_previous_value() {
        let store = MemoryBlobStore::default();
        store.put("auth_info/session.json", b"one".to_vec()).await.unwrap();
        store.put("auth_info/session.json", b"two".to_vec()).await.unwrap();

        assert_eq!(store.get("auth_info/session.json").await.unwrap(), Some(b"two".to_vec()));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("auth_state/last_auth.json").await.unwrap(), None);
    }
}
