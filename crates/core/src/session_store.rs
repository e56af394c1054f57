//! Session persistence on top of a [`BlobStore`]
//!
//! The credential files are bundled into one JSON blob so a restore never
//! sees half of a rotation.

use std::sync::Arc;

use bdaybot_domain::constants::SESSION_BUNDLE_KEY;
use bdaybot_domain::{RelayError, Result, SessionMaterial};
use tracing::debug;

use crate::ports::BlobStore;

/// Persists and restores [`SessionMaterial`].
#[derive(Clone)]
pub struct SessionStore {
    store: Arc<dyn BlobStore>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Load the stored session, if any.
    ///
    /// An empty bundle counts as no session.
    pub async fn restore(&self) -> Result<Option<SessionMaterial>> {
        let Some(bytes) = self.store.get(SESSION_BUNDLE_KEY).await? else {
            debug!(key = SESSION_BUNDLE_KEY, "session.restore.not_found");
            return Ok(None);
        };

        let material: SessionMaterial = serde_json::from_slice(&bytes).map_err(|err| {
            RelayError::Serialization(format!("corrupt session bundle: {err}"))
        })?;

        debug!(files = material.len(), "session.restore.loaded");
        Ok((!material.is_empty()).then_some(material))
    }

    /// Replace the stored session with `material`.
    pub async fn persist(&self, material: &SessionMaterial) -> Result<()> {
        let bytes = serde_json::to_vec(material)
            .map_err(|err| RelayError::Serialization(err.to_string()))?;
        self.store.put(SESSION_BUNDLE_KEY, bytes).await?;
        debug!(files = material.len(), "session.persist.saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;

    #[derive(Default)]
    struct MapStore(Mutex<HashMap<String, Vec<u8>>>);

    #[async_trait]
    impl BlobStore for MapStore {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            Ok(self.0.lock().get(key).cloned())
        }

        async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
            self.0.lock().insert(key.to_string(), bytes);
            Ok(())
        }
    }

    #[tokio::test]
    async fn persisted_bundle_restores_every_file() {
        let sessions = SessionStore::new(Arc::new(MapStore::default()));
        let material = SessionMaterial::from_files([
            ("creds.json", b"{}".to_vec()),
            ("app-state-sync-key-1.json", b"key".to_vec()),
        ]);

        sessions.persist(&material).await.unwrap();

        assert_eq!(sessions.restore().await.unwrap(), Some(material));
    }

    #[tokio::test]
    async fn empty_bundle_is_no_session() {
        let sessions = SessionStore::new(Arc::new(MapStore::default()));
        assert_eq!(sessions.restore().await.unwrap(), None);

        sessions.persist(&SessionMaterial::new()).await.unwrap();
        assert_eq!(sessions.restore().await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_bundle_is_a_serialization_error() {
        let store = MapStore::default();
        store.0.lock().insert(SESSION_BUNDLE_KEY.to_string(), b"\x00\x01".to_vec());
        let sessions = SessionStore::new(Arc::new(store));

        let err = sessions.restore().await.unwrap_err();
        assert!(matches!(err, RelayError::Serialization(_)));
    }
}
