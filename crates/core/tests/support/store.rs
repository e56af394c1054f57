//! In-memory `BlobStore` with call counters.

use std::collections::HashMap;

use async_trait::async_trait;
use bdaybot_core::BlobStore;
use bdaybot_domain::constants::{AUTH_TIMESTAMP_KEY, SESSION_BUNDLE_KEY};
use bdaybot_domain::{AuthTimestampRecord, RelayError, Result, SessionMaterial};
use parking_lot::Mutex;

#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    puts: Mutex<Vec<String>>,
    fail_writes: Mutex<bool>,
}

impl MemoryStore {
    pub fn with_session(material: &SessionMaterial) -> Self {
        let store = Self::default();
        store.insert(SESSION_BUNDLE_KEY, serde_json::to_vec(material).expect("serializable"));
        store
    }

    pub fn insert(&self, key: &str, bytes: Vec<u8>) {
        self.blobs.lock().insert(key.to_string(), bytes);
    }

    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.lock().get(key).cloned()
    }

    pub fn session(&self) -> Option<SessionMaterial> {
        self.raw(SESSION_BUNDLE_KEY)
            .map(|bytes| serde_json::from_slice(&bytes).expect("valid session bundle"))
    }

    pub fn auth_record(&self) -> Option<AuthTimestampRecord> {
        self.raw(AUTH_TIMESTAMP_KEY)
            .map(|bytes| serde_json::from_slice(&bytes).expect("valid auth record"))
    }

    /// Keys written so far, in order.
    pub fn puts(&self) -> Vec<String> {
        self.puts.lock().clone()
    }

    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.raw(key))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        if *self.fail_writes.lock() {
            return Err(RelayError::Storage(format!("write to {key} rejected")));
        }
        self.puts.lock().push(key.to_string());
        self.insert(key, bytes);
        Ok(())
    }
}
