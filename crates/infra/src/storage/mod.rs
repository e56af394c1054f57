//! `BlobStore` adapters
//!
//! The relay keeps two small blobs (session bundle and auth timestamp). Where
//! they live depends on the deployment: a local directory for long-lived
//! hosts, an HTTP object store for ephemeral runners, memory for tests and
//! dry runs.

mod local;
mod memory;
mod object_store;

use std::sync::Arc;

use bdaybot_core::BlobStore;
use bdaybot_domain::{RelayError, Result, StorageConfig};

pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;
pub use object_store::ObjectStoreBlobStore;

/// Build the store selected by `config`.
pub fn build_blob_store(config: &StorageConfig) -> Result<Arc<dyn BlobStore>> {
    let store: Arc<dyn BlobStore> = match config {
        StorageConfig::Local { root } => Arc::new(LocalBlobStore::new(root)),
        StorageConfig::ObjectStore { endpoint, bucket, token } => {
            Arc::new(ObjectStoreBlobStore::new(endpoint, bucket, token.clone())?)
        }
        StorageConfig::Memory => Arc::new(MemoryBlobStore::default()),
    };
    Ok(store)
}

/// Reject keys that could escape the store's namespace.
pub(crate) fn validate_key(key: &str) -> Result<()> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..");

    if invalid {
        return Err(RelayError::Storage(format!("invalid blob key: {key:?}")));
    }
    Ok(())
}
