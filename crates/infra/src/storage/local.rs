use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bdaybot_core::BlobStore;
use bdaybot_domain::{RelayError, Result};
use tokio::fs;
use tracing::debug;

use super::validate_key;
use crate::errors::InfraError;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Blobs stored as files below a root directory.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// reader sees either the old or the new contents.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.root.clone(), |path, segment| path.join(segment)))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(InfraError::from(err).into()),
        }
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.path_for(key)?;
        let parent = path
            .parent()
            .ok_or_else(|| RelayError::Storage(format!("blob key has no parent: {key}")))?;
        fs::create_dir_all(parent).await.map_err(InfraError::from)?;

        let file_name = path.file_name().and_then(|name| name.to_str()).unwrap_or("blob");
        let temp = parent.join(format!(
            ".{file_name}.{}.{}.tmp",
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        fs::write(&temp, &bytes).await.map_err(InfraError::from)?;
        if let Err(err) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(InfraError::from(err).into());
        }

        debug!(key, bytes = bytes.len(), "storage.local.put");
        Ok(())
    }
}
