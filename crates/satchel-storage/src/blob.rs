// SPDX-FileCopyrightText: 2026 Satchel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Blob store implementations.
//!
//! [`FsBlobStore`] is the production backend: one file per database name
//! under a root directory, written atomically. [`MemoryBlobStore`] backs
//! tests and lets them simulate a process restart by sharing one store
//! across session handles.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use satchel_core::{BlobStore, SatchelError, StorageConfig};
use tokio::sync::Mutex;

fn storage_err(e: impl std::error::Error + Send + Sync + 'static) -> SatchelError {
    SatchelError::Storage {
        source: Box::new(e),
    }
}

/// Filesystem-backed blob store. One snapshot file per database name.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Create a store rooted at `root`. The directory is created lazily on
    /// the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create a store from the storage config section.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.data_dir.clone())
    }

    fn blob_path(&self, name: &str) -> Result<PathBuf, SatchelError> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(SatchelError::Storage {
                source: format!("invalid database name: {name:?}").into(),
            });
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, SatchelError> {
        let path = self.blob_path(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_err(e)),
        }
    }

    async fn put(&self, name: &str, bytes: &[u8]) -> Result<(), SatchelError> {
        let path = self.blob_path(name)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(storage_err)?;

        // Write-then-rename so a crash mid-write never truncates the only
        // durable copy of the database. The scratch file is unique per
        // write, so concurrent puts for the same name each rename a
        // complete image into place.
        let tmp = tempfile::NamedTempFile::new_in(&self.root).map_err(storage_err)?;
        tokio::fs::write(tmp.path(), bytes)
            .await
            .map_err(storage_err)?;
        tmp.persist(&path).map_err(|e| storage_err(e.error))?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), SatchelError> {
        let path = self.blob_path(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_err(e)),
        }
    }
}

/// In-memory blob store.
///
/// Clones share the same underlying map, which is how tests model "the
/// browser-local store survives while the process restarts".
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, SatchelError> {
        Ok(self.blobs.lock().await.get(name).cloned())
    }

    async fn put(&self, name: &str, bytes: &[u8]) -> Result<(), SatchelError> {
        self.blobs
            .lock()
            .await
            .insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), SatchelError> {
        self.blobs.lock().await.remove(name);
        Ok(())
    }
}
