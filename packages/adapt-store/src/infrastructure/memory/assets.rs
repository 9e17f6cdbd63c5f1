use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::new_id;
use crate::domain::{AssetRecord, AssetStore, AssetUpload};
use crate::{Result, StoreError};

/// Asset store keeping records in memory
///
/// With a storage directory, uploaded files are copied there so the record
/// outlives the import's working directory.
#[derive(Default)]
pub struct MemoryAssetStore {
    records: Mutex<Vec<AssetRecord>>,
    storage_dir: Option<PathBuf>,
    failing: Mutex<HashSet<String>>,
    writes: AtomicUsize,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_storage_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: Some(dir.into()),
            ..Self::default()
        }
    }

    /// Make uploads of `filename` fail
    pub fn fail_upload_of(&self, filename: &str) {
        self.failing.lock().insert(filename.to_string());
    }

    pub fn records(&self) -> Vec<AssetRecord> {
        self.records.lock().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetStore for MemoryAssetStore {
    async fn insert(&self, upload: AssetUpload) -> Result<AssetRecord> {
        let filename = upload.file.original_filename.clone();
        if self.failing.lock().contains(&filename) {
            return Err(StoreError::database(format!("failed to store {}", filename)));
        }
        tokio::fs::metadata(&upload.file.filepath).await?;

        let id = new_id();
        let path = match &self.storage_dir {
            Some(dir) => {
                tokio::fs::create_dir_all(dir).await?;
                let dest = dir.join(format!("{}-{}", id, filename));
                tokio::fs::copy(&upload.file.filepath, &dest).await?;
                Some(dest)
            }
            None => None,
        };
        let record = AssetRecord {
            id,
            title: upload.title,
            filename,
            path,
            tags: upload.tags,
        };
        self.records.lock().push(record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(record)
    }

    async fn find(&self, ids: &[String]) -> Result<Vec<AssetRecord>> {
        Ok(self
            .records
            .lock()
            .iter()
            .filter(|r| ids.contains(&r.id))
            .cloned()
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let removed = {
            let mut records = self.records.lock();
            let pos = records
                .iter()
                .position(|r| r.id == id)
                .ok_or_else(|| StoreError::not_found(format!("asset {}", id)))?;
            records.remove(pos)
        };
        if let Some(path) = removed.path {
            let _ = tokio::fs::remove_file(path).await;
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
