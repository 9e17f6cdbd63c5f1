//! Build record cache: concurrent map with store fallback

use adapt_store::domain::{BuildRecord, Collection, ContentStore, Query};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use crate::error::Result;

/// Build records by id
///
/// Owned by the build subsystem (no process-wide singleton). Every insert
/// purges expired entries and a read evicts the entry it finds expired; a
/// miss falls back to the `adaptbuilds` collection and caches what it finds.
pub struct BuildCache {
    records: DashMap<String, BuildRecord>,
    store: Arc<dyn ContentStore>,
}

impl BuildCache {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self {
            records: DashMap::new(),
            store,
        }
    }

    /// Cache `record`, returning how many expired entries were purged first
    pub fn insert(&self, record: BuildRecord) -> usize {
        let purged = self.purge_expired(Utc::now());
        self.records.insert(record.id.clone(), record);
        purged
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Unexpired record for `id`
    pub async fn get(&self, id: &str) -> Result<Option<BuildRecord>> {
        self.get_at(id, Utc::now()).await
    }

    pub async fn get_at(&self, id: &str, now: DateTime<Utc>) -> Result<Option<BuildRecord>> {
        if let Some(entry) = self.records.get(id) {
            if !entry.is_expired(now) {
                return Ok(Some(entry.clone()));
            }
        }
        // Either expired or absent; drop the stale entry before the lookup
        if self.records.remove_if(id, |_, r| r.is_expired(now)).is_some() {
            tracing::debug!("BuildCache: evicted expired build {}", id);
            return Ok(None);
        }

        let query = Query::new(Collection::AdaptBuilds).eq("_id", id);
        let Some(doc) = self.store.find(&query).await?.into_iter().next() else {
            return Ok(None);
        };
        let record = BuildRecord::from_document(doc)?;
        if record.is_expired(now) {
            return Ok(None);
        }
        self.insert(record.clone());
        Ok(Some(record))
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| !record.is_expired(now));
        let purged = before - self.records.len();
        if purged > 0 {
            tracing::debug!("BuildCache: purged {} expired builds", purged);
        }
        purged
    }
}

impl std::fmt::Debug for BuildCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildCache")
            .field("records", &self.records.len())
            .finish()
    }
}
