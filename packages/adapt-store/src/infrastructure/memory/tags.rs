use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::new_id;
use crate::domain::{Tag, TagStore};
use crate::{Result, StoreError};

#[derive(Default)]
pub struct MemoryTagStore {
    tags: Mutex<Vec<Tag>>,
    writes: AtomicUsize,
}

impl MemoryTagStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_titles(titles: &[&str]) -> Self {
        let tags = titles
            .iter()
            .map(|t| Tag {
                id: new_id(),
                title: t.to_string(),
            })
            .collect();
        Self {
            tags: Mutex::new(tags),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn tags(&self) -> Vec<Tag> {
        self.tags.lock().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TagStore for MemoryTagStore {
    async fn find(&self) -> Result<Vec<Tag>> {
        Ok(self.tags())
    }

    async fn insert(&self, title: &str) -> Result<Tag> {
        let mut tags = self.tags.lock();
        if tags.iter().any(|t| t.title == title) {
            return Err(StoreError::already_exists(format!("tag '{}'", title)));
        }
        let tag = Tag {
            id: new_id(),
            title: title.to_string(),
        };
        tags.push(tag.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(tag)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut tags = self.tags.lock();
        let pos = tags
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| StoreError::not_found(format!("tag {}", id)))?;
        tags.remove(pos);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
