use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::new_id;
use crate::domain::{
    Collection, ContentSchema, ContentStore, CourseLock, Document, InsertOptions, Query,
};
use crate::{Result, StoreError};

type InsertFailure = Box<dyn Fn(&InsertOptions, &Document) -> Option<String> + Send + Sync>;
type DeleteFailure = Box<dyn Fn(&Query) -> Option<String> + Send + Sync>;

/// Content store holding every collection in process memory
#[derive(Default)]
pub struct MemoryContentStore {
    docs: Mutex<Vec<(Collection, Document)>>,
    schemas: Mutex<HashMap<String, ContentSchema>>,
    locks: Mutex<HashMap<String, CourseLock>>,
    insert_failure: Mutex<Option<InsertFailure>>,
    delete_failure: Mutex<Option<DeleteFailure>>,
    writes: AtomicUsize,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema returned by `get_schema`
    ///
    /// Component documents first look up `<_component>-component`.
    pub fn register_schema(&self, schema: ContentSchema) {
        self.schemas.lock().insert(schema.name.clone(), schema);
    }

    /// Make `insert` fail with a validation error whenever `f` returns a reason
    pub fn fail_inserts_when<F>(&self, f: F)
    where
        F: Fn(&InsertOptions, &Document) -> Option<String> + Send + Sync + 'static,
    {
        *self.insert_failure.lock() = Some(Box::new(f));
    }

    /// Make `delete_many` fail with a database error whenever `f` returns a reason
    pub fn fail_deletes_when<F>(&self, f: F)
    where
        F: Fn(&Query) -> Option<String> + Send + Sync + 'static,
    {
        *self.delete_failure.lock() = Some(Box::new(f));
    }

    /// Add a document without counting it as a write
    pub fn seed(&self, collection: Collection, doc: Document) {
        self.docs.lock().push((collection, doc));
    }

    /// Snapshot of one collection
    pub fn documents(&self, collection: Collection) -> Vec<Document> {
        self.docs
            .lock()
            .iter()
            .filter(|(c, _)| *c == collection)
            .map(|(_, d)| d.clone())
            .collect()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn is_locked(&self, course_id: &str) -> bool {
        self.locks.lock().contains_key(course_id)
    }

    fn count_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    fn validate(&self, opts: &InsertOptions, doc: &Document) -> Result<()> {
        if let Some(check) = self.insert_failure.lock().as_ref() {
            if let Some(reason) = check(opts, doc) {
                return Err(StoreError::validation(reason));
            }
        }
        if !opts.validate {
            return Ok(());
        }
        if let Some(schema) = self.schemas.lock().get(&opts.schema_name) {
            for (key, prop) in &schema.properties {
                let required = prop.get("required").and_then(Value::as_bool).unwrap_or(false);
                if required && !doc.contains_key(key) {
                    return Err(StoreError::validation(format!(
                        "{}: '{}' is required",
                        opts.schema_name, key
                    )));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn find(&self, query: &Query) -> Result<Vec<Document>> {
        Ok(self
            .docs
            .lock()
            .iter()
            .filter(|(c, d)| *c == query.collection && query.matches(d))
            .map(|(_, d)| d.clone())
            .collect())
    }

    async fn insert(&self, mut doc: Document, opts: &InsertOptions) -> Result<Document> {
        self.validate(opts, &doc)?;
        if !doc.contains_key("_id") {
            doc.insert("_id".to_string(), Value::String(new_id()));
        }
        self.count_write();
        self.docs.lock().push((opts.collection, doc.clone()));
        Ok(doc)
    }

    async fn update(
        &self,
        query: &Query,
        changes: Document,
        _opts: &InsertOptions,
    ) -> Result<Document> {
        let mut docs = self.docs.lock();
        let (_, doc) = docs
            .iter_mut()
            .find(|(c, d)| *c == query.collection && query.matches(d))
            .ok_or_else(|| StoreError::not_found(format!("{:?}", query.filter)))?;
        for (key, value) in changes {
            doc.insert(key, value);
        }
        self.count_write();
        Ok(doc.clone())
    }

    async fn delete(&self, query: &Query) -> Result<()> {
        let mut docs = self.docs.lock();
        let pos = docs
            .iter()
            .position(|(c, d)| *c == query.collection && query.matches(d))
            .ok_or_else(|| StoreError::not_found(format!("{:?}", query.filter)))?;
        docs.remove(pos);
        self.count_write();
        Ok(())
    }

    async fn delete_many(&self, query: &Query) -> Result<usize> {
        if let Some(reason) = self.delete_failure.lock().as_ref().and_then(|f| f(query)) {
            return Err(StoreError::database(reason));
        }
        let mut docs = self.docs.lock();
        let before = docs.len();
        docs.retain(|(c, d)| !(*c == query.collection && query.matches(d)));
        self.count_write();
        Ok(before - docs.len())
    }

    async fn get_schema(&self, schema_name: &str, data: &Document) -> Result<ContentSchema> {
        let schemas = self.schemas.lock();
        let specific = data
            .get("_component")
            .and_then(Value::as_str)
            .filter(|_| schema_name == "component")
            .and_then(|c| schemas.get(&format!("{}-component", c)));
        Ok(specific
            .or_else(|| schemas.get(schema_name))
            .cloned()
            .unwrap_or_else(|| ContentSchema::permissive(schema_name)))
    }

    async fn get_lock(
        &self,
        timestamp: DateTime<Utc>,
        user_id: &str,
        course_id: &str,
    ) -> Result<Option<CourseLock>> {
        let mut locks = self.locks.lock();
        if let Some(existing) = locks.get(course_id) {
            if existing.user_id != user_id {
                return Ok(None);
            }
        }
        let lock = CourseLock {
            course_id: course_id.to_string(),
            user_id: user_id.to_string(),
            acquired_at: timestamp,
        };
        locks.insert(course_id.to_string(), lock.clone());
        Ok(Some(lock))
    }

    async fn release_lock(&self, course_id: &str) -> Result<()> {
        self.locks.lock().remove(course_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: Value) -> Document {
        v.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_counts() {
        let store = MemoryContentStore::new();
        let out = store
            .insert(doc(json!({ "_type": "course" })), &InsertOptions::content("course"))
            .await
            .unwrap();

        assert!(out["_id"].is_string());
        assert_eq!(store.write_count(), 1);
        assert_eq!(store.documents(Collection::Content).len(), 1);
    }

    #[tokio::test]
    async fn test_injected_delete_failure() {
        let store = MemoryContentStore::new();
        store.seed(Collection::Content, doc(json!({ "_id": "a", "_type": "page" })));
        store.seed(Collection::CourseAssets, doc(json!({ "_id": "l", "_courseId": "c" })));
        store.fail_deletes_when(|q| {
            (q.collection == Collection::CourseAssets).then(|| "links pinned".to_string())
        });

        let err = store
            .delete_many(&Query::new(Collection::CourseAssets))
            .await
            .unwrap_err();
        assert!(err.message.contains("links pinned"));
        assert_eq!(store.documents(Collection::CourseAssets).len(), 1);
        assert_eq!(store.delete_many(&Query::content()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_required_properties_validated() {
        let store = MemoryContentStore::new();
        store.register_schema(ContentSchema::new(
            "article",
            doc(json!({ "title": { "type": "string", "required": true } })),
        ));

        let err = store
            .insert(doc(json!({ "_type": "article" })), &InsertOptions::content("article"))
            .await
            .unwrap_err();
        assert!(err.message.contains("'title' is required"));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_component_schema_lookup() {
        let store = MemoryContentStore::new();
        store.register_schema(ContentSchema::new("text-component", doc(json!({ "body": {} }))));

        let schema = store
            .get_schema("component", &doc(json!({ "_component": "text" })))
            .await
            .unwrap();
        assert_eq!(schema.name, "text-component");

        let schema = store.get_schema("block", &Document::new()).await.unwrap();
        assert_eq!(schema, ContentSchema::permissive("block"));
    }

    #[tokio::test]
    async fn test_delete_many_scoped_to_collection() {
        let store = MemoryContentStore::new();
        store.seed(Collection::Content, doc(json!({ "_courseId": "c1" })));
        store.seed(Collection::Content, doc(json!({ "_courseId": "c1" })));
        store.seed(Collection::CourseAssets, doc(json!({ "_courseId": "c1" })));

        let removed = store
            .delete_many(&Query::content().eq("_courseId", "c1"))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.documents(Collection::CourseAssets).len(), 1);
    }

    #[tokio::test]
    async fn test_lock_contention() {
        let store = MemoryContentStore::new();
        let now = Utc::now();

        assert!(store.get_lock(now, "u1", "c1").await.unwrap().is_some());
        assert!(store.get_lock(now, "u2", "c1").await.unwrap().is_none());
        assert!(store.get_lock(now, "u1", "c1").await.unwrap().is_some());

        store.release_lock("c1").await.unwrap();
        assert!(store.get_lock(now, "u2", "c1").await.unwrap().is_some());
    }
}
