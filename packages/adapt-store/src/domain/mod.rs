//! Domain layer for the course content stores
//!
//! # Domain Models
//!
//! - `ContentDocument`: course, config or content object, tagged by `ContentKind`
//! - `PluginManifest` / `PluginDescriptor`: plugins declared by a package
//! - `InstalledPlugin`: plugins known to the server registry
//! - `Tag`, `AssetUpload`, `AssetRecord`: tag vocabulary and asset metadata
//! - `BuildRecord`: persisted output of a build
//!
//! # Port Traits
//!
//! - `ContentStore`: document database with schema lookup and course locks
//! - `PluginRegistry`: installed plugin registry and installer
//! - `TagStore`: tag vocabulary
//! - `AssetStore`: asset binary store
//!
//! None of the stores share a transaction. Callers that need all-or-nothing
//! behaviour across them keep their own record of side effects.

mod asset;
mod build;
mod content;
mod plugin;

pub use asset::{AssetFile, AssetRecord, AssetUpload, Tag};
pub use build::{BuildAction, BuildRecord};
pub use content::{
    Collection, ContentDocument, ContentKind, ContentSchema, CourseLock, Document, InsertOptions,
    Query,
};
pub use plugin::{InstalledPlugin, PluginDescriptor, PluginManifest, PluginType, MANIFEST_FILES};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

use crate::Result;

// ═══════════════════════════════════════════════════════════════════════════
// Port Trait: ContentStore
// ═══════════════════════════════════════════════════════════════════════════

/// Document database abstraction
///
/// # Core Operations
///
/// 1. **Documents**: `find`, `insert`, `update`, `delete`, `delete_many`
/// 2. **Schemas**: `get_schema` returns the built schema a document of the
///    given name validates against
/// 3. **Locks**: `get_lock` / `release_lock` guard destructive edits of a course
///
/// # Examples
///
/// ```rust,ignore
/// use adapt_store::domain::{ContentStore, InsertOptions, Query};
///
/// async fn example(store: impl ContentStore) -> Result<()> {
///     let doc = store.insert(data, &InsertOptions::content("article")).await?;
///     let articles = store
///         .find(&Query::content().eq("_courseId", doc["_courseId"].clone()))
///         .await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Documents matching every condition of the query
    async fn find(&self, query: &Query) -> Result<Vec<Document>>;

    /// Insert a document; returns the stored document including its new `_id`
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error when `opts.validate` is set and the
    /// document does not satisfy the named schema.
    async fn insert(&self, doc: Document, opts: &InsertOptions) -> Result<Document>;

    /// Merge `changes` into the first matching document; returns the result
    ///
    /// # Errors
    ///
    /// Returns a `NotFound` error if nothing matches.
    async fn update(&self, query: &Query, changes: Document, opts: &InsertOptions)
        -> Result<Document>;

    /// Delete the first matching document
    async fn delete(&self, query: &Query) -> Result<()>;

    /// Delete every matching document; returns the number removed
    async fn delete_many(&self, query: &Query) -> Result<usize>;

    /// Built schema for `schema_name`, resolved against the document data
    /// (component documents resolve their plugin-specific schema)
    async fn get_schema(&self, schema_name: &str, data: &Document) -> Result<ContentSchema>;

    /// Acquire the edit lock of a course; `None` when another user holds it
    async fn get_lock(
        &self,
        timestamp: DateTime<Utc>,
        user_id: &str,
        course_id: &str,
    ) -> Result<Option<CourseLock>>;

    /// Release the edit lock of a course
    async fn release_lock(&self, course_id: &str) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════════
// Port Trait: PluginRegistry
// ═══════════════════════════════════════════════════════════════════════════

/// Installed plugin registry and installer
#[async_trait]
pub trait PluginRegistry: Send + Sync {
    /// Every installed plugin
    async fn find(&self) -> Result<Vec<InstalledPlugin>>;

    /// Install (or overwrite) plugins from `(name, source directory)` pairs
    ///
    /// With `strict`, an already installed plugin of the same version is an
    /// `AlreadyExists` error.
    async fn install_plugins(
        &self,
        plugins: &[(String, PathBuf)],
        strict: bool,
    ) -> Result<Vec<InstalledPlugin>>;

    async fn uninstall_plugin(&self, id: &str) -> Result<()>;

    /// Put back the files and record a plugin had before its last update
    async fn restore_plugin_from_backup(&self, name: &str) -> Result<InstalledPlugin>;
}

// ═══════════════════════════════════════════════════════════════════════════
// Port Traits: TagStore, AssetStore
// ═══════════════════════════════════════════════════════════════════════════

/// Tag vocabulary
#[async_trait]
pub trait TagStore: Send + Sync {
    async fn find(&self) -> Result<Vec<Tag>>;

    async fn insert(&self, title: &str) -> Result<Tag>;

    async fn delete(&self, id: &str) -> Result<()>;
}

/// Asset binary store
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn insert(&self, upload: AssetUpload) -> Result<AssetRecord>;

    /// Records for the given ids; unknown ids are skipped
    async fn find(&self, ids: &[String]) -> Result<Vec<AssetRecord>>;

    async fn delete(&self, id: &str) -> Result<()>;
}
