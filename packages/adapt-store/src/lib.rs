//! Course content stores
//!
//! Collaborator contracts the course importer and builder run against:
//! the document database, the plugin registry, the tag vocabulary and the
//! asset binary store.
//!
//! ## Layout
//!
//! - `domain`: content documents, plugin manifests, asset and build records,
//!   plus the async port traits
//! - `infrastructure::memory`: in-process adapters (feature `memory`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use adapt_store::infrastructure::MemoryContentStore;
//! use adapt_store::{ContentStore, InsertOptions, Query};
//!
//! let store = MemoryContentStore::new();
//! let course = store.insert(data, &InsertOptions::content("course")).await?;
//! let found = store.find(&Query::content().eq("_id", course["_id"].clone())).await?;
//! ```

pub mod domain;
pub mod error;

#[cfg(feature = "memory")]
pub mod infrastructure;

pub use error::{ErrorKind, Result, StoreError};

pub use domain::{
    AssetStore, Collection, ContentDocument, ContentKind, ContentSchema, ContentStore,
    Document, InsertOptions, PluginRegistry, Query, TagStore,
};
