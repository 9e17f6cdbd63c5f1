//! In-memory store adapters
//!
//! Every adapter counts its mutating calls (`write_count`) so callers can
//! assert that a dry run left the stores untouched, and supports failure
//! injection for rollback tests.

mod assets;
mod content;
mod plugins;
mod tags;

pub use assets::MemoryAssetStore;
pub use content::MemoryContentStore;
pub use plugins::MemoryPluginRegistry;
pub use tags::MemoryTagStore;

/// Store-assigned primary id
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
