//! Infrastructure layer - Store adapters
//!
//! In-memory adapters back the CLI dry runs and the test suites. Production
//! deployments implement the port traits against their own database and
//! binary store.

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "memory")]
pub use memory::{MemoryAssetStore, MemoryContentStore, MemoryPluginRegistry, MemoryTagStore};
