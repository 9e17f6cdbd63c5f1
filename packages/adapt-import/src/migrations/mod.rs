//! Content migrations
//!
//! An ordered chain of per-document transforms applied to every course,
//! config and content object before it is persisted. Each migration guards
//! itself on the document kind and is a no-op for anything else; applying a
//! migration twice gives the same document as applying it once.
//!
//! # Built-in chain
//!
//! 1. `numeric-fields` - legacy number/string drift on known attributes
//! 2. `graphic-src` - single `src` graphics split into `large`/`small`
//! 3. `parent-id` - `_parentId` rewritten through the id map
//! 4. `remove-undef` - `null` properties stripped (objects only)
//! 5. `component-name` - `_component` resolved to the installed plugin
//! 6. `start-page` - friendly ids for start pages
//! 7. `theme-default` - missing config `_theme` defaulted
//!
//! Extensions append their own migrations with `MigrationRegistry::register`.

mod fields;
mod references;

pub use fields::{GraphicSrcMigration, NumericFieldsMigration, RemoveUndefMigration};
pub use references::{
    start_page_friendly_ids, ComponentNameMigration, ParentIdMigration, StartPageMigration,
    ThemeDefaultMigration,
};

use adapt_store::domain::ContentDocument;
use std::collections::HashMap;
use std::sync::Arc;

use crate::context::IdMap;
use crate::error::Result;

/// Cross-reference tables a migration may consult
#[derive(Debug, Clone, Copy)]
pub struct MigrationContext<'a> {
    /// Package id -> persisted id
    pub id_map: &'a IdMap,
    /// Component key -> installed plugin name
    pub component_map: &'a HashMap<String, String>,
    /// Package page id -> friendly id of a start page
    pub start_pages: &'a HashMap<String, String>,
    pub theme: Option<&'a str>,
}

/// One idempotent document transform
pub trait ContentMigration: Send + Sync {
    fn name(&self) -> &str;

    /// Whether `apply` has anything to do for this document
    fn applies_to(&self, doc: &ContentDocument) -> bool;

    fn apply(&self, doc: &mut ContentDocument, ctx: &MigrationContext<'_>) -> Result<()>;
}

/// Ordered migration chain
#[derive(Clone, Default)]
pub struct MigrationRegistry {
    migrations: Vec<Arc<dyn ContentMigration>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in chain
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry
            .register(Arc::new(NumericFieldsMigration))
            .register(Arc::new(GraphicSrcMigration))
            .register(Arc::new(ParentIdMigration))
            .register(Arc::new(RemoveUndefMigration))
            .register(Arc::new(ComponentNameMigration))
            .register(Arc::new(StartPageMigration))
            .register(Arc::new(ThemeDefaultMigration));
        registry
    }

    /// Append a migration after everything registered so far
    pub fn register(&mut self, migration: Arc<dyn ContentMigration>) -> &mut Self {
        self.migrations.push(migration);
        self
    }

    pub fn len(&self) -> usize {
        self.migrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrations.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.migrations.iter().map(|m| m.name()).collect()
    }

    /// Run every applicable migration in registration order
    pub fn apply_all(&self, doc: &mut ContentDocument, ctx: &MigrationContext<'_>) -> Result<()> {
        for migration in &self.migrations {
            if migration.applies_to(doc) {
                migration.apply(doc, ctx)?;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for MigrationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationRegistry")
            .field("migrations", &self.names())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Owned tables behind a `MigrationContext`
    #[derive(Default)]
    pub struct Tables {
        pub id_map: IdMap,
        pub component_map: HashMap<String, String>,
        pub start_pages: HashMap<String, String>,
        pub theme: Option<String>,
    }

    impl Tables {
        pub fn ctx(&self) -> MigrationContext<'_> {
            MigrationContext {
                id_map: &self.id_map,
                component_map: &self.component_map,
                start_pages: &self.start_pages,
                theme: self.theme.as_deref(),
            }
        }
    }

    pub fn doc(value: serde_json::Value) -> ContentDocument {
        ContentDocument::from_value(value).unwrap()
    }
}
