use adapt_store::domain::{ContentDocument, ContentKind};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use super::{ContentMigration, MigrationContext};
use crate::error::{ImportError, Result};

/// Rewrite `_parentId` through the id map
///
/// A parent that was never imported removes the field; the hierarchy sort is
/// what rejects such a document. A value that is already a persisted id is
/// left as it is.
pub struct ParentIdMigration;

impl ContentMigration for ParentIdMigration {
    fn name(&self) -> &str {
        "parent-id"
    }

    fn applies_to(&self, doc: &ContentDocument) -> bool {
        doc.kind.is_content_object() && doc.data.contains_key("_parentId")
    }

    fn apply(&self, doc: &mut ContentDocument, ctx: &MigrationContext<'_>) -> Result<()> {
        let Some(parent) = doc.parent_id().map(str::to_string) else {
            doc.data.remove("_parentId");
            return Ok(());
        };
        match ctx.id_map.get(&parent) {
            Some(mapped) => doc.set("_parentId", mapped.clone()),
            None if ctx.id_map.is_persisted(&parent) => {}
            None => {
                doc.data.remove("_parentId");
            }
        }
        Ok(())
    }
}

/// Resolve `_component` to the name of the installed plugin
pub struct ComponentNameMigration;

impl ContentMigration for ComponentNameMigration {
    fn name(&self) -> &str {
        "component-name"
    }

    fn applies_to(&self, doc: &ContentDocument) -> bool {
        doc.kind == ContentKind::Component
    }

    fn apply(&self, doc: &mut ContentDocument, ctx: &MigrationContext<'_>) -> Result<()> {
        let component = doc.component().unwrap_or_default().to_string();
        match ctx.component_map.get(&component) {
            Some(name) => {
                doc.set("_component", name.clone());
                Ok(())
            }
            None => Err(ImportError::UnknownComponent {
                id: doc.id().unwrap_or_default().to_string(),
                component,
            }),
        }
    }
}

fn start_ids(course: &ContentDocument) -> impl Iterator<Item = &str> {
    course
        .data
        .get("_start")
        .and_then(|s| s.get("_startIds"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.get("_id").and_then(Value::as_str))
}

/// Friendly id of every start page, keyed by package page id
///
/// Pages with a `_friendlyId` keep it; the rest are numbered
/// `start_page_1`, `start_page_2`, ... in `_startIds` order.
pub fn start_page_friendly_ids(
    course: &ContentDocument,
    content_objects: &BTreeMap<String, ContentDocument>,
) -> HashMap<String, String> {
    let mut map = HashMap::new();
    let mut next = 1;
    for id in start_ids(course) {
        if map.contains_key(id) {
            continue;
        }
        let Some(page) = content_objects.get(id) else {
            continue;
        };
        let friendly = match page.friendly_id().filter(|f| !f.is_empty()) {
            Some(f) => f.to_string(),
            None => {
                let assigned = format!("start_page_{}", next);
                next += 1;
                assigned
            }
        };
        map.insert(id.to_string(), friendly);
    }
    map
}

/// Point course start ids at friendly ids and stamp them on the pages
pub struct StartPageMigration;

impl ContentMigration for StartPageMigration {
    fn name(&self) -> &str {
        "start-page"
    }

    fn applies_to(&self, doc: &ContentDocument) -> bool {
        matches!(doc.kind, ContentKind::Course | ContentKind::Page)
    }

    fn apply(&self, doc: &mut ContentDocument, ctx: &MigrationContext<'_>) -> Result<()> {
        if ctx.start_pages.is_empty() {
            return Ok(());
        }
        if doc.kind == ContentKind::Page {
            if doc.friendly_id().is_none() {
                if let Some(friendly) = doc.id().and_then(|id| ctx.start_pages.get(id)).cloned() {
                    doc.set("_friendlyId", friendly);
                }
            }
            return Ok(());
        }
        let entries = doc
            .data
            .get_mut("_start")
            .and_then(|s| s.get_mut("_startIds"))
            .and_then(Value::as_array_mut);
        for entry in entries.into_iter().flatten() {
            let mapped = entry
                .get("_id")
                .and_then(Value::as_str)
                .and_then(|id| ctx.start_pages.get(id))
                .cloned();
            if let (Some(mapped), Some(obj)) = (mapped, entry.as_object_mut()) {
                obj.insert("_id".to_string(), Value::String(mapped));
            }
        }
        Ok(())
    }
}

/// Default a missing config `_theme` to the installed theme
pub struct ThemeDefaultMigration;

impl ContentMigration for ThemeDefaultMigration {
    fn name(&self) -> &str {
        "theme-default"
    }

    fn applies_to(&self, doc: &ContentDocument) -> bool {
        doc.kind == ContentKind::Config
    }

    fn apply(&self, doc: &mut ContentDocument, ctx: &MigrationContext<'_>) -> Result<()> {
        let missing = doc.str_field("_theme").map_or(true, str::is_empty);
        if let (true, Some(theme)) = (missing, ctx.theme) {
            doc.set("_theme", theme);
        }
        Ok(())
    }
}
