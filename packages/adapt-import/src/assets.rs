//! Asset discovery, import and schema-driven reference rewriting

use adapt_store::domain::{AssetFile, AssetStore, AssetUpload, Document};
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::error::Result;
use crate::journal::SideEffectJournal;
use crate::package::{read_json, PackageLayout, ASSETS_FILE};

/// One asset the package carries
#[derive(Debug, Clone, PartialEq)]
pub struct AssetEntry {
    /// Normalized path relative to the package source dir (AssetMap key)
    pub key: String,
    pub filepath: PathBuf,
    pub title: String,
    pub description: Option<String>,
    /// Tag titles
    pub tags: Vec<String>,
    pub metadata: Map<String, Value>,
}

impl AssetEntry {
    pub fn filename(&self) -> String {
        self.filepath
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.key.clone())
    }
}

#[derive(Debug, Default, Deserialize)]
struct AssetMetadata {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Forward slashes, no leading `./` or `/`
pub fn normalise_asset_path(raw: &str) -> String {
    let path = raw.trim().replace('\\', "/");
    let mut path = path.as_str();
    loop {
        if let Some(rest) = path.strip_prefix("./") {
            path = rest;
        } else if let Some(rest) = path.strip_prefix('/') {
            path = rest;
        } else {
            break;
        }
    }
    path.to_string()
}

/// AssetMap key of a file inside the package
pub fn asset_key(src_dir: &Path, file: &Path) -> Option<String> {
    let rel = file.strip_prefix(src_dir).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

/// Asset descriptors from `assets.json`, or one per file in the asset folders
pub async fn load_asset_data(
    layout: &PackageLayout,
    asset_folders: &[String],
    global_tags: &[String],
) -> Result<Vec<AssetEntry>> {
    let metadata_path = layout.lang_dir.join(ASSETS_FILE);
    let mut entries = if metadata_path.is_file() {
        let metadata: Map<String, Value> = read_json(&metadata_path).await?;
        let mut entries = Vec::with_capacity(metadata.len());
        for (filename, value) in metadata {
            let meta: AssetMetadata = serde_json::from_value(value).unwrap_or_else(|e| {
                warn!("Ignoring malformed metadata for asset {}: {}", filename, e);
                AssetMetadata::default()
            });
            let filepath = locate_asset(&layout.lang_dir, asset_folders, &filename);
            entries.push(AssetEntry {
                key: asset_key(&layout.src_dir, &filepath).unwrap_or_else(|| filename.clone()),
                title: meta.title.unwrap_or_else(|| filename.clone()),
                description: meta.description,
                tags: meta.tags,
                metadata: meta.extra,
                filepath,
            });
        }
        entries
    } else {
        infer_asset_data(layout, asset_folders)
    };

    for entry in &mut entries {
        for tag in global_tags {
            if !entry.tags.contains(tag) {
                entry.tags.push(tag.clone());
            }
        }
    }
    entries.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(entries)
}

fn locate_asset(lang_dir: &Path, asset_folders: &[String], filename: &str) -> PathBuf {
    asset_folders
        .iter()
        .map(|folder| lang_dir.join(folder).join(filename))
        .find(|p| p.is_file())
        .unwrap_or_else(|| {
            let folder = asset_folders.first().map(String::as_str).unwrap_or("assets");
            lang_dir.join(folder).join(filename)
        })
}

fn infer_asset_data(layout: &PackageLayout, asset_folders: &[String]) -> Vec<AssetEntry> {
    asset_folders
        .iter()
        .map(|folder| layout.lang_dir.join(folder))
        .filter(|dir| dir.is_dir())
        .flat_map(|dir| {
            WalkDir::new(dir)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .collect::<Vec<_>>()
        })
        .filter_map(|filepath| {
            let key = asset_key(&layout.src_dir, &filepath)?;
            let title = filepath.file_name()?.to_string_lossy().into_owned();
            Some(AssetEntry {
                key,
                filepath,
                title,
                description: None,
                tags: Vec::new(),
                metadata: Map::new(),
            })
        })
        .collect()
}

/// Result of persisting assets
#[derive(Debug, Default)]
pub struct AssetImportOutcome {
    /// Normalized package path -> persisted asset id
    pub asset_map: HashMap<String, String>,
    /// `(filepath, error)` of every asset the store refused
    pub failures: Vec<(String, String)>,
}

/// Persists package assets with bounded fan-out
pub struct AssetReconciler<'a> {
    store: &'a dyn AssetStore,
    journal: &'a SideEffectJournal,
    concurrency: usize,
}

impl<'a> AssetReconciler<'a> {
    pub fn new(store: &'a dyn AssetStore, journal: &'a SideEffectJournal, concurrency: usize) -> Self {
        Self {
            store,
            journal,
            concurrency: concurrency.max(1),
        }
    }

    /// Insert every entry; individual failures are collected, never fatal
    pub async fn import(
        &self,
        entries: &[AssetEntry],
        tag_ids: &HashMap<String, String>,
        user_id: &str,
    ) -> AssetImportOutcome {
        info!(
            "AssetReconciler: importing {} assets with {} workers",
            entries.len(),
            self.concurrency
        );

        let results: Vec<_> = stream::iter(entries)
            .map(|entry| async move {
                let upload = AssetUpload {
                    title: entry.title.clone(),
                    description: entry.description.clone(),
                    tags: entry
                        .tags
                        .iter()
                        .filter_map(|t| tag_ids.get(t.trim()).cloned())
                        .collect(),
                    file: AssetFile {
                        filepath: entry.filepath.clone(),
                        original_filename: entry.filename(),
                    },
                    created_by: user_id.to_string(),
                    metadata: entry.metadata.clone(),
                };
                (entry, self.store.insert(upload).await)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut outcome = AssetImportOutcome::default();
        for (entry, result) in results {
            match result {
                Ok(record) => {
                    self.journal.record_asset(record.id.clone());
                    outcome.asset_map.insert(entry.key.clone(), record.id);
                }
                Err(e) => {
                    warn!("Failed to import asset {}: {}", entry.filepath.display(), e);
                    outcome
                        .failures
                        .push((entry.filepath.display().to_string(), e.to_string()));
                }
            }
        }
        outcome.failures.sort();
        outcome
    }
}

/// `Asset` or a typed picker such as `Asset:image`
fn is_asset_editor(editor: &str) -> bool {
    editor == "Asset" || editor.starts_with("Asset:")
}

/// True for schema properties edited as an asset picker
pub fn is_asset_field(prop: &Value) -> bool {
    match prop.get("_backboneForms") {
        Some(Value::String(s)) => is_asset_editor(s),
        Some(Value::Object(o)) => o.get("type").and_then(Value::as_str).map_or(false, is_asset_editor),
        _ => false,
    }
}

/// Rewrite every asset-typed string in `data` the schema declares
///
/// `f` returns the replacement, or `None` to leave a value untouched.
/// Recurses into object `properties` and into array `items`.
pub fn rewrite_asset_fields<F>(properties: &Document, data: &mut Document, f: &mut F)
where
    F: FnMut(&str) -> Option<String>,
{
    for (key, prop) in properties {
        let Some(value) = data.get_mut(key) else {
            continue;
        };
        rewrite_value(prop, value, f);
    }
}

fn rewrite_value<F>(prop: &Value, value: &mut Value, f: &mut F)
where
    F: FnMut(&str) -> Option<String>,
{
    if is_asset_field(prop) {
        if let Value::String(s) = value {
            if let Some(replacement) = f(s) {
                *s = replacement;
            }
        }
        return;
    }
    match value {
        Value::Object(obj) => {
            if let Some(Value::Object(nested)) = prop.get("properties") {
                rewrite_asset_fields(nested, obj, f);
            }
        }
        Value::Array(items) => {
            if let Some(item_schema) = prop.get("items") {
                for item in items {
                    rewrite_value(item_schema, item, f);
                }
            }
        }
        _ => {}
    }
}
