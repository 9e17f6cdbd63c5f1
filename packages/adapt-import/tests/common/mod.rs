//! Shared fixtures for the import and build integration tests
//!
//! `write_course_package` lays out a small but complete framework package:
//! two pages, one article/block/component under each, a text and a graphic
//! component plugin, and one asset with metadata.

#![allow(dead_code)]

use adapt_import::{ImportRequest, ImportServices, ImporterConfig};
use adapt_store::domain::{Collection, ContentSchema, Document};
use adapt_store::infrastructure::{
    MemoryAssetStore, MemoryContentStore, MemoryPluginRegistry, MemoryTagStore,
};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const USER: &str = "user-1";

/// Documents the fixture package contains (course included)
pub const PACKAGE_DOCUMENTS: usize = 9;

pub fn write_json(path: &Path, value: &Value) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
}

pub fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

pub fn write_course_package(root: &Path) {
    write_json(
        &root.join("package.json"),
        &json!({ "name": "adapt_framework", "version": "5.0.0" }),
    );

    let course_dir = root.join("src").join("course");
    write_json(
        &course_dir.join("config.json"),
        &json!({ "_defaultLanguage": "en", "_accessibility": { "_isEnabled": true } }),
    );

    let en = course_dir.join("en");
    write_json(
        &en.join("course.json"),
        &json!({
            "_id": "course",
            "_type": "course",
            "title": "Site Safety",
            "tags": ["safety"],
            "_start": { "_isEnabled": true, "_startIds": [{ "_id": "co-05" }] },
            "_globals": { "_text": { "ariaRegion": "Text" } }
        }),
    );
    write_json(
        &en.join("contentObjects.json"),
        &json!([
            { "_id": "co-05", "_parentId": "course", "_type": "page", "title": "Intro", "_sortOrder": 1 },
            { "_id": "co-10", "_parentId": "course", "_type": "page", "title": "Hazards", "_sortOrder": 2 }
        ]),
    );
    write_json(
        &en.join("articles.json"),
        &json!([
            { "_id": "a-05", "_parentId": "co-05", "_type": "article", "title": "Welcome" },
            { "_id": "a-10", "_parentId": "co-10", "_type": "article", "title": "Spotting hazards" }
        ]),
    );
    write_json(
        &en.join("blocks.json"),
        &json!([
            { "_id": "b-05", "_parentId": "a-05", "_type": "block", "_sortOrder": "1" },
            { "_id": "b-10", "_parentId": "a-10", "_type": "block", "_sortOrder": "1" }
        ]),
    );
    write_json(
        &en.join("components.json"),
        &json!([
            { "_id": "c-05", "_parentId": "b-05", "_type": "component", "_component": "text", "body": "Hello" },
            {
                "_id": "c-10", "_parentId": "b-10", "_type": "component", "_component": "graphic",
                "_graphic": { "src": "course/en/assets/logo.png", "alt": "Logo" }
            }
        ]),
    );
    write_json(
        &en.join("assets.json"),
        &json!({ "logo.png": { "title": "Logo", "tags": ["brand"] } }),
    );
    std::fs::create_dir_all(en.join("assets")).unwrap();
    std::fs::write(en.join("assets").join("logo.png"), b"\x89PNG fixture").unwrap();

    let components = root.join("src").join("components");
    write_json(
        &components.join("adapt-contrib-text").join("bower.json"),
        &json!({ "name": "adapt-contrib-text", "version": "5.0.0", "component": "text" }),
    );
    write_json(
        &components.join("adapt-contrib-graphic").join("bower.json"),
        &json!({
            "name": "adapt-contrib-graphic", "version": "5.1.0",
            "component": "graphic", "targetAttribute": "_graphic"
        }),
    );
}

/// Asset picker schema for the graphic component
pub fn graphic_schema() -> ContentSchema {
    let props = json!({
        "_graphic": {
            "type": "object",
            "properties": {
                "large": { "type": "string", "_backboneForms": "Asset:image" },
                "small": { "type": "string", "_backboneForms": "Asset:image" },
                "alt": { "type": "string" }
            }
        }
    });
    ContentSchema::new(
        "adapt-contrib-graphic-component",
        props.as_object().cloned().unwrap_or_default(),
    )
}

/// In-memory collaborators with their concrete types kept for assertions
pub struct Stores {
    pub content: Arc<MemoryContentStore>,
    pub plugins: Arc<MemoryPluginRegistry>,
    pub tags: Arc<MemoryTagStore>,
    pub assets: Arc<MemoryAssetStore>,
}

impl Stores {
    pub fn new(asset_dir: &Path) -> Self {
        Self::with_registry(asset_dir, MemoryPluginRegistry::new())
    }

    pub fn with_registry(asset_dir: &Path, registry: MemoryPluginRegistry) -> Self {
        let content = MemoryContentStore::new();
        content.register_schema(graphic_schema());
        Self {
            content: Arc::new(content),
            plugins: Arc::new(registry),
            tags: Arc::new(MemoryTagStore::new()),
            assets: Arc::new(MemoryAssetStore::with_storage_dir(asset_dir)),
        }
    }

    pub fn services(&self, config: &ImporterConfig) -> ImportServices {
        ImportServices::new(
            self.content.clone(),
            self.plugins.clone(),
            self.tags.clone(),
            self.assets.clone(),
            config,
        )
    }

    pub fn total_writes(&self) -> usize {
        self.content.write_count()
            + self.plugins.write_count()
            + self.tags.write_count()
            + self.assets.write_count()
    }

    pub fn content_of_type(&self, kind: &str) -> Vec<Document> {
        self.content
            .documents(Collection::Content)
            .into_iter()
            .filter(|d| d.get("_type").and_then(Value::as_str) == Some(kind))
            .collect()
    }
}

/// Package, scratch and storage directories for one test
pub struct Fixture {
    pub package: TempDir,
    pub workspace: TempDir,
    pub stores: Stores,
    pub config: ImporterConfig,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_registry(MemoryPluginRegistry::new())
    }

    pub fn with_registry(registry: MemoryPluginRegistry) -> Self {
        let package = TempDir::new().unwrap();
        write_course_package(package.path());
        let workspace = TempDir::new().unwrap();
        let config = ImporterConfig::default()
            .with_framework_version("5.0.0")
            .with_scratch_dir(workspace.path().join("scratch"))
            .with_build_dir(workspace.path().join("builds"));
        let stores = Stores::with_registry(&workspace.path().join("asset-store"), registry);
        Self {
            package,
            workspace,
            stores,
            config,
        }
    }

    pub fn path(&self) -> PathBuf {
        self.package.path().to_path_buf()
    }

    pub fn request(&self) -> ImportRequest {
        ImportRequest::new(self.path(), USER).remove_source(false)
    }

    pub fn services(&self) -> ImportServices {
        self.stores.services(&self.config)
    }
}
