//! Unpacked import package on disk
//!
//! ```text
//! <root>/package.json
//! <root>/src/course/config.json
//! <root>/src/course/<lang>/*.json
//! <root>/src/{components,extensions,menu,theme}/<plugin>/bower.json
//! ```

use adapt_store::domain::{
    ContentDocument, ContentKind, Document, PluginDescriptor, PluginManifest, PluginType,
};
use adapt_store::ErrorKind;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{ImportError, Result};

pub const COURSE_DIR: &str = "course";
pub const CONFIG_FILE: &str = "config.json";
pub const PACKAGE_FILE: &str = "package.json";
pub const ASSETS_FILE: &str = "assets.json";

/// Root `package.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageManifest {
    #[serde(default)]
    pub name: Option<String>,
    /// Framework version the package was exported from
    pub version: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Resolved locations inside an unpacked package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageLayout {
    pub root: PathBuf,
    /// Parent of the course directory; asset paths are relative to it
    pub src_dir: PathBuf,
    pub course_dir: PathBuf,
    pub language: String,
    pub lang_dir: PathBuf,
}

impl PackageLayout {
    /// Locate the course directory and resolve the working language
    ///
    /// Returns the layout and the raw `config.json` payload.
    pub async fn locate(root: &Path, language: Option<&str>) -> Result<(Self, Document)> {
        unwrap_nested(root).await?;

        let mut course_dirs = find_course_dirs(root);
        let course_dir = match course_dirs.len() {
            1 => course_dirs.remove(0),
            0 => {
                return Err(ImportError::invalid_course(format!(
                    "no course directory found in {}",
                    root.display()
                )))
            }
            n => {
                return Err(ImportError::invalid_course(format!(
                    "{} course directories found in {}",
                    n,
                    root.display()
                )))
            }
        };

        let config_path = course_dir.join(CONFIG_FILE);
        if !config_path.is_file() {
            return Err(ImportError::invalid_course("missing course config.json"));
        }
        let config: Document = read_json(&config_path).await?;

        let language = match language {
            Some(lang) => lang.to_string(),
            None => config
                .get("_defaultLanguage")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    ImportError::invalid_course("config.json has no _defaultLanguage")
                })?,
        };
        let lang_dir = course_dir.join(&language);
        if !lang_dir.is_dir() {
            return Err(ImportError::invalid_course(format!(
                "no content for language '{}'",
                language
            )));
        }

        let src_dir = course_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| root.to_path_buf());

        Ok((
            Self {
                root: root.to_path_buf(),
                src_dir,
                course_dir,
                language,
                lang_dir,
            },
            config,
        ))
    }

    pub fn plugin_dir(&self, plugin_type: PluginType) -> PathBuf {
        self.root.join("src").join(plugin_type.dir_name())
    }
}

/// Lift the contents of a single wrapping directory into `root`
///
/// Zips are often created around a folder, leaving `<root>/<name>/package.json`.
pub async fn unwrap_nested(root: &Path) -> Result<()> {
    if root.join(PACKAGE_FILE).exists() {
        return Ok(());
    }
    let mut entries = read_dir_sorted(root).await?;
    if entries.len() != 1 {
        return Ok(());
    }
    let only = entries.remove(0);
    if !only.is_dir() || !only.join(PACKAGE_FILE).is_file() {
        return Ok(());
    }

    // Move aside first: the wrapper may contain an entry with its own name
    let staging = root.join(format!(".unwrap-{}", uuid::Uuid::new_v4().simple()));
    tokio::fs::rename(&only, &staging).await?;
    for entry in read_dir_sorted(&staging).await? {
        if let Some(name) = entry.file_name() {
            tokio::fs::rename(&entry, root.join(name)).await?;
        }
    }
    tokio::fs::remove_dir(&staging).await?;
    debug!("Unwrapped nested package directory {}", only.display());
    Ok(())
}

/// `course` directories one level below an immediate child of `root`
pub fn find_course_dirs(root: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(2)
        .max_depth(2)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir() && e.file_name() == COURSE_DIR)
        .map(|e| e.into_path())
        .collect();
    dirs.sort();
    dirs
}

pub async fn read_package_manifest(root: &Path) -> Result<PackageManifest> {
    read_json(&root.join(PACKAGE_FILE)).await
}

/// Read and parse a package JSON file; problems are package errors
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ImportError::invalid_package(format!(
                "missing {}",
                path.display()
            )))
        }
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&bytes)
        .map_err(|e| ImportError::invalid_package(format!("{}: {}", path.display(), e)))
}

pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

/// Parsed course content of the working language
#[derive(Debug, Clone, PartialEq)]
pub struct CourseData {
    pub course: ContentDocument,
    pub config: ContentDocument,
    /// Content objects keyed by package id
    pub content_objects: BTreeMap<String, ContentDocument>,
}

impl CourseData {
    pub fn course_id(&self) -> &str {
        self.course.id().unwrap_or_default()
    }

    /// Documents per `_type`; the course counts once, config is not content
    pub fn counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        counts.insert(ContentKind::Course.as_str().to_string(), 1);
        for doc in self.content_objects.values() {
            *counts.entry(doc.kind.as_str().to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Tag titles declared on the course
    pub fn course_tags(&self) -> Vec<String> {
        self.course
            .data
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Parse every content file of the working language
pub async fn load_course_data(layout: &PackageLayout) -> Result<CourseData> {
    let config: Document = read_json(&layout.course_dir.join(CONFIG_FILE)).await?;
    let config = ContentDocument::config(config);

    let mut course: Option<ContentDocument> = None;
    let mut content_objects = BTreeMap::new();

    for path in read_dir_sorted(&layout.lang_dir).await? {
        let is_json = path.extension().map_or(false, |ext| ext == "json");
        let is_assets = path.file_name().map_or(false, |name| name == ASSETS_FILE);
        if !path.is_file() || !is_json || is_assets {
            continue;
        }
        let items = match read_json::<Value>(&path).await? {
            Value::Array(items) => items,
            value @ Value::Object(_) => vec![value],
            _ => {
                return Err(ImportError::invalid_package(format!(
                    "{}: expected an object or array",
                    path.display()
                )))
            }
        };
        for item in items {
            let doc = ContentDocument::from_value(item).map_err(|e| {
                ImportError::invalid_package(format!("{}: {}", path.display(), e.message))
            })?;
            match doc.kind {
                ContentKind::Course => {
                    if course.is_some() {
                        return Err(ImportError::invalid_course("multiple course documents"));
                    }
                    course = Some(doc);
                }
                ContentKind::Config => {
                    warn!("Ignoring config document in {}", path.display());
                }
                _ => {
                    let id = doc.id().map(str::to_string).ok_or_else(|| {
                        ImportError::invalid_package(format!(
                            "{}: {} document without _id",
                            path.display(),
                            doc.kind
                        ))
                    })?;
                    if content_objects.insert(id.clone(), doc).is_some() {
                        return Err(ImportError::invalid_package(format!(
                            "duplicate content id {}",
                            id
                        )));
                    }
                }
            }
        }
    }

    let course = course.ok_or_else(|| ImportError::invalid_course("missing course document"))?;
    if course.id().is_none() {
        return Err(ImportError::invalid_course("course document has no _id"));
    }
    debug!(
        "Loaded course {} with {} content objects",
        course.id().unwrap_or_default(),
        content_objects.len()
    );

    Ok(CourseData {
        course,
        config,
        content_objects,
    })
}

/// Plugins shipped in the package, by type directory
pub async fn scan_plugins(layout: &PackageLayout) -> Result<Vec<PluginDescriptor>> {
    let mut plugins = Vec::new();
    for plugin_type in PluginType::ALL {
        let dir = layout.plugin_dir(plugin_type);
        if !dir.is_dir() {
            continue;
        }
        for plugin_dir in read_dir_sorted(&dir).await? {
            if !plugin_dir.is_dir() {
                continue;
            }
            match PluginManifest::read_from_dir(&plugin_dir).await {
                Ok((manifest, _)) => {
                    let mut descriptor = PluginDescriptor::from_manifest(&manifest, plugin_dir);
                    descriptor.plugin_type = descriptor.plugin_type.or(Some(plugin_type));
                    plugins.push(descriptor);
                }
                Err(e) if e.kind == ErrorKind::NotFound => {
                    warn!("Skipping {}: no plugin manifest", plugin_dir.display());
                }
                Err(e) => {
                    return Err(ImportError::invalid_package(format!(
                        "{}: {}",
                        plugin_dir.display(),
                        e.message
                    )))
                }
            }
        }
    }
    Ok(plugins)
}

pub(crate) async fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(path: &Path, value: Value) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, serde_json::to_vec(&value).unwrap()).unwrap();
    }

    fn minimal_package(root: &Path) {
        write(&root.join("package.json"), json!({ "name": "course", "version": "5.31.0" }));
        write(
            &root.join("src/course/config.json"),
            json!({ "_defaultLanguage": "en" }),
        );
        write(
            &root.join("src/course/en/course.json"),
            json!({ "_id": "course", "_type": "course", "title": "Course", "tags": ["safety"] }),
        );
        write(
            &root.join("src/course/en/contentObjects.json"),
            json!([
                { "_id": "co-05", "_type": "page", "_parentId": "course" },
                { "_id": "co-10", "_type": "page", "_parentId": "course" },
                { "_id": "co-00", "_type": "menu", "_parentId": "course" }
            ]),
        );
        write(
            &root.join("src/course/en/assets.json"),
            json!({ "logo.png": { "title": "Logo" } }),
        );
    }

    #[tokio::test]
    async fn test_locate_and_load() {
        let dir = TempDir::new().unwrap();
        minimal_package(dir.path());

        let (layout, config) = PackageLayout::locate(dir.path(), None).await.unwrap();
        assert_eq!(layout.language, "en");
        assert_eq!(layout.src_dir, dir.path().join("src"));
        assert_eq!(config["_defaultLanguage"], json!("en"));

        let data = load_course_data(&layout).await.unwrap();
        assert_eq!(data.course_id(), "course");
        assert_eq!(data.config.id(), Some("config"));
        assert_eq!(data.content_objects.len(), 3);
        assert_eq!(data.course_tags(), vec!["safety"]);

        let counts = data.counts();
        assert_eq!(counts["course"], 1);
        assert_eq!(counts["page"], 2);
        assert_eq!(counts["menu"], 1);
        assert!(!counts.contains_key("config"));
    }

    #[tokio::test]
    async fn test_nested_package_is_unwrapped() {
        let dir = TempDir::new().unwrap();
        // Wrapper shares its name with an inner directory
        let wrapper = dir.path().join("src");
        minimal_package(&wrapper);

        let (layout, _) = PackageLayout::locate(dir.path(), None).await.unwrap();
        assert!(dir.path().join("package.json").is_file());
        assert_eq!(layout.course_dir, dir.path().join("src/course"));
    }

    #[tokio::test]
    async fn test_multiple_course_dirs_rejected() {
        let dir = TempDir::new().unwrap();
        minimal_package(dir.path());
        write(
            &dir.path().join("build/course/config.json"),
            json!({ "_defaultLanguage": "en" }),
        );

        let err = PackageLayout::locate(dir.path(), None).await.unwrap_err();
        assert_eq!(err.code(), "FW_IMPORT_INVALID_COURSE");
        assert!(err.to_string().contains("2 course directories"));
    }

    #[tokio::test]
    async fn test_missing_course_dir_rejected() {
        let dir = TempDir::new().unwrap();
        write(&dir.path().join("package.json"), json!({ "version": "5.0.0" }));

        let err = PackageLayout::locate(dir.path(), None).await.unwrap_err();
        assert_eq!(err.code(), "FW_IMPORT_INVALID_COURSE");
    }

    #[tokio::test]
    async fn test_unknown_language_rejected() {
        let dir = TempDir::new().unwrap();
        minimal_package(dir.path());

        let err = PackageLayout::locate(dir.path(), Some("fr")).await.unwrap_err();
        assert!(err.to_string().contains("'fr'"));
    }

    #[tokio::test]
    async fn test_unknown_type_names_document() {
        let dir = TempDir::new().unwrap();
        minimal_package(dir.path());
        write(
            &dir.path().join("src/course/en/quizzes.json"),
            json!([{ "_id": "q-1", "_type": "quiz" }]),
        );

        let (layout, _) = PackageLayout::locate(dir.path(), None).await.unwrap();
        let err = load_course_data(&layout).await.unwrap_err();
        assert_eq!(err.code(), "FW_IMPORT_INVALID");
        assert!(err.to_string().contains("q-1"));
    }

    #[tokio::test]
    async fn test_scan_plugins() {
        let dir = TempDir::new().unwrap();
        minimal_package(dir.path());
        write(
            &dir.path().join("src/components/adapt-contrib-text/bower.json"),
            json!({ "name": "adapt-contrib-text", "version": "5.0.0", "component": "text" }),
        );
        write(
            &dir.path().join("src/theme/adapt-contrib-vanilla/package.json"),
            json!({ "name": "adapt-contrib-vanilla", "version": "9.0.0" }),
        );
        std::fs::create_dir_all(dir.path().join("src/extensions/empty")).unwrap();

        let (layout, _) = PackageLayout::locate(dir.path(), None).await.unwrap();
        let plugins = scan_plugins(&layout).await.unwrap();

        assert_eq!(plugins.len(), 2);
        assert_eq!(plugins[0].name, "adapt-contrib-text");
        assert_eq!(plugins[0].plugin_type, Some(PluginType::Component));
        // Type falls back to the directory the plugin was found in
        assert_eq!(plugins[1].plugin_type, Some(PluginType::Theme));
    }
}
