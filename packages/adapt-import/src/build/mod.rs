//! Course build pipeline
//!
//! Turns a persisted course back into framework JSON files:
//!
//! ```text
//! store documents → id remap (friendly ids) → depth-first ordering
//!   → asset paths → plugin globals → course/<lang>/*.json → [compress] → BuildRecord
//! ```

pub mod cache;
pub mod transform;

pub use cache::BuildCache;

use adapt_store::domain::{
    AssetRecord, AssetStore, BuildAction, BuildRecord, Collection, ContentDocument, ContentKind,
    ContentStore, Document, InsertOptions, InstalledPlugin, PluginRegistry, Query,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::assets::rewrite_asset_fields;
use crate::config::ImporterConfig;
use crate::error::{ImportError, Result};
use crate::hierarchy::sort_hierarchy;
use crate::package::{write_json, CONFIG_FILE, COURSE_DIR};
use transform::{
    component_short_names, enabled_plugins, relocate_plugin_globals, restore_component_name,
    IdTable,
};

/// Framework version key in `BuildRecord::versions`
pub const FRAMEWORK_VERSION_KEY: &str = "adapt_framework";

const DEFAULT_LANGUAGE: &str = "en";

/// Content object files every build writes, even when empty
const OUTPUT_FILES: [&str; 4] = [
    "contentObjects.json",
    "articles.json",
    "blocks.json",
    "components.json",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub course_id: String,
    pub action: BuildAction,
    pub user_id: String,
}

impl BuildRequest {
    pub fn new(course_id: impl Into<String>, action: BuildAction, user_id: impl Into<String>) -> Self {
        Self {
            course_id: course_id.into(),
            action,
            user_id: user_id.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.course_id.trim().is_empty() {
            return Err(ImportError::InvalidParams("courseId is required".to_string()));
        }
        if self.user_id.trim().is_empty() {
            return Err(ImportError::InvalidParams("userId is required".to_string()));
        }
        Ok(())
    }
}

/// Packs a finished build directory into a single archive
#[async_trait]
pub trait Compressor: Send + Sync {
    async fn compress(&self, source_dir: &Path, archive: &Path) -> Result<()>;

    /// File extension of produced archives
    fn extension(&self) -> &str;
}

/// `tar -czf <archive> -C <source_dir> .`
#[derive(Debug, Clone)]
pub struct TarCompressor {
    program: PathBuf,
}

impl TarCompressor {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("tar"),
        }
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for TarCompressor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Compressor for TarCompressor {
    async fn compress(&self, source_dir: &Path, archive: &Path) -> Result<()> {
        let output = Command::new(&self.program)
            .arg("-czf")
            .arg(archive)
            .arg("-C")
            .arg(source_dir)
            .arg(".")
            .output()
            .await
            .map_err(|e| {
                ImportError::BuildFailed(format!("failed to start {}: {}", self.program.display(), e))
            })?;
        if !output.status.success() {
            return Err(ImportError::BuildFailed(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    fn extension(&self) -> &str {
        "tar.gz"
    }
}

/// Course documents as loaded from the store
struct CourseDocuments {
    course: ContentDocument,
    config: Option<ContentDocument>,
    objects: Vec<ContentDocument>,
}

/// Builds persisted courses into framework output directories
pub struct BuildOrchestrator {
    content: Arc<dyn ContentStore>,
    assets: Arc<dyn AssetStore>,
    plugins: Arc<dyn PluginRegistry>,
    config: ImporterConfig,
    cache: Arc<BuildCache>,
    compressor: Option<Arc<dyn Compressor>>,
}

impl BuildOrchestrator {
    pub fn new(
        content: Arc<dyn ContentStore>,
        assets: Arc<dyn AssetStore>,
        plugins: Arc<dyn PluginRegistry>,
        config: ImporterConfig,
    ) -> Self {
        let cache = Arc::new(BuildCache::new(Arc::clone(&content)));
        Self {
            content,
            assets,
            plugins,
            config,
            cache,
            compressor: None,
        }
    }

    /// Compress `export` builds
    pub fn with_compressor(mut self, compressor: Arc<dyn Compressor>) -> Self {
        self.compressor = Some(compressor);
        self
    }

    pub fn cache(&self) -> &Arc<BuildCache> {
        &self.cache
    }

    pub async fn build(&self, request: BuildRequest) -> Result<BuildRecord> {
        request.validate()?;
        let started = Instant::now();
        info!("Build {}: {} started", request.course_id, request.action);

        let docs = self.load(&request.course_id).await?;
        let installed = self.plugins.find().await?;
        let language = docs
            .config
            .as_ref()
            .and_then(|c| c.str_field("_defaultLanguage"))
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_LANGUAGE)
            .to_string();

        // Depth-first content order, siblings by _sortOrder
        let sort_orders: HashMap<&str, i64> = docs
            .objects
            .iter()
            .filter_map(|d| d.id().map(|id| (id, d.sort_order())))
            .collect();
        let hierarchy = sort_hierarchy(
            &request.course_id,
            docs.objects.iter().filter_map(|d| d.id().map(|id| (id, d.parent_id()))),
        )?;
        let order = hierarchy.depth_first(&request.course_id, |id| {
            sort_orders.get(id).copied().unwrap_or(0)
        });
        let by_id: HashMap<&str, &ContentDocument> = docs
            .objects
            .iter()
            .filter_map(|d| d.id().map(|id| (id, d)))
            .collect();

        let ids = IdTable::from_documents(
            &request.course_id,
            std::iter::once(&docs.course)
                .chain(docs.config.iter())
                .chain(docs.objects.iter()),
        );

        let used_components: HashSet<String> = docs
            .objects
            .iter()
            .filter_map(|d| d.component().map(str::to_string))
            .collect();
        let enabled = enabled_plugins(&installed, docs.config.as_ref(), &used_components);
        let short_names = component_short_names(&installed);

        // Documents in output order
        let mut output: Vec<ContentDocument> = Vec::with_capacity(order.len() + 2);
        output.push(docs.course.clone());
        if let Some(config) = &docs.config {
            output.push(config.clone());
        }
        output.extend(order.iter().filter_map(|id| by_id.get(id.as_str()).map(|d| (*d).clone())));

        let assets = self.resolve_assets(&mut output, &language).await?;

        for doc in &mut output {
            match doc.kind {
                ContentKind::Course => {
                    let moved = relocate_plugin_globals(&mut doc.data, &enabled);
                    debug!("Build {}: relocated {} plugin globals", request.course_id, moved);
                }
                ContentKind::Component => restore_component_name(&mut doc.data, &short_names),
                _ => {}
            }
            ids.remap(&mut doc.data);
        }

        let expires_at = Utc::now()
            .checked_add_signed(self.ttl()?)
            .ok_or_else(|| {
                ImportError::BuildFailed(format!(
                    "build.ttl_secs {} overflows the record expiry",
                    self.config.build.ttl_secs
                ))
            })?;
        let build_id = Uuid::new_v4().simple().to_string();
        let build_dir = self.config.paths.build_dir.join(&build_id);
        let archive = match (&self.compressor, request.action) {
            (Some(compressor), BuildAction::Export) => Some((
                Arc::clone(compressor),
                self.config
                    .paths
                    .build_dir
                    .join(format!("{}.{}", build_id, compressor.extension())),
            )),
            _ => None,
        };

        let written = async {
            self.write_output(&build_dir, &language, output).await?;
            copy_assets(&assets, &build_dir.join(COURSE_DIR).join(&language)).await?;

            let location = match &archive {
                Some((compressor, archive)) => {
                    compressor.compress(&build_dir, archive).await?;
                    if let Err(e) = tokio::fs::remove_dir_all(&build_dir).await {
                        warn!("Build {}: failed to remove {}: {}", build_id, build_dir.display(), e);
                    }
                    archive.clone()
                }
                None => build_dir.clone(),
            };

            let record = BuildRecord {
                id: build_id.clone(),
                action: request.action,
                course_id: request.course_id.clone(),
                location: location.display().to_string(),
                expires_at,
                created_by: request.user_id.clone(),
                versions: self.versions(&enabled),
            };
            let opts = InsertOptions {
                validate: false,
                ..InsertOptions::new(Collection::AdaptBuilds, "adaptbuild")
            };
            self.content.insert(record.to_document()?, &opts).await?;
            Ok::<_, ImportError>(record)
        }
        .await;

        let record = match written {
            Ok(record) => record,
            Err(e) => {
                remove_partial_output(&build_dir, archive.as_ref().map(|(_, a)| a.as_path())).await;
                return Err(e);
            }
        };
        let purged = self.cache.insert(record.clone());
        if purged > 0 {
            debug!("Build {}: evicted {} expired builds", record.id, purged);
        }

        info!(
            "Build {}: {} written to {} in {}ms",
            request.course_id,
            request.action,
            record.location,
            started.elapsed().as_millis()
        );
        Ok(record)
    }

    /// Unexpired build record by id
    pub async fn retrieve(&self, build_id: &str) -> Result<Option<BuildRecord>> {
        self.cache.get(build_id).await
    }

    fn ttl(&self) -> Result<Duration> {
        i64::try_from(self.config.build.ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| {
                ImportError::BuildFailed(format!(
                    "build.ttl_secs {} is out of range",
                    self.config.build.ttl_secs
                ))
            })
    }

    fn versions(&self, enabled: &[&InstalledPlugin]) -> BTreeMap<String, String> {
        let mut versions: BTreeMap<String, String> = enabled
            .iter()
            .filter_map(|p| p.version.clone().map(|v| (p.name.clone(), v)))
            .collect();
        versions.insert(
            FRAMEWORK_VERSION_KEY.to_string(),
            self.config.framework.version.clone(),
        );
        versions
    }

    async fn load(&self, course_id: &str) -> Result<CourseDocuments> {
        let mut found = self
            .content
            .find(&Query::content().eq("_courseId", course_id))
            .await?;
        if !found.iter().any(|d| d.get("_id").and_then(Value::as_str) == Some(course_id)) {
            found.extend(self.content.find(&Query::content().eq("_id", course_id)).await?);
        }

        let mut course = None;
        let mut config = None;
        let mut objects = Vec::new();
        for data in found {
            let doc = ContentDocument::from_value(Value::Object(data))?;
            match doc.kind {
                ContentKind::Course if doc.id() == Some(course_id) => course = Some(doc),
                ContentKind::Course => {}
                ContentKind::Config => config = Some(doc),
                _ => objects.push(doc),
            }
        }
        let course = course
            .ok_or_else(|| ImportError::BuildFailed(format!("course {} not found", course_id)))?;
        Ok(CourseDocuments {
            course,
            config,
            objects,
        })
    }

    /// Replace asset ids with `course/<lang>/assets/<filename>`
    async fn resolve_assets(
        &self,
        docs: &mut [ContentDocument],
        language: &str,
    ) -> Result<Vec<AssetRecord>> {
        let mut schemas = Vec::with_capacity(docs.len());
        let mut referenced: Vec<String> = Vec::new();
        for doc in docs.iter_mut() {
            let schema = self
                .content
                .get_schema(doc.kind.schema_name(), &doc.data)
                .await?;
            rewrite_asset_fields(&schema.properties, &mut doc.data, &mut |value| {
                if !referenced.iter().any(|r| r == value) {
                    referenced.push(value.to_string());
                }
                None
            });
            schemas.push(schema);
        }
        if referenced.is_empty() {
            return Ok(Vec::new());
        }

        let records = self.assets.find(&referenced).await?;
        let paths: HashMap<&str, String> = records
            .iter()
            .map(|r| {
                (
                    r.id.as_str(),
                    format!("{}/{}/assets/{}", COURSE_DIR, language, r.filename),
                )
            })
            .collect();
        for (doc, schema) in docs.iter_mut().zip(&schemas) {
            rewrite_asset_fields(&schema.properties, &mut doc.data, &mut |value| {
                paths.get(value).cloned()
            });
        }
        Ok(records)
    }

    async fn write_output(
        &self,
        build_dir: &Path,
        language: &str,
        docs: Vec<ContentDocument>,
    ) -> Result<()> {
        let course_dir = build_dir.join(COURSE_DIR);
        let lang_dir = course_dir.join(language);
        tokio::fs::create_dir_all(&lang_dir).await?;

        let mut files: BTreeMap<&str, Vec<Document>> =
            OUTPUT_FILES.iter().map(|name| (*name, Vec::new())).collect();
        for doc in docs {
            match doc.kind {
                ContentKind::Config => {
                    write_json(&course_dir.join(CONFIG_FILE), &doc.into_data()).await?;
                }
                ContentKind::Course => {
                    write_json(&lang_dir.join(doc.kind.build_file_name()), &doc.into_data())
                        .await?;
                }
                kind => {
                    if let Some(list) = files.get_mut(kind.build_file_name()) {
                        list.push(doc.into_data());
                    }
                }
            }
        }
        for (name, list) in &files {
            write_json(&lang_dir.join(name), list).await?;
        }
        Ok(())
    }
}

/// Drop whatever a failed build left behind
async fn remove_partial_output(build_dir: &Path, archive: Option<&Path>) {
    if build_dir.exists() {
        if let Err(e) = tokio::fs::remove_dir_all(build_dir).await {
            warn!("Build: failed to remove {}: {}", build_dir.display(), e);
        }
    }
    if let Some(archive) = archive.filter(|a| a.exists()) {
        if let Err(e) = tokio::fs::remove_file(archive).await {
            warn!("Build: failed to remove {}: {}", archive.display(), e);
        }
    }
}

async fn copy_assets(records: &[AssetRecord], lang_dir: &Path) -> Result<()> {
    if records.is_empty() {
        return Ok(());
    }
    let dest_dir = lang_dir.join("assets");
    tokio::fs::create_dir_all(&dest_dir).await?;
    for record in records {
        match &record.path {
            Some(path) => {
                tokio::fs::copy(path, dest_dir.join(&record.filename)).await?;
            }
            None => warn!("Build: asset {} has no stored file", record.id),
        }
    }
    Ok(())
}

impl std::fmt::Debug for BuildOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildOrchestrator")
            .field("build_dir", &self.config.paths.build_dir)
            .field("cache", &self.cache)
            .field("compressor", &self.compressor.is_some())
            .finish()
    }
}
