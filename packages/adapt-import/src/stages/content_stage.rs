//! Course content stages: load, file-level migration, import and summary

use adapt_store::domain::{
    Collection, ContentDocument, ContentKind, ContentStore, Document, InsertOptions, Query,
};
use adapt_store::StoreError;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde_json::{json, Map, Value};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::StageEnv;
use crate::assets::{normalise_asset_path, rewrite_asset_fields};
use crate::context::ImportContext;
use crate::error::{ContentInsertFailure, ImportError, Result};
use crate::hierarchy::sort_hierarchy;
use crate::migration_tool::MigrationTool;
use crate::migrations::{start_page_friendly_ids, MigrationContext};
use crate::package::{self, read_json, write_json, CourseData, PackageLayout, CONFIG_FILE};
use crate::status::{StatusCode, StatusEntry};
use crate::summary::ImportSummary;

// ═══════════════════════════════════════════════════════════════════════════
// loadCourseData
// ═══════════════════════════════════════════════════════════════════════════

pub async fn load_course_data(ctx: &mut ImportContext, _env: &StageEnv<'_>) -> Result<()> {
    let data = package::load_course_data(ctx.layout()?).await?;
    let count: usize = data.counts().values().sum();
    if ctx.settings.is_dry_run {
        ctx.status.info(StatusEntry::new(
            StatusCode::ContentImported,
            json!({ "count": count }),
        ));
    }
    info!("LoadCourseData: {} documents", count);
    ctx.course_data = Some(data);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// migrateCourseData
// ═══════════════════════════════════════════════════════════════════════════

/// Run the upstream migration tool over the unpacked package files
///
/// Only runs when the package predates the installed framework or plugin
/// reconciliation queued plugins for content migration.
pub async fn migrate_course_data(ctx: &mut ImportContext, env: &StageEnv<'_>) -> Result<()> {
    let plugins = ctx.plugins_to_migrate().to_vec();
    if !ctx.framework_migration_required && plugins.is_empty() {
        info!("MigrateCourseData: nothing to migrate");
        return Ok(());
    }

    let layout = ctx.layout()?.clone();
    patch_legacy_files(&layout, ctx.theme.as_deref()).await?;

    let scratch = env
        .config
        .paths
        .scratch_dir
        .join("migrations")
        .join(format!("{}-{}", ctx.request.user_id, Uuid::new_v4().simple()));
    tokio::fs::create_dir_all(&scratch).await?;
    ctx.migration_scratch = Some(scratch.clone());

    info!(
        "MigrateCourseData: migrating {} (plugins: {:?})",
        layout.course_dir.display(),
        plugins
    );
    let result =
        run_migration_tool(env.services.migration_tool.as_ref(), &layout.course_dir, &scratch)
            .await;

    match tokio::fs::remove_dir_all(&scratch).await {
        Ok(()) => ctx.migration_scratch = None,
        Err(e) => warn!("Failed to remove {}: {}", scratch.display(), e),
    }
    result
}

async fn run_migration_tool(
    tool: &dyn MigrationTool,
    course_dir: &Path,
    scratch: &Path,
) -> Result<()> {
    let log = tool.capture(course_dir, scratch).await?;
    debug!("migrate capture output:\n{}", log);
    let log = tool.migrate(course_dir, scratch).await?;
    debug!("migrate migrate output:\n{}", log);
    Ok(())
}

/// Patch conventions the migration scripts expect but legacy packages omit
///
/// - `config.json` gets `_theme` when it has none
/// - `course.json` gets an empty `customStyle` when it has none
async fn patch_legacy_files(layout: &PackageLayout, theme: Option<&str>) -> Result<()> {
    let config_path = layout.course_dir.join(CONFIG_FILE);
    let mut config: Document = read_json(&config_path).await?;
    let has_theme = config
        .get("_theme")
        .and_then(Value::as_str)
        .map_or(false, |t| !t.is_empty());
    if let (false, Some(theme)) = (has_theme, theme) {
        config.insert("_theme".to_string(), Value::String(theme.to_string()));
        write_json(&config_path, &config).await?;
    }

    let course_path = layout.lang_dir.join("course.json");
    if course_path.is_file() {
        let mut course: Document = read_json(&course_path).await?;
        if !course.contains_key("customStyle") {
            course.insert("customStyle".to_string(), Value::String(String::new()));
            write_json(&course_path, &course).await?;
        }
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// importCourseData
// ═══════════════════════════════════════════════════════════════════════════

/// Persist course, config and the content tree level by level
///
/// With `replace_course_id`, the course lock is held for the whole write and
/// released on success and failure.
pub async fn import_course_data(ctx: &mut ImportContext, env: &StageEnv<'_>) -> Result<()> {
    let data = ctx
        .course_data
        .take()
        .ok_or_else(|| ImportError::invalid_package("course data has not been loaded"))?;

    let result = match ctx.request.replace_course_id.clone() {
        Some(course_id) => {
            let store = env.services.content.as_ref();
            match store
                .get_lock(Utc::now(), &ctx.request.user_id, &course_id)
                .await
            {
                Ok(Some(_)) => {
                    let result = write_course(ctx, env, &data, Some(course_id.as_str())).await;
                    if let Err(e) = store.release_lock(&course_id).await {
                        warn!("Failed to release lock on course {}: {}", course_id, e);
                    }
                    result
                }
                Ok(None) => Err(ImportError::CourseLocked(course_id)),
                Err(e) => Err(e.into()),
            }
        }
        None => write_course(ctx, env, &data, None).await,
    };

    ctx.course_data = Some(data);
    result
}

fn migration_context<'a>(
    ctx: &'a ImportContext,
    start_pages: &'a HashMap<String, String>,
) -> MigrationContext<'a> {
    MigrationContext {
        id_map: &ctx.id_map,
        component_map: &ctx.component_map,
        start_pages,
        theme: ctx.theme.as_deref(),
    }
}

fn content_options(kind: ContentKind) -> InsertOptions {
    InsertOptions::content(kind.schema_name())
}

fn document_id(doc: &Document) -> Result<String> {
    doc.get("_id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ImportError::Store(StoreError::database("stored document has no _id")))
}

/// Tag ids for the course: its own tag titles plus the request's global tags
fn course_tag_ids(
    course: &ContentDocument,
    global: &[String],
    tag_ids: &HashMap<String, String>,
) -> Vec<Value> {
    let own = course
        .data
        .get("tags")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str);
    let titles: BTreeSet<&str> = own.chain(global.iter().map(String::as_str)).collect();
    titles
        .into_iter()
        .filter_map(|t| tag_ids.get(t.trim()))
        .map(|id| Value::String(id.clone()))
        .collect()
}

/// Sanitise against the store schema and rewrite asset paths to asset ids
///
/// Returns the payload and the asset ids it references.
async fn prepare_document(
    store: &dyn ContentStore,
    doc: ContentDocument,
    asset_map: &HashMap<String, String>,
) -> Result<(Document, Vec<String>)> {
    let schema = store.get_schema(doc.kind.schema_name(), &doc.data).await?;
    let mut data = schema.sanitise(doc.into_data());
    let mut used = Vec::new();
    rewrite_asset_fields(&schema.properties, &mut data, &mut |value: &str| {
        let id = asset_map.get(&normalise_asset_path(value))?.clone();
        used.push(id.clone());
        Some(id)
    });
    used.sort();
    used.dedup();
    Ok((data, used))
}

async fn link_assets(
    store: &dyn ContentStore,
    course_id: &str,
    content_id: &str,
    asset_ids: &[String],
) -> Result<()> {
    let mut opts = InsertOptions::new(Collection::CourseAssets, "courseasset");
    opts.validate = false;
    for asset_id in asset_ids {
        let mut link = Map::new();
        link.insert("_courseId".to_string(), json!(course_id));
        link.insert("_contentId".to_string(), json!(content_id));
        link.insert("_assetId".to_string(), json!(asset_id));
        store.insert(link, &opts).await?;
    }
    Ok(())
}

async fn insert_document(
    store: &dyn ContentStore,
    doc: ContentDocument,
    asset_map: &HashMap<String, String>,
    course_id: &str,
) -> Result<String> {
    let opts = content_options(doc.kind);
    let (data, assets) = prepare_document(store, doc, asset_map).await?;
    let stored = store.insert(data, &opts).await?;
    let id = document_id(&stored)?;
    link_assets(store, course_id, &id, &assets).await?;
    Ok(id)
}

/// Remove the content objects, config and asset links of an existing course
async fn clear_course(store: &dyn ContentStore, course_id: &str) -> Result<()> {
    let kinds = ContentKind::CONTENT_OBJECTS
        .iter()
        .chain(std::iter::once(&ContentKind::Config));
    for kind in kinds {
        let removed = store
            .delete_many(
                &Query::content()
                    .eq("_courseId", course_id)
                    .eq("_type", kind.as_str()),
            )
            .await?;
        debug!("Removed {} {} documents from course {}", removed, kind, course_id);
    }
    store
        .delete_many(&Query::new(Collection::CourseAssets).eq("_courseId", course_id))
        .await?;
    Ok(())
}

async fn write_course(
    ctx: &mut ImportContext,
    env: &StageEnv<'_>,
    data: &CourseData,
    replace: Option<&str>,
) -> Result<()> {
    let started = Instant::now();
    let store = env.services.content.as_ref();
    let package_course_id = data.course_id().to_string();

    // The hierarchy is the integrity gate: orphans fail before any write
    let sorted = sort_hierarchy(
        &package_course_id,
        data.content_objects
            .iter()
            .map(|(id, doc)| (id.as_str(), doc.parent_id())),
    )?;
    let start_pages = start_page_friendly_ids(&data.course, &data.content_objects);

    // Course
    let mut course = data.course.clone();
    env.migrations
        .apply_all(&mut course, &migration_context(ctx, &start_pages))?;
    course.data.remove("_id");
    course.set(
        "tags",
        course_tag_ids(&data.course, &ctx.request.tags, &ctx.tag_ids),
    );
    let (mut course_data, course_assets) = prepare_document(store, course, &ctx.asset_map).await?;

    let course_id = match replace {
        Some(existing) => {
            clear_course(store, existing).await?;
            course_data.insert("_courseId".to_string(), json!(existing));
            store
                .update(
                    &Query::content().eq("_id", existing),
                    course_data,
                    &content_options(ContentKind::Course),
                )
                .await?;
            ctx.journal.record_course(existing, true);
            existing.to_string()
        }
        None => {
            let stored = store
                .insert(course_data, &content_options(ContentKind::Course))
                .await?;
            let id = document_id(&stored)?;
            ctx.journal.record_course(&id, false);
            let mut changes = Map::new();
            changes.insert("_courseId".to_string(), json!(id));
            store
                .update(
                    &Query::content().eq("_id", id.as_str()),
                    changes,
                    &content_options(ContentKind::Course),
                )
                .await?;
            id
        }
    };
    ctx.id_map.insert(package_course_id, course_id.clone());
    ctx.course_id = Some(course_id.clone());
    link_assets(store, &course_id, &course_id, &course_assets).await?;

    // Config
    let mut config = data.config.clone();
    env.migrations
        .apply_all(&mut config, &migration_context(ctx, &start_pages))?;
    config.data.remove("_id");
    config.set("_courseId", course_id.clone());
    insert_document(store, config, &ctx.asset_map, &course_id).await?;

    // Content tree, one level at a time
    let mut failures: Vec<ContentInsertFailure> = Vec::new();
    let mut imported = 1usize;
    for (depth, level) in sorted.sorted.iter().enumerate() {
        let mut pending = Vec::with_capacity(level.len());
        {
            let mctx = migration_context(ctx, &start_pages);
            for package_id in level {
                let Some(doc) = data.content_objects.get(package_id) else {
                    continue;
                };
                let failure = |reason: String| ContentInsertFailure {
                    id: package_id.clone(),
                    schema: doc.kind.schema_name().to_string(),
                    reason,
                };
                if let Some(parent) = doc.parent_id() {
                    if !ctx.id_map.contains_key(parent) {
                        failures.push(failure(format!("parent {} was not imported", parent)));
                        continue;
                    }
                }
                let mut doc = doc.clone();
                if let Err(e) = env.migrations.apply_all(&mut doc, &mctx) {
                    failures.push(failure(e.to_string()));
                    continue;
                }
                doc.data.remove("_id");
                doc.set("_courseId", course_id.clone());
                pending.push((package_id.clone(), doc));
            }
        }

        let asset_map = &ctx.asset_map;
        let course_id = course_id.as_str();
        let results: Vec<(String, &'static str, Result<String>)> = stream::iter(pending)
            .map(|(package_id, doc)| async move {
                let schema = doc.kind.schema_name();
                let result = insert_document(store, doc, asset_map, course_id).await;
                (package_id, schema, result)
            })
            .buffer_unordered(env.config.import.concurrency.max(1))
            .collect()
            .await;

        let level_size = results.len();
        for (package_id, schema, result) in results {
            match result {
                Ok(id) => {
                    ctx.id_map.insert(package_id, id);
                    imported += 1;
                }
                Err(e) => failures.push(ContentInsertFailure {
                    id: package_id,
                    schema: schema.to_string(),
                    reason: e.to_string(),
                }),
            }
        }
        debug!("ImportCourseData: level {} ({} documents)", depth, level_size);
    }

    if !failures.is_empty() {
        failures.sort_by(|a, b| a.id.cmp(&b.id));
        warn!(
            "ImportCourseData: {} of {} documents failed",
            failures.len(),
            imported + failures.len()
        );
        return Err(ImportError::ContentFailed { failures });
    }

    ctx.status.info(StatusEntry::new(
        StatusCode::ContentImported,
        json!({ "count": imported }),
    ));
    info!(
        "ImportCourseData: {} documents into course {} in {}ms",
        imported,
        course_id,
        started.elapsed().as_millis()
    );
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// generateSummary
// ═══════════════════════════════════════════════════════════════════════════

pub async fn generate_summary(ctx: &mut ImportContext, _env: &StageEnv<'_>) -> Result<()> {
    let (title, content) = match &ctx.course_data {
        Some(data) => (
            data.course
                .str_field("title")
                .or_else(|| data.course.str_field("displayTitle"))
                .map(str::to_string),
            data.counts(),
        ),
        None => (None, Default::default()),
    };
    ctx.summary = Some(ImportSummary {
        title,
        course_id: ctx.course_id.clone(),
        status_report: ctx.status.clone(),
        content,
        versions: ctx.versions.clone(),
    });
    Ok(())
}
