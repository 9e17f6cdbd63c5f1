use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use tracing::info;

use super::StageEnv;
use crate::assets::{self, AssetReconciler};
use crate::context::ImportContext;
use crate::error::Result;
use crate::package::load_course_data;
use crate::status::{StatusCode, StatusEntry};

/// Discover asset metadata and inject the request's global tags
pub async fn load_asset_data(ctx: &mut ImportContext, env: &StageEnv<'_>) -> Result<()> {
    let folders = ctx
        .request
        .asset_folders
        .clone()
        .unwrap_or_else(|| env.config.import.asset_folders.clone());
    let entries = assets::load_asset_data(ctx.layout()?, &folders, &ctx.request.tags).await?;
    info!("LoadAssetData: {} assets in {:?}", entries.len(), folders);
    ctx.assets = entries;
    Ok(())
}

/// Tag titles referenced by the request, the assets and the course
async fn required_tag_titles(ctx: &ImportContext) -> Result<BTreeSet<String>> {
    let course_tags = load_course_data(ctx.layout()?).await?.course_tags();
    Ok(ctx
        .request
        .tags
        .iter()
        .chain(ctx.assets.iter().flat_map(|a| a.tags.iter()))
        .chain(course_tags.iter())
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect())
}

/// Resolve tag titles to ids, creating the missing ones
pub async fn import_tags(ctx: &mut ImportContext, env: &StageEnv<'_>) -> Result<()> {
    let titles = required_tag_titles(ctx).await?;
    let mut tag_ids: HashMap<String, String> = env
        .services
        .tags
        .find()
        .await?
        .into_iter()
        .map(|tag| (tag.title, tag.id))
        .collect();

    let missing: Vec<String> = titles
        .into_iter()
        .filter(|title| !tag_ids.contains_key(title))
        .collect();

    if !ctx.settings.is_dry_run {
        for title in &missing {
            let tag = env.services.tags.insert(title).await?;
            ctx.journal.record_tag(tag.id.clone());
            tag_ids.insert(tag.title, tag.id);
        }
    }
    if !missing.is_empty() {
        ctx.status.info(StatusEntry::new(
            StatusCode::TagsCreated,
            json!({ "count": missing.len() }),
        ));
    }
    info!("ImportTags: {} new tags", missing.len());
    ctx.tag_ids = tag_ids;
    Ok(())
}

/// Persist every package asset; refused assets become warnings
pub async fn import_course_assets(ctx: &mut ImportContext, env: &StageEnv<'_>) -> Result<()> {
    if ctx.settings.is_dry_run {
        if !ctx.assets.is_empty() {
            ctx.status.info(StatusEntry::new(
                StatusCode::AssetsImported,
                json!({ "count": ctx.assets.len() }),
            ));
        }
        return Ok(());
    }

    let outcome = AssetReconciler::new(
        env.services.assets.as_ref(),
        &ctx.journal,
        env.config.import.concurrency,
    )
    .import(&ctx.assets, &ctx.tag_ids, &ctx.request.user_id)
    .await;

    for (filepath, error) in &outcome.failures {
        ctx.status.warn(StatusEntry::new(
            StatusCode::AssetImportFailed,
            json!({ "filepath": filepath, "error": error }),
        ));
    }
    if !outcome.asset_map.is_empty() {
        ctx.status.info(StatusEntry::new(
            StatusCode::AssetsImported,
            json!({ "count": outcome.asset_map.len() }),
        ));
    }
    info!(
        "ImportCourseAssets: {} imported, {} failed",
        outcome.asset_map.len(),
        outcome.failures.len()
    );
    ctx.asset_map = outcome.asset_map;
    Ok(())
}
