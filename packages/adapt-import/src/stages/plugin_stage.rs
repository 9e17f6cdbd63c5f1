use tracing::info;

use super::StageEnv;
use crate::context::ImportContext;
use crate::error::Result;
use crate::package::scan_plugins;
use crate::plugins::{component_name_map, default_theme, reconcile, PluginInstaller};

/// Package plugins and the installed registry
pub async fn load_plugin_data(ctx: &mut ImportContext, env: &StageEnv<'_>) -> Result<()> {
    ctx.used_plugins = scan_plugins(ctx.layout()?).await?;
    refresh_installed(ctx, env).await?;
    info!(
        "LoadPluginData: {} package plugins, {} installed",
        ctx.used_plugins.len(),
        ctx.installed_plugins.len()
    );
    Ok(())
}

async fn refresh_installed(ctx: &mut ImportContext, env: &StageEnv<'_>) -> Result<()> {
    ctx.installed_plugins = env.services.plugins.find().await?;
    ctx.component_map = component_name_map(&ctx.installed_plugins);
    ctx.theme = default_theme(&ctx.installed_plugins, &ctx.used_plugins);
    Ok(())
}

/// Reconcile package plugins and, outside dry runs, install/update them
pub async fn import_course_plugins(ctx: &mut ImportContext, env: &StageEnv<'_>) -> Result<()> {
    let plan = reconcile(&ctx.used_plugins, &ctx.installed_plugins, &ctx.settings)?;
    ctx.status.merge(plan.status.clone());
    ctx.versions = plan.versions.clone();

    if !ctx.settings.is_dry_run && plan.has_changes() {
        PluginInstaller::new(env.services.plugins.as_ref(), &ctx.journal)
            .apply(&plan)
            .await?;
        refresh_installed(ctx, env).await?;
    }

    info!(
        "ImportCoursePlugins: {} to install, {} to update, {} need content migration",
        plan.to_install.len(),
        plan.to_update.len(),
        plan.to_migrate.len()
    );
    ctx.plugin_plan = Some(plan);
    Ok(())
}
