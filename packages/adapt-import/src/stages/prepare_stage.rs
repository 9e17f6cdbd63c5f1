use serde_json::json;
use tracing::info;

use super::StageEnv;
use crate::context::ImportContext;
use crate::error::{ImportError, Result};
use crate::package::{read_package_manifest, PackageLayout, PackageManifest};
use crate::status::{StatusCode, StatusEntry};
use crate::version::{framework_compat, parse_version, FrameworkCompat};

/// Locate the course, resolve the language and check the framework version
pub async fn prepare(ctx: &mut ImportContext, env: &StageEnv<'_>) -> Result<()> {
    let root = ctx.request.import_path.clone();
    if !root.is_dir() {
        return Err(ImportError::invalid_package(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let (layout, _config) = PackageLayout::locate(&root, ctx.request.language.as_deref()).await?;
    env.services.schema_converter.convert(&layout.root).await?;
    let package = read_package_manifest(&layout.root).await?;

    check_framework_version(ctx, &package, &env.config.framework.version)?;

    info!(
        "Prepare: package {} v{} (language {})",
        package.name.as_deref().unwrap_or("<unnamed>"),
        package.version,
        layout.language
    );
    ctx.layout = Some(layout);
    ctx.package = Some(package);
    Ok(())
}

/// Reject packages the installed framework cannot take
///
/// A newer major is always incompatible. An older major needs
/// `migrate_content`, which flags the run for framework migration; minor
/// and patch differences import as they are.
fn check_framework_version(
    ctx: &mut ImportContext,
    package: &PackageManifest,
    installed: &str,
) -> Result<()> {
    let installed_version = parse_version(installed).ok_or_else(|| ImportError::InvalidVersion {
        name: "adapt_framework".to_string(),
        version: installed.to_string(),
    })?;
    let package_version =
        parse_version(&package.version).ok_or_else(|| ImportError::InvalidVersion {
            name: package
                .name
                .clone()
                .unwrap_or_else(|| "adapt_framework".to_string()),
            version: package.version.clone(),
        })?;
    let incompatible = || ImportError::Incompatible {
        installed: installed_version.to_string(),
        package: package_version.to_string(),
    };

    match framework_compat(&installed_version, &package_version) {
        FrameworkCompat::Newer => Err(incompatible()),
        FrameworkCompat::Older if ctx.settings.migrate_content => {
            ctx.framework_migration_required = true;
            ctx.status.info(StatusEntry::new(
                StatusCode::FrameworkMigrationRequired,
                json!({
                    "installed": installed_version.to_string(),
                    "import": package_version.to_string()
                }),
            ));
            Ok(())
        }
        FrameworkCompat::Older => Err(incompatible()),
        FrameworkCompat::Compatible => Ok(()),
    }
}
