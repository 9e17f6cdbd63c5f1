//! Plugin reconciliation
//!
//! `reconcile` is a pure decision over the package plugins and the installed
//! registry; `PluginInstaller` carries the decision out.

use adapt_store::domain::{
    InstalledPlugin, PluginDescriptor, PluginManifest, PluginRegistry, PluginType,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{ImportError, Result};
use crate::journal::SideEffectJournal;
use crate::settings::ImportSettings;
use crate::status::{StatusCode, StatusEntry, StatusReport};
use crate::version::{parse_version, plugin_update_status, PluginUpdateStatus};

/// Row of the summary's plugin version table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginVersionEntry {
    pub name: String,
    pub status: PluginUpdateStatus,
    /// `[installed, imported]`
    pub versions: [Option<String>; 2],
}

/// What to do with every package plugin
#[derive(Debug, Clone, Default)]
pub struct PluginPlan {
    pub to_install: Vec<PluginDescriptor>,
    /// Package plugin with the record it overwrites
    pub to_update: Vec<(PluginDescriptor, InstalledPlugin)>,
    /// Plugins whose package content predates the installed version
    pub to_migrate: Vec<String>,
    pub missing: Vec<String>,
    pub versions: Vec<PluginVersionEntry>,
    pub status: StatusReport,
}

impl PluginPlan {
    pub fn has_changes(&self) -> bool {
        !self.to_install.is_empty() || !self.to_update.is_empty()
    }
}

fn names<'a>(plugins: impl Iterator<Item = &'a PluginDescriptor>) -> Vec<String> {
    plugins.map(|p| p.name.clone()).collect()
}

/// Decide install/update/migrate/skip for each package plugin
///
/// # Errors
///
/// - `InvalidVersion` when neither the package nor the registry has a usable version
/// - `MissingPlugins` when plugins must be installed but `import_plugins` is off
///   (a dry run records a warning instead)
pub fn reconcile(
    used: &[PluginDescriptor],
    installed: &[InstalledPlugin],
    settings: &ImportSettings,
) -> Result<PluginPlan> {
    let mut plan = PluginPlan::default();
    let mut blocked = Vec::new();

    let mut used: Vec<&PluginDescriptor> = used.iter().collect();
    used.sort_by(|a, b| a.name.cmp(&b.name));

    for plugin in used {
        let existing = installed.iter().find(|p| p.name == plugin.name);
        let installed_version = existing.and_then(|p| p.version.clone());
        let import_version = plugin.version.clone().unwrap_or_default();
        let is_local = existing.map_or(false, |p| p.is_local_install);

        let status = plugin_update_status(
            installed_version.as_deref(),
            &import_version,
            is_local,
            settings.update_plugins,
        );
        plan.versions.push(PluginVersionEntry {
            name: plugin.name.clone(),
            status,
            versions: [installed_version.clone(), plugin.version.clone()],
        });

        match status {
            PluginUpdateStatus::Invalid => {
                if installed_version.as_deref().and_then(parse_version).is_none() {
                    return Err(ImportError::InvalidVersion {
                        name: plugin.name.clone(),
                        version: import_version,
                    });
                }
                // Treated as 0.0.0: the installed plugin is newer
                plan.status.warn(StatusEntry::new(
                    StatusCode::InvalidPluginVersion,
                    json!({ "name": plugin.name, "version": import_version }),
                ));
                plan.to_migrate.push(plugin.name.clone());
            }
            PluginUpdateStatus::Installed => {
                if settings.import_plugins {
                    plan.to_install.push(plugin.clone());
                } else {
                    plan.missing.push(plugin.name.clone());
                }
            }
            PluginUpdateStatus::Older => plan.to_migrate.push(plugin.name.clone()),
            PluginUpdateStatus::NoChange => plan.status.info(StatusEntry::new(
                StatusCode::PluginNotNewer,
                json!({ "name": plugin.name, "version": import_version }),
            )),
            PluginUpdateStatus::UpdateBlocked => blocked.push(plugin.name.clone()),
            PluginUpdateStatus::Updated => {
                // Updated implies an installed record
                if let Some(existing) = existing {
                    if settings.update_plugins && !existing.is_local_install {
                        plan.status.warn(StatusEntry::new(
                            StatusCode::ManagedPluginOverwritten,
                            json!({ "name": plugin.name }),
                        ));
                    }
                    plan.to_update.push((plugin.clone(), existing.clone()));
                }
            }
        }
    }

    if !blocked.is_empty() {
        plan.status.warn(StatusEntry::new(
            StatusCode::UpdateBlocked,
            json!({ "plugins": blocked }),
        ));
    }
    if !plan.missing.is_empty() {
        if !settings.is_dry_run {
            return Err(ImportError::MissingPlugins {
                plugins: plan.missing.clone(),
            });
        }
        plan.status.warn(StatusEntry::new(
            StatusCode::MissingPlugins,
            json!({ "plugins": plan.missing }),
        ));
    }
    if !plan.to_install.is_empty() {
        plan.status.info(StatusEntry::new(
            StatusCode::PluginsInstalled,
            json!({ "plugins": names(plan.to_install.iter()) }),
        ));
    }
    if !plan.to_update.is_empty() {
        plan.status.info(StatusEntry::new(
            StatusCode::PluginsUpdated,
            json!({ "plugins": names(plan.to_update.iter().map(|(d, _)| d)) }),
        ));
    }
    if !plan.to_migrate.is_empty() {
        plan.status.info(StatusEntry::new(
            StatusCode::ContentMigrationRequired,
            json!({ "plugins": plan.to_migrate }),
        ));
    }

    Ok(plan)
}

/// Write an inferred `targetAttribute` back into the plugin manifest
///
/// Returns the attribute the plugin ends up with.
pub async fn ensure_target_attribute(plugin_dir: &Path) -> adapt_store::Result<Option<String>> {
    let (mut manifest, path) = PluginManifest::read_from_dir(plugin_dir).await?;
    if manifest.target_attribute.is_none() {
        if let Some(attribute) = manifest.inferred_target_attribute() {
            debug!("Setting targetAttribute {} on {}", attribute, manifest.name);
            manifest.target_attribute = Some(attribute);
            manifest.write_to(&path).await?;
        }
    }
    Ok(manifest.target_attribute)
}

/// Carries out a `PluginPlan` against the registry
pub struct PluginInstaller<'a> {
    registry: &'a dyn PluginRegistry,
    journal: &'a SideEffectJournal,
}

impl<'a> PluginInstaller<'a> {
    pub fn new(registry: &'a dyn PluginRegistry, journal: &'a SideEffectJournal) -> Self {
        Self { registry, journal }
    }

    /// Install and update concurrently; every failure is reported at the end
    pub async fn apply(&self, plan: &PluginPlan) -> Result<()> {
        let installs = plan.to_install.iter().map(|d| (d, None));
        let updates = plan.to_update.iter().map(|(d, prev)| (d, Some(prev)));

        info!(
            "PluginInstaller: installing {} and updating {} plugins",
            plan.to_install.len(),
            plan.to_update.len()
        );
        let results = join_all(
            installs
                .chain(updates)
                .map(|(plugin, previous)| self.install_one(plugin, previous)),
        )
        .await;

        let errors: Vec<String> = results.into_iter().filter_map(|r| r.err()).collect();
        if !errors.is_empty() {
            return Err(ImportError::PluginsFailed { errors });
        }
        Ok(())
    }

    async fn install_one(
        &self,
        plugin: &PluginDescriptor,
        previous: Option<&InstalledPlugin>,
    ) -> std::result::Result<(), String> {
        ensure_target_attribute(&plugin.path)
            .await
            .map_err(|e| format!("{}: {}", plugin.name, e))?;

        if let Some(previous) = previous {
            self.journal.record_plugin_update(previous.clone());
        }

        let request = [(plugin.name.clone(), plugin.path.clone())];
        match self.registry.install_plugins(&request, true).await {
            Ok(records) => {
                if previous.is_none() {
                    for record in records {
                        self.journal.record_plugin_install(record.id);
                    }
                }
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                debug!("Plugin {} already installed", plugin.name);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to install plugin {}: {}", plugin.name, e);
                Err(format!("{}: {}", plugin.name, e))
            }
        }
    }
}

/// Component key (`_component` short name or plugin name) -> installed plugin name
pub fn component_name_map(installed: &[InstalledPlugin]) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for plugin in installed
        .iter()
        .filter(|p| p.plugin_type == Some(PluginType::Component))
    {
        map.insert(plugin.name.clone(), plugin.name.clone());
        if let Some(short) = plugin.short_name() {
            map.insert(short.to_string(), plugin.name.clone());
        }
    }
    map
}

/// Theme the course should default to: the package's own, else any installed theme
pub fn default_theme(installed: &[InstalledPlugin], used: &[PluginDescriptor]) -> Option<String> {
    let themes: Vec<&InstalledPlugin> = installed
        .iter()
        .filter(|p| p.plugin_type == Some(PluginType::Theme))
        .collect();
    used.iter()
        .filter(|u| u.plugin_type == Some(PluginType::Theme))
        .find_map(|u| themes.iter().find(|t| t.name == u.name))
        .or_else(|| themes.first())
        .map(|t| t.name.clone())
}
