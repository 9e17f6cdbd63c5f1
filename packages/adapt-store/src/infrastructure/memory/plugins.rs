use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::new_id;
use crate::domain::{InstalledPlugin, PluginManifest, PluginRegistry};
use crate::{Result, StoreError};

/// Plugin registry that installs by reading the plugin manifest
#[derive(Default)]
pub struct MemoryPluginRegistry {
    plugins: Mutex<Vec<InstalledPlugin>>,
    backups: Mutex<HashMap<String, InstalledPlugin>>,
    failing: Mutex<HashSet<String>>,
    writes: AtomicUsize,
}

impl MemoryPluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_plugins(plugins: Vec<InstalledPlugin>) -> Self {
        Self {
            plugins: Mutex::new(plugins),
            ..Self::default()
        }
    }

    /// Make installs of `name` fail
    pub fn fail_install_of(&self, name: &str) {
        self.failing.lock().insert(name.to_string());
    }

    pub fn installed(&self) -> Vec<InstalledPlugin> {
        self.plugins.lock().clone()
    }

    pub fn get(&self, name: &str) -> Option<InstalledPlugin> {
        self.plugins.lock().iter().find(|p| p.name == name).cloned()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PluginRegistry for MemoryPluginRegistry {
    async fn find(&self) -> Result<Vec<InstalledPlugin>> {
        Ok(self.installed())
    }

    async fn install_plugins(
        &self,
        plugins: &[(String, PathBuf)],
        strict: bool,
    ) -> Result<Vec<InstalledPlugin>> {
        let mut installed = Vec::with_capacity(plugins.len());
        for (name, path) in plugins {
            if self.failing.lock().contains(name) {
                return Err(StoreError::database(format!("failed to install {}", name)));
            }
            let (manifest, _) = PluginManifest::read_from_dir(path).await?;
            self.writes.fetch_add(1, Ordering::SeqCst);

            let mut registry = self.plugins.lock();
            let record = match registry.iter_mut().find(|p| &p.name == name) {
                Some(existing) => {
                    if strict && existing.version == manifest.version {
                        return Err(StoreError::already_exists(name.clone()));
                    }
                    self.backups.lock().insert(name.clone(), existing.clone());
                    existing.version = manifest.version.clone();
                    existing.target_attribute = manifest.target_attribute.clone();
                    existing.plugin_type = manifest.plugin_type();
                    existing.is_local_install = true;
                    existing.clone()
                }
                None => {
                    let record = InstalledPlugin {
                        id: new_id(),
                        name: name.clone(),
                        version: manifest.version.clone(),
                        is_local_install: true,
                        target_attribute: manifest.target_attribute.clone(),
                        plugin_type: manifest.plugin_type(),
                    };
                    registry.push(record.clone());
                    record
                }
            };
            installed.push(record);
        }
        Ok(installed)
    }

    async fn uninstall_plugin(&self, id: &str) -> Result<()> {
        let mut registry = self.plugins.lock();
        let pos = registry
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| StoreError::not_found(format!("plugin {}", id)))?;
        registry.remove(pos);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn restore_plugin_from_backup(&self, name: &str) -> Result<InstalledPlugin> {
        let backup = self
            .backups
            .lock()
            .remove(name)
            .ok_or_else(|| StoreError::not_found(format!("backup of {}", name)))?;
        let mut registry = self.plugins.lock();
        match registry.iter_mut().find(|p| p.name == name) {
            Some(existing) => *existing = backup.clone(),
            None => registry.push(backup.clone()),
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(backup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PluginType;
    use tempfile::TempDir;

    fn plugin_dir(version: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("bower.json"),
            format!(
                r#"{{"name":"adapt-contrib-text","version":"{}","component":"text","targetAttribute":"_text"}}"#,
                version
            ),
        )
        .unwrap();
        dir
    }

    #[tokio::test]
    async fn test_install_new_plugin() {
        let registry = MemoryPluginRegistry::new();
        let dir = plugin_dir("5.0.0");

        let installed = registry
            .install_plugins(&[("adapt-contrib-text".into(), dir.path().to_path_buf())], true)
            .await
            .unwrap();

        assert_eq!(installed.len(), 1);
        assert_eq!(installed[0].plugin_type, Some(PluginType::Component));
        assert_eq!(registry.write_count(), 1);
    }

    #[tokio::test]
    async fn test_update_then_restore() {
        let registry = MemoryPluginRegistry::new();
        let v1 = plugin_dir("5.0.0");
        let v2 = plugin_dir("6.0.0");
        let name = "adapt-contrib-text".to_string();

        registry
            .install_plugins(&[(name.clone(), v1.path().to_path_buf())], true)
            .await
            .unwrap();
        registry
            .install_plugins(&[(name.clone(), v2.path().to_path_buf())], true)
            .await
            .unwrap();
        assert_eq!(registry.get(&name).unwrap().version.as_deref(), Some("6.0.0"));

        registry.restore_plugin_from_backup(&name).await.unwrap();
        assert_eq!(registry.get(&name).unwrap().version.as_deref(), Some("5.0.0"));
    }

    #[tokio::test]
    async fn test_strict_reinstall_is_already_exists() {
        let registry = MemoryPluginRegistry::new();
        let dir = plugin_dir("5.0.0");
        let plugins = [("adapt-contrib-text".to_string(), dir.path().to_path_buf())];

        registry.install_plugins(&plugins, true).await.unwrap();
        let err = registry.install_plugins(&plugins, true).await.unwrap_err();
        assert!(err.is_already_exists());
    }
}
