//! Plugin manifests, descriptors and registry records

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::{Result, StoreError};

/// Manifest file names, in lookup order
pub const MANIFEST_FILES: [&str; 2] = ["bower.json", "package.json"];

/// Plugin type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginType {
    Component,
    Extension,
    Menu,
    Theme,
}

impl PluginType {
    pub const ALL: [PluginType; 4] = [
        PluginType::Component,
        PluginType::Extension,
        PluginType::Menu,
        PluginType::Theme,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PluginType::Component => "component",
            PluginType::Extension => "extension",
            PluginType::Menu => "menu",
            PluginType::Theme => "theme",
        }
    }

    /// Directory under `src/` holding plugins of this type
    pub fn dir_name(&self) -> &'static str {
        match self {
            PluginType::Component => "components",
            PluginType::Extension => "extensions",
            PluginType::Menu => "menu",
            PluginType::Theme => "theme",
        }
    }
}

impl std::fmt::Display for PluginType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Plugin manifest (`bower.json` / `package.json`)
///
/// Unknown keys are preserved so a corrected manifest can be written back
/// without losing data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(
        rename = "targetAttribute",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub target_attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub menu: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PluginManifest {
    /// First declared type key, with its value
    fn type_entry(&self) -> Option<(PluginType, &str)> {
        [
            (PluginType::Component, &self.component),
            (PluginType::Extension, &self.extension),
            (PluginType::Menu, &self.menu),
            (PluginType::Theme, &self.theme),
        ]
        .into_iter()
        .find_map(|(t, v)| v.as_deref().map(|v| (t, v)))
    }

    pub fn plugin_type(&self) -> Option<PluginType> {
        self.type_entry().map(|(t, _)| t)
    }

    /// `_` + the declared component/extension/menu/theme name
    pub fn inferred_target_attribute(&self) -> Option<String> {
        self.type_entry().map(|(_, name)| format!("_{}", name))
    }

    /// Locate and parse the manifest inside a plugin directory
    pub async fn read_from_dir(dir: &Path) -> Result<(Self, PathBuf)> {
        for file in MANIFEST_FILES {
            let path = dir.join(file);
            match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    let manifest: PluginManifest = serde_json::from_slice(&bytes)?;
                    return Ok((manifest, path));
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(StoreError::not_found(format!(
            "plugin manifest in {}",
            dir.display()
        )))
    }

    pub async fn write_to(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

/// Plugin declared by an import package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub name: String,
    pub path: PathBuf,
    pub version: Option<String>,
    pub target_attribute: Option<String>,
    pub plugin_type: Option<PluginType>,
}

impl PluginDescriptor {
    pub fn from_manifest(manifest: &PluginManifest, path: PathBuf) -> Self {
        Self {
            name: manifest.name.clone(),
            path,
            version: manifest.version.clone(),
            target_attribute: manifest.target_attribute.clone(),
            plugin_type: manifest.plugin_type(),
        }
    }
}

/// Plugin installed in the server registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledPlugin {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(rename = "isLocalInstall", default)]
    pub is_local_install: bool,
    #[serde(rename = "targetAttribute", default)]
    pub target_attribute: Option<String>,
    #[serde(rename = "type", default)]
    pub plugin_type: Option<PluginType>,
}

impl InstalledPlugin {
    /// Key content documents use to reference this plugin (`_component`)
    pub fn short_name(&self) -> Option<&str> {
        self.target_attribute
            .as_deref()
            .map(|attr| attr.trim_start_matches('_'))
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_manifest_type_and_target_attribute() {
        let manifest: PluginManifest = serde_json::from_value(json!({
            "name": "adapt-contrib-trickle",
            "version": "4.0.0",
            "extension": "trickle",
            "keywords": ["adapt-plugin"]
        }))
        .unwrap();

        assert_eq!(manifest.plugin_type(), Some(PluginType::Extension));
        assert_eq!(
            manifest.inferred_target_attribute().as_deref(),
            Some("_trickle")
        );
        assert!(manifest.extra.contains_key("keywords"));
    }

    #[test]
    fn test_manifest_without_type() {
        let manifest: PluginManifest =
            serde_json::from_value(json!({ "name": "adapt-lonely" })).unwrap();
        assert_eq!(manifest.plugin_type(), None);
        assert_eq!(manifest.inferred_target_attribute(), None);
    }

    #[tokio::test]
    async fn test_read_prefers_bower() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("bower.json"),
            r#"{"name":"from-bower","component":"text"}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("package.json"),
            r#"{"name":"from-package","component":"text"}"#,
        )
        .unwrap();

        let (manifest, path) = PluginManifest::read_from_dir(dir.path()).await.unwrap();
        assert_eq!(manifest.name, "from-bower");
        assert!(path.ends_with("bower.json"));
    }

    #[tokio::test]
    async fn test_read_missing_manifest() {
        let dir = TempDir::new().unwrap();
        let err = PluginManifest::read_from_dir(dir.path()).await.unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_write_preserves_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bower.json");
        std::fs::write(&path, r#"{"name":"p","menu":"boxMenu","main":"js/menu.js"}"#).unwrap();

        let (mut manifest, path) = PluginManifest::read_from_dir(dir.path()).await.unwrap();
        manifest.target_attribute = manifest.inferred_target_attribute();
        manifest.write_to(&path).await.unwrap();

        let written: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written["targetAttribute"], json!("_boxMenu"));
        assert_eq!(written["main"], json!("js/menu.js"));
    }

    #[test]
    fn test_installed_short_name() {
        let plugin = InstalledPlugin {
            id: "p1".into(),
            name: "adapt-contrib-text".into(),
            version: Some("5.0.0".into()),
            is_local_install: false,
            target_attribute: Some("_text".into()),
            plugin_type: Some(PluginType::Component),
        };
        assert_eq!(plugin.short_name(), Some("text"));
    }
}
