//! Non-fatal status report accumulated over an import run

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    // info
    FrameworkMigrationRequired,
    TagsCreated,
    AssetsImported,
    PluginsInstalled,
    PluginsUpdated,
    PluginNotNewer,
    ContentMigrationRequired,
    ContentImported,
    // warn
    AssetImportFailed,
    MissingPlugins,
    InvalidPluginVersion,
    UpdateBlocked,
    ManagedPluginOverwritten,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::FrameworkMigrationRequired => "FRAMEWORK_MIGRATION_REQUIRED",
            StatusCode::TagsCreated => "TAGS_CREATED",
            StatusCode::AssetsImported => "ASSETS_IMPORTED",
            StatusCode::PluginsInstalled => "PLUGINS_INSTALLED",
            StatusCode::PluginsUpdated => "PLUGINS_UPDATED",
            StatusCode::PluginNotNewer => "PLUGIN_NOT_NEWER",
            StatusCode::ContentMigrationRequired => "CONTENT_MIGRATION_REQUIRED",
            StatusCode::ContentImported => "CONTENT_IMPORTED",
            StatusCode::AssetImportFailed => "ASSET_IMPORT_FAILED",
            StatusCode::MissingPlugins => "MISSING_PLUGINS",
            StatusCode::InvalidPluginVersion => "INVALID_PLUGIN_VERSION",
            StatusCode::UpdateBlocked => "UPDATE_BLOCKED",
            StatusCode::ManagedPluginOverwritten => "MANAGED_PLUGIN_OVERWRITTEN",
        }
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub code: StatusCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl StatusEntry {
    pub fn new(code: StatusCode, data: Value) -> Self {
        Self {
            code,
            data: Some(data),
        }
    }

    pub fn bare(code: StatusCode) -> Self {
        Self { code, data: None }
    }
}

/// Append-only `{info, warn}` lists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub info: Vec<StatusEntry>,
    pub warn: Vec<StatusEntry>,
}

impl StatusReport {
    pub fn info(&mut self, entry: StatusEntry) {
        self.info.push(entry);
    }

    pub fn warn(&mut self, entry: StatusEntry) {
        self.warn.push(entry);
    }

    /// Append every entry of `other`, keeping its order
    pub fn merge(&mut self, other: StatusReport) {
        self.info.extend(other.info);
        self.warn.extend(other.warn);
    }

    pub fn has_info(&self, code: StatusCode) -> bool {
        self.info.iter().any(|e| e.code == code)
    }

    pub fn has_warning(&self, code: StatusCode) -> bool {
        self.warn.iter().any(|e| e.code == code)
    }

    /// First info entry with `code`
    pub fn find_info(&self, code: StatusCode) -> Option<&StatusEntry> {
        self.info.iter().find(|e| e.code == code)
    }

    pub fn warnings_with(&self, code: StatusCode) -> impl Iterator<Item = &StatusEntry> {
        self.warn.iter().filter(move |e| e.code == code)
    }
}
