//! State owned by one import run

use adapt_store::domain::{InstalledPlugin, PluginDescriptor};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use uuid::Uuid;

use crate::assets::AssetEntry;
use crate::error::{ImportError, Result};
use crate::journal::SideEffectJournal;
use crate::package::{CourseData, PackageLayout, PackageManifest};
use crate::plugins::{PluginPlan, PluginVersionEntry};
use crate::settings::{ImportRequest, ImportSettings};
use crate::status::StatusReport;
use crate::summary::ImportSummary;

/// Package id -> persisted id, with the persisted ids indexed
#[derive(Debug, Clone, Default)]
pub struct IdMap {
    forward: HashMap<String, String>,
    persisted: HashSet<String>,
}

impl IdMap {
    pub fn insert(&mut self, package_id: String, persisted_id: String) {
        self.persisted.insert(persisted_id.clone());
        if let Some(previous) = self.forward.insert(package_id, persisted_id) {
            if !self.forward.values().any(|v| *v == previous) {
                self.persisted.remove(&previous);
            }
        }
    }

    pub fn get(&self, package_id: &str) -> Option<&String> {
        self.forward.get(package_id)
    }

    pub fn contains_key(&self, package_id: &str) -> bool {
        self.forward.contains_key(package_id)
    }

    /// True when `id` is already a persisted id
    pub fn is_persisted(&self, id: &str) -> bool {
        self.persisted.contains(id)
    }
}

/// Everything an import accumulates between stages
///
/// Owned by a single orchestrator; hooks receive it mutably and may adjust
/// package or plugin state before content is written.
#[derive(Debug)]
pub struct ImportContext {
    pub run_id: Uuid,
    pub request: ImportRequest,
    pub settings: ImportSettings,

    // prepare
    pub layout: Option<PackageLayout>,
    pub package: Option<PackageManifest>,
    pub framework_migration_required: bool,

    // assets, tags, plugins
    pub assets: Vec<AssetEntry>,
    /// Tag title -> tag id
    pub tag_ids: HashMap<String, String>,
    /// Normalized package path -> asset id
    pub asset_map: HashMap<String, String>,
    pub used_plugins: Vec<PluginDescriptor>,
    pub installed_plugins: Vec<InstalledPlugin>,
    pub plugin_plan: Option<PluginPlan>,
    pub component_map: HashMap<String, String>,
    pub theme: Option<String>,

    // content
    pub course_data: Option<CourseData>,
    pub id_map: IdMap,
    pub course_id: Option<String>,
    pub migration_scratch: Option<PathBuf>,

    pub status: StatusReport,
    pub versions: Vec<PluginVersionEntry>,
    pub journal: SideEffectJournal,
    pub summary: Option<ImportSummary>,
}

impl ImportContext {
    pub fn new(request: ImportRequest) -> Self {
        let settings = request.settings();
        Self {
            run_id: Uuid::new_v4(),
            request,
            settings,
            layout: None,
            package: None,
            framework_migration_required: false,
            assets: Vec::new(),
            tag_ids: HashMap::new(),
            asset_map: HashMap::new(),
            used_plugins: Vec::new(),
            installed_plugins: Vec::new(),
            plugin_plan: None,
            component_map: HashMap::new(),
            theme: None,
            course_data: None,
            id_map: IdMap::default(),
            course_id: None,
            migration_scratch: None,
            status: StatusReport::default(),
            versions: Vec::new(),
            journal: SideEffectJournal::new(),
            summary: None,
        }
    }

    pub fn layout(&self) -> Result<&PackageLayout> {
        self.layout
            .as_ref()
            .ok_or_else(|| ImportError::invalid_package("package has not been prepared"))
    }

    pub fn course_data(&self) -> Result<&CourseData> {
        self.course_data
            .as_ref()
            .ok_or_else(|| ImportError::invalid_package("course data has not been loaded"))
    }

    /// Plugins queued for content migration by plugin reconciliation
    pub fn plugins_to_migrate(&self) -> &[String] {
        self.plugin_plan
            .as_ref()
            .map(|p| p.to_migrate.as_slice())
            .unwrap_or_default()
    }
}
