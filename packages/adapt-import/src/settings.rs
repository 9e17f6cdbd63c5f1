use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ImportError, Result};

/// Parameters of one import call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportRequest {
    /// Unpacked package directory
    pub import_path: PathBuf,
    pub user_id: String,
    /// Language directory to import; defaults to the package's `_defaultLanguage`
    pub language: Option<String>,
    /// Asset folder names; defaults to the configured folders
    pub asset_folders: Option<Vec<String>>,
    /// Tag titles applied to the course and every asset
    pub tags: Vec<String>,
    pub is_dry_run: bool,
    pub import_content: bool,
    pub import_plugins: bool,
    pub migrate_content: bool,
    pub update_plugins: bool,
    pub remove_source: bool,
    /// Existing course to overwrite instead of creating a new one
    pub replace_course_id: Option<String>,
}

impl Default for ImportRequest {
    fn default() -> Self {
        Self {
            import_path: PathBuf::new(),
            user_id: String::new(),
            language: None,
            asset_folders: None,
            tags: Vec::new(),
            is_dry_run: false,
            import_content: true,
            import_plugins: true,
            migrate_content: true,
            update_plugins: false,
            remove_source: true,
            replace_course_id: None,
        }
    }
}

impl ImportRequest {
    pub fn new(import_path: impl Into<PathBuf>, user_id: impl Into<String>) -> Self {
        Self {
            import_path: import_path.into(),
            user_id: user_id.into(),
            ..Self::default()
        }
    }

    pub fn dry_run(mut self, is_dry_run: bool) -> Self {
        self.is_dry_run = is_dry_run;
        self
    }

    pub fn update_plugins(mut self, update: bool) -> Self {
        self.update_plugins = update;
        self
    }

    pub fn import_plugins(mut self, import: bool) -> Self {
        self.import_plugins = import;
        self
    }

    pub fn remove_source(mut self, remove: bool) -> Self {
        self.remove_source = remove;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn replacing(mut self, course_id: impl Into<String>) -> Self {
        self.replace_course_id = Some(course_id.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.import_path.as_os_str().is_empty() {
            return Err(ImportError::InvalidParams("importPath is required".to_string()));
        }
        if self.user_id.trim().is_empty() {
            return Err(ImportError::InvalidParams("userId is required".to_string()));
        }
        Ok(())
    }

    pub fn settings(&self) -> ImportSettings {
        ImportSettings {
            is_dry_run: self.is_dry_run,
            import_content: self.import_content,
            import_plugins: self.import_plugins,
            migrate_content: self.migrate_content,
            update_plugins: self.update_plugins,
            remove_source: self.remove_source,
        }
    }
}

/// Flags every stage consults; fixed for the lifetime of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSettings {
    pub is_dry_run: bool,
    pub import_content: bool,
    pub import_plugins: bool,
    pub migrate_content: bool,
    pub update_plugins: bool,
    pub remove_source: bool,
}

impl Default for ImportSettings {
    fn default() -> Self {
        ImportRequest::default().settings()
    }
}
