use adapt_store::StoreError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, ImportError>;

/// One content document the store refused during `importCourseData`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentInsertFailure {
    pub id: String,
    pub schema: String,
    pub reason: String,
}

impl std::fmt::Display for ContentInsertFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.id, self.schema, self.reason)
    }
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Invalid import package: {0}")]
    InvalidPackage(String),

    #[error("Invalid course structure: {0}")]
    InvalidCourse(String),

    #[error("Package framework version {package} is incompatible with installed {installed}")]
    Incompatible { installed: String, package: String },

    #[error("Invalid version '{version}' for plugin {name}")]
    InvalidVersion { name: String, version: String },

    #[error("Missing plugins: {}", plugins.join(", "))]
    MissingPlugins { plugins: Vec<String> },

    #[error("Failed to import plugins: {}", errors.join("; "))]
    PluginsFailed { errors: Vec<String> },

    #[error("Orphaned content: {}", ids.join(", "))]
    OrphanedContent { ids: Vec<String> },

    #[error("Unknown component '{component}' on {id}")]
    UnknownComponent { id: String, component: String },

    #[error("Failed to import {} content document(s)", failures.len())]
    ContentFailed { failures: Vec<ContentInsertFailure> },

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Course is locked: {0}")]
    CourseLocked(String),

    #[error("Build failed: {0}")]
    BuildFailed(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ImportError {
    pub fn invalid_package<E: std::fmt::Display>(e: E) -> Self {
        Self::InvalidPackage(e.to_string())
    }

    pub fn invalid_course<E: std::fmt::Display>(e: E) -> Self {
        Self::InvalidCourse(e.to_string())
    }

    /// Stable code surfaced to callers
    pub fn code(&self) -> &'static str {
        match self {
            ImportError::InvalidParams(_) => "INVALID_PARAMS",
            ImportError::InvalidPackage(_) => "FW_IMPORT_INVALID",
            ImportError::InvalidCourse(_) => "FW_IMPORT_INVALID_COURSE",
            ImportError::Incompatible { .. } => "FW_IMPORT_INCOMPAT",
            ImportError::InvalidVersion { .. } => "FW_INVALID_VERSION",
            ImportError::MissingPlugins { .. } => "FW_IMPORT_MISSING_PLUGINS",
            ImportError::PluginsFailed { .. } => "FW_IMPORT_PLUGINS_FAILED",
            ImportError::OrphanedContent { .. } => "FW_IMPORT_ORPHANED_CONTENT",
            ImportError::UnknownComponent { .. } => "FW_IMPORT_UNKNOWN_COMPONENT",
            ImportError::ContentFailed { .. } => "FW_IMPORT_CONTENT_FAILED",
            ImportError::MigrationFailed(_) => "FW_MIGRATION_FAILED",
            ImportError::CourseLocked(_) => "COURSE_LOCKED",
            ImportError::BuildFailed(_) => "FW_BUILD_FAILED",
            ImportError::InvalidStateTransition { .. } => "INVALID_STATE",
            ImportError::Store(_) => "STORE_ERROR",
            ImportError::Io(_) => "IO_ERROR",
            ImportError::Json(_) => "SERIALIZATION_ERROR",
            ImportError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Structured payload accompanying `code()`
    pub fn data(&self) -> Value {
        match self {
            ImportError::Incompatible { installed, package } => {
                json!({ "installed": installed, "import": package })
            }
            ImportError::InvalidVersion { name, version } => {
                json!({ "name": name, "version": version })
            }
            ImportError::MissingPlugins { plugins } => json!({ "plugins": plugins }),
            ImportError::PluginsFailed { errors } => json!({ "errors": errors }),
            ImportError::OrphanedContent { ids } => json!({ "ids": ids }),
            ImportError::UnknownComponent { id, component } => {
                json!({ "id": id, "component": component })
            }
            ImportError::ContentFailed { failures } => json!({ "errors": failures }),
            ImportError::CourseLocked(course_id) => json!({ "courseId": course_id }),
            other => json!({ "reason": other.to_string() }),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ImportError::InvalidParams(_)
            | ImportError::InvalidPackage(_)
            | ImportError::InvalidCourse(_)
            | ImportError::Incompatible { .. }
            | ImportError::OrphanedContent { .. }
            | ImportError::Config(_) => ErrorCategory::Validation,
            ImportError::UnknownComponent { .. } | ImportError::ContentFailed { .. } => {
                ErrorCategory::Content
            }
            ImportError::InvalidVersion { .. }
            | ImportError::MissingPlugins { .. }
            | ImportError::PluginsFailed { .. } => ErrorCategory::Plugin,
            ImportError::MigrationFailed(_)
            | ImportError::CourseLocked(_)
            | ImportError::BuildFailed(_) => ErrorCategory::External,
            ImportError::InvalidStateTransition { .. }
            | ImportError::Store(_)
            | ImportError::Io(_)
            | ImportError::Json(_) => ErrorCategory::Infrastructure,
        }
    }
}

/// Error category used when logging failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Package or request rejected before anything was persisted
    Validation,
    /// Content documents rejected by migrations or the store
    Content,
    /// Plugin version or install problems
    Plugin,
    /// Migration tool, lock holder or build tooling
    External,
    /// Store, filesystem or serialization failures
    Infrastructure,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::Content => "content",
            ErrorCategory::Plugin => "plugin",
            ErrorCategory::External => "external",
            ErrorCategory::Infrastructure => "infrastructure",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ImportError::InvalidParams("x".into()).code(), "INVALID_PARAMS");
        assert_eq!(
            ImportError::OrphanedContent { ids: vec![] }.code(),
            "FW_IMPORT_ORPHANED_CONTENT"
        );
        assert_eq!(ImportError::CourseLocked("c1".into()).code(), "COURSE_LOCKED");
        assert_eq!(
            ImportError::Store(StoreError::database("down")).code(),
            "STORE_ERROR"
        );
    }

    #[test]
    fn test_content_failed_data_lists_every_document() {
        let err = ImportError::ContentFailed {
            failures: vec![
                ContentInsertFailure {
                    id: "a-05".into(),
                    schema: "article".into(),
                    reason: "title is required".into(),
                },
                ContentInsertFailure {
                    id: "c-10".into(),
                    schema: "component".into(),
                    reason: "unknown component".into(),
                },
            ],
        };

        let data = err.data();
        assert_eq!(data["errors"].as_array().unwrap().len(), 2);
        assert_eq!(data["errors"][0]["schema"], "article");
        assert_eq!(err.category(), ErrorCategory::Content);
        assert!(err.to_string().contains("2 content document"));
    }

    #[test]
    fn test_missing_plugins_message() {
        let err = ImportError::MissingPlugins {
            plugins: vec!["adapt-contrib-text".into(), "adapt-contrib-mcq".into()],
        };
        assert_eq!(
            err.to_string(),
            "Missing plugins: adapt-contrib-text, adapt-contrib-mcq"
        );
        assert_eq!(err.category(), ErrorCategory::Plugin);
    }
}
