//! Importer configuration (YAML v1)
//!
//! ```yaml
//! version: 1
//! framework:
//!   version: 5.31.0
//!   migration_tool: /usr/local/bin/adapt
//! paths:
//!   scratch_dir: /var/tmp/adapt-import
//!   build_dir: /var/lib/adapt/builds
//! import:
//!   concurrency: 8
//!   asset_folders: [assets]
//! build:
//!   ttl_secs: 86400
//! logging:
//!   filter: info,adapt_import=debug
//! ```
//!
//! Every section is optional; missing fields take their defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::version::parse_version;

pub const SUPPORTED_VERSIONS: [u32; 1] = [1];

#[derive(Error, Debug)]
pub enum ConfigError {
    /// Missing version field in YAML
    #[error("Missing 'version' field in configuration file. Add 'version: 1' to the top of your YAML file.")]
    MissingVersion,

    #[error("Unsupported configuration version {found}. Supported versions: {}", supported.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", "))]
    UnsupportedVersion { found: u32, supported: Vec<u32> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct FrameworkConfig {
    /// Installed framework version packages are checked against
    pub version: String,
    pub migration_tool: PathBuf,
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self {
            version: "5.0.0".to_string(),
            migration_tool: PathBuf::from("adapt"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PathsConfig {
    pub scratch_dir: PathBuf,
    pub build_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let tmp = std::env::temp_dir();
        Self {
            scratch_dir: tmp.join("adapt-import"),
            build_dir: tmp.join("adapt-builds"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct ImportConfig {
    /// Fan-out width for per-level and per-asset work
    pub concurrency: usize,
    pub asset_folders: Vec<String>,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            concurrency: (num_cpus::get() * 3 / 4).max(1), // 75% of cores
            asset_folders: vec!["assets".to_string()],
        }
    }
}

/// Longest accepted build record lifetime (ten years)
pub const MAX_BUILD_TTL_SECS: u64 = 10 * 365 * 86_400;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct BuildConfig {
    pub ttl_secs: u64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self { ttl_secs: 86_400 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// YAML schema v1
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFileV1 {
    version: Option<u32>,
    #[serde(default)]
    framework: FrameworkConfig,
    #[serde(default)]
    paths: PathsConfig,
    #[serde(default)]
    import: ImportConfig,
    #[serde(default)]
    build: BuildConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImporterConfig {
    pub framework: FrameworkConfig,
    pub paths: PathsConfig,
    pub import: ImportConfig,
    pub build: BuildConfig,
    pub logging: LoggingConfig,
}

impl ImporterConfig {
    pub fn from_yaml(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFileV1 = serde_yaml::from_str(content)?;

        // Version check
        let version = file.version.ok_or(ConfigError::MissingVersion)?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(ConfigError::UnsupportedVersion {
                found: version,
                supported: SUPPORTED_VERSIONS.to_vec(),
            });
        }

        let config = Self {
            framework: file.framework,
            paths: file.paths,
            import: file.import,
            build: file.build,
            logging: file.logging,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_framework_version(mut self, version: impl Into<String>) -> Self {
        self.framework.version = version.into();
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.paths.scratch_dir = dir.into();
        self
    }

    pub fn with_build_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.paths.build_dir = dir.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if parse_version(&self.framework.version).is_none() {
            return Err(ConfigError::Validation(format!(
                "framework.version '{}' is not a valid semver version",
                self.framework.version
            )));
        }
        if self.import.concurrency == 0 {
            return Err(ConfigError::Validation(
                "import.concurrency must be at least 1".to_string(),
            ));
        }
        if self.build.ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "build.ttl_secs must be greater than 0".to_string(),
            ));
        }
        if self.build.ttl_secs > MAX_BUILD_TTL_SECS {
            return Err(ConfigError::Validation(format!(
                "build.ttl_secs must be at most {}",
                MAX_BUILD_TTL_SECS
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() {
        let config = ImporterConfig::default();
        config.validate().unwrap();
        assert!(config.import.concurrency >= 1);
        assert_eq!(config.import.asset_folders, vec!["assets"]);
        assert_eq!(config.build.ttl_secs, 86_400);
        assert_eq!(config.framework.migration_tool, PathBuf::from("adapt"));
    }

    #[test]
    fn test_yaml_loading() {
        let yaml_content = r#"
version: 1
framework:
  version: 5.31.0
import:
  concurrency: 4
logging:
  filter: debug
"#;
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml_content.as_bytes()).unwrap();

        let config = ImporterConfig::from_yaml(temp_file.path()).unwrap();
        assert_eq!(config.framework.version, "5.31.0");
        assert_eq!(config.import.concurrency, 4);
        assert_eq!(config.import.asset_folders, vec!["assets"]);
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn test_yaml_missing_version() {
        let err = ImporterConfig::from_yaml_str("framework:\n  version: 5.0.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingVersion));
    }

    #[test]
    fn test_yaml_unsupported_version() {
        let err = ImporterConfig::from_yaml_str("version: 2\n").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedVersion { found: 2, .. }));
    }

    #[test]
    fn test_yaml_unknown_field() {
        let err = ImporterConfig::from_yaml_str("version: 1\nimport:\n  threads: 4\n").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_validation_rejects_zero_concurrency() {
        let err =
            ImporterConfig::from_yaml_str("version: 1\nimport:\n  concurrency: 0\n").unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_validation_rejects_bad_framework_version() {
        let config = ImporterConfig::default().with_framework_version("five");
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_validation_bounds_build_ttl() {
        let mut config = ImporterConfig::default();
        config.build.ttl_secs = MAX_BUILD_TTL_SECS;
        config.validate().unwrap();

        config.build.ttl_secs = u64::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("build.ttl_secs"));
    }
}
