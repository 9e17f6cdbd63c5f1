//! Version policy
//!
//! Pure decisions over semantic versions: plugin update status and framework
//! compatibility. Nothing here touches a store.

use semver::Version;
use serde::{Deserialize, Serialize};

/// Parse a version string, tolerating surrounding whitespace and a leading `v` or `=`
pub fn parse_version(raw: &str) -> Option<Version> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('='))
        .unwrap_or(trimmed);
    Version::parse(trimmed).ok()
}

/// Outcome of comparing one package plugin against the installed registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PluginUpdateStatus {
    Invalid,
    Installed,
    Older,
    NoChange,
    UpdateBlocked,
    Updated,
}

impl PluginUpdateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginUpdateStatus::Invalid => "INVALID",
            PluginUpdateStatus::Installed => "INSTALLED",
            PluginUpdateStatus::Older => "OLDER",
            PluginUpdateStatus::NoChange => "NO_CHANGE",
            PluginUpdateStatus::UpdateBlocked => "UPDATE_BLOCKED",
            PluginUpdateStatus::Updated => "UPDATED",
        }
    }
}

impl std::fmt::Display for PluginUpdateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of importing `import_version` over `installed_version`
///
/// Total over its inputs: an unparsable import version is `Invalid` whatever
/// is installed, nothing installed is `Installed`, and a newer import
/// version is only `Updated` when updates are allowed or the installed
/// plugin is a local install.
pub fn plugin_update_status(
    installed_version: Option<&str>,
    import_version: &str,
    is_local_install: bool,
    update_plugins: bool,
) -> PluginUpdateStatus {
    let Some(import) = parse_version(import_version) else {
        return PluginUpdateStatus::Invalid;
    };
    let Some(installed) = installed_version else {
        return PluginUpdateStatus::Installed;
    };
    // An unparsable installed version never blocks the package version
    let Some(installed) = parse_version(installed) else {
        return PluginUpdateStatus::Updated;
    };
    if import < installed {
        return PluginUpdateStatus::Older;
    }
    if import == installed {
        return PluginUpdateStatus::NoChange;
    }
    if !update_plugins && !is_local_install {
        return PluginUpdateStatus::UpdateBlocked;
    }
    PluginUpdateStatus::Updated
}

/// Framework compatibility of a package against the installed framework
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameworkCompat {
    /// Same major version, whatever the minor and patch
    Compatible,
    /// Package major predates the installed framework and must be migrated
    Older,
    /// Package targets a newer major version than is installed
    Newer,
}

pub fn framework_compat(installed: &Version, package: &Version) -> FrameworkCompat {
    if package.major > installed.major {
        FrameworkCompat::Newer
    } else if package.major < installed.major {
        FrameworkCompat::Older
    } else {
        FrameworkCompat::Compatible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PluginUpdateStatus::*;

    #[test]
    fn test_parse_version_leniency() {
        assert_eq!(parse_version(" v5.2.0 "), Some(Version::new(5, 2, 0)));
        assert_eq!(parse_version("=1.0.0"), Some(Version::new(1, 0, 0)));
        assert_eq!(parse_version("not-semver"), None);
        assert_eq!(parse_version("5.2"), None);
    }

    #[test]
    fn test_plugin_status_table() {
        assert_eq!(plugin_update_status(None, "1.0.0", false, false), Installed);
        assert_eq!(plugin_update_status(None, "1.0.0", true, true), Installed);
        assert_eq!(plugin_update_status(Some("2.0.0"), "1.0.0", false, false), Older);
        assert_eq!(plugin_update_status(Some("1.0.0"), "1.0.0", false, false), NoChange);
        assert_eq!(plugin_update_status(Some("1.0.0"), "1.0.0", true, true), NoChange);
        assert_eq!(
            plugin_update_status(Some("1.0.0"), "2.0.0", false, false),
            UpdateBlocked
        );
        assert_eq!(plugin_update_status(Some("1.0.0"), "2.0.0", false, true), Updated);
        assert_eq!(plugin_update_status(Some("1.0.0"), "2.0.0", true, false), Updated);
        assert_eq!(plugin_update_status(Some("1.0.0"), "not-semver", false, false), Invalid);
        assert_eq!(plugin_update_status(None, "not-semver", true, true), Invalid);
    }

    #[test]
    fn test_status_serializes_screaming() {
        assert_eq!(
            serde_json::to_value(UpdateBlocked).unwrap(),
            serde_json::json!("UPDATE_BLOCKED")
        );
        assert_eq!(NoChange.as_str(), "NO_CHANGE");
    }

    #[test]
    fn test_framework_compat() {
        let installed = Version::new(5, 31, 0);
        assert_eq!(
            framework_compat(&installed, &Version::new(5, 31, 0)),
            FrameworkCompat::Compatible
        );
        assert_eq!(
            framework_compat(&installed, &Version::new(5, 40, 0)),
            FrameworkCompat::Compatible
        );
        assert_eq!(
            framework_compat(&installed, &Version::new(4, 2, 0)),
            FrameworkCompat::Older
        );
        assert_eq!(
            framework_compat(&installed, &Version::new(5, 2, 0)),
            FrameworkCompat::Compatible
        );
        assert_eq!(
            framework_compat(&installed, &Version::new(5, 0, 0)),
            FrameworkCompat::Compatible
        );
        assert_eq!(
            framework_compat(&installed, &Version::new(6, 0, 0)),
            FrameworkCompat::Newer
        );
    }
}
