use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::plugins::PluginVersionEntry;
use crate::status::StatusReport;

/// Result handed back to the caller of a successful (or dry) import
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub title: Option<String>,
    /// Persisted course id; `None` for dry runs and plugin-only imports
    pub course_id: Option<String>,
    pub status_report: StatusReport,
    /// Documents per content type
    pub content: BTreeMap<String, usize>,
    pub versions: Vec<PluginVersionEntry>,
}
