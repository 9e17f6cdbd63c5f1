//! Build records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::Document;
use crate::{Result, StoreError};

/// Build action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildAction {
    Preview,
    Publish,
    Export,
}

impl BuildAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildAction::Preview => "preview",
            BuildAction::Publish => "publish",
            BuildAction::Export => "export",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "preview" => Some(BuildAction::Preview),
            "publish" => Some(BuildAction::Publish),
            "export" => Some(BuildAction::Export),
            _ => None,
        }
    }
}

impl std::fmt::Display for BuildAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted record of one build, keyed by a generated id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub action: BuildAction,
    #[serde(rename = "courseId")]
    pub course_id: String,
    pub location: String,
    #[serde(rename = "expiresAt")]
    pub expires_at: DateTime<Utc>,
    #[serde(rename = "createdBy")]
    pub created_by: String,
    /// Framework and plugin versions the build was produced with
    #[serde(default)]
    pub versions: BTreeMap<String, String>,
}

impl BuildRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn to_document(&self) -> Result<Document> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(StoreError::serialization("build record is not an object")),
        }
    }

    pub fn from_document(doc: Document) -> Result<Self> {
        Ok(serde_json::from_value(serde_json::Value::Object(doc))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(expires_at: DateTime<Utc>) -> BuildRecord {
        BuildRecord {
            id: "b1".into(),
            action: BuildAction::Publish,
            course_id: "c1".into(),
            location: "/builds/b1".into(),
            expires_at,
            created_by: "u1".into(),
            versions: BTreeMap::from([("adapt_framework".to_string(), "5.31.0".to_string())]),
        }
    }

    #[test]
    fn test_document_field_names() {
        let doc = record(Utc::now()).to_document().unwrap();
        for key in ["_id", "action", "courseId", "location", "expiresAt", "createdBy", "versions"] {
            assert!(doc.contains_key(key), "missing {}", key);
        }
        assert_eq!(doc["action"], serde_json::json!("publish"));

        let back = BuildRecord::from_document(doc).unwrap();
        assert_eq!(back.course_id, "c1");
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        assert!(record(now).is_expired(now));
        assert!(!record(now + chrono::Duration::hours(1)).is_expired(now));
    }

    #[test]
    fn test_action_parse() {
        assert_eq!(BuildAction::from_str("export"), Some(BuildAction::Export));
        assert_eq!(BuildAction::from_str("zip"), None);
    }
}
