//! Tags and assets

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Tag vocabulary entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
}

/// File half of an asset upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetFile {
    pub filepath: PathBuf,
    #[serde(rename = "originalFilename")]
    pub original_filename: String,
}

/// Asset to persist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetUpload {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Tag ids
    #[serde(default)]
    pub tags: Vec<String>,
    pub file: AssetFile,
    #[serde(rename = "createdBy")]
    pub created_by: String,
    /// Remaining metadata from `assets.json`
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

/// Persisted asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    /// File name the asset was uploaded with
    pub filename: String,
    /// Location of the stored binary, when the store keeps one on disk
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub tags: Vec<String>,
}
