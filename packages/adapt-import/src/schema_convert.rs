//! Legacy plugin schema conversion
//!
//! Older plugins ship `properties.schema` files in the legacy property-schema
//! dialect. The content store expects JSON schema, so every package is
//! converted once before any content is read.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::Result;
use crate::package::{read_json, write_json};

pub const LEGACY_SCHEMA_FILE: &str = "properties.schema";
pub const SCHEMA_DIR: &str = "schema";
const JSON_SCHEMA_DIALECT: &str = "https://json-schema.org/draft/2020-12/schema";

#[async_trait]
pub trait SchemaConverter: Send + Sync {
    /// Convert every legacy schema under `root`; returns how many were written
    async fn convert(&self, root: &Path) -> Result<usize>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LegacySchemaConverter;

impl LegacySchemaConverter {
    pub fn new() -> Self {
        Self
    }
}

fn legacy_schemas(root: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && e.file_name() == LEGACY_SCHEMA_FILE)
        .map(|e| e.into_path())
        .collect();
    found.sort();
    found
}

/// Convert one legacy property table into JSON-schema `properties` + `required`
fn convert_properties(legacy: &Map<String, Value>) -> (Map<String, Value>, Vec<String>) {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for (key, prop) in legacy {
        let Value::Object(prop) = prop else {
            continue;
        };
        let is_required = prop
            .get("validators")
            .and_then(Value::as_array)
            .map_or(false, |v| v.iter().any(|v| v.as_str() == Some("required")));
        if is_required {
            required.push(key.clone());
        }
        properties.insert(key.clone(), Value::Object(convert_property(prop)));
    }
    (properties, required)
}

fn convert_property(prop: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for key in ["type", "default", "title", "enum"] {
        if let Some(value) = prop.get(key) {
            out.insert(key.to_string(), value.clone());
        }
    }
    if let Some(help) = prop.get("help") {
        out.insert("description".to_string(), help.clone());
    }
    if let Some(input_type) = prop.get("inputType") {
        out.insert("_backboneForms".to_string(), input_type.clone());
    }
    if let Some(Value::Object(nested)) = prop.get("properties") {
        let (properties, required) = convert_properties(nested);
        out.insert("properties".to_string(), Value::Object(properties));
        if !required.is_empty() {
            out.insert("required".to_string(), json!(required));
        }
    }
    if let Some(Value::Object(items)) = prop.get("items") {
        out.insert("items".to_string(), Value::Object(convert_property(items)));
    }
    out
}

/// JSON-schema document for a legacy schema of plugin `name`
pub fn convert_legacy_schema(name: &str, legacy: &Map<String, Value>) -> Value {
    let (properties, required) = match legacy.get("properties") {
        Some(Value::Object(props)) => convert_properties(props),
        _ => (Map::new(), Vec::new()),
    };
    let mut schema = json!({
        "$anchor": name,
        "$schema": JSON_SCHEMA_DIALECT,
        "type": "object",
        "properties": properties,
    });
    if !required.is_empty() {
        schema["required"] = json!(required);
    }
    schema
}

#[async_trait]
impl SchemaConverter for LegacySchemaConverter {
    async fn convert(&self, root: &Path) -> Result<usize> {
        let mut converted = 0;
        for legacy_path in legacy_schemas(root) {
            let Some(plugin_dir) = legacy_path.parent() else {
                continue;
            };
            let name = plugin_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let target = plugin_dir
                .join(SCHEMA_DIR)
                .join(format!("{}.schema.json", name));
            if target.exists() {
                debug!("Skipping {}: already converted", name);
                continue;
            }

            let legacy: Map<String, Value> = read_json(&legacy_path).await?;
            tokio::fs::create_dir_all(plugin_dir.join(SCHEMA_DIR)).await?;
            write_json(&target, &convert_legacy_schema(&name, &legacy)).await?;
            converted += 1;
        }
        if converted > 0 {
            info!("SchemaConverter: converted {} legacy schemas", converted);
        }
        Ok(converted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn legacy() -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string", "default": "", "title": "Title",
                    "inputType": "Text", "validators": ["required"], "help": "Shown above"
                },
                "_items": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "_graphic": {
                                "type": "object",
                                "properties": {
                                    "src": { "type": "string", "inputType": "Asset:image", "validators": ["required"] }
                                }
                            }
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn test_convert_legacy_schema() {
        let schema = convert_legacy_schema("mcq", legacy().as_object().unwrap());

        assert_eq!(schema["$anchor"], "mcq");
        assert_eq!(schema["required"], json!(["title"]));
        assert_eq!(
            schema["properties"]["title"],
            json!({
                "type": "string", "default": "", "title": "Title",
                "description": "Shown above", "_backboneForms": "Text"
            })
        );
        let graphic = &schema["properties"]["_items"]["items"]["properties"]["_graphic"];
        assert_eq!(graphic["required"], json!(["src"]));
        assert_eq!(graphic["properties"]["src"]["_backboneForms"], "Asset:image");
    }

    #[tokio::test]
    async fn test_convert_writes_once() {
        let root = TempDir::new().unwrap();
        let plugin = root.path().join("src/components/mcq");
        std::fs::create_dir_all(&plugin).unwrap();
        std::fs::write(plugin.join(LEGACY_SCHEMA_FILE), legacy().to_string()).unwrap();

        let converter = LegacySchemaConverter::new();
        assert_eq!(converter.convert(root.path()).await.unwrap(), 1);
        assert!(plugin.join("schema/mcq.schema.json").is_file());
        assert_eq!(converter.convert(root.path()).await.unwrap(), 0);
    }
}
