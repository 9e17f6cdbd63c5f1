//! Content documents, queries and schemas

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Result, StoreError};

/// JSON object payload of a stored or packaged document
pub type Document = Map<String, Value>;

// ═══════════════════════════════════════════════════════════════════════════
// Content Kinds
// ═══════════════════════════════════════════════════════════════════════════

/// Variant tag of a content document
///
/// Decided once when package JSON is parsed, so downstream logic matches on
/// the kind instead of probing `_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Course,
    Config,
    Page,
    Menu,
    Article,
    Block,
    Component,
}

impl ContentKind {
    pub const CONTENT_OBJECTS: [ContentKind; 5] = [
        ContentKind::Page,
        ContentKind::Menu,
        ContentKind::Article,
        ContentKind::Block,
        ContentKind::Component,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Course => "course",
            ContentKind::Config => "config",
            ContentKind::Page => "page",
            ContentKind::Menu => "menu",
            ContentKind::Article => "article",
            ContentKind::Block => "block",
            ContentKind::Component => "component",
        }
    }

    /// Parse a `_type` value
    pub fn from_type(s: &str) -> Option<Self> {
        match s {
            "course" => Some(ContentKind::Course),
            "config" => Some(ContentKind::Config),
            "page" => Some(ContentKind::Page),
            "menu" => Some(ContentKind::Menu),
            "article" => Some(ContentKind::Article),
            "block" => Some(ContentKind::Block),
            "component" => Some(ContentKind::Component),
            _ => None,
        }
    }

    /// Name of the store schema documents of this kind validate against
    pub fn schema_name(&self) -> &'static str {
        match self {
            ContentKind::Course => "course",
            ContentKind::Config => "config",
            ContentKind::Page | ContentKind::Menu => "contentobject",
            ContentKind::Article => "article",
            ContentKind::Block => "block",
            ContentKind::Component => "component",
        }
    }

    /// Framework file the kind is written to by a build
    pub fn build_file_name(&self) -> &'static str {
        match self {
            ContentKind::Course => "course.json",
            ContentKind::Config => "config.json",
            ContentKind::Page | ContentKind::Menu => "contentObjects.json",
            ContentKind::Article => "articles.json",
            ContentKind::Block => "blocks.json",
            ContentKind::Component => "components.json",
        }
    }

    /// True for hierarchical nodes below the course
    pub fn is_content_object(&self) -> bool {
        !matches!(self, ContentKind::Course | ContentKind::Config)
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Content Document
// ═══════════════════════════════════════════════════════════════════════════

/// A course, config or content object document
///
/// # Examples
///
/// ```rust
/// use adapt_store::domain::{ContentDocument, ContentKind};
///
/// let doc = ContentDocument::from_value(serde_json::json!({
///     "_id": "a-05",
///     "_type": "article",
///     "_parentId": "co-05"
/// }))
/// .unwrap();
/// assert_eq!(doc.kind, ContentKind::Article);
/// assert_eq!(doc.parent_id(), Some("co-05"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ContentDocument {
    pub kind: ContentKind,
    pub data: Document,
}

impl ContentDocument {
    pub fn new(kind: ContentKind, data: Document) -> Self {
        Self { kind, data }
    }

    /// Parse a JSON value carrying a `_type` discriminator
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(data) = value else {
            return Err(StoreError::validation("content document must be a JSON object"));
        };
        let kind = match data.get("_type").and_then(Value::as_str) {
            Some(t) => ContentKind::from_type(t).ok_or_else(|| {
                StoreError::validation(format!(
                    "unknown content type '{}' on document {}",
                    t,
                    data.get("_id").and_then(Value::as_str).unwrap_or("<no id>")
                ))
            })?,
            None => {
                return Err(StoreError::validation(format!(
                    "missing _type on document {}",
                    data.get("_id").and_then(Value::as_str).unwrap_or("<no id>")
                )))
            }
        };
        Ok(Self { kind, data })
    }

    /// Wrap the raw `config.json` payload
    pub fn config(mut data: Document) -> Self {
        data.insert("_id".to_string(), Value::String("config".to_string()));
        data.insert("_type".to_string(), Value::String("config".to_string()));
        Self {
            kind: ContentKind::Config,
            data,
        }
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.str_field("_id")
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.str_field("_parentId")
    }

    pub fn friendly_id(&self) -> Option<&str> {
        self.str_field("_friendlyId")
    }

    pub fn component(&self) -> Option<&str> {
        self.str_field("_component")
    }

    pub fn sort_order(&self) -> i64 {
        match self.data.get("_sortOrder") {
            Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.data.insert(key.to_string(), value.into());
    }

    pub fn into_data(self) -> Document {
        self.data
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Queries
// ═══════════════════════════════════════════════════════════════════════════

/// Collections the content store persists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Content,
    CourseAssets,
    AdaptBuilds,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Content => "content",
            Collection::CourseAssets => "courseassets",
            Collection::AdaptBuilds => "adaptbuilds",
        }
    }
}

/// Equality query against one collection
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: Collection,
    pub filter: Document,
}

impl Query {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            filter: Map::new(),
        }
    }

    pub fn content() -> Self {
        Self::new(Collection::Content)
    }

    /// Add an equality condition
    pub fn eq(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.filter.insert(key.to_string(), value.into());
        self
    }

    /// Whether a document satisfies every condition
    pub fn matches(&self, doc: &Document) -> bool {
        self.filter
            .iter()
            .all(|(key, expected)| doc.get(key) == Some(expected))
    }
}

/// Insert/update options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertOptions {
    pub collection: Collection,
    pub schema_name: String,
    pub validate: bool,
    pub use_cache: bool,
}

impl InsertOptions {
    pub fn new(collection: Collection, schema_name: impl Into<String>) -> Self {
        Self {
            collection,
            schema_name: schema_name.into(),
            validate: true,
            use_cache: false,
        }
    }

    /// Validated, uncached write into the content collection
    pub fn content(schema_name: impl Into<String>) -> Self {
        Self::new(Collection::Content, schema_name)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Schemas & Locks
// ═══════════════════════════════════════════════════════════════════════════

/// Built schema returned by the content store
///
/// `properties` is the built JSON-schema property table. Asset fields are
/// marked with `_backboneForms: "Asset"` (or `{ "type": "Asset" }`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ContentSchema {
    pub name: String,
    #[serde(default)]
    pub properties: Document,
}

impl ContentSchema {
    pub fn new(name: impl Into<String>, properties: Document) -> Self {
        Self {
            name: name.into(),
            properties,
        }
    }

    /// Schema with no declared properties; sanitise is the identity
    pub fn permissive(name: impl Into<String>) -> Self {
        Self::new(name, Map::new())
    }

    /// Drop properties flagged `isInternal` and fill declared defaults
    pub fn sanitise(&self, mut data: Document) -> Document {
        for (key, prop) in &self.properties {
            let internal = prop
                .get("isInternal")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if internal {
                data.remove(key);
                continue;
            }
            if !data.contains_key(key) {
                if let Some(default) = prop.get("default") {
                    data.insert(key.clone(), default.clone());
                }
            }
        }
        data
    }
}

/// Edit lock on a course held by one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseLock {
    pub course_id: String,
    pub user_id: String,
    pub acquired_at: DateTime<Utc>,
}
