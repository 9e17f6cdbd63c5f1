use adapt_store::domain::{ContentDocument, ContentKind, Document};
use serde_json::{Map, Number, Value};

use super::{ContentMigration, MigrationContext};
use crate::error::Result;

/// Attributes the store keeps as strings; legacy exports wrote some as numbers
const STRING_FIELDS: [&str; 4] = ["_friendlyId", "title", "displayTitle", "_classes"];

/// Attributes the store keeps as integers; legacy exports wrote some as strings
const INTEGER_FIELDS: [&str; 4] = ["_sortOrder", "_attempts", "_columns", "_minimumParticipants"];

pub struct NumericFieldsMigration;

impl ContentMigration for NumericFieldsMigration {
    fn name(&self) -> &str {
        "numeric-fields"
    }

    fn applies_to(&self, doc: &ContentDocument) -> bool {
        doc.kind != ContentKind::Config
    }

    fn apply(&self, doc: &mut ContentDocument, _ctx: &MigrationContext<'_>) -> Result<()> {
        for key in STRING_FIELDS {
            if let Some(Value::Number(n)) = doc.data.get(key) {
                let text = n.to_string();
                doc.set(key, text);
            }
        }
        for key in INTEGER_FIELDS {
            let parsed = match doc.data.get(key) {
                Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
                _ => None,
            };
            if let Some(n) = parsed {
                doc.set(key, Value::Number(Number::from(n)));
            }
        }
        Ok(())
    }
}

/// Copy a legacy `src` graphic into the `large` and `small` variants
fn split_graphic(graphic: &mut Map<String, Value>) {
    let Some(src) = graphic.get("src").and_then(Value::as_str).map(str::to_string) else {
        return;
    };
    for variant in ["large", "small"] {
        let missing = graphic
            .get(variant)
            .and_then(Value::as_str)
            .map_or(true, str::is_empty);
        if missing {
            graphic.insert(variant.to_string(), Value::String(src.clone()));
        }
    }
    graphic.remove("src");
}

pub struct GraphicSrcMigration;

impl ContentMigration for GraphicSrcMigration {
    fn name(&self) -> &str {
        "graphic-src"
    }

    fn applies_to(&self, doc: &ContentDocument) -> bool {
        doc.kind == ContentKind::Component
    }

    fn apply(&self, doc: &mut ContentDocument, _ctx: &MigrationContext<'_>) -> Result<()> {
        if let Some(Value::Object(graphic)) = doc.data.get_mut("_graphic") {
            split_graphic(graphic);
        }
        if let Some(Value::Array(items)) = doc.data.get_mut("_items") {
            for item in items.iter_mut() {
                if let Some(Value::Object(graphic)) = item.get_mut("_graphic") {
                    split_graphic(graphic);
                }
            }
        }
        Ok(())
    }
}

fn strip_nulls(map: &mut Document) {
    map.retain(|_, value| !value.is_null());
    for value in map.values_mut() {
        if let Value::Object(inner) = value {
            strip_nulls(inner);
        }
    }
}

/// Remove `null` properties through nested objects; arrays are left alone
pub struct RemoveUndefMigration;

impl ContentMigration for RemoveUndefMigration {
    fn name(&self) -> &str {
        "remove-undef"
    }

    fn applies_to(&self, _doc: &ContentDocument) -> bool {
        true
    }

    fn apply(&self, doc: &mut ContentDocument, _ctx: &MigrationContext<'_>) -> Result<()> {
        strip_nulls(&mut doc.data);
        Ok(())
    }
}
