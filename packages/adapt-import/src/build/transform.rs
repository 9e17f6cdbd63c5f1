//! Persisted documents → framework build documents

use adapt_store::domain::{ContentDocument, ContentKind, Document, InstalledPlugin, PluginType};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

/// Reference fields rewritten from store ids to build ids
const ID_FIELDS: [&str; 3] = ["_id", "_courseId", "_parentId"];

/// Build id of the course document when it carries no `_friendlyId`
pub const COURSE_BUILD_ID: &str = "course";

/// Store id -> id written into the build
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdTable {
    ids: HashMap<String, String>,
}

impl IdTable {
    /// `_friendlyId` where present, otherwise the store id
    pub fn from_documents<'a, I>(course_id: &str, docs: I) -> Self
    where
        I: IntoIterator<Item = &'a ContentDocument>,
    {
        let mut ids = HashMap::new();
        for doc in docs {
            let Some(id) = doc.id() else { continue };
            let build_id = match (doc.kind, doc.friendly_id()) {
                (_, Some(friendly)) if !friendly.is_empty() => friendly.to_string(),
                (ContentKind::Course, _) => COURSE_BUILD_ID.to_string(),
                (ContentKind::Config, _) => "config".to_string(),
                _ => id.to_string(),
            };
            ids.insert(id.to_string(), build_id);
        }
        ids.entry(course_id.to_string())
            .or_insert_with(|| COURSE_BUILD_ID.to_string());
        Self { ids }
    }

    pub fn get<'a>(&'a self, id: &'a str) -> &'a str {
        self.ids.get(id).map_or(id, String::as_str)
    }

    pub fn remap(&self, data: &mut Document) {
        for field in ID_FIELDS {
            if let Some(Value::String(id)) = data.get_mut(field) {
                if let Some(mapped) = self.ids.get(id.as_str()) {
                    *id = mapped.clone();
                }
            }
        }
    }
}

/// Full plugin name -> `_component` value the framework expects
pub fn component_short_names(installed: &[InstalledPlugin]) -> HashMap<String, String> {
    installed
        .iter()
        .filter(|p| p.plugin_type == Some(PluginType::Component))
        .filter_map(|p| p.short_name().map(|short| (p.name.clone(), short.to_string())))
        .collect()
}

/// Plugins whose global settings belong in the build
///
/// Components count when any component document uses them; other plugin
/// types when the config lists them in `_enabledPlugins`.
pub fn enabled_plugins<'a>(
    installed: &'a [InstalledPlugin],
    config: Option<&ContentDocument>,
    components: &HashSet<String>,
) -> Vec<&'a InstalledPlugin> {
    let listed: HashSet<&str> = config
        .and_then(|c| c.data.get("_enabledPlugins"))
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    installed
        .iter()
        .filter(|p| match p.plugin_type {
            Some(PluginType::Component) => components.contains(&p.name),
            Some(_) => listed.contains(p.name.as_str()),
            None => false,
        })
        .collect()
}

fn globals_namespace(plugin_type: PluginType) -> Option<&'static str> {
    match plugin_type {
        PluginType::Component => Some("_components"),
        PluginType::Extension => Some("_extensions"),
        PluginType::Menu | PluginType::Theme => None,
    }
}

/// Move top-level `_globals.<targetAttribute>` entries of enabled plugins
/// under `_globals._components` / `_globals._extensions`
///
/// Returns how many entries moved.
pub fn relocate_plugin_globals(course: &mut Document, enabled: &[&InstalledPlugin]) -> usize {
    let Some(Value::Object(globals)) = course.get_mut("_globals") else {
        return 0;
    };
    let mut moved = 0;
    for plugin in enabled {
        let (Some(plugin_type), Some(attr)) = (plugin.plugin_type, plugin.target_attribute.as_deref())
        else {
            continue;
        };
        let Some(namespace) = globals_namespace(plugin_type) else {
            continue;
        };
        let Some(settings) = globals.remove(attr) else {
            continue;
        };
        let slot = globals
            .entry(namespace.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(slot) = slot {
            slot.insert(attr.to_string(), settings);
            moved += 1;
        }
    }
    moved
}

/// Map `_component` back from the installed plugin name
pub fn restore_component_name(data: &mut Document, short_names: &HashMap<String, String>) {
    if let Some(Value::String(component)) = data.get_mut("_component") {
        if let Some(short) = short_names.get(component.as_str()) {
            *component = short.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc(value: Value) -> ContentDocument {
        ContentDocument::from_value(value).unwrap()
    }

    fn plugin(name: &str, plugin_type: PluginType, attr: &str) -> InstalledPlugin {
        InstalledPlugin {
            id: format!("{}-id", name),
            name: name.to_string(),
            version: Some("1.0.0".to_string()),
            is_local_install: false,
            target_attribute: Some(attr.to_string()),
            plugin_type: Some(plugin_type),
        }
    }

    #[test]
    fn test_id_table_prefers_friendly_ids() {
        let docs = vec![
            doc(json!({ "_id": "c1", "_type": "course" })),
            doc(json!({ "_id": "cfg1", "_type": "config" })),
            doc(json!({ "_id": "p1", "_type": "page", "_friendlyId": "intro" })),
            doc(json!({ "_id": "a1", "_type": "article", "_friendlyId": "" })),
        ];
        let table = IdTable::from_documents("c1", &docs);

        assert_eq!(table.get("c1"), "course");
        assert_eq!(table.get("cfg1"), "config");
        assert_eq!(table.get("p1"), "intro");
        assert_eq!(table.get("a1"), "a1");
        assert_eq!(table.get("unknown"), "unknown");

        let mut data = json!({ "_id": "a1", "_parentId": "p1", "_courseId": "c1", "title": "p1" })
            .as_object()
            .unwrap()
            .clone();
        table.remap(&mut data);
        assert_eq!(
            Value::Object(data),
            json!({ "_id": "a1", "_parentId": "intro", "_courseId": "course", "title": "p1" })
        );
    }

    #[test]
    fn test_enabled_plugins() {
        let installed = vec![
            plugin("adapt-contrib-text", PluginType::Component, "_text"),
            plugin("adapt-contrib-mcq", PluginType::Component, "_mcq"),
            plugin("adapt-contrib-trickle", PluginType::Extension, "_trickle"),
            plugin("adapt-contrib-tutor", PluginType::Extension, "_tutor"),
        ];
        let config = doc(json!({ "_id": "cfg", "_type": "config", "_enabledPlugins": ["adapt-contrib-trickle"] }));
        let used = HashSet::from(["adapt-contrib-text".to_string()]);

        let names: Vec<&str> = enabled_plugins(&installed, Some(&config), &used)
            .into_iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["adapt-contrib-text", "adapt-contrib-trickle"]);
    }

    #[test]
    fn test_relocate_plugin_globals() {
        let text = plugin("adapt-contrib-text", PluginType::Component, "_text");
        let trickle = plugin("adapt-contrib-trickle", PluginType::Extension, "_trickle");
        let mut course = json!({
            "_globals": {
                "_accessibility": { "_ariaRegions": {} },
                "_text": { "ariaRegion": "Text" },
                "_trickle": { "incompleteContent": "Locked" },
                "_tutor": { "hide": "Hide" }
            }
        })
        .as_object()
        .unwrap()
        .clone();

        assert_eq!(relocate_plugin_globals(&mut course, &[&text, &trickle]), 2);
        assert_eq!(
            course["_globals"],
            json!({
                "_accessibility": { "_ariaRegions": {} },
                "_tutor": { "hide": "Hide" },
                "_components": { "_text": { "ariaRegion": "Text" } },
                "_extensions": { "_trickle": { "incompleteContent": "Locked" } }
            })
        );

        let mut bare = Map::new();
        assert_eq!(relocate_plugin_globals(&mut bare, &[&text]), 0);
    }

    #[test]
    fn test_restore_component_name() {
        let short = component_short_names(&[plugin("adapt-contrib-text", PluginType::Component, "_text")]);
        let mut data = json!({ "_component": "adapt-contrib-text" }).as_object().unwrap().clone();
        restore_component_name(&mut data, &short);
        assert_eq!(data["_component"], json!("text"));

        let mut data = json!({ "_component": "custom" }).as_object().unwrap().clone();
        restore_component_name(&mut data, &short);
        assert_eq!(data["_component"], json!("custom"));
    }
}
