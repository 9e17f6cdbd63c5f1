//! Compensating rollback of a failed import
//!
//! The stores share no transaction, so a failed run undoes what its
//! `SideEffectJournal` recorded. Every action is attempted concurrently and
//! independently; failures are logged and counted, never returned, so the
//! stage error stays the one the caller sees.

use adapt_store::domain::{Collection, ContentKind, Query};
use futures::future::{join_all, BoxFuture, FutureExt};
use std::sync::Arc;
use tracing::{error, info};

use crate::journal::JournalEntries;
use crate::orchestrator::ImportServices;

/// Outcome of a rollback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RollbackReport {
    pub attempted: usize,
    pub failed: usize,
}

type Action = BoxFuture<'static, (String, adapt_store::Result<()>)>;

fn content_actions(entries: &JournalEntries, services: &ImportServices) -> Vec<Action> {
    let Some(course) = entries.course.clone() else {
        return Vec::new();
    };
    let mut actions: Vec<Action> = Vec::new();

    let kinds = ContentKind::CONTENT_OBJECTS
        .into_iter()
        .chain(std::iter::once(ContentKind::Config));
    for kind in kinds {
        let store = Arc::clone(&services.content);
        let course_id = course.id.clone();
        actions.push(
            async move {
                let query = Query::content()
                    .eq("_courseId", course_id.as_str())
                    .eq("_type", kind.as_str());
                let result = store.delete_many(&query).await.map(|_| ());
                (format!("delete {} documents of course {}", kind, course_id), result)
            }
            .boxed(),
        );
    }

    let store = Arc::clone(&services.content);
    let course_id = course.id.clone();
    actions.push(
        async move {
            let query = Query::new(Collection::CourseAssets).eq("_courseId", course_id.as_str());
            let result = store.delete_many(&query).await.map(|_| ());
            (format!("delete asset links of course {}", course_id), result)
        }
        .boxed(),
    );

    // A replaced course keeps its document
    if !course.replaced {
        let store = Arc::clone(&services.content);
        actions.push(
            async move {
                let query = Query::content().eq("_id", course.id.as_str());
                let result = store.delete(&query).await;
                (format!("delete course {}", course.id), result)
            }
            .boxed(),
        );
    }
    actions
}

fn registry_actions(entries: &JournalEntries, services: &ImportServices) -> Vec<Action> {
    let mut actions: Vec<Action> = Vec::new();
    for id in entries.installed_plugins.iter().cloned() {
        let registry = Arc::clone(&services.plugins);
        actions.push(
            async move {
                let result = registry.uninstall_plugin(&id).await;
                (format!("uninstall plugin {}", id), result)
            }
            .boxed(),
        );
    }
    for previous in entries.updated_plugins.iter().cloned() {
        let registry = Arc::clone(&services.plugins);
        actions.push(
            async move {
                let result = registry
                    .restore_plugin_from_backup(&previous.name)
                    .await
                    .map(|_| ());
                (format!("restore plugin {}", previous.name), result)
            }
            .boxed(),
        );
    }
    for id in entries.tags.iter().cloned() {
        let tags = Arc::clone(&services.tags);
        actions.push(
            async move {
                let result = tags.delete(&id).await;
                (format!("delete tag {}", id), result)
            }
            .boxed(),
        );
    }
    for id in entries.assets.iter().cloned() {
        let assets = Arc::clone(&services.assets);
        actions.push(
            async move {
                let result = assets.delete(&id).await;
                (format!("delete asset {}", id), result)
            }
            .boxed(),
        );
    }
    actions
}

/// Undo every recorded side effect
pub async fn roll_back(entries: &JournalEntries, services: &ImportServices) -> RollbackReport {
    let mut actions = content_actions(entries, services);
    actions.extend(registry_actions(entries, services));

    let attempted = actions.len();
    let mut failed = 0;
    for (action, result) in join_all(actions).await {
        if let Err(e) = result {
            failed += 1;
            error!("Rollback: failed to {}: {}", action, e);
        }
    }
    info!("Rollback: {} actions, {} failed", attempted, failed);
    RollbackReport { attempted, failed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImporterConfig;
    use crate::journal::JournalCourse;
    use adapt_store::domain::{Document, InstalledPlugin};
    use adapt_store::infrastructure::{
        MemoryAssetStore, MemoryContentStore, MemoryPluginRegistry, MemoryTagStore,
    };
    use serde_json::json;

    fn doc(v: serde_json::Value) -> Document {
        v.as_object().unwrap().clone()
    }

    struct Stores {
        content: Arc<MemoryContentStore>,
        plugins: Arc<MemoryPluginRegistry>,
        tags: Arc<MemoryTagStore>,
    }

    impl Stores {
        fn services(&self) -> ImportServices {
            ImportServices::new(
                self.content.clone(),
                self.plugins.clone(),
                self.tags.clone(),
                Arc::new(MemoryAssetStore::new()),
                &ImporterConfig::default(),
            )
        }
    }

    fn partial_import() -> (Stores, JournalEntries) {
        let content = Arc::new(MemoryContentStore::new());
        for data in [
            json!({ "_id": "c1", "_type": "course" }),
            json!({ "_id": "cfg", "_type": "config", "_courseId": "c1" }),
            json!({ "_id": "p1", "_type": "page", "_courseId": "c1" }),
            json!({ "_id": "a1", "_type": "article", "_courseId": "c1" }),
        ] {
            content.seed(Collection::Content, doc(data));
        }
        content.seed(
            Collection::CourseAssets,
            doc(json!({ "_id": "l1", "_courseId": "c1", "_assetId": "x" })),
        );
        let plugins = Arc::new(MemoryPluginRegistry::with_plugins(vec![InstalledPlugin {
            id: "text-1".to_string(),
            name: "adapt-contrib-text".to_string(),
            version: Some("5.0.0".to_string()),
            is_local_install: false,
            target_attribute: Some("_text".to_string()),
            plugin_type: None,
        }]));
        let tags = Arc::new(MemoryTagStore::with_titles(&["safety"]));

        let entries = JournalEntries {
            installed_plugins: vec!["text-1".to_string()],
            tags: tags.tags().into_iter().map(|t| t.id).collect(),
            course: Some(JournalCourse {
                id: "c1".to_string(),
                replaced: false,
            }),
            ..JournalEntries::default()
        };
        (
            Stores {
                content,
                plugins,
                tags,
            },
            entries,
        )
    }

    #[tokio::test]
    async fn test_rollback_undoes_everything() {
        let (stores, entries) = partial_import();
        let report = roll_back(&entries, &stores.services()).await;

        // Content kinds, config, links, course, one plugin, one tag
        let expected = ContentKind::CONTENT_OBJECTS.len() + 5;
        assert_eq!(report, RollbackReport { attempted: expected, failed: 0 });
        assert!(stores.content.documents(Collection::Content).is_empty());
        assert!(stores.content.documents(Collection::CourseAssets).is_empty());
        assert!(stores.plugins.installed().is_empty());
        assert!(stores.tags.tags().is_empty());
    }

    #[tokio::test]
    async fn test_one_failed_action_does_not_stop_the_rest() {
        let (stores, entries) = partial_import();
        stores.content.fail_deletes_when(|q| {
            (q.collection == Collection::CourseAssets).then(|| "links pinned".to_string())
        });

        let report = roll_back(&entries, &stores.services()).await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.attempted, ContentKind::CONTENT_OBJECTS.len() + 5);
        assert_eq!(stores.content.documents(Collection::CourseAssets).len(), 1);
        assert!(stores.content.documents(Collection::Content).is_empty());
        assert!(stores.plugins.installed().is_empty());
        assert!(stores.tags.tags().is_empty());
    }

    #[tokio::test]
    async fn test_replaced_course_document_is_kept() {
        let (stores, mut entries) = partial_import();
        if let Some(course) = entries.course.as_mut() {
            course.replaced = true;
        }

        let report = roll_back(&entries, &stores.services()).await;

        assert_eq!(report.failed, 0);
        let left = stores.content.documents(Collection::Content);
        assert_eq!(left.len(), 1);
        assert_eq!(left[0]["_id"], "c1");
    }
}
