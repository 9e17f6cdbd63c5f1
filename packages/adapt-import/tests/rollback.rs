//! Failed imports leave the stores as they found them

mod common;

use adapt_import::{ImportOrchestrator, StatusCode};
use adapt_store::domain::{Collection, InstalledPlugin, PluginType};
use adapt_store::infrastructure::MemoryPluginRegistry;
use common::{Fixture, Stores};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn managed_text_plugin() -> InstalledPlugin {
    InstalledPlugin {
        id: "text-4".to_string(),
        name: "adapt-contrib-text".to_string(),
        version: Some("4.0.0".to_string()),
        is_local_install: false,
        target_attribute: Some("_text".to_string()),
        plugin_type: Some(PluginType::Component),
    }
}

fn assert_no_import_left(stores: &Stores) {
    assert!(stores.content.documents(Collection::Content).is_empty());
    assert!(stores.content.documents(Collection::CourseAssets).is_empty());
    assert!(stores.tags.tags().is_empty());
    assert!(stores.assets.records().is_empty());
}

#[tokio::test]
async fn test_failed_plugin_install_rolls_back() {
    let fx = Fixture::new();
    fx.stores.plugins.fail_install_of("adapt-contrib-graphic");

    let err = ImportOrchestrator::new(fx.request(), fx.services(), fx.config.clone())
        .unwrap()
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.code(), "FW_IMPORT_PLUGINS_FAILED");
    assert_no_import_left(&fx.stores);
    // The text plugin installed alongside is uninstalled again
    assert!(fx.stores.plugins.installed().is_empty());
    assert!(fx.path().join("src").is_dir());
}

#[tokio::test]
async fn test_failed_content_restores_updated_plugins() {
    let fx = Fixture::with_registry(MemoryPluginRegistry::with_plugins(vec![
        managed_text_plugin(),
    ]));

    // The dry run reports the managed plugin it would overwrite
    let dry = ImportOrchestrator::new(
        fx.request().dry_run(true).update_plugins(true),
        fx.services(),
        fx.config.clone(),
    )
    .unwrap()
    .run()
    .await
    .unwrap();
    let overwritten: Vec<Option<&Value>> = dry
        .status_report
        .warnings_with(StatusCode::ManagedPluginOverwritten)
        .map(|e| e.data.as_ref())
        .collect();
    assert_eq!(overwritten, vec![Some(&json!({ "name": "adapt-contrib-text" }))]);

    fx.stores.content.fail_inserts_when(|_, doc| {
        (doc.get("_component").and_then(Value::as_str) == Some("adapt-contrib-graphic"))
            .then(|| "graphic refused".to_string())
    });
    let err = ImportOrchestrator::new(
        fx.request().update_plugins(true),
        fx.services(),
        fx.config.clone(),
    )
    .unwrap()
    .run()
    .await
    .unwrap_err();

    assert_eq!(err.code(), "FW_IMPORT_CONTENT_FAILED");
    let failures = err.data()["errors"].clone();
    assert_eq!(failures.as_array().map(Vec::len), Some(1));
    assert_eq!(failures[0]["id"], "c-10");
    assert_eq!(failures[0]["schema"], "component");

    assert_no_import_left(&fx.stores);
    assert_eq!(fx.stores.plugins.installed(), vec![managed_text_plugin()]);
}

#[tokio::test]
async fn test_failed_compensation_keeps_original_error() {
    let fx = Fixture::new();
    fx.stores.content.fail_inserts_when(|_, doc| {
        (doc.get("_component").and_then(Value::as_str) == Some("adapt-contrib-graphic"))
            .then(|| "graphic refused".to_string())
    });
    fx.stores.content.fail_deletes_when(|q| {
        (q.collection == Collection::CourseAssets).then(|| "links pinned".to_string())
    });

    let err = ImportOrchestrator::new(fx.request(), fx.services(), fx.config.clone())
        .unwrap()
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.code(), "FW_IMPORT_CONTENT_FAILED");
    // Every other compensation still ran
    assert_no_import_left(&fx.stores);
    assert!(fx.stores.plugins.installed().is_empty());
}

#[tokio::test]
async fn test_orphaned_content_is_rejected() {
    let fx = Fixture::new();
    common::write_json(
        &fx.path().join("src/course/en/blocks.json"),
        &json!([
            { "_id": "b-05", "_parentId": "a-05", "_type": "block" },
            { "_id": "b-10", "_parentId": "a-missing", "_type": "block" }
        ]),
    );

    let err = ImportOrchestrator::new(fx.request(), fx.services(), fx.config.clone())
        .unwrap()
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.code(), "FW_IMPORT_ORPHANED_CONTENT");
    assert_eq!(err.data(), json!({ "ids": ["b-10", "c-10"] }));
    assert_no_import_left(&fx.stores);
    assert!(fx.stores.plugins.installed().is_empty());
}

#[tokio::test]
async fn test_block_reusing_course_id_is_rejected() {
    let fx = Fixture::new();
    common::write_json(
        &fx.path().join("src/course/en/blocks.json"),
        &json!([
            { "_id": "b-05", "_parentId": "a-05", "_type": "block" },
            { "_id": "course", "_parentId": "a-10", "_type": "block" }
        ]),
    );

    let err = ImportOrchestrator::new(fx.request(), fx.services(), fx.config.clone())
        .unwrap()
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.code(), "FW_IMPORT_INVALID");
    assert!(err.to_string().contains("duplicate content id course"));
    assert_no_import_left(&fx.stores);
}

#[tokio::test]
async fn test_refused_asset_is_a_warning() {
    let fx = Fixture::new();
    fx.stores.assets.fail_upload_of("logo.png");

    let summary = ImportOrchestrator::new(fx.request(), fx.services(), fx.config.clone())
        .unwrap()
        .run()
        .await
        .unwrap();

    let failed = summary
        .status_report
        .warnings_with(StatusCode::AssetImportFailed)
        .count();
    assert_eq!(failed, 1);
    assert!(!summary.status_report.has_info(StatusCode::AssetsImported));
    // The reference stays a plain path when no asset backs it
    let graphic = fx
        .stores
        .content_of_type("component")
        .into_iter()
        .find(|c| c["_component"] == "adapt-contrib-graphic")
        .unwrap();
    assert_eq!(graphic["_graphic"]["large"], "course/en/assets/logo.png");
    assert!(fx.stores.content.documents(Collection::CourseAssets).is_empty());
}
