/*
 * Adapt Import - Course package import and build pipeline
 *
 * Turns an unpacked Adapt framework package into persisted course content,
 * and persisted courses back into framework build output.
 *
 * Architecture:
 * - Import State Machine (Created → Running → Completed | Failed)
 * - Stage pipeline with per-setting gates
 * - Plugin reconciliation against the installed registry
 * - Content migrations (in-memory) + migration tool (file-level)
 * - Side-effect journal with compensating rollback
 * - Build pipeline with an expiring build record cache
 */

// Public modules
pub mod assets;
pub mod build;
pub mod config;
pub mod context;
pub mod error;
pub mod hierarchy;
pub mod hooks;
pub mod journal;
pub mod migration_tool;
pub mod migrations;
pub mod orchestrator;
pub mod package;
pub mod plugins;
pub mod rollback;
pub mod run_state;
pub mod schema_convert;
pub mod settings;
pub mod stages;
pub mod status;
pub mod summary;
pub mod version;

// Re-exports
pub use assets::{AssetEntry, AssetReconciler};
pub use build::{BuildCache, BuildOrchestrator, BuildRequest, Compressor, TarCompressor};
pub use config::{ConfigError, ImporterConfig};
pub use context::{IdMap, ImportContext};
pub use error::{ContentInsertFailure, ErrorCategory, ImportError, Result};
pub use hierarchy::{sort_hierarchy, SortedHierarchy};
pub use hooks::{ImportHook, ImportHooks};
pub use journal::{JournalEntries, SideEffectJournal};
pub use migration_tool::{CommandMigrationTool, MigrationTool};
pub use migrations::{ContentMigration, MigrationContext, MigrationRegistry};
pub use orchestrator::{ImportOrchestrator, ImportServices};
pub use plugins::{PluginPlan, PluginVersionEntry};
pub use rollback::{roll_back, RollbackReport};
pub use run_state::{ImportStage, RunState, RunStateMachine};
pub use schema_convert::{LegacySchemaConverter, SchemaConverter};
pub use settings::{ImportRequest, ImportSettings};
pub use status::{StatusCode, StatusEntry, StatusReport};
pub use summary::ImportSummary;
pub use version::{FrameworkCompat, PluginUpdateStatus};
