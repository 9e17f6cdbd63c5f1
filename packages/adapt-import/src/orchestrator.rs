use adapt_store::domain::{AssetStore, ContentStore, PluginRegistry, TagStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::config::ImporterConfig;
use crate::context::ImportContext;
use crate::error::{ImportError, Result};
use crate::hooks::{ImportHook, ImportHooks};
use crate::migration_tool::{CommandMigrationTool, MigrationTool};
use crate::migrations::{ContentMigration, MigrationRegistry};
use crate::rollback::roll_back;
use crate::run_state::{planned_stages, ImportStage, RunState, RunStateMachine};
use crate::schema_convert::{LegacySchemaConverter, SchemaConverter};
use crate::settings::ImportRequest;
use crate::stages::{asset_stage, content_stage, plugin_stage, prepare_stage, StageEnv};
use crate::summary::ImportSummary;

/// Collaborators an import talks to, injected at construction
#[derive(Clone)]
pub struct ImportServices {
    pub content: Arc<dyn ContentStore>,
    pub plugins: Arc<dyn PluginRegistry>,
    pub tags: Arc<dyn TagStore>,
    pub assets: Arc<dyn AssetStore>,
    pub migration_tool: Arc<dyn MigrationTool>,
    pub schema_converter: Arc<dyn SchemaConverter>,
    pub hooks: ImportHooks,
    /// Registered after the built-in migration chain
    pub migrations: Vec<Arc<dyn ContentMigration>>,
}

impl ImportServices {
    /// Stores plus the default migration tool and schema converter
    pub fn new(
        content: Arc<dyn ContentStore>,
        plugins: Arc<dyn PluginRegistry>,
        tags: Arc<dyn TagStore>,
        assets: Arc<dyn AssetStore>,
        config: &ImporterConfig,
    ) -> Self {
        Self {
            content,
            plugins,
            tags,
            assets,
            migration_tool: Arc::new(CommandMigrationTool::new(
                config.framework.migration_tool.clone(),
            )),
            schema_converter: Arc::new(LegacySchemaConverter::new()),
            hooks: ImportHooks::new(),
            migrations: Vec::new(),
        }
    }

    pub fn with_migration_tool(mut self, tool: Arc<dyn MigrationTool>) -> Self {
        self.migration_tool = tool;
        self
    }

    pub fn with_schema_converter(mut self, converter: Arc<dyn SchemaConverter>) -> Self {
        self.schema_converter = converter;
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn ImportHook>) -> Self {
        self.hooks.register(hook);
        self
    }

    pub fn with_migration(mut self, migration: Arc<dyn ContentMigration>) -> Self {
        self.migrations.push(migration);
        self
    }
}

/// Single-use driver of one import
///
/// # Flow
///
/// ```text
/// prepare → loadAssetData → loadPluginData → preImportHook
///   → importTags → importCourseAssets → importCoursePlugins
///   → loadCourseData → migrateCourseData → loadCourseData → importCourseData
///   → generateSummary → postImportHook
/// ```
///
/// Stages whose gate is false for the request's settings are skipped. Any
/// stage error stops the run, rolls back the journal and is returned as is.
pub struct ImportOrchestrator {
    ctx: ImportContext,
    services: ImportServices,
    config: ImporterConfig,
    migrations: MigrationRegistry,
    state: RunStateMachine,
}

impl ImportOrchestrator {
    /// # Errors
    ///
    /// `InvalidParams` when the request has no import path or user id;
    /// `Config` when the configuration does not validate.
    pub fn new(
        request: ImportRequest,
        services: ImportServices,
        config: ImporterConfig,
    ) -> Result<Self> {
        request.validate()?;
        config.validate()?;

        let mut migrations = MigrationRegistry::with_builtins();
        for migration in &services.migrations {
            migrations.register(Arc::clone(migration));
        }

        let state = RunStateMachine::new();
        let mut ctx = ImportContext::new(request);
        ctx.run_id = state.run_id();

        Ok(Self {
            ctx,
            services,
            config,
            migrations,
            state,
        })
    }

    pub fn context(&self) -> &ImportContext {
        &self.ctx
    }

    pub fn state(&self) -> &RunState {
        self.state.state()
    }

    /// Execute every planned stage (consumes the orchestrator)
    pub async fn run(mut self) -> Result<ImportSummary> {
        let stages = planned_stages(&self.ctx.settings);
        let started = Instant::now();
        info!(
            "Import {}: {} stages for {} (dry run: {})",
            self.ctx.run_id,
            stages.len(),
            self.ctx.request.import_path.display(),
            self.ctx.settings.is_dry_run
        );

        let result = self.run_stages(&stages).await;

        match result {
            Ok(()) => {
                self.state.complete()?;
                self.clean_up(None).await;
                info!(
                    "Import {}: completed in {}ms",
                    self.ctx.run_id,
                    started.elapsed().as_millis()
                );
                self.ctx
                    .summary
                    .take()
                    .ok_or_else(|| ImportError::invalid_package("no summary was generated"))
            }
            Err(e) => {
                error!(
                    "Import {} failed in {}: {} ({})",
                    self.ctx.run_id,
                    self.state
                        .current_stage()
                        .map_or("<not started>", |s| s.as_str()),
                    e,
                    e.code()
                );
                if let Err(state_err) = self.state.fail(&e) {
                    warn!("Import {}: {}", self.ctx.run_id, state_err);
                }
                self.clean_up(Some(&e)).await;
                Err(e)
            }
        }
    }

    async fn run_stages(&mut self, stages: &[ImportStage]) -> Result<()> {
        for (i, stage) in stages.iter().enumerate() {
            if i == 0 {
                self.state.start(*stage)?;
            } else {
                self.state.advance(*stage)?;
            }
            let started = Instant::now();
            info!("Stage {}: started", stage);
            self.run_stage(*stage).await?;
            info!(
                "Stage {}: completed in {}ms",
                stage,
                started.elapsed().as_millis()
            );
        }
        Ok(())
    }

    async fn run_stage(&mut self, stage: ImportStage) -> Result<()> {
        let env = StageEnv {
            services: &self.services,
            config: &self.config,
            migrations: &self.migrations,
        };
        let ctx = &mut self.ctx;
        match stage {
            ImportStage::Prepare => prepare_stage::prepare(ctx, &env).await,
            ImportStage::LoadAssetData => asset_stage::load_asset_data(ctx, &env).await,
            ImportStage::LoadPluginData => plugin_stage::load_plugin_data(ctx, &env).await,
            ImportStage::PreImportHook => self.services.hooks.pre_import(ctx).await,
            ImportStage::ImportTags => asset_stage::import_tags(ctx, &env).await,
            ImportStage::ImportCourseAssets => asset_stage::import_course_assets(ctx, &env).await,
            ImportStage::ImportCoursePlugins => {
                plugin_stage::import_course_plugins(ctx, &env).await
            }
            ImportStage::LoadCourseData => content_stage::load_course_data(ctx, &env).await,
            ImportStage::MigrateCourseData => content_stage::migrate_course_data(ctx, &env).await,
            ImportStage::ImportCourseData => content_stage::import_course_data(ctx, &env).await,
            ImportStage::GenerateSummary => content_stage::generate_summary(ctx, &env).await,
            ImportStage::PostImportHook => self.services.hooks.post_import(ctx).await,
        }
    }

    /// Remove working directories; on failure also roll back side effects
    async fn clean_up(&mut self, error: Option<&ImportError>) {
        if let Some(scratch) = self.ctx.migration_scratch.take() {
            remove_dir(&scratch).await;
        }

        if let Some(error) = error {
            let entries = self.ctx.journal.snapshot();
            if !entries.is_empty() {
                info!(
                    "Import {}: rolling back after {}",
                    self.ctx.run_id,
                    error.code()
                );
                let report = roll_back(&entries, &self.services).await;
                if report.failed > 0 {
                    error!(
                        "Import {}: {} of {} rollback actions failed; course {} may be partially imported",
                        self.ctx.run_id,
                        report.failed,
                        report.attempted,
                        entries.course.as_ref().map_or("<none>", |c| c.id.as_str())
                    );
                }
            }
        }

        if self.ctx.settings.remove_source {
            remove_dir(&self.ctx.request.import_path).await;
        }
    }
}

async fn remove_dir(path: &Path) {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}
