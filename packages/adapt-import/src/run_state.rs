use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ErrorCategory, ImportError, Result};
use crate::settings::ImportSettings;

/// Import stage identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImportStage {
    Prepare,
    LoadAssetData,
    LoadPluginData,
    PreImportHook,
    ImportTags,
    ImportCourseAssets,
    ImportCoursePlugins,
    LoadCourseData,
    MigrateCourseData,
    ImportCourseData,
    GenerateSummary,
    PostImportHook,
}

impl ImportStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStage::Prepare => "prepare",
            ImportStage::LoadAssetData => "loadAssetData",
            ImportStage::LoadPluginData => "loadPluginData",
            ImportStage::PreImportHook => "preImportHook",
            ImportStage::ImportTags => "importTags",
            ImportStage::ImportCourseAssets => "importCourseAssets",
            ImportStage::ImportCoursePlugins => "importCoursePlugins",
            ImportStage::LoadCourseData => "loadCourseData",
            ImportStage::MigrateCourseData => "migrateCourseData",
            ImportStage::ImportCourseData => "importCourseData",
            ImportStage::GenerateSummary => "generateSummary",
            ImportStage::PostImportHook => "postImportHook",
        }
    }
}

impl std::fmt::Display for ImportStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

type Gate = fn(&ImportSettings) -> bool;

fn always(_: &ImportSettings) -> bool {
    true
}

/// Fixed stage order with the predicate deciding whether each one runs
///
/// `ImportCoursePlugins` appears twice: the plugin-only pass (dry runs, or
/// real runs that skip content) and the pass ahead of a content import. The
/// two gates are exclusive so plugins are reconciled once per run.
const STAGE_PLAN: [(ImportStage, Gate); 15] = [
    (ImportStage::Prepare, always),
    (ImportStage::LoadAssetData, always),
    (ImportStage::LoadPluginData, always),
    (ImportStage::PreImportHook, always),
    (ImportStage::ImportTags, |s| s.import_content),
    (ImportStage::ImportCourseAssets, |s| s.import_content),
    (ImportStage::ImportCoursePlugins, |s| {
        s.is_dry_run || !s.import_content
    }),
    (ImportStage::LoadCourseData, |s| s.is_dry_run && s.import_content),
    (ImportStage::ImportCoursePlugins, |s| {
        !s.is_dry_run && s.import_content
    }),
    (ImportStage::LoadCourseData, |s| !s.is_dry_run && s.import_content),
    (ImportStage::MigrateCourseData, |s| !s.is_dry_run && s.migrate_content),
    (ImportStage::LoadCourseData, |s| !s.is_dry_run && s.migrate_content),
    (ImportStage::ImportCourseData, |s| !s.is_dry_run && s.import_content),
    (ImportStage::GenerateSummary, always),
    (ImportStage::PostImportHook, always),
];

/// Stages that run for `settings`, in execution order
pub fn planned_stages(settings: &ImportSettings) -> Vec<ImportStage> {
    STAGE_PLAN
        .iter()
        .filter(|(_, gate)| gate(settings))
        .map(|(stage, _)| *stage)
        .collect()
}

/// Run state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunState {
    Created {
        created_at: DateTime<Utc>,
    },
    Running {
        started_at: DateTime<Utc>,
        current_stage: ImportStage,
        stages_completed: usize,
    },
    Completed {
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        duration_ms: u64,
    },
    Failed {
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
        failed_stage: ImportStage,
        error: String,
        error_code: String,
        error_category: ErrorCategory,
    },
}

impl RunState {
    pub fn state_name(&self) -> &'static str {
        match self {
            RunState::Created { .. } => "created",
            RunState::Running { .. } => "running",
            RunState::Completed { .. } => "completed",
            RunState::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed { .. } | RunState::Failed { .. })
    }
}

/// State machine for one import run
pub struct RunStateMachine {
    run_id: Uuid,
    state: RunState,
}

impl RunStateMachine {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            state: RunState::Created {
                created_at: Utc::now(),
            },
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn current_stage(&self) -> Option<ImportStage> {
        match &self.state {
            RunState::Running { current_stage, .. } => Some(*current_stage),
            RunState::Failed { failed_stage, .. } => Some(*failed_stage),
            _ => None,
        }
    }

    fn invalid(&self, to: &str) -> ImportError {
        ImportError::InvalidStateTransition {
            from: self.state.state_name().to_string(),
            to: to.to_string(),
        }
    }

    /// Transition: CREATED → RUNNING
    pub fn start(&mut self, first_stage: ImportStage) -> Result<()> {
        match &self.state {
            RunState::Created { .. } => {
                self.state = RunState::Running {
                    started_at: Utc::now(),
                    current_stage: first_stage,
                    stages_completed: 0,
                };
                Ok(())
            }
            _ => Err(self.invalid("running")),
        }
    }

    /// Move a running import to its next stage
    pub fn advance(&mut self, stage: ImportStage) -> Result<()> {
        match &mut self.state {
            RunState::Running {
                current_stage,
                stages_completed,
                ..
            } => {
                *current_stage = stage;
                *stages_completed += 1;
                Ok(())
            }
            _ => Err(self.invalid("advance")),
        }
    }

    /// Transition: RUNNING → COMPLETED
    pub fn complete(&mut self) -> Result<()> {
        match &self.state {
            RunState::Running { started_at, .. } => {
                let now = Utc::now();
                let duration_ms = (now - *started_at).num_milliseconds().max(0) as u64;
                self.state = RunState::Completed {
                    started_at: *started_at,
                    completed_at: now,
                    duration_ms,
                };
                Ok(())
            }
            _ => Err(self.invalid("completed")),
        }
    }

    /// Transition: RUNNING → FAILED
    pub fn fail(&mut self, error: &ImportError) -> Result<()> {
        match &self.state {
            RunState::Running {
                started_at,
                current_stage,
                ..
            } => {
                self.state = RunState::Failed {
                    started_at: *started_at,
                    failed_at: Utc::now(),
                    failed_stage: *current_stage,
                    error: error.to_string(),
                    error_code: error.code().to_string(),
                    error_category: error.category(),
                };
                Ok(())
            }
            _ => Err(self.invalid("failed")),
        }
    }
}

impl Default for RunStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
