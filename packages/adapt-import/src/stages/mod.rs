// Import stage implementations
pub mod asset_stage;
pub mod content_stage;
pub mod plugin_stage;
pub mod prepare_stage;

use crate::config::ImporterConfig;
use crate::migrations::MigrationRegistry;
use crate::orchestrator::ImportServices;

/// Read-only collaborators every stage receives next to the mutable context
pub struct StageEnv<'a> {
    pub services: &'a ImportServices,
    pub config: &'a ImporterConfig,
    pub migrations: &'a MigrationRegistry,
}
