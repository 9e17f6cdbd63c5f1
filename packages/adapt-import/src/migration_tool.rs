//! External framework migration tool

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::error::{ImportError, Result};

/// Upstream migration tool with `capture` and `migrate` steps
///
/// Both steps return the tool's combined output log.
#[async_trait]
pub trait MigrationTool: Send + Sync {
    /// Snapshot the content of `output_dir` into `capture_dir`
    async fn capture(&self, output_dir: &Path, capture_dir: &Path) -> Result<String>;

    /// Apply the registered migration scripts to `output_dir`
    async fn migrate(&self, output_dir: &Path, capture_dir: &Path) -> Result<String>;
}

/// Runs `<program> migrate <step> --outputdir <dir> --capturedir <dir>`
#[derive(Debug, Clone)]
pub struct CommandMigrationTool {
    program: PathBuf,
}

impl CommandMigrationTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, step: &str, output_dir: &Path, capture_dir: &Path) -> Result<String> {
        debug!(
            "Running {} migrate {} (outputdir {}, capturedir {})",
            self.program.display(),
            step,
            output_dir.display(),
            capture_dir.display()
        );
        let output = Command::new(&self.program)
            .arg("migrate")
            .arg(step)
            .arg("--outputdir")
            .arg(output_dir)
            .arg("--capturedir")
            .arg(capture_dir)
            .output()
            .await
            .map_err(|e| {
                ImportError::MigrationFailed(format!(
                    "failed to start {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        let mut log = String::from_utf8_lossy(&output.stdout).into_owned();
        log.push_str(&String::from_utf8_lossy(&output.stderr));
        for line in log.lines() {
            debug!("migrate {}: {}", step, line);
        }

        if !output.status.success() {
            return Err(ImportError::MigrationFailed(format!(
                "{} exited with {}: {}",
                step,
                output.status,
                log.trim()
            )));
        }
        Ok(log)
    }
}

#[async_trait]
impl MigrationTool for CommandMigrationTool {
    async fn capture(&self, output_dir: &Path, capture_dir: &Path) -> Result<String> {
        self.run("capture", output_dir, capture_dir).await
    }

    async fn migrate(&self, output_dir: &Path, capture_dir: &Path) -> Result<String> {
        self.run("migrate", output_dir, capture_dir).await
    }
}
