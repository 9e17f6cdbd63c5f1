/*
 * adapt-package: inspect an unpacked Adapt course package
 *
 * Usage:
 *   adapt-package inspect ./my-course
 *   adapt-package inspect ./my-course --language fr --config importer.yaml
 *
 * Runs a dry-run import against empty in-memory stores and prints the
 * import summary as JSON. The package is copied to the scratch directory
 * first, so the source is never modified.
 */

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use walkdir::WalkDir;

use adapt_import::{ImportOrchestrator, ImportRequest, ImportServices, ImporterConfig};
use adapt_store::infrastructure::{
    MemoryAssetStore, MemoryContentStore, MemoryPluginRegistry, MemoryTagStore,
};

const CLI_USER: &str = "adapt-package";

#[derive(Parser)]
#[command(name = "adapt-package", version, about = "Adapt course package tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dry-run import of a package; prints the summary as JSON
    Inspect {
        /// Unpacked package directory
        dir: PathBuf,

        /// Language directory to import (defaults to _defaultLanguage)
        #[arg(long)]
        language: Option<String>,

        /// Importer configuration (YAML)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match cli.command {
        Command::Inspect {
            dir,
            language,
            config,
        } => match inspect(&dir, language, config.as_deref()).await {
            Ok(code) => code,
            Err(e) => {
                eprintln!("error: {:#}", e);
                ExitCode::FAILURE
            }
        },
    }
}

fn load_config(path: Option<&Path>) -> Result<ImporterConfig> {
    match path {
        Some(path) => ImporterConfig::from_yaml(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Ok(ImporterConfig::default()),
    }
}

fn init_logging(config: &ImporterConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Recursive copy of `source` into a fresh directory `dest`
fn copy_package(source: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.with_context(|| format!("failed to read {}", source.display()))?;
        let rel = entry.path().strip_prefix(source)?;
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
                .with_context(|| format!("failed to create {}", target.display()))?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &target)
                .with_context(|| format!("failed to copy {}", entry.path().display()))?;
        }
    }
    Ok(())
}

async fn inspect(dir: &Path, language: Option<String>, config: Option<&Path>) -> Result<ExitCode> {
    let config = load_config(config)?;
    init_logging(&config);

    if !dir.is_dir() {
        anyhow::bail!("{} is not a directory", dir.display());
    }
    let working = config
        .paths
        .scratch_dir
        .join(format!("inspect-{}", Uuid::new_v4().simple()));
    if let Err(e) = copy_package(dir, &working) {
        let _ = std::fs::remove_dir_all(&working);
        return Err(e);
    }

    let mut request = ImportRequest::new(&working, CLI_USER)
        .dry_run(true)
        .remove_source(true);
    if let Some(language) = language {
        request = request.with_language(language);
    }

    let services = ImportServices::new(
        Arc::new(MemoryContentStore::new()),
        Arc::new(MemoryPluginRegistry::new()),
        Arc::new(MemoryTagStore::new()),
        Arc::new(MemoryAssetStore::new()),
        &config,
    );
    let orchestrator = ImportOrchestrator::new(request, services, config)?;

    match orchestrator.run().await {
        Ok(summary) => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            let report = serde_json::json!({
                "code": e.code(),
                "category": e.category().as_str(),
                "message": e.to_string(),
                "data": e.data(),
            });
            eprintln!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::FAILURE)
        }
    }
}
