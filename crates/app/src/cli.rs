//! Subcommands and their execution

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use mud_config::EditorConfig;
use mud_scene::{Editor, EditorError, LoadState, LocalFileStore, drive_loads};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Parser)]
#[command(name = "mud", version, about = "Create, inspect and re-save mud projects")]
pub struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// JSON editor config; environment overrides still apply on top
    #[arg(long, global = true, env = "MUD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory that entity asset urls resolve against
    #[arg(long, global = true, env = "MUD_STORAGE_ROOT")]
    pub storage_root: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write an empty project
    New { path: PathBuf },
    /// Load a project and report per-entity load status
    Inspect { path: PathBuf },
    /// Load a project and write it back, upgrading it to the current format
    Resave {
        input: PathBuf,
        /// Defaults to overwriting the input
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to read config {}: {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    ConfigFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Editor(#[from] EditorError),
}

/// Outcome of opening a project
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub loaded: usize,
    pub degraded: usize,
    pub skipped: usize,
}

pub async fn run(cli: Cli) -> Result<(), AppError> {
    let mut config = load_config(cli.config.as_deref()).await?;
    if let Some(root) = cli.storage_root {
        config.storage_root = root;
    }

    match cli.command {
        Command::New { path } => {
            let written = new_project(config, &path).await?;
            info!("Created {}", written.display());
        }
        Command::Inspect { path } => {
            let summary = inspect(config, &path).await?;
            info!(
                "{}: {} loaded, {} degraded, {} skipped",
                path.display(),
                summary.loaded,
                summary.degraded,
                summary.skipped
            );
        }
        Command::Resave { input, output } => {
            let target = output.unwrap_or_else(|| input.clone());
            let written = resave(config, &input, &target).await?;
            info!("Saved {}", written.display());
        }
    }
    Ok(())
}

async fn load_config(path: Option<&Path>) -> Result<EditorConfig, AppError> {
    let Some(path) = path else {
        return Ok(EditorConfig::from_env());
    };
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| AppError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
    let mut config = EditorConfig::from_json_str(&json).map_err(|source| AppError::ConfigFormat {
        path: path.to_path_buf(),
        source,
    })?;
    let env = EditorConfig::from_env();
    let defaults = EditorConfig::default();
    if env.storage_root != defaults.storage_root {
        config.storage_root = env.storage_root;
    }
    if env.max_history != defaults.max_history {
        config.max_history = env.max_history;
    }
    if env.generation_server_url.is_some() {
        config.generation_server_url = env.generation_server_url;
    }
    debug!("Loaded config from {}", path.display());
    Ok(config)
}

pub async fn new_project(config: EditorConfig, path: &Path) -> Result<PathBuf, AppError> {
    let mut editor = Editor::headless(config);
    editor.new_project()?;
    Ok(editor.save_project_file(path).await?)
}

/// Open a project and run every asset load to completion
async fn open(config: EditorConfig, path: &Path) -> Result<(Editor, LoadSummary), AppError> {
    let store = LocalFileStore::new(config.storage_root.clone());
    let mut editor = Editor::headless(config);
    let report = editor.load_project_file(path).await?;
    for skipped in &report.skipped {
        warn!(
            "Skipped {} entity {}: {}",
            skipped.entity_type, skipped.uuid, skipped.reason
        );
    }

    let finished = drive_loads(&mut editor, &store).await;
    debug!("{} asset loads finished", finished);

    let mut summary = LoadSummary {
        skipped: report.skipped.len(),
        ..LoadSummary::default()
    };
    for entity in editor.scene().entities() {
        match entity.load_state() {
            LoadState::Degraded { reason } => {
                summary.degraded += 1;
                warn!(
                    "{} {} '{}' degraded: {}",
                    entity.entity_type(),
                    entity.uuid(),
                    entity.name(),
                    reason
                );
            }
            state => {
                summary.loaded += 1;
                info!(
                    "{} {} '{}' {:?}",
                    entity.entity_type(),
                    entity.uuid(),
                    entity.name(),
                    state
                );
            }
        }
    }
    Ok((editor, summary))
}

pub async fn inspect(config: EditorConfig, path: &Path) -> Result<LoadSummary, AppError> {
    let (_, summary) = open(config, path).await?;
    Ok(summary)
}

pub async fn resave(config: EditorConfig, input: &Path, output: &Path) -> Result<PathBuf, AppError> {
    let (editor, _) = open(config, input).await?;
    Ok(editor.save_project_file(output).await?)
}
