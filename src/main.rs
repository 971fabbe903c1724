/* src/main.rs */

mod config;
mod proxy;
mod scripts;
mod static_files;
mod styles;
mod tasks;
mod ui;
mod watch;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use config::{Mode, PaveConfig, find_pave_config, load_pave_config};
use tasks::TaskId;

#[derive(Parser)]
#[command(name = "pave", about = "Front-end asset pipeline", version)]
struct Cli {
  /// Task to run
  #[arg(value_enum, default_value = "default")]
  task: TaskId,
  /// Path to pave.toml (auto-detected if omitted)
  #[arg(short, long)]
  config: Option<PathBuf>,
}

/// Resolve config path (explicit or auto-detected) and parse it
fn resolve_config(explicit: Option<PathBuf>) -> Result<(PathBuf, PaveConfig)> {
  let path = match explicit {
    Some(p) => p,
    None => {
      let cwd = std::env::current_dir().context("failed to get cwd")?;
      find_pave_config(&cwd)?
    }
  };
  let config = load_pave_config(&path)?;
  Ok((path, config))
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  let (config_path, config) = resolve_config(cli.config)?;
  let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

  let mode = Mode::from_env();
  ui::banner(cli.task.name(), Some(&config.project.name));

  let registry = tasks::Registry::standard()?;
  let runner = tasks::AppRunner::new(base_dir.to_path_buf(), config, mode);
  tasks::run(&registry, cli.task, &runner).await
}
