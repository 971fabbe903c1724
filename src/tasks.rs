/* src/tasks.rs */


use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use futures::future::{LocalBoxFuture, join_all};
use tokio::sync::broadcast;

use crate::config::{Mode, PaveConfig};
use crate::scripts::{self, BundleConfig};
use crate::{proxy, static_files, styles, ui};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TaskId {
  #[value(name = "static:build")]
  StaticBuild,
  #[value(name = "styles:build")]
  StylesBuild,
  #[value(name = "styles:watch")]
  StylesWatch,
  #[value(name = "scripts:build")]
  ScriptsBuild,
  #[value(name = "scripts:watch")]
  ScriptsWatch,
  #[value(name = "bsync")]
  Bsync,
  #[value(name = "buildup")]
  Buildup,
  #[value(name = "build")]
  Build,
  #[value(name = "watch")]
  Watch,
  #[value(name = "default")]
  Default,
}

impl TaskId {
  pub fn name(self) -> &'static str {
    match self {
      TaskId::StaticBuild => "static:build",
      TaskId::StylesBuild => "styles:build",
      TaskId::StylesWatch => "styles:watch",
      TaskId::ScriptsBuild => "scripts:build",
      TaskId::ScriptsWatch => "scripts:watch",
      TaskId::Bsync => "bsync",
      TaskId::Buildup => "buildup",
      TaskId::Build => "build",
      TaskId::Watch => "watch",
      TaskId::Default => "default",
    }
  }
}

/// The direct actions; everything else composes these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Leaf {
  CopyIcons,
  BuildStyles,
  WatchStyles,
  BuildScripts,
  WatchScripts,
  Bsync,
}

#[derive(Debug, Clone)]
pub enum Task {
  Leaf(Leaf),
  Parallel(Vec<TaskId>),
  Sequence(Vec<TaskId>),
}

/// Registration-ordered task table. Composites may only reference ids that
/// are already registered, so the table is buildable in one pass and free of
/// cycles by construction.
pub struct Registry {
  tasks: Vec<(TaskId, Task)>,
}

impl Registry {
  pub fn new() -> Self {
    Self { tasks: Vec::new() }
  }

  pub fn register(&mut self, id: TaskId, task: Task) -> Result<()> {
    if self.get(id).is_some() {
      bail!("task {} registered twice", id.name());
    }
    if let Task::Parallel(members) | Task::Sequence(members) = &task {
      for member in members {
        if self.get(*member).is_none() {
          bail!("task {} references unregistered task {}", id.name(), member.name());
        }
      }
    }
    self.tasks.push((id, task));
    Ok(())
  }

  pub fn get(&self, id: TaskId) -> Option<&Task> {
    self.tasks.iter().find(|(task_id, _)| *task_id == id).map(|(_, task)| task)
  }

  /// The fixed task graph. `watch` members never terminate under normal
  /// operation, so `default` only ends on external interrupt.
  pub fn standard() -> Result<Self> {
    let mut registry = Self::new();
    registry.register(TaskId::StaticBuild, Task::Leaf(Leaf::CopyIcons))?;
    registry.register(TaskId::StylesBuild, Task::Leaf(Leaf::BuildStyles))?;
    registry.register(TaskId::StylesWatch, Task::Leaf(Leaf::WatchStyles))?;
    registry.register(TaskId::ScriptsBuild, Task::Leaf(Leaf::BuildScripts))?;
    registry.register(TaskId::ScriptsWatch, Task::Leaf(Leaf::WatchScripts))?;
    registry.register(TaskId::Bsync, Task::Leaf(Leaf::Bsync))?;
    registry.register(TaskId::Buildup, Task::Parallel(vec![TaskId::StaticBuild, TaskId::StylesBuild]))?;
    registry.register(TaskId::Build, Task::Parallel(vec![TaskId::Buildup, TaskId::ScriptsBuild]))?;
    registry
      .register(TaskId::Watch, Task::Parallel(vec![TaskId::StylesWatch, TaskId::ScriptsWatch, TaskId::Bsync]))?;
    registry.register(TaskId::Default, Task::Sequence(vec![TaskId::Buildup, TaskId::Watch]))?;
    Ok(registry)
  }
}

#[allow(async_fn_in_trait)]
pub trait LeafRunner {
  async fn run_leaf(&self, leaf: Leaf) -> Result<()>;
}

/// Execute a task. Parallel groups run all members to completion and only
/// then surface the first failure (siblings are never cancelled); sequences
/// stop before the member after a failure.
pub fn run<'a, R: LeafRunner>(
  registry: &'a Registry,
  id: TaskId,
  runner: &'a R,
) -> LocalBoxFuture<'a, Result<()>> {
  Box::pin(async move {
    let task = registry.get(id).with_context(|| format!("unknown task {}", id.name()))?;
    match task {
      Task::Leaf(leaf) => runner.run_leaf(*leaf).await,
      Task::Parallel(members) => {
        let results = join_all(members.iter().map(|member| run(registry, *member, runner))).await;
        let mut first_err = None;
        for (member, result) in members.iter().zip(results) {
          if let Err(e) = result {
            if first_err.is_none() {
              first_err = Some(e.context(format!("task {} failed", member.name())));
            } else {
              ui::fail(&format!("task {} failed: {e:#}", member.name()));
            }
          }
        }
        match first_err {
          Some(e) => Err(e),
          None => Ok(()),
        }
      }
      Task::Sequence(members) => {
        for member in members {
          run(registry, *member, runner)
            .await
            .with_context(|| format!("task {} failed", member.name()))?;
        }
        Ok(())
      }
    }
  })
}

/// Production leaf dispatch bound to the loaded config, the mode flag, the
/// shared bundler config, and the reload bus connecting the script watcher
/// to the proxy.
pub struct AppRunner {
  base_dir: PathBuf,
  config: PaveConfig,
  mode: Mode,
  bundle: Arc<BundleConfig>,
  reload: broadcast::Sender<()>,
}

impl AppRunner {
  pub fn new(base_dir: PathBuf, config: PaveConfig, mode: Mode) -> Self {
    let bundle = Arc::new(BundleConfig::from_config(&base_dir, &config, mode));
    let (reload, _) = broadcast::channel(16);
    Self { base_dir, config, mode, bundle, reload }
  }
}

impl LeafRunner for AppRunner {
  async fn run_leaf(&self, leaf: Leaf) -> Result<()> {
    match leaf {
      Leaf::CopyIcons => {
        let base = self.base_dir.clone();
        let config = self.config.clone();
        let copied = tokio::task::spawn_blocking(move || static_files::copy_icons(&base, &config))
          .await
          .context("icon task panicked")??;
        ui::ok(&format!("copied {copied} icons"));
        Ok(())
      }
      Leaf::BuildStyles => {
        let base = self.base_dir.clone();
        let config = self.config.clone();
        let mode = self.mode;
        let out = tokio::task::spawn_blocking(move || styles::build_styles(&base, &config, mode))
          .await
          .context("style task panicked")??;
        ui::ok(&format!("styles \u{2192} {}", out.display()));
        Ok(())
      }
      Leaf::WatchStyles => styles::watch_styles(&self.base_dir, &self.config, self.mode).await,
      Leaf::BuildScripts => scripts::build_scripts(self.bundle.clone()).await,
      Leaf::WatchScripts => scripts::watch_scripts(self.bundle.clone(), self.reload.clone()).await,
      Leaf::Bsync => proxy::serve(&self.base_dir, &self.config, self.reload.clone()).await,
    }
  }
}
