/* src/scripts.rs */

mod bundler;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use notify::RecursiveMode;
use notify::Watcher as _;
use tokio::sync::broadcast;

use crate::config::{Mode, PaveConfig};
use crate::ui::{self, CYAN, RED, format_size};
use crate::watch;

pub use bundler::bundle_once;

/// Shared bundler configuration, constructed once and used by both the
/// one-shot build and the persistent watch.
#[derive(Debug, Clone)]
pub struct BundleConfig {
  pub entry: PathBuf,
  pub src_dir: PathBuf,
  pub out_file: PathBuf,
  pub minify: bool,
  pub stats: StatsProfile,
}

impl BundleConfig {
  pub fn from_config(base_dir: &Path, config: &PaveConfig, mode: Mode) -> Self {
    Self {
      entry: base_dir.join(&config.paths.script_entry),
      src_dir: base_dir.join(&config.paths.script_dir),
      out_file: base_dir.join(&config.paths.public_dir).join(&config.paths.script_out),
      minify: mode.is_production(),
      stats: StatsProfile::default(),
    }
  }
}

/// Which parts of the stats report get logged.
#[derive(Debug, Clone, Copy)]
pub struct StatsProfile {
  pub timings: bool,
  pub modules: bool,
  pub assets: bool,
}

impl Default for StatsProfile {
  fn default() -> Self {
    Self { timings: true, modules: false, assets: false }
  }
}

/// Summary of one bundling pass.
#[derive(Debug, Clone)]
pub struct BundleStats {
  pub modules: usize,
  pub duration: Duration,
  pub output_bytes: u64,
  pub errors: Vec<String>,
}

impl BundleStats {
  pub fn has_errors(&self) -> bool {
    !self.errors.is_empty()
  }

  pub fn render(&self, profile: &StatsProfile) -> String {
    let mut line = String::from("bundled");
    if profile.modules {
      line.push_str(&format!(" {} modules", self.modules));
    }
    if profile.assets {
      line.push_str(&format!(" {}", format_size(self.output_bytes)));
    }
    if profile.timings {
      line.push_str(&format!(" in {:.2}s", self.duration.as_secs_f64()));
    }
    if self.has_errors() {
      line.push_str(&format!(" with {} errors", self.errors.len()));
    }
    line
  }
}

/// One bundler run has three distinguishable endings: the bundler machinery
/// failed to run at all, it ran but the input has errors, or a clean build.
#[derive(Debug)]
pub enum BundleOutcome {
  InvocationError(anyhow::Error),
  CompileReported(BundleStats),
  Success(BundleStats),
}

impl BundleOutcome {
  /// Console lines for a finished run. A completed run carries exactly one
  /// stats line; compile errors follow it, one per line.
  pub fn report(&self, profile: &StatsProfile) -> Vec<String> {
    match self {
      BundleOutcome::InvocationError(e) => vec![format!("{e:#}")],
      BundleOutcome::CompileReported(stats) => {
        let mut lines = vec![stats.render(profile)];
        lines.extend(stats.errors.iter().cloned());
        lines
      }
      BundleOutcome::Success(stats) => vec![stats.render(profile)],
    }
  }
}

fn log_outcome(outcome: &BundleOutcome, profile: &StatsProfile) {
  let first_color = if matches!(outcome, BundleOutcome::InvocationError(_)) { RED } else { CYAN };
  let mut lines = outcome.report(profile).into_iter();
  if let Some(first) = lines.next() {
    ui::tag("bundle", first_color, &first);
  }
  for line in lines {
    ui::tag("bundle", RED, &line);
  }
}

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
  #[error("bundler invocation failed: {0}")]
  Invocation(String),
  #[error("bundle has errors")]
  Plugin,
}

/// One-shot build task. Logs the stats report once on any completed run.
pub async fn build_scripts(cfg: Arc<BundleConfig>) -> Result<()> {
  let bundle_cfg = cfg.clone();
  let outcome = tokio::task::spawn_blocking(move || bundle_once(&bundle_cfg))
    .await
    .context("bundler task panicked")?;
  if let BundleOutcome::InvocationError(e) = &outcome {
    return Err(BundleError::Invocation(format!("{e:#}")).into());
  }
  log_outcome(&outcome, &cfg.stats);
  match outcome {
    BundleOutcome::CompileReported(_) => Err(BundleError::Plugin.into()),
    _ => Ok(()),
  }
}

/// Persistent watch: rebundle on every change under the script source tree.
/// Errors are logged and the loop keeps watching; a clean cycle signals the
/// reload bus.
pub async fn watch_scripts(cfg: Arc<BundleConfig>, reload: broadcast::Sender<()>) -> Result<()> {
  let (mut watcher, mut rx) = watch::channel_watcher()?;
  watcher
    .watch(&cfg.src_dir, RecursiveMode::Recursive)
    .with_context(|| format!("failed to watch {}", cfg.src_dir.display()))?;
  ui::tag("bundle", CYAN, &format!("watching {}", cfg.src_dir.display()));

  // first cycle runs up front so the watch serves a fresh bundle immediately
  watch_cycle(&cfg, &reload).await;
  while rx.recv().await.is_some() {
    watch_cycle(&cfg, &reload).await;
  }
  Ok(())
}

async fn watch_cycle(cfg: &Arc<BundleConfig>, reload: &broadcast::Sender<()>) {
  let bundle_cfg = cfg.clone();
  match tokio::task::spawn_blocking(move || bundle_once(&bundle_cfg)).await {
    Ok(outcome) => {
      log_outcome(&outcome, &cfg.stats);
      if matches!(outcome, BundleOutcome::Success(_)) {
        let _ = reload.send(());
      }
    }
    Err(e) => ui::tag("bundle", RED, &format!("bundler task panicked: {e}")),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn test_bundle_config(dir: &Path, minify: bool) -> BundleConfig {
    BundleConfig {
      entry: dir.join("src-js/main.js"),
      src_dir: dir.join("src-js"),
      out_file: dir.join("public/main.js"),
      minify,
      stats: StatsProfile::default(),
    }
  }

  fn write_sources(dir: &Path, main: &str, util: Option<&str>) {
    std::fs::create_dir_all(dir.join("src-js")).unwrap();
    std::fs::write(dir.join("src-js/main.js"), main).unwrap();
    if let Some(util) = util {
      std::fs::write(dir.join("src-js/util.js"), util).unwrap();
    }
  }

  #[test]
  fn clean_build_succeeds_and_writes_output() {
    let tmp = TempDir::new().unwrap();
    write_sources(
      tmp.path(),
      "import { greet } from \"./util.js\";\nconsole.log(greet(\"world\"));\n",
      Some("export function greet(name) {\n  return \"hello \" + name;\n}\n"),
    );
    let cfg = test_bundle_config(tmp.path(), false);

    let outcome = bundle_once(&cfg);
    let BundleOutcome::Success(stats) = outcome else {
      panic!("expected success, got {outcome:?}");
    };
    assert!(stats.modules >= 2, "entry and import should both load: {stats:?}");
    assert!(!stats.has_errors());

    let out = std::fs::read_to_string(tmp.path().join("public/main.js")).unwrap();
    assert!(out.contains("hello "), "bundle should inline the import: {out}");
  }

  #[test]
  fn missing_entry_is_invocation_error() {
    let tmp = TempDir::new().unwrap();
    let cfg = test_bundle_config(tmp.path(), false);

    let outcome = bundle_once(&cfg);
    let BundleOutcome::InvocationError(e) = outcome else {
      panic!("expected invocation error, got {outcome:?}");
    };
    assert!(e.to_string().contains("main.js"));
  }

  #[test]
  fn syntax_error_is_compile_reported() {
    let tmp = TempDir::new().unwrap();
    write_sources(tmp.path(), "let = ;\n", None);
    let cfg = test_bundle_config(tmp.path(), false);

    let outcome = bundle_once(&cfg);
    let BundleOutcome::CompileReported(stats) = outcome else {
      panic!("expected compile-reported errors, got {outcome:?}");
    };
    assert!(stats.has_errors());
    assert!(stats.errors[0].contains("main.js"));
  }

  #[tokio::test]
  async fn build_task_tags_invocation_errors() {
    let tmp = TempDir::new().unwrap();
    let cfg = Arc::new(test_bundle_config(tmp.path(), false));

    let err = build_scripts(cfg).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<BundleError>(), Some(BundleError::Invocation(_))));
  }

  #[tokio::test]
  async fn build_task_tags_compile_errors_as_plugin_error() {
    let tmp = TempDir::new().unwrap();
    write_sources(tmp.path(), "let = ;\n", None);
    let cfg = Arc::new(test_bundle_config(tmp.path(), false));

    let err = build_scripts(cfg).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<BundleError>(), Some(BundleError::Plugin)));
  }

  #[tokio::test]
  async fn watch_bundles_once_before_any_change() {
    let tmp = TempDir::new().unwrap();
    write_sources(tmp.path(), "console.log(\"boot\");\n", None);
    let cfg = Arc::new(test_bundle_config(tmp.path(), false));
    let (reload, mut signals) = broadcast::channel(4);

    let watch = tokio::spawn(watch_scripts(cfg.clone(), reload));
    // the startup cycle is a clean build, so it signals the reload bus
    tokio::time::timeout(Duration::from_secs(30), signals.recv())
      .await
      .expect("no startup bundle")
      .unwrap();
    let out = std::fs::read_to_string(&cfg.out_file).unwrap();
    assert!(out.contains("boot"), "startup cycle should write the bundle: {out}");
    watch.abort();
  }

  #[test]
  fn completed_run_reports_stats_exactly_once() {
    let tmp = TempDir::new().unwrap();
    write_sources(tmp.path(), "console.log(1);\n", None);
    let cfg = test_bundle_config(tmp.path(), false);

    let lines = bundle_once(&cfg).report(&cfg.stats);
    assert_eq!(lines.iter().filter(|l| l.starts_with("bundled")).count(), 1);
    assert_eq!(lines.len(), 1, "clean run logs only the stats line: {lines:?}");

    std::fs::write(tmp.path().join("src-js/main.js"), "let = ;\n").unwrap();
    let lines = bundle_once(&cfg).report(&cfg.stats);
    assert_eq!(lines.iter().filter(|l| l.starts_with("bundled")).count(), 1);
    assert!(lines.len() >= 2, "errors follow the stats line: {lines:?}");
  }

  #[test]
  fn stats_render_respects_profile() {
    let stats = BundleStats {
      modules: 3,
      duration: Duration::from_millis(420),
      output_bytes: 12_300,
      errors: vec![],
    };
    let default = stats.render(&StatsProfile::default());
    assert!(default.contains("0.42s"));
    assert!(!default.contains("modules"));

    let verbose = stats.render(&StatsProfile { timings: true, modules: true, assets: true });
    assert!(verbose.contains("3 modules"));
    assert!(verbose.contains("12.3 kB"));
  }
}
