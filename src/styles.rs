/* src/styles.rs */

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use notify::RecursiveMode;
use notify::Watcher as _;

use crate::config::{Mode, PaveConfig};
use crate::ui::{self, MAGENTA, RED};
use crate::watch;

/// Compile the sass entry, vendor-prefix it, and (production only) run the
/// cleaning pass. Output filename is the entry stem with a `.css` extension.
pub fn build_styles(base_dir: &Path, config: &PaveConfig, mode: Mode) -> Result<PathBuf> {
  let entry = base_dir.join(&config.paths.style_entry);
  // grass errors carry file and line; they abort the task
  let compiled = grass::from_path(&entry, &grass::Options::default())?;

  let prefixed = prefix_css(&compiled)?;
  let output = if mode.is_production() { clean_css(&prefixed)? } else { prefixed };

  let out_dir = base_dir.join(&config.paths.style_out_dir);
  std::fs::create_dir_all(&out_dir)
    .with_context(|| format!("failed to create {}", out_dir.display()))?;
  let stem = entry
    .file_stem()
    .and_then(|s| s.to_str())
    .with_context(|| format!("style entry {} has no file name", entry.display()))?;
  let out_file = out_dir.join(format!("{stem}.css"));
  std::fs::write(&out_file, output)
    .with_context(|| format!("failed to write {}", out_file.display()))?;
  Ok(out_file)
}

/// Rerun the full style build on every change under the style source tree.
/// Compile errors are logged; the watch never exits on them.
pub async fn watch_styles(base_dir: &Path, config: &PaveConfig, mode: Mode) -> Result<()> {
  let dir = base_dir.join(&config.paths.style_dir);
  let (mut watcher, mut rx) = watch::channel_watcher()?;
  watcher
    .watch(&dir, RecursiveMode::Recursive)
    .with_context(|| format!("failed to watch {}", dir.display()))?;
  ui::tag("styles", MAGENTA, &format!("watching {}", config.paths.style_dir));

  while rx.recv().await.is_some() {
    // rebuilds are synchronous fs + compile work; keep them off the runtime
    let base = base_dir.to_path_buf();
    let rebuild_config = config.clone();
    match tokio::task::spawn_blocking(move || build_styles(&base, &rebuild_config, mode)).await {
      Ok(Ok(out)) => ui::tag("styles", MAGENTA, &format!("rebuilt {}", out.display())),
      Ok(Err(e)) => ui::tag("styles", RED, &format!("{e:#}")),
      Err(e) => ui::tag("styles", RED, &format!("style task panicked: {e}")),
    }
  }
  Ok(())
}

/// Fixed target-browser policy for prefixing (the "> 1%, IE >= 10, iOS 7"
/// support matrix; versions are major << 16).
fn browser_targets() -> Targets {
  Targets::from(Browsers { ie: Some(10 << 16), ios_saf: Some(7 << 16), ..Browsers::default() })
}

/// Vendor-prefix only; whitespace and structure are left readable.
pub fn prefix_css(css: &str) -> Result<String> {
  transform(css, false)
}

/// Production cleaning pass: comments stripped, no selector restructuring,
/// and `@import` rules kept as imports, never inlined.
pub fn clean_css(css: &str) -> Result<String> {
  transform(css, true)
}

fn transform(css: &str, minify: bool) -> Result<String> {
  let targets = browser_targets();
  let mut sheet =
    StyleSheet::parse(css, ParserOptions::default()).map_err(|e| anyhow!("css parse: {e}"))?;
  sheet
    .minify(MinifyOptions { targets, ..MinifyOptions::default() })
    .map_err(|e| anyhow!("css transform: {e}"))?;
  let out = sheet
    .to_css(PrinterOptions { minify, targets, ..PrinterOptions::default() })
    .map_err(|e| anyhow!("css print: {e}"))?;
  Ok(out.code)
}
