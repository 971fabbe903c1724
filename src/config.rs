/* src/config.rs */

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;

/// Production/development switch, read once from NODE_ENV at startup and
/// threaded explicitly into every component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
  Development,
  Production,
}

impl Mode {
  pub fn from_env() -> Self {
    if std::env::var("NODE_ENV").is_ok_and(|v| v == "production") {
      Mode::Production
    } else {
      Mode::Development
    }
  }

  pub fn is_production(self) -> bool {
    matches!(self, Mode::Production)
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaveConfig {
  pub project: ProjectConfig,
  #[serde(default)]
  pub dev: DevSection,
  #[serde(default)]
  pub paths: PathsSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
  pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DevSection {
  /// Backend port P; the proxy listens on P+1.
  #[serde(default = "default_port")]
  pub port: u16,
}

impl Default for DevSection {
  fn default() -> Self {
    Self { port: default_port() }
  }
}

fn default_port() -> u16 {
  3000
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
  #[serde(default = "default_public_dir")]
  pub public_dir: String,
  #[serde(default = "default_icon_dir")]
  pub icon_dir: String,
  #[serde(default = "default_icon_out_dir")]
  pub icon_out_dir: String,
  #[serde(default = "default_style_dir")]
  pub style_dir: String,
  #[serde(default = "default_style_entry")]
  pub style_entry: String,
  #[serde(default = "default_style_out_dir")]
  pub style_out_dir: String,
  #[serde(default = "default_script_dir")]
  pub script_dir: String,
  #[serde(default = "default_script_entry")]
  pub script_entry: String,
  #[serde(default = "default_script_out")]
  pub script_out: String,
}

impl Default for PathsSection {
  fn default() -> Self {
    Self {
      public_dir: default_public_dir(),
      icon_dir: default_icon_dir(),
      icon_out_dir: default_icon_out_dir(),
      style_dir: default_style_dir(),
      style_entry: default_style_entry(),
      style_out_dir: default_style_out_dir(),
      script_dir: default_script_dir(),
      script_entry: default_script_entry(),
      script_out: default_script_out(),
    }
  }
}

fn default_public_dir() -> String {
  "public".to_string()
}

fn default_icon_dir() -> String {
  "node_modules/feather-icons/dist/icons".to_string()
}

fn default_icon_out_dir() -> String {
  "public/icons".to_string()
}

fn default_style_dir() -> String {
  "src-scss".to_string()
}

fn default_style_entry() -> String {
  "src-scss/main.scss".to_string()
}

fn default_style_out_dir() -> String {
  "public/styles".to_string()
}

fn default_script_dir() -> String {
  "src-js".to_string()
}

fn default_script_entry() -> String {
  "src-js/main.js".to_string()
}

fn default_script_out() -> String {
  "main.js".to_string()
}

impl PaveConfig {
  /// All output paths must live under the public root; sources are read-only.
  pub fn validate(&self) -> Result<()> {
    if self.project.name.trim().is_empty() {
      bail!("project.name must not be empty");
    }
    if self.dev.port == u16::MAX {
      bail!("dev.port must leave room for the proxy port (dev.port + 1)");
    }
    let public = Path::new(&self.paths.public_dir);
    for (key, dir) in
      [("paths.icon_out_dir", &self.paths.icon_out_dir), ("paths.style_out_dir", &self.paths.style_out_dir)]
    {
      if !Path::new(dir).starts_with(public) {
        bail!("{key} \"{dir}\" must be inside paths.public_dir \"{}\"", self.paths.public_dir);
      }
    }
    Ok(())
  }
}

/// Walk upward from `start` to find `pave.toml`, like Cargo.toml discovery
pub fn find_pave_config(start: &Path) -> Result<PathBuf> {
  let mut dir =
    start.canonicalize().with_context(|| format!("failed to canonicalize {}", start.display()))?;
  loop {
    let candidate = dir.join("pave.toml");
    if candidate.is_file() {
      return Ok(candidate);
    }
    if !dir.pop() {
      bail!("pave.toml not found (searched upward from {})", start.display());
    }
  }
}

pub fn load_pave_config(path: &Path) -> Result<PaveConfig> {
  let content =
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
  let config: PaveConfig =
    toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))?;
  config.validate()?;
  Ok(config)
}

#[cfg(test)]
mod tests {
  use super::*;

  mod parsing;
  mod validation;
}
