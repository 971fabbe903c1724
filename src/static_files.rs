/* src/static_files.rs */

use std::path::Path;

use anyhow::{Context, Result};

use crate::config::PaveConfig;

/// Copy every `.svg` under the icon source tree into the icon output
/// directory, preserving relative structure. Returns the number of files
/// copied; any filesystem error aborts the task.
pub fn copy_icons(base_dir: &Path, config: &PaveConfig) -> Result<usize> {
  let src = base_dir.join(&config.paths.icon_dir);
  let dst = base_dir.join(&config.paths.icon_out_dir);
  let mut copied = 0;
  copy_tree(&src, &dst, &mut copied)?;
  Ok(copied)
}

fn copy_tree(src: &Path, dst: &Path, copied: &mut usize) -> Result<()> {
  let entries =
    std::fs::read_dir(src).with_context(|| format!("failed to read {}", src.display()))?;
  for entry in entries {
    let entry = entry.with_context(|| format!("failed to read entry in {}", src.display()))?;
    let path = entry.path();
    if path.is_dir() {
      copy_tree(&path, &dst.join(entry.file_name()), copied)?;
    } else if path.extension().is_some_and(|ext| ext == "svg") {
      std::fs::create_dir_all(dst).with_context(|| format!("failed to create {}", dst.display()))?;
      let target = dst.join(entry.file_name());
      std::fs::copy(&path, &target)
        .with_context(|| format!("failed to copy {} to {}", path.display(), target.display()))?;
      *copied += 1;
    }
  }
  Ok(())
}
