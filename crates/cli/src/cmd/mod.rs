mod expand;
mod generate;
mod live;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use ninjagen_lib::config::Config;
use ninjagen_lib::manifest::Package;

pub use expand::cmd_expand;
pub use generate::cmd_generate;
pub use live::cmd_live;

/// Global options shared by every command.
pub struct Settings {
  pub config: Option<PathBuf>,
  pub set: Vec<String>,
}

impl Settings {
  /// The `--config` file, if any, with `--set` assignments applied on top.
  pub fn load_config(&self) -> Result<Config> {
    let mut config = match &self.config {
      Some(path) => Config::load(path).with_context(|| format!("Failed to load config: {}", path.display()))?,
      None => Config::new(),
    };
    for assignment in &self.set {
      let (key, value) = Config::parse_assignment(assignment)?;
      debug!(key = %key, value = %value, "config override");
      config.insert(key, value);
    }
    Ok(config)
  }
}

pub fn load_package(manifest: &Path) -> Result<Package> {
  debug!(manifest = %manifest.display(), "loading manifest");
  Package::load(manifest).with_context(|| format!("Failed to load manifest: {}", manifest.display()))
}

/// Globs in a manifest are relative to the directory containing it.
pub fn source_root(manifest: &Path) -> PathBuf {
  match manifest.parent() {
    Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
    _ => PathBuf::from("."),
  }
}
