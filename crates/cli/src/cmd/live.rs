//! Implementation of the `ninjagen live` command.
//!
//! Runs discovery only and lists what became live.

use std::path::Path;

use anyhow::{Context, Result};

use ninjagen_lib::generate::Generator;
use ninjagen_lib::template::Escape;

use super::{Settings, load_package, source_root};
use crate::output::{format_live, print_json, print_stat, print_success};

pub fn cmd_live(settings: &Settings, manifest: &Path, json: bool) -> Result<()> {
  let config = settings.load_config()?;
  let package = load_package(manifest)?;

  let generation = Generator::new(config, source_root(manifest))
    .discover(package.statements())
    .context("Failed to compute live entities")?;
  let snapshot = generation.snapshot();

  if json {
    return print_json(&snapshot);
  }

  print_success(&format!("Live: {}", format_live(&generation.report.live)));

  if !snapshot.pools.is_empty() {
    println!();
    println!("Pools:");
    for (pool, def) in &snapshot.pools {
      print_stat(pool.name(), &format!("depth {}", def.depth));
    }
  }

  if !snapshot.variables.is_empty() {
    println!();
    println!("Variables:");
    for (v, value) in &snapshot.variables {
      print_stat(v.name(), &value.to_ninja(Escape::Value));
    }
  }

  if !snapshot.rules.is_empty() {
    println!();
    println!("Rules:");
    for (rule, def) in &snapshot.rules {
      let command = def.variables.get("command").map(|c| c.to_string()).unwrap_or_default();
      print_stat(rule.name(), &command);
    }
  }

  Ok(())
}
