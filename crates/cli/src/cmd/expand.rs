//! Implementation of the `ninjagen expand` command.

use std::path::Path;

use anyhow::{Context, Result};

use ninjagen_lib::generate::Generator;
use ninjagen_lib::template::LazyTemplate;

use super::{Settings, load_package, source_root};

pub fn cmd_expand(settings: &Settings, manifest: &Path, template: &str) -> Result<()> {
  let config = settings.load_config()?;
  let package = load_package(manifest)?;
  let template = LazyTemplate::parse(template, &package).context("Failed to parse template")?;

  let generation = Generator::new(config, source_root(manifest))
    .discover(package.statements())
    .context("Failed to compute live entities")?;
  generation
    .tracker
    .add_template_dependency(&template)
    .context("Failed to resolve template variables")?;
  let expanded = generation.tracker.expand(&template).context("Failed to expand template")?;

  println!("{}", expanded);
  Ok(())
}
