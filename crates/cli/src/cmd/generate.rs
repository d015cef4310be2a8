//! Implementation of the `ninjagen generate` command.

use std::path::Path;

use anyhow::{Context, Result};

use ninjagen_lib::generate::Generator;

use super::{Settings, load_package, source_root};
use crate::output::{format_live, print_info, print_json, print_stat, print_success, print_warning};

pub fn cmd_generate(settings: &Settings, manifest: &Path, output: &Path, json: bool) -> Result<()> {
  let config = settings.load_config()?;
  let package = load_package(manifest)?;

  let generator = Generator::new(config, source_root(manifest));
  let report = generator
    .generate_file(package.statements(), output)
    .with_context(|| format!("Failed to generate {}", output.display()))?;

  if json {
    return print_json(&report);
  }

  for discarded in &report.discarded {
    print_warning(&format!("Discarded duplicate build statement for {}", discarded));
  }
  print_success(&format!("Wrote {}", output.display()));
  print_stat("Builds", &format!("{} of {} submitted", report.kept, report.submitted));
  print_stat("Live", &format_live(&report.live));
  print_stat("Globs", &report.globs.len().to_string());
  if !report.retracted_rules.is_empty() || !report.retracted_variables.is_empty() {
    print_info(&format!(
      "Pruned {} rule(s) and {} variable(s) only discarded builds used",
      report.retracted_rules.len(),
      report.retracted_variables.len()
    ));
  }

  Ok(())
}
