//! The generation pipeline: submit statements, deduplicate, prune, write.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::context::{EvalContext, GlobRecord};
use crate::entity::{Rule, Variable};
use crate::live::{LiveError, LiveSnapshot, LiveStats, LiveTracker};
use crate::ninja::{NinjaWriter, WriteError};
use crate::statement::BuildStatement;
use crate::template::{LazyTemplate, Segment};

#[derive(Debug, Error)]
pub enum GenerateError {
  #[error("failed to add build statement for '{output}': {source}")]
  Submit {
    output: String,
    #[source]
    source: LiveError,
  },

  #[error(transparent)]
  Live(#[from] LiveError),

  #[error(transparent)]
  Write(#[from] WriteError),

  #[error("failed to write {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

/// Summary of one generation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerateReport {
  /// Statements submitted to the tracker.
  pub submitted: usize,
  /// Statements kept after deduplication.
  pub kept: usize,
  /// First outputs of discarded duplicate statements.
  pub discarded: Vec<String>,
  pub retracted_rules: Vec<String>,
  pub retracted_variables: Vec<String>,
  pub live: LiveStats,
  pub globs: Vec<GlobRecord>,
}

/// Runs statements through a fresh [`LiveTracker`].
pub struct Generator {
  config: Arc<Config>,
  root: PathBuf,
}

impl Generator {
  /// `root` is the directory globs are evaluated against.
  pub fn new(config: Config, root: impl Into<PathBuf>) -> Self {
    Self {
      config: Arc::new(config),
      root: root.into(),
    }
  }

  /// Submit, deduplicate and prune, without writing anything.
  ///
  /// # Errors
  ///
  /// Every statement is submitted even when some fail. The failure reported
  /// is the one of the earliest statement in `statements`, whatever order
  /// the submissions ran in.
  pub fn discover(&self, statements: &[BuildStatement]) -> Result<Generation, GenerateError> {
    let tracker = LiveTracker::new(self.config.clone(), Arc::new(EvalContext::new(&self.root)));

    let failure = statements
      .par_iter()
      .enumerate()
      .filter_map(|(index, stmt)| {
        tracker
          .add_statement_dependencies(stmt)
          .err()
          .map(|source| (index, stmt, source))
      })
      .min_by_key(|(index, ..)| *index);
    if let Some((index, stmt, source)) = failure {
      debug!(index, "build statement failed");
      return Err(GenerateError::Submit {
        output: first_output(stmt),
        source,
      });
    }
    info!(statements = statements.len(), "submitted build statements");

    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(statements.len());
    let mut discarded = Vec::new();
    for stmt in statements {
      let key = match stmt.outputs.first() {
        Some(output) => Some(tracker.expand(output)?),
        None => None,
      };
      if let Some(output) = key
        && !seen.insert(output.clone())
      {
        warn!(output = %output, rule = %stmt.rule, "discarding duplicate build statement");
        discarded.push(output);
        continue;
      }
      kept.push(stmt.clone());
    }

    let (retracted_rules, retracted_variables) = prune(&tracker, &kept);

    let report = GenerateReport {
      submitted: statements.len(),
      kept: kept.len(),
      discarded,
      retracted_rules,
      retracted_variables,
      live: tracker.stats(),
      globs: tracker.context().globs(),
    };
    Ok(Generation {
      tracker,
      statements: kept,
      report,
    })
  }

  /// Run the pipeline and write the ninja file to `out`.
  pub fn generate<W: io::Write>(&self, statements: &[BuildStatement], out: &mut W) -> Result<GenerateReport, GenerateError> {
    let generation = self.discover(statements)?;
    generation.write(out)?;
    Ok(generation.report)
  }

  /// Run the pipeline and write the ninja file to `path`.
  ///
  /// The file is only replaced once rendering has succeeded.
  pub fn generate_file(&self, statements: &[BuildStatement], path: &Path) -> Result<GenerateReport, GenerateError> {
    let generation = self.discover(statements)?;
    let text = NinjaWriter::new(&generation.tracker).render(&generation.statements)?;
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      fs::create_dir_all(parent).map_err(|source| GenerateError::Io {
        path: parent.to_path_buf(),
        source,
      })?;
    }
    fs::write(path, text).map_err(|source| GenerateError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    info!(path = %path.display(), "wrote ninja file");
    Ok(generation.report)
  }
}

/// The result of discovery: the tracker and the statements that survived
/// deduplication.
pub struct Generation {
  pub tracker: LiveTracker,
  pub statements: Vec<BuildStatement>,
  pub report: GenerateReport,
}

impl Generation {
  pub fn snapshot(&self) -> LiveSnapshot {
    self.tracker.snapshot()
  }

  pub fn write<W: io::Write>(&self, out: &mut W) -> Result<(), WriteError> {
    NinjaWriter::new(&self.tracker).write(out, &self.statements)
  }
}

fn first_output(stmt: &BuildStatement) -> String {
  stmt
    .outputs
    .first()
    .map(|t| t.to_string())
    .unwrap_or_else(|| format!("<{} without outputs>", stmt.rule))
}

/// Retract live rules and variables that no kept statement reaches.
///
/// The tracker never cascades a retraction, so reachability is recomputed
/// here over a snapshot of the live sets.
fn prune(tracker: &LiveTracker, kept: &[BuildStatement]) -> (Vec<String>, Vec<String>) {
  let snapshot = tracker.snapshot();

  let mut rules: BTreeSet<&Rule> = BTreeSet::new();
  let mut pending: Vec<&LazyTemplate> = Vec::new();
  for stmt in kept {
    pending.extend(stmt.templates());
    if let Some((rule, def)) = snapshot.rules.get_key_value(&stmt.rule)
      && rules.insert(rule)
    {
      pending.extend(def.templates());
    }
  }

  let mut variables: BTreeSet<&Variable> = BTreeSet::new();
  while let Some(template) = pending.pop() {
    for segment in template.segments() {
      if let Segment::Variable(v) = segment
        && let Some((v, value)) = snapshot.variables.get_key_value(v)
        && variables.insert(v)
      {
        pending.push(value);
      }
    }
  }

  let mut retracted_rules = Vec::new();
  for rule in snapshot.rules.keys().filter(|r| !rules.contains(r)) {
    if tracker.remove_rule_if_live(rule) {
      retracted_rules.push(rule.name().to_string());
    }
  }
  let mut retracted_variables = Vec::new();
  for v in snapshot.variables.keys().filter(|v| !variables.contains(v)) {
    if tracker.remove_variable_if_live(v) {
      retracted_variables.push(v.name().to_string());
    }
  }
  debug!(
    rules = retracted_rules.len(),
    variables = retracted_variables.len(),
    "pruned unreachable entities"
  );
  (retracted_rules, retracted_variables)
}
