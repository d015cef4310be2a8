//! Rendering live entities and build statements as a ninja file.
//!
//! Pools, global variables and rules come from the tracker's live sets and
//! are written unexpanded, so ninja performs the final substitution (rule
//! bodies need `$in`/`$out`). Build lines are fully expanded.

use std::collections::{BTreeMap, BTreeSet};
use std::io;

use thiserror::Error;
use tracing::debug;

use crate::entity::{Pool, RuleDefinition, Variable, VariableValue};
use crate::live::{LiveError, LiveSnapshot, LiveTracker};
use crate::statement::BuildStatement;
use crate::template::{Escape, LazyTemplate, Segment, escape};

const HEADER: &str = "# Generated by ninjagen. Do not edit.";

#[derive(Debug, Error)]
pub enum WriteError {
  #[error("failed to write ninja file: {0}")]
  Io(#[from] io::Error),

  #[error(transparent)]
  Live(#[from] LiveError),

  #[error("rule '{0}' is used by a build statement but is not live")]
  RuleNotLive(String),
}

/// Writes a ninja file from a tracker's live state.
pub struct NinjaWriter<'a> {
  tracker: &'a LiveTracker,
}

impl<'a> NinjaWriter<'a> {
  pub fn new(tracker: &'a LiveTracker) -> Self {
    Self { tracker }
  }

  /// Render to a string.
  pub fn render(&self, statements: &[BuildStatement]) -> Result<String, WriteError> {
    let mut buf = Vec::new();
    self.write(&mut buf, statements)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
  }

  /// Write the whole file: header, pools, global variables, rules, builds and
  /// default targets.
  ///
  /// Every statement's rule must be live (or builtin), and every variable its
  /// templates reference must be live.
  pub fn write<W: io::Write>(&self, out: &mut W, statements: &[BuildStatement]) -> Result<(), WriteError> {
    let snapshot = self.tracker.snapshot();

    writeln!(out, "{HEADER}")?;
    for glob in self.tracker.context().globs() {
      if glob.excludes.is_empty() {
        writeln!(out, "# glob: {}", glob.pattern)?;
      } else {
        writeln!(out, "# glob: {} (excluding {})", glob.pattern, glob.excludes.join(", "))?;
      }
    }
    writeln!(out)?;
    writeln!(out, "ninja_required_version = {}", required_version(statements))?;
    writeln!(out)?;

    write_pools(out, &snapshot)?;
    write_variables(out, &snapshot)?;
    write_rules(out, &snapshot)?;

    let mut defaults = Vec::new();
    for stmt in statements {
      self.write_build(out, stmt, &snapshot, &mut defaults)?;
    }
    if !defaults.is_empty() {
      writeln!(out, "default {}", defaults.join(" "))?;
    }

    debug!(
      pools = snapshot.pools.len(),
      variables = snapshot.variables.len(),
      rules = snapshot.rules.len(),
      builds = statements.len(),
      "rendered ninja file"
    );
    Ok(())
  }

  fn write_build<W: io::Write>(
    &self,
    out: &mut W,
    stmt: &BuildStatement,
    snapshot: &LiveSnapshot,
    defaults: &mut Vec<String>,
  ) -> Result<(), WriteError> {
    let rule_def: Option<&RuleDefinition> = if stmt.rule.is_builtin() {
      None
    } else {
      Some(
        snapshot
          .rules
          .get(&stmt.rule)
          .ok_or_else(|| WriteError::RuleNotLive(stmt.rule.name().to_string()))?,
      )
    };

    let outputs = self.paths(&stmt.outputs)?;
    let implicit_outputs = self.paths(&stmt.implicit_outputs)?;
    let inputs = self.paths(&stmt.inputs)?;
    let mut implicits = self.paths(&stmt.implicits)?;
    let mut order_only = self.paths(&stmt.order_only)?;
    let validations = self.paths(&stmt.validations)?;
    if let Some(def) = rule_def {
      implicits.extend(self.paths(&def.command_deps)?);
      order_only.extend(self.paths(&def.command_order_only)?);
    }

    let mut line = format!("build {}", outputs.join(" "));
    if !implicit_outputs.is_empty() {
      line.push_str(" | ");
      line.push_str(&implicit_outputs.join(" "));
    }
    line.push_str(": ");
    line.push_str(stmt.rule.name());
    for (sep, group) in [("", &inputs), (" |", &implicits), (" ||", &order_only), (" |@", &validations)] {
      if group.is_empty() {
        continue;
      }
      line.push_str(sep);
      line.push(' ');
      line.push_str(&group.join(" "));
    }
    writeln!(out, "{line}")?;

    for (name, value) in &stmt.variables {
      writeln!(out, "  {} = {}", name, self.value(value)?)?;
    }
    for (arg, value) in &stmt.args {
      writeln!(out, "  {} = {}", arg.name(), self.value(value)?)?;
    }
    writeln!(out)?;

    if stmt.default {
      defaults.extend(outputs);
    }
    Ok(())
  }

  /// Expand path templates; each expansion may hold several paths.
  fn paths(&self, templates: &[LazyTemplate]) -> Result<Vec<String>, LiveError> {
    let mut paths = Vec::new();
    for template in templates {
      let expanded = self.tracker.expand(template)?;
      paths.extend(expanded.split_whitespace().map(|p| escape(p, Escape::Path)));
    }
    Ok(paths)
  }

  fn value(&self, template: &LazyTemplate) -> Result<String, LiveError> {
    Ok(escape(&self.tracker.expand(template)?, Escape::Value))
  }
}

fn required_version(statements: &[BuildStatement]) -> &'static str {
  if statements.iter().any(|s| !s.validations.is_empty()) {
    "1.11"
  } else {
    "1.7"
  }
}

fn write_comment<W: io::Write>(out: &mut W, comment: Option<&str>) -> io::Result<()> {
  for line in comment.into_iter().flat_map(str::lines) {
    writeln!(out, "# {line}")?;
  }
  Ok(())
}

// A pool stays live after the rules using it are retracted; only pools some
// live rule still names are written.
fn write_pools<W: io::Write>(out: &mut W, snapshot: &LiveSnapshot) -> io::Result<()> {
  let used: BTreeSet<&Pool> = snapshot.rules.values().filter_map(|def| def.pool.as_ref()).collect();
  for (pool, def) in snapshot.pools.iter().filter(|(pool, _)| used.contains(pool)) {
    write_comment(out, def.comment.as_deref())?;
    writeln!(out, "pool {}", pool.name())?;
    writeln!(out, "  depth = {}", def.depth)?;
    writeln!(out)?;
  }
  Ok(())
}

fn write_variables<W: io::Write>(out: &mut W, snapshot: &LiveSnapshot) -> io::Result<()> {
  let ordered = dependency_order(&snapshot.variables);
  for v in &ordered {
    if let Some(value) = snapshot.variables.get(*v) {
      writeln!(out, "{} = {}", v.name(), value.to_ninja(Escape::Value))?;
    }
  }
  if !ordered.is_empty() {
    writeln!(out)?;
  }
  Ok(())
}

fn write_rules<W: io::Write>(out: &mut W, snapshot: &LiveSnapshot) -> io::Result<()> {
  for (rule, def) in &snapshot.rules {
    write_comment(out, def.comment.as_deref())?;
    writeln!(out, "rule {}", rule.name())?;
    for (name, value) in &def.variables {
      writeln!(out, "  {} = {}", name, value.to_ninja(Escape::Value))?;
    }
    if let Some(pool) = &def.pool {
      writeln!(out, "  pool = {}", pool.name())?;
    }
    writeln!(out)?;
  }
  Ok(())
}

/// Order variables so each one follows the variables its value references.
/// Ninja evaluates top-level assignments in file order.
fn dependency_order(values: &BTreeMap<Variable, VariableValue>) -> Vec<&Variable> {
  fn visit<'s>(
    v: &'s Variable,
    values: &'s BTreeMap<Variable, VariableValue>,
    seen: &mut BTreeSet<&'s Variable>,
    order: &mut Vec<&'s Variable>,
  ) {
    if !seen.insert(v) {
      return;
    }
    if let Some(value) = values.get(v) {
      for segment in value.segments() {
        if let Segment::Variable(dep) = segment
          && let Some((dep, _)) = values.get_key_value(dep)
        {
          visit(dep, values, seen, order);
        }
      }
    }
    order.push(v);
  }

  let mut seen = BTreeSet::new();
  let mut order = Vec::with_capacity(values.len());
  for v in values.keys() {
    visit(v, values, &mut seen, &mut order);
  }
  order
}
