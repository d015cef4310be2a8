use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock};

use serde::Serialize;

use crate::config::Config;
use crate::context::EvalContext;
use crate::template::LazyTemplate;

use super::pool::Pool;
use super::types::{ResolveError, Resolvable, Resolved};

/// Author-facing description of a rule.
///
/// Resolving a rule turns its params into a [`RuleDefinition`].
#[derive(Debug, Clone)]
pub struct RuleParams {
  pub comment: Option<String>,
  pub command: LazyTemplate,
  pub description: Option<LazyTemplate>,
  pub depfile: Option<LazyTemplate>,
  pub deps: Option<String>,
  pub rspfile: Option<LazyTemplate>,
  pub rspfile_content: Option<LazyTemplate>,
  pub restat: bool,
  pub generator: bool,
  pub pool: Option<Pool>,
  pub command_deps: Vec<LazyTemplate>,
  pub command_order_only: Vec<LazyTemplate>,
  /// Argument names beyond `in` and `out` that build statements may bind.
  pub args: Vec<String>,
}

impl RuleParams {
  pub fn new(command: LazyTemplate) -> Self {
    Self {
      comment: None,
      command,
      description: None,
      depfile: None,
      deps: None,
      rspfile: None,
      rspfile_content: None,
      restat: false,
      generator: false,
      pool: None,
      command_deps: Vec::new(),
      command_order_only: Vec::new(),
      args: Vec::new(),
    }
  }

  pub fn with_description(mut self, description: LazyTemplate) -> Self {
    self.description = Some(description);
    self
  }

  pub fn with_pool(mut self, pool: Pool) -> Self {
    self.pool = Some(pool);
    self
  }

  pub fn with_command_deps(mut self, deps: Vec<LazyTemplate>) -> Self {
    self.command_deps = deps;
    self
  }

  pub fn with_command_order_only(mut self, deps: Vec<LazyTemplate>) -> Self {
    self.command_order_only = deps;
    self
  }

  pub fn with_args(mut self, args: Vec<String>) -> Self {
    self.args = args;
    self
  }

  /// Validate and convert into the definition the tracker stores.
  pub fn to_definition(&self) -> Result<RuleDefinition, ResolveError> {
    if self.rspfile.is_some() != self.rspfile_content.is_some() {
      return Err(ResolveError::InvalidRule(
        "rspfile and rspfile_content must be set together".to_string(),
      ));
    }
    if let Some(deps) = &self.deps
      && deps != "gcc"
      && deps != "msvc"
    {
      return Err(ResolveError::InvalidRule(format!(
        "deps must be 'gcc' or 'msvc', got '{deps}'"
      )));
    }

    let mut variables = BTreeMap::new();
    variables.insert("command".to_string(), self.command.clone());
    let optional = [
      ("description", &self.description),
      ("depfile", &self.depfile),
      ("rspfile", &self.rspfile),
      ("rspfile_content", &self.rspfile_content),
    ];
    for (name, value) in optional {
      if let Some(value) = value {
        variables.insert(name.to_string(), value.clone());
      }
    }
    if let Some(deps) = &self.deps {
      variables.insert("deps".to_string(), LazyTemplate::literal(deps.clone()));
    }
    if self.restat {
      variables.insert("restat".to_string(), LazyTemplate::literal("1"));
    }
    if self.generator {
      variables.insert("generator".to_string(), LazyTemplate::literal("1"));
    }

    Ok(RuleDefinition {
      comment: self.comment.clone(),
      pool: self.pool.clone(),
      command_deps: self.command_deps.clone(),
      command_order_only: self.command_order_only.clone(),
      variables,
      args: self.args.iter().cloned().collect(),
    })
  }
}

/// The evaluated form of a rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleDefinition {
  pub comment: Option<String>,
  pub pool: Option<Pool>,
  /// Implicit dependencies of every build that uses the rule.
  pub command_deps: Vec<LazyTemplate>,
  /// Order-only dependencies of every build that uses the rule.
  pub command_order_only: Vec<LazyTemplate>,
  /// Rule-scoped variables: `command`, `description`, `depfile`, ...
  pub variables: BTreeMap<String, LazyTemplate>,
  pub args: BTreeSet<String>,
}

impl RuleDefinition {
  /// Every template whose references must be live for this rule.
  pub fn templates(&self) -> impl Iterator<Item = &LazyTemplate> {
    self
      .command_deps
      .iter()
      .chain(&self.command_order_only)
      .chain(self.variables.values())
  }
}

/// Computes a rule's params from the configuration.
pub trait RuleFunc: Send + Sync {
  fn params(&self, config: &Config) -> Result<RuleParams, ResolveError>;
}

impl<F> RuleFunc for F
where
  F: Fn(&Config) -> Result<RuleParams, ResolveError> + Send + Sync,
{
  fn params(&self, config: &Config) -> Result<RuleParams, ResolveError> {
    self(config)
  }
}

#[derive(Clone)]
pub enum RuleKind {
  Static(RuleParams),
  Func(Arc<dyn RuleFunc>),
  /// Provided by ninja itself.
  Builtin,
}

static PHONY: LazyLock<Rule> = LazyLock::new(|| Rule::with_kind("phony", RuleKind::Builtin));

struct RuleInner {
  name: String,
  kind: RuleKind,
}

/// Handle to a ninja rule. Equality is handle identity; ordering is by name.
#[derive(Clone)]
pub struct Rule(Arc<RuleInner>);

impl Rule {
  pub fn new_static(name: impl Into<String>, params: RuleParams) -> Self {
    Self::with_kind(name, RuleKind::Static(params))
  }

  pub fn new_func<F>(name: impl Into<String>, func: F) -> Self
  where
    F: Fn(&Config) -> Result<RuleParams, ResolveError> + Send + Sync + 'static,
  {
    Self::with_kind(name, RuleKind::Func(Arc::new(func)))
  }

  /// ninja's builtin `phony` rule.
  pub fn phony() -> Self {
    PHONY.clone()
  }

  pub fn with_kind(name: impl Into<String>, kind: RuleKind) -> Self {
    Self(Arc::new(RuleInner {
      name: name.into(),
      kind,
    }))
  }

  pub fn name(&self) -> &str {
    &self.0.name
  }

  pub fn kind(&self) -> &RuleKind {
    &self.0.kind
  }

  pub fn is_builtin(&self) -> bool {
    matches!(self.0.kind, RuleKind::Builtin)
  }
}

impl Resolvable for Rule {
  type Definition = RuleDefinition;

  fn resolve(&self, _ctx: &EvalContext, config: &Config) -> Result<Resolved<RuleDefinition>, ResolveError> {
    match &self.0.kind {
      RuleKind::Static(params) => params.to_definition().map(Resolved::Defined),
      RuleKind::Func(func) => func.params(config)?.to_definition().map(Resolved::Defined),
      RuleKind::Builtin => Ok(Resolved::Builtin),
    }
  }
}

impl PartialEq for Rule {
  fn eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.0, &other.0)
  }
}

impl Eq for Rule {}

impl Hash for Rule {
  fn hash<H: Hasher>(&self, state: &mut H) {
    Arc::as_ptr(&self.0).hash(state);
  }
}

impl PartialOrd for Rule {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Rule {
  fn cmp(&self, other: &Self) -> Ordering {
    self
      .0
      .name
      .cmp(&other.0.name)
      .then_with(|| Arc::as_ptr(&self.0).cmp(&Arc::as_ptr(&other.0)))
  }
}

impl fmt::Debug for Rule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Rule").field(&self.0.name).finish()
  }
}

impl fmt::Display for Rule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0.name)
  }
}

impl Serialize for Rule {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.0.name)
  }
}
