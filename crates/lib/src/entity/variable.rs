use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock};

use crate::config::Config;
use crate::context::{EvalContext, VariableFuncContext};
use crate::template::LazyTemplate;

use super::types::{ResolveError, Resolvable, Resolved};

/// The stored, not yet expanded value of a variable.
pub type VariableValue = LazyTemplate;

/// Computes a variable's value at resolve time.
pub trait VariableFunc: Send + Sync {
  fn value(&self, ctx: &VariableFuncContext<'_>, config: &Config) -> Result<VariableValue, ResolveError>;
}

impl<F> VariableFunc for F
where
  F: Fn(&VariableFuncContext<'_>, &Config) -> Result<VariableValue, ResolveError> + Send + Sync,
{
  fn value(&self, ctx: &VariableFuncContext<'_>, config: &Config) -> Result<VariableValue, ResolveError> {
    self(ctx, config)
  }
}

#[derive(Clone)]
pub enum VariableKind {
  /// A value fixed when the variable was declared.
  Static(VariableValue),

  /// A value computed from the configuration, possibly globbing.
  Func(Arc<dyn VariableFunc>),

  /// A rule argument slot such as `in` or `out`.
  Argument,
}

struct VariableInner {
  name: String,
  kind: VariableKind,
}

static INPUT: LazyLock<Variable> = LazyLock::new(|| Variable::argument("in"));
static OUTPUT: LazyLock<Variable> = LazyLock::new(|| Variable::argument("out"));

/// Handle to a ninja variable.
///
/// Handles are compared by identity: clones are equal, while two separately
/// constructed variables are distinct even when they share a name. Ordering
/// is by name first.
#[derive(Clone)]
pub struct Variable(Arc<VariableInner>);

impl Variable {
  pub fn new_static(name: impl Into<String>, value: VariableValue) -> Self {
    Self::with_kind(name, VariableKind::Static(value))
  }

  pub fn new_func<F>(name: impl Into<String>, func: F) -> Self
  where
    F: Fn(&VariableFuncContext<'_>, &Config) -> Result<VariableValue, ResolveError> + Send + Sync + 'static,
  {
    Self::with_kind(name, VariableKind::Func(Arc::new(func)))
  }

  pub fn argument(name: impl Into<String>) -> Self {
    Self::with_kind(name, VariableKind::Argument)
  }

  /// The `$in` argument of every rule.
  pub fn input() -> Self {
    INPUT.clone()
  }

  /// The `$out` argument of every rule.
  pub fn output() -> Self {
    OUTPUT.clone()
  }

  pub fn with_kind(name: impl Into<String>, kind: VariableKind) -> Self {
    Self(Arc::new(VariableInner {
      name: name.into(),
      kind,
    }))
  }

  pub fn name(&self) -> &str {
    &self.0.name
  }

  pub fn kind(&self) -> &VariableKind {
    &self.0.kind
  }

  pub fn is_argument(&self) -> bool {
    matches!(self.0.kind, VariableKind::Argument)
  }
}

impl Resolvable for Variable {
  type Definition = VariableValue;

  fn resolve(&self, ctx: &EvalContext, config: &Config) -> Result<Resolved<VariableValue>, ResolveError> {
    match &self.0.kind {
      VariableKind::Static(value) => Ok(Resolved::Defined(value.clone())),
      VariableKind::Func(func) => func.value(&VariableFuncContext::new(ctx), config).map(Resolved::Defined),
      VariableKind::Argument => Ok(Resolved::Argument),
    }
  }
}

impl PartialEq for Variable {
  fn eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.0, &other.0)
  }
}

impl Eq for Variable {}

impl Hash for Variable {
  fn hash<H: Hasher>(&self, state: &mut H) {
    Arc::as_ptr(&self.0).hash(state);
  }
}

impl PartialOrd for Variable {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Variable {
  fn cmp(&self, other: &Self) -> Ordering {
    self
      .0
      .name
      .cmp(&other.0.name)
      .then_with(|| Arc::as_ptr(&self.0).cmp(&Arc::as_ptr(&other.0)))
  }
}

impl fmt::Debug for Variable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Variable").field(&self.0.name).finish()
  }
}

impl fmt::Display for Variable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0.name)
  }
}

impl serde::Serialize for Variable {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.0.name)
  }
}
