use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock};

use serde::Serialize;

use crate::config::Config;
use crate::context::EvalContext;

use super::types::{ResolveError, Resolvable, Resolved};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolParams {
  pub depth: u32,
  pub comment: Option<String>,
}

impl PoolParams {
  pub fn new(depth: u32) -> Self {
    Self { depth, comment: None }
  }

  pub fn to_definition(&self) -> Result<PoolDefinition, ResolveError> {
    if self.depth == 0 {
      return Err(ResolveError::InvalidPoolDepth(self.depth));
    }
    Ok(PoolDefinition {
      depth: self.depth,
      comment: self.comment.clone(),
    })
  }
}

/// Concurrency limit metadata. Pools reference nothing else.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolDefinition {
  pub depth: u32,
  pub comment: Option<String>,
}

pub trait PoolFunc: Send + Sync {
  fn params(&self, config: &Config) -> Result<PoolParams, ResolveError>;
}

impl<F> PoolFunc for F
where
  F: Fn(&Config) -> Result<PoolParams, ResolveError> + Send + Sync,
{
  fn params(&self, config: &Config) -> Result<PoolParams, ResolveError> {
    self(config)
  }
}

#[derive(Clone)]
pub enum PoolKind {
  Static(PoolParams),
  Func(Arc<dyn PoolFunc>),
  Builtin,
}

static CONSOLE: LazyLock<Pool> = LazyLock::new(|| Pool::with_kind("console", PoolKind::Builtin));

struct PoolInner {
  name: String,
  kind: PoolKind,
}

/// Handle to a ninja pool. Equality is handle identity; ordering is by name.
#[derive(Clone)]
pub struct Pool(Arc<PoolInner>);

impl Pool {
  pub fn new_static(name: impl Into<String>, params: PoolParams) -> Self {
    Self::with_kind(name, PoolKind::Static(params))
  }

  pub fn new_func<F>(name: impl Into<String>, func: F) -> Self
  where
    F: Fn(&Config) -> Result<PoolParams, ResolveError> + Send + Sync + 'static,
  {
    Self::with_kind(name, PoolKind::Func(Arc::new(func)))
  }

  /// ninja's builtin `console` pool.
  pub fn console() -> Self {
    CONSOLE.clone()
  }

  pub fn with_kind(name: impl Into<String>, kind: PoolKind) -> Self {
    Self(Arc::new(PoolInner {
      name: name.into(),
      kind,
    }))
  }

  pub fn name(&self) -> &str {
    &self.0.name
  }

  pub fn kind(&self) -> &PoolKind {
    &self.0.kind
  }

  pub fn is_builtin(&self) -> bool {
    matches!(self.0.kind, PoolKind::Builtin)
  }
}

impl Resolvable for Pool {
  type Definition = PoolDefinition;

  fn resolve(&self, _ctx: &EvalContext, config: &Config) -> Result<Resolved<PoolDefinition>, ResolveError> {
    match &self.0.kind {
      PoolKind::Static(params) => params.to_definition().map(Resolved::Defined),
      PoolKind::Func(func) => func.params(config)?.to_definition().map(Resolved::Defined),
      PoolKind::Builtin => Ok(Resolved::Builtin),
    }
  }
}

impl PartialEq for Pool {
  fn eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.0, &other.0)
  }
}

impl Eq for Pool {}

impl Hash for Pool {
  fn hash<H: Hasher>(&self, state: &mut H) {
    Arc::as_ptr(&self.0).hash(state);
  }
}

impl PartialOrd for Pool {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Pool {
  fn cmp(&self, other: &Self) -> Ordering {
    self
      .0
      .name
      .cmp(&other.0.name)
      .then_with(|| Arc::as_ptr(&self.0).cmp(&Arc::as_ptr(&other.0)))
  }
}

impl fmt::Debug for Pool {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Pool").field(&self.0.name).finish()
  }
}

impl fmt::Display for Pool {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0.name)
  }
}

impl Serialize for Pool {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.0.name)
  }
}
