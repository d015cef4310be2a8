//! The resolution capability shared by all entity kinds.

use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::context::{EvalContext, GlobError};
use crate::template::TemplateError;

/// Outcome of resolving an entity against a configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<T> {
  /// The entity has a definition that must be tracked.
  Defined(T),

  /// The entity is provided natively by ninja (`phony`, `console`).
  Builtin,

  /// The variable is a rule argument placeholder with no value of its own.
  Argument,
}

impl<T> Resolved<T> {
  pub fn into_defined(self) -> Option<T> {
    match self {
      Resolved::Defined(def) => Some(def),
      Resolved::Builtin | Resolved::Argument => None,
    }
  }
}

/// Failure internal to a single entity's resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
  #[error("{0}")]
  Message(String),

  #[error("config error: {0}")]
  Config(#[from] ConfigError),

  #[error("glob error: {0}")]
  Glob(#[from] GlobError),

  #[error("invalid template: {0}")]
  Template(#[from] TemplateError),

  #[error("invalid rule: {0}")]
  InvalidRule(String),

  #[error("invalid pool depth {0}: must be greater than zero")]
  InvalidPoolDepth(u32),
}

impl ResolveError {
  pub fn message(message: impl Into<String>) -> Self {
    ResolveError::Message(message.into())
  }
}

/// An entity that can compute its own definition.
///
/// Implementations must be idempotent: the live tracker calls `resolve` at
/// most once per entity and tracker, but a failed call is retried by the next
/// add operation that reaches the entity.
pub trait Resolvable {
  type Definition;

  fn resolve(&self, ctx: &EvalContext, config: &Config) -> Result<Resolved<Self::Definition>, ResolveError>;
}
