//! Error and report types for the live tracker.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::entity::{Pool, PoolDefinition, ResolveError, Rule, RuleDefinition, Variable, VariableValue};
use crate::template::TemplateError;

/// Errors surfaced by live tracker operations.
#[derive(Debug, Error)]
pub enum LiveError {
  /// A variable's own resolution failed.
  #[error("failed to resolve variable '{name}': {source}")]
  Variable {
    name: String,
    #[source]
    source: ResolveError,
  },

  /// A rule's own resolution failed.
  #[error("failed to resolve rule '{name}': {source}")]
  Rule {
    name: String,
    #[source]
    source: ResolveError,
  },

  /// A pool's own resolution failed.
  #[error("failed to resolve pool '{name}': {source}")]
  Pool {
    name: String,
    #[source]
    source: ResolveError,
  },

  /// A variable was reached again while its own dependencies were being added.
  #[error("variable reference cycle: {}", chain.join(" -> "))]
  Cycle { chain: Vec<String> },

  /// Expansion referenced a variable that is not live.
  #[error("failed to expand template: {0}")]
  Expand(#[from] TemplateError),
}

impl LiveError {
  /// The entity-level failure, if this error came from a Resolve call.
  pub fn resolve_error(&self) -> Option<&ResolveError> {
    match self {
      LiveError::Variable { source, .. } | LiveError::Rule { source, .. } | LiveError::Pool { source, .. } => {
        Some(source)
      }
      LiveError::Cycle { .. } | LiveError::Expand(_) => None,
    }
  }
}

/// Ordered copy of the live sets at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LiveSnapshot {
  pub variables: BTreeMap<Variable, VariableValue>,
  pub rules: BTreeMap<Rule, RuleDefinition>,
  pub pools: BTreeMap<Pool, PoolDefinition>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LiveStats {
  pub variables: usize,
  pub rules: usize,
  pub pools: usize,
}
