//! Liveness tracking for variables, rules and pools.
//!
//! An entity becomes live when a submitted build statement references it,
//! directly or through another live entity. Becoming live evaluates the
//! entity against the run's configuration exactly once; the result is
//! memoized for later expansion.
//!
//! All state sits behind a single lock held for the full duration of every
//! public operation, recursive walks included. Callers may submit statements
//! from many threads, but resolution itself is serialized, which is what
//! guarantees each entity's resolve (and any glob it performs) runs at most
//! once per tracker.
//!
//! Retraction is unconditional: removing an entity does not check whether
//! another live statement still needs it. Callers that retract must do their
//! own reference accounting.

mod types;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, trace};

use crate::config::Config;
use crate::context::EvalContext;
use crate::entity::{Pool, PoolDefinition, Resolvable, Resolved, Rule, RuleDefinition, Variable, VariableValue};
use crate::statement::BuildStatement;
use crate::template::LazyTemplate;

pub use types::{LiveError, LiveSnapshot, LiveStats};

#[derive(Default)]
struct LiveState {
  variables: HashMap<Variable, VariableValue>,
  rules: HashMap<Rule, Arc<RuleDefinition>>,
  pools: HashMap<Pool, Arc<PoolDefinition>>,

  // Entities that resolved to Builtin/Argument. Never part of the live sets;
  // kept so their resolve is not repeated either.
  builtin_rules: HashSet<Rule>,
  builtin_pools: HashSet<Pool>,
  arguments: HashSet<Variable>,

  // Variables whose dependencies are currently being walked.
  resolving: Vec<Variable>,
}

/// Tracks live entities for one generation run.
pub struct LiveTracker {
  config: Arc<Config>,
  ctx: Arc<EvalContext>,
  state: Mutex<LiveState>,
}

impl LiveTracker {
  pub fn new(config: Arc<Config>, ctx: Arc<EvalContext>) -> Self {
    Self {
      config,
      ctx,
      state: Mutex::new(LiveState::default()),
    }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn context(&self) -> &EvalContext {
    &self.ctx
  }

  // The live sets are only changed by idempotent inserts and removes, so a
  // panic inside a resolve cannot leave them half-updated.
  fn lock(&self) -> MutexGuard<'_, LiveState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn with_walker<T>(&self, f: impl FnOnce(&mut Walker<'_>) -> T) -> T {
    let mut state = self.lock();
    let mut walker = Walker {
      config: &self.config,
      ctx: &self.ctx,
      state: &mut *state,
    };
    f(&mut walker)
  }

  /// Make everything `stmt` references live.
  ///
  /// Walks the rule, then outputs, implicit outputs, inputs, implicits,
  /// order-only inputs, validations, local variables and argument bindings.
  /// Returns the rule's definition (`None` for builtin rules).
  ///
  /// # Errors
  ///
  /// Stops at the first resolution failure. Entities resolved before the
  /// failure stay live.
  pub fn add_statement_dependencies(&self, stmt: &BuildStatement) -> Result<Option<Arc<RuleDefinition>>, LiveError> {
    self.with_walker(|w| {
      let rule_def = w.add_rule(&stmt.rule)?;
      w.add_templates(&stmt.outputs)?;
      w.add_templates(&stmt.implicit_outputs)?;
      w.add_templates(&stmt.inputs)?;
      w.add_templates(&stmt.implicits)?;
      w.add_templates(&stmt.order_only)?;
      w.add_templates(&stmt.validations)?;
      for value in stmt.variables.values() {
        w.add_template(value)?;
      }
      for value in stmt.args.values() {
        w.add_template(value)?;
      }
      Ok(rule_def)
    })
  }

  pub fn add_variable(&self, v: &Variable) -> Result<(), LiveError> {
    self.with_walker(|w| w.add_variable(v))
  }

  pub fn add_rule(&self, r: &Rule) -> Result<Option<Arc<RuleDefinition>>, LiveError> {
    self.with_walker(|w| w.add_rule(r))
  }

  pub fn add_pool(&self, p: &Pool) -> Result<(), LiveError> {
    self.with_walker(|w| w.add_pool(p))
  }

  pub fn add_template_dependencies(&self, templates: &[LazyTemplate]) -> Result<(), LiveError> {
    self.with_walker(|w| w.add_templates(templates))
  }

  pub fn add_template_dependency(&self, template: &LazyTemplate) -> Result<(), LiveError> {
    self.with_walker(|w| w.add_template(template))
  }

  /// Expand `template` with the current live variable values.
  ///
  /// # Errors
  ///
  /// Fails if the template references a variable that is not live (never
  /// added, or retracted since).
  pub fn expand(&self, template: &LazyTemplate) -> Result<String, LiveError> {
    let state = self.lock();
    Ok(template.expand(&state.variables)?)
  }

  /// Remove `v` from the live set. Returns whether it was live.
  ///
  /// Nothing `v` depends on is removed, and nothing checks whether other live
  /// entities still reference `v`.
  pub fn remove_variable_if_live(&self, v: &Variable) -> bool {
    let removed = self.lock().variables.remove(v).is_some();
    if removed {
      debug!(variable = %v, "retracted variable");
    }
    removed
  }

  /// Remove `r` from the live set. Returns whether it was live.
  pub fn remove_rule_if_live(&self, r: &Rule) -> bool {
    let removed = self.lock().rules.remove(r).is_some();
    if removed {
      debug!(rule = %r, "retracted rule");
    }
    removed
  }

  pub fn variable_value(&self, v: &Variable) -> Option<VariableValue> {
    self.lock().variables.get(v).cloned()
  }

  pub fn rule_definition(&self, r: &Rule) -> Option<Arc<RuleDefinition>> {
    self.lock().rules.get(r).cloned()
  }

  pub fn pool_definition(&self, p: &Pool) -> Option<Arc<PoolDefinition>> {
    self.lock().pools.get(p).cloned()
  }

  pub fn is_variable_live(&self, v: &Variable) -> bool {
    self.lock().variables.contains_key(v)
  }

  pub fn is_rule_live(&self, r: &Rule) -> bool {
    self.lock().rules.contains_key(r)
  }

  pub fn is_pool_live(&self, p: &Pool) -> bool {
    self.lock().pools.contains_key(p)
  }

  /// Copy the live sets, ordered by name.
  pub fn snapshot(&self) -> LiveSnapshot {
    let state = self.lock();
    LiveSnapshot {
      variables: state.variables.iter().map(|(v, value)| (v.clone(), value.clone())).collect(),
      rules: state.rules.iter().map(|(r, def)| (r.clone(), def.as_ref().clone())).collect(),
      pools: state.pools.iter().map(|(p, def)| (p.clone(), def.as_ref().clone())).collect(),
    }
  }

  pub fn stats(&self) -> LiveStats {
    let state = self.lock();
    LiveStats {
      variables: state.variables.len(),
      rules: state.rules.len(),
      pools: state.pools.len(),
    }
  }
}

/// Recursive closure computation over locked state.
struct Walker<'a> {
  config: &'a Config,
  ctx: &'a EvalContext,
  state: &'a mut LiveState,
}

impl Walker<'_> {
  fn add_rule(&mut self, r: &Rule) -> Result<Option<Arc<RuleDefinition>>, LiveError> {
    if let Some(def) = self.state.rules.get(r) {
      trace!(rule = %r, "rule already live");
      return Ok(Some(def.clone()));
    }
    if self.state.builtin_rules.contains(r) {
      return Ok(None);
    }

    debug!(rule = %r, "resolving rule");
    let resolved = r.resolve(self.ctx, self.config).map_err(|source| LiveError::Rule {
      name: r.name().to_string(),
      source,
    })?;
    let def = match resolved {
      Resolved::Defined(def) => Arc::new(def),
      Resolved::Builtin | Resolved::Argument => {
        self.state.builtin_rules.insert(r.clone());
        return Ok(None);
      }
    };
    self.state.rules.insert(r.clone(), def.clone());

    if let Some(pool) = &def.pool {
      self.add_pool(pool)?;
    }
    for template in def.templates() {
      self.add_template(template)?;
    }
    Ok(Some(def))
  }

  fn add_pool(&mut self, p: &Pool) -> Result<(), LiveError> {
    if self.state.pools.contains_key(p) || self.state.builtin_pools.contains(p) {
      trace!(pool = %p, "pool already live");
      return Ok(());
    }

    debug!(pool = %p, "resolving pool");
    let resolved = p.resolve(self.ctx, self.config).map_err(|source| LiveError::Pool {
      name: p.name().to_string(),
      source,
    })?;
    match resolved {
      Resolved::Defined(def) => {
        self.state.pools.insert(p.clone(), Arc::new(def));
      }
      Resolved::Builtin | Resolved::Argument => {
        self.state.builtin_pools.insert(p.clone());
      }
    }
    Ok(())
  }

  fn add_variable(&mut self, v: &Variable) -> Result<(), LiveError> {
    if let Some(start) = self.state.resolving.iter().position(|r| r == v) {
      let mut chain: Vec<String> = self.state.resolving[start..]
        .iter()
        .map(|r| r.name().to_string())
        .collect();
      chain.push(v.name().to_string());
      return Err(LiveError::Cycle { chain });
    }
    if self.state.variables.contains_key(v) || self.state.arguments.contains(v) {
      trace!(variable = %v, "variable already live");
      return Ok(());
    }

    debug!(variable = %v, "resolving variable");
    let resolved = v.resolve(self.ctx, self.config).map_err(|source| LiveError::Variable {
      name: v.name().to_string(),
      source,
    })?;
    let value = match resolved {
      Resolved::Defined(value) => value,
      Resolved::Builtin | Resolved::Argument => {
        self.state.arguments.insert(v.clone());
        return Ok(());
      }
    };
    self.state.variables.insert(v.clone(), value.clone());

    self.state.resolving.push(v.clone());
    let result = self.add_template(&value);
    self.state.resolving.pop();
    result
  }

  fn add_templates(&mut self, templates: &[LazyTemplate]) -> Result<(), LiveError> {
    for template in templates {
      self.add_template(template)?;
    }
    Ok(())
  }

  fn add_template(&mut self, template: &LazyTemplate) -> Result<(), LiveError> {
    for v in template.referenced_variables() {
      self.add_variable(&v)?;
    }
    Ok(())
  }
}
