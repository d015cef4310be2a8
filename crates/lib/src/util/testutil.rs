//! Test utilities for ninjagen-lib.
//!
//! Entity doubles that count how often they are resolved, so tests can assert
//! the tracker's at-most-once guarantee.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use crate::config::Config;
use crate::context::{EvalContext, VariableFuncContext};
use crate::entity::{Pool, PoolParams, ResolveError, Rule, RuleParams, Variable};
use crate::live::LiveTracker;
use crate::template::LazyTemplate;

/// A tracker with an empty config rooted at the current directory.
pub fn tracker() -> LiveTracker {
  LiveTracker::new(Arc::new(Config::new()), Arc::new(EvalContext::new(".")))
}

/// Parse `text` with `vars` in scope.
pub fn tpl(text: &str, vars: &[&Variable]) -> LazyTemplate {
  let scope: BTreeMap<String, Variable> = vars.iter().map(|v| (v.name().to_string(), (*v).clone())).collect();
  LazyTemplate::parse(text, &scope).unwrap_or_else(|e| panic!("bad template {:?}: {}", text, e))
}

/// A variable that returns `value` and counts its resolutions.
pub fn counting_variable(name: &str, value: LazyTemplate) -> (Variable, Arc<AtomicUsize>) {
  let calls = Arc::new(AtomicUsize::new(0));
  let counter = calls.clone();
  let v = Variable::new_func(name, move |_ctx: &VariableFuncContext<'_>, _config: &Config| {
    counter.fetch_add(1, Ordering::SeqCst);
    Ok(value.clone())
  });
  (v, calls)
}

/// A variable whose first resolution fails and later ones succeed.
pub fn flaky_variable(name: &str, value: LazyTemplate) -> (Variable, Arc<AtomicUsize>) {
  let calls = Arc::new(AtomicUsize::new(0));
  let counter = calls.clone();
  let v = Variable::new_func(name, move |_ctx: &VariableFuncContext<'_>, _config: &Config| {
    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
      return Err(ResolveError::message("transient failure"));
    }
    Ok(value.clone())
  });
  (v, calls)
}

/// A variable that appends its name to `log` when resolved.
pub fn recording_variable(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Variable {
  let log = log.clone();
  let recorded = name.to_string();
  Variable::new_func(name, move |_ctx: &VariableFuncContext<'_>, _config: &Config| {
    log.lock().unwrap().push(recorded.clone());
    Ok(LazyTemplate::literal(recorded.clone()))
  })
}

/// Two variables whose values reference each other.
pub fn cyclic_variables(a: &str, b: &str) -> (Variable, Variable) {
  let scope: Arc<OnceLock<BTreeMap<String, Variable>>> = Arc::new(OnceLock::new());
  let make = |name: &str, target: &str| {
    let scope = scope.clone();
    let text = format!("${target}");
    Variable::new_func(name, move |_ctx: &VariableFuncContext<'_>, _config: &Config| {
      let scope = scope.get().ok_or_else(|| ResolveError::message("scope not ready"))?;
      Ok(LazyTemplate::parse(&text, scope)?)
    })
  };
  let va = make(a, b);
  let vb = make(b, a);
  let _ = scope.set(BTreeMap::from([
    (a.to_string(), va.clone()),
    (b.to_string(), vb.clone()),
  ]));
  (va, vb)
}

/// A rule that returns `params` and counts its resolutions.
pub fn counting_rule(name: &str, params: RuleParams) -> (Rule, Arc<AtomicUsize>) {
  let calls = Arc::new(AtomicUsize::new(0));
  let counter = calls.clone();
  let r = Rule::new_func(name, move |_config: &Config| {
    counter.fetch_add(1, Ordering::SeqCst);
    Ok(params.clone())
  });
  (r, calls)
}

/// A pool of the given depth that counts its resolutions.
pub fn counting_pool(name: &str, depth: u32) -> (Pool, Arc<AtomicUsize>) {
  let calls = Arc::new(AtomicUsize::new(0));
  let counter = calls.clone();
  let p = Pool::new_func(name, move |_config: &Config| {
    counter.fetch_add(1, Ordering::SeqCst);
    Ok(PoolParams::new(depth))
  });
  (p, calls)
}
