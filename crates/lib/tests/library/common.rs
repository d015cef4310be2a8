use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ninjagen_lib::config::Config;
use ninjagen_lib::context::{EvalContext, VariableFuncContext};
use ninjagen_lib::entity::{Pool, PoolParams, Rule, RuleParams, Variable};
use ninjagen_lib::live::LiveTracker;
use ninjagen_lib::statement::BuildStatement;
use ninjagen_lib::template::LazyTemplate;

pub fn tracker() -> LiveTracker {
  LiveTracker::new(Arc::new(Config::new()), Arc::new(EvalContext::new(".")))
}

/// A variable whose value is `value`, counting every resolve.
pub fn counting_variable(name: &str, value: LazyTemplate, calls: &Arc<AtomicUsize>) -> Variable {
  let calls = calls.clone();
  Variable::new_func(name, move |_ctx: &VariableFuncContext<'_>, _config: &Config| {
    calls.fetch_add(1, Ordering::SeqCst);
    // Widen the window in which another thread could race this resolve.
    std::thread::yield_now();
    Ok(value.clone())
  })
}

pub fn counting_pool(name: &str, calls: &Arc<AtomicUsize>) -> Pool {
  let calls = calls.clone();
  Pool::new_func(name, move |_config: &Config| {
    calls.fetch_add(1, Ordering::SeqCst);
    Ok(PoolParams::new(4))
  })
}

pub fn counting_rule(name: &str, params: RuleParams, calls: &Arc<AtomicUsize>) -> Rule {
  let calls = calls.clone();
  Rule::new_func(name, move |_config: &Config| {
    calls.fetch_add(1, Ordering::SeqCst);
    Ok(params.clone())
  })
}

/// Templates referencing `vars` in order, separated by spaces.
pub fn refs(vars: &[&Variable]) -> LazyTemplate {
  let scope = vars
    .iter()
    .map(|v| (v.name().to_string(), (*v).clone()))
    .collect::<std::collections::BTreeMap<_, _>>();
  let text = vars.iter().map(|v| format!("${}", v.name())).collect::<Vec<_>>().join(" ");
  LazyTemplate::parse(&text, &scope).unwrap()
}

pub fn statement(rule: &Rule, output: &str, input: LazyTemplate) -> BuildStatement {
  BuildStatement::new(rule.clone())
    .output(LazyTemplate::literal(output))
    .input(input)
}
