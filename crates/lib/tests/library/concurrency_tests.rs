use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ninjagen_lib::config::Config;
use ninjagen_lib::context::VariableFuncContext;
use ninjagen_lib::entity::{ResolveError, RuleParams, Variable};
use ninjagen_lib::live::{LiveError, LiveStats};
use ninjagen_lib::statement::BuildStatement;
use ninjagen_lib::template::LazyTemplate;

use super::common::{counting_pool, counting_rule, counting_variable, refs, statement, tracker};

const THREADS: usize = 8;
const STATEMENTS: usize = 64;

fn submit_on_threads(tracker: &ninjagen_lib::live::LiveTracker, statements: &[BuildStatement]) {
  std::thread::scope(|s| {
    for chunk in statements.chunks(STATEMENTS / THREADS) {
      s.spawn(move || {
        for stmt in chunk {
          tracker.add_statement_dependencies(stmt).unwrap();
        }
      });
    }
  });
}

#[test]
fn shared_entities_resolve_once_under_contention() {
  let var_calls = Arc::new(AtomicUsize::new(0));
  let rule_calls = Arc::new(AtomicUsize::new(0));
  let pool_calls = Arc::new(AtomicUsize::new(0));

  let leaf = counting_variable("leaf", LazyTemplate::literal("x"), &var_calls);
  let mid = counting_variable("mid", refs(&[&leaf]), &var_calls);
  let pool = counting_pool("jobs", &pool_calls);
  let rule = counting_rule("cc", RuleParams::new(refs(&[&mid])).with_pool(pool), &rule_calls);

  let statements: Vec<_> = (0..STATEMENTS)
    .map(|i| statement(&rule, &format!("out{i}"), refs(&[&mid, &leaf])))
    .collect();

  let tracker = tracker();
  submit_on_threads(&tracker, &statements);

  assert_eq!(var_calls.load(Ordering::SeqCst), 2);
  assert_eq!(rule_calls.load(Ordering::SeqCst), 1);
  assert_eq!(pool_calls.load(Ordering::SeqCst), 1);
  assert_eq!(
    tracker.stats(),
    LiveStats {
      variables: 2,
      rules: 1,
      pools: 1
    }
  );
}

#[test]
fn concurrent_submission_matches_sequential() {
  let calls = Arc::new(AtomicUsize::new(0));
  let vars: Vec<Variable> = (0..16)
    .map(|i| counting_variable(&format!("v{i}"), LazyTemplate::literal(format!("value{i}")), &calls))
    .collect();
  let rule = counting_rule("cc", RuleParams::new(LazyTemplate::literal("cc")), &calls);

  let statements: Vec<_> = (0..STATEMENTS)
    .map(|i| {
      let a = &vars[i % vars.len()];
      let b = &vars[(i * 7) % vars.len()];
      statement(&rule, &format!("out{i}"), refs(&[a, b]))
    })
    .collect();

  let sequential = tracker();
  for stmt in &statements {
    sequential.add_statement_dependencies(stmt).unwrap();
  }

  let mut reversed = statements.clone();
  reversed.reverse();
  let concurrent = tracker();
  submit_on_threads(&concurrent, &reversed);

  assert_eq!(sequential.snapshot(), concurrent.snapshot());
}

#[test]
fn expansion_after_add_sees_dependencies() {
  let calls = Arc::new(AtomicUsize::new(0));
  let base = counting_variable("base", LazyTemplate::literal("gen"), &calls);
  let dir = counting_variable("dir", refs(&[&base]), &calls);
  let rule = counting_rule("cc", RuleParams::new(LazyTemplate::literal("cc")), &calls);
  let tracker = tracker();

  std::thread::scope(|s| {
    for i in 0..THREADS {
      let (tracker, dir, rule) = (&tracker, &dir, &rule);
      s.spawn(move || {
        let stmt = statement(rule, &format!("out{i}"), refs(&[dir]));
        tracker.add_statement_dependencies(&stmt).unwrap();
        assert_eq!(tracker.expand(&stmt.inputs[0]).unwrap(), "gen");
      });
    }
  });
}

#[test]
fn failures_are_retried_and_partial_progress_kept() {
  let good_calls = Arc::new(AtomicUsize::new(0));
  let bad_calls = Arc::new(AtomicUsize::new(0));
  let rule_calls = Arc::new(AtomicUsize::new(0));

  let good = counting_variable("good", LazyTemplate::literal("ok"), &good_calls);
  let bad = {
    let calls = bad_calls.clone();
    Variable::new_func("bad", move |_ctx: &VariableFuncContext<'_>, _config: &Config| {
      calls.fetch_add(1, Ordering::SeqCst);
      Err(ResolveError::message("no value"))
    })
  };
  let rule = counting_rule("cc", RuleParams::new(LazyTemplate::literal("cc")), &rule_calls);
  let tracker = tracker();

  std::thread::scope(|s| {
    for i in 0..THREADS {
      let (tracker, good, bad, rule) = (&tracker, &good, &bad, &rule);
      s.spawn(move || {
        let stmt = statement(rule, &format!("out{i}"), refs(&[good, bad]));
        let err = tracker.add_statement_dependencies(&stmt).unwrap_err();
        assert!(matches!(err, LiveError::Variable { ref name, .. } if name == "bad"));
      });
    }
  });

  assert_eq!(bad_calls.load(Ordering::SeqCst), THREADS);
  assert_eq!(good_calls.load(Ordering::SeqCst), 1);
  assert_eq!(rule_calls.load(Ordering::SeqCst), 1);
  assert!(tracker.is_variable_live(&good));
  assert!(!tracker.is_variable_live(&bad));
}
