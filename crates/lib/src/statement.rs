//! Build statements: one `build` line of the generated ninja file.

use std::collections::BTreeMap;

use crate::entity::{Rule, Variable};
use crate::template::LazyTemplate;

/// A single build-graph node.
///
/// Field order is also the order in which the live tracker walks a statement:
/// rule, outputs, implicit outputs, inputs, implicits, order-only,
/// validations, local variables, arguments.
#[derive(Debug, Clone)]
pub struct BuildStatement {
  pub rule: Rule,
  pub outputs: Vec<LazyTemplate>,
  pub implicit_outputs: Vec<LazyTemplate>,
  pub inputs: Vec<LazyTemplate>,
  pub implicits: Vec<LazyTemplate>,
  pub order_only: Vec<LazyTemplate>,
  pub validations: Vec<LazyTemplate>,
  /// Build-scoped variable overrides, written under the build line.
  pub variables: BTreeMap<String, LazyTemplate>,
  /// Values bound to the rule's argument placeholders.
  pub args: BTreeMap<Variable, LazyTemplate>,
  /// Emit the outputs as `default` targets.
  pub default: bool,
}

impl BuildStatement {
  pub fn new(rule: Rule) -> Self {
    Self {
      rule,
      outputs: Vec::new(),
      implicit_outputs: Vec::new(),
      inputs: Vec::new(),
      implicits: Vec::new(),
      order_only: Vec::new(),
      validations: Vec::new(),
      variables: BTreeMap::new(),
      args: BTreeMap::new(),
      default: false,
    }
  }

  pub fn output(mut self, output: LazyTemplate) -> Self {
    self.outputs.push(output);
    self
  }

  pub fn implicit_output(mut self, output: LazyTemplate) -> Self {
    self.implicit_outputs.push(output);
    self
  }

  pub fn input(mut self, input: LazyTemplate) -> Self {
    self.inputs.push(input);
    self
  }

  pub fn implicit(mut self, input: LazyTemplate) -> Self {
    self.implicits.push(input);
    self
  }

  pub fn order_only(mut self, input: LazyTemplate) -> Self {
    self.order_only.push(input);
    self
  }

  pub fn validation(mut self, input: LazyTemplate) -> Self {
    self.validations.push(input);
    self
  }

  pub fn variable(mut self, name: impl Into<String>, value: LazyTemplate) -> Self {
    self.variables.insert(name.into(), value);
    self
  }

  pub fn arg(mut self, arg: Variable, value: LazyTemplate) -> Self {
    self.args.insert(arg, value);
    self
  }

  pub fn as_default(mut self) -> Self {
    self.default = true;
    self
  }

  /// Every template of the statement, in walk order.
  pub fn templates(&self) -> impl Iterator<Item = &LazyTemplate> {
    self
      .outputs
      .iter()
      .chain(&self.implicit_outputs)
      .chain(&self.inputs)
      .chain(&self.implicits)
      .chain(&self.order_only)
      .chain(&self.validations)
      .chain(self.variables.values())
      .chain(self.args.values())
  }

  /// Distinct variables referenced directly by the statement's templates.
  pub fn referenced_variables(&self) -> Vec<Variable> {
    let mut seen = Vec::new();
    for template in self.templates() {
      for v in template.referenced_variables() {
        if !seen.contains(&v) {
          seen.push(v);
        }
      }
    }
    seen
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn templates_follow_walk_order() {
    let stmt = BuildStatement::new(Rule::phony())
      .validation(LazyTemplate::literal("v"))
      .input(LazyTemplate::literal("i"))
      .output(LazyTemplate::literal("o"))
      .arg(Variable::argument("flag"), LazyTemplate::literal("a"))
      .variable("local", LazyTemplate::literal("l"))
      .order_only(LazyTemplate::literal("oo"))
      .implicit(LazyTemplate::literal("imp"))
      .implicit_output(LazyTemplate::literal("io"));

    let order: Vec<String> = stmt.templates().map(|t| t.to_string()).collect();
    assert_eq!(order, vec!["o", "io", "i", "imp", "oo", "v", "l", "a"]);
  }

  #[test]
  fn referenced_variables_are_deduplicated() {
    let dir = Variable::new_static("dir", LazyTemplate::literal("out"));
    let scope = BTreeMap::from([("dir".to_string(), dir.clone())]);
    let stmt = BuildStatement::new(Rule::phony())
      .output(LazyTemplate::parse("$dir/a", &scope).unwrap())
      .input(LazyTemplate::parse("$dir/b", &scope).unwrap());

    assert_eq!(stmt.referenced_variables(), vec![dir]);
  }
}
