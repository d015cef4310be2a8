//! Turning a [`Manifest`] into entity handles.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::config::{Config, ConfigError};
use crate::context::VariableFuncContext;
use crate::entity::{Pool, PoolParams, Rule, RuleParams, Variable};
use crate::statement::BuildStatement;
use crate::template::{LazyTemplate, ScopeChain, TemplateError, VariableLookup};

use super::types::{BuildDecl, Manifest, RuleDecl, VariableDecl};

#[derive(Debug, Error)]
pub enum ManifestError {
  #[error("failed to read manifest {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse manifest: {0}")]
  Parse(#[from] toml::de::Error),

  #[error("invalid template: {0}")]
  Template(#[from] TemplateError),

  #[error("in variable '{name}': {source}")]
  InVariable {
    name: String,
    #[source]
    source: Box<ManifestError>,
  },

  #[error("in rule '{name}': {source}")]
  InRule {
    name: String,
    #[source]
    source: Box<ManifestError>,
  },

  #[error("in build #{index}: {source}")]
  InBuild {
    index: usize,
    #[source]
    source: Box<ManifestError>,
  },

  #[error("variable reference cycle: {}", .0.join(" -> "))]
  VariableCycle(Vec<String>),

  #[error("unknown rule '{0}'")]
  UnknownRule(String),

  #[error("unknown pool '{0}'")]
  UnknownPool(String),

  #[error("'{0}' is not an argument of the rule")]
  UnknownArgument(String),

  #[error("'{0}' is a reserved name")]
  ReservedName(String),

  #[error("argument '{0}' shadows a global variable")]
  ArgumentShadowsVariable(String),

  #[error("build statement has no outputs")]
  NoOutputs,
}

/// The handles and statements declared by one manifest.
#[derive(Debug, Clone, Default)]
pub struct Package {
  variables: BTreeMap<String, Variable>,
  rules: BTreeMap<String, Rule>,
  /// Declared argument placeholders per rule, shared by the rule's templates
  /// and every build binding them.
  rule_args: BTreeMap<String, BTreeMap<String, Variable>>,
  pools: BTreeMap<String, Pool>,
  statements: Vec<BuildStatement>,
}

impl Package {
  pub fn load(path: &Path) -> Result<Self, ManifestError> {
    Self::from_manifest(&Manifest::load(path)?)
  }

  /// Create handles for every declaration and parse every template.
  ///
  /// Global variables may reference each other in any order; a reference
  /// cycle between static declarations is an error.
  pub fn from_manifest(manifest: &Manifest) -> Result<Self, ManifestError> {
    let variables = VariableBuilder::new(&manifest.variables).build_all()?;

    let mut pools = BTreeMap::new();
    for (name, decl) in &manifest.pools {
      if name == "console" {
        return Err(ManifestError::ReservedName(name.clone()));
      }
      let params = PoolParams {
        depth: decl.depth,
        comment: decl.comment.clone(),
      };
      pools.insert(name.clone(), Pool::new_static(name, params));
    }

    let mut rules = BTreeMap::new();
    let mut rule_args = BTreeMap::new();
    for (name, decl) in &manifest.rules {
      let (rule, args) = load_rule(name, decl, &variables, &pools).map_err(|e| ManifestError::InRule {
        name: name.clone(),
        source: Box::new(e),
      })?;
      rules.insert(name.clone(), rule);
      rule_args.insert(name.clone(), args);
    }

    let mut statements = Vec::with_capacity(manifest.builds.len());
    for (index, decl) in manifest.builds.iter().enumerate() {
      let stmt = load_build(decl, &variables, &rules, &rule_args).map_err(|e| ManifestError::InBuild {
        index,
        source: Box::new(e),
      })?;
      statements.push(stmt);
    }

    debug!(
      variables = variables.len(),
      pools = pools.len(),
      rules = rules.len(),
      builds = statements.len(),
      "loaded manifest"
    );

    Ok(Self {
      variables,
      rules,
      rule_args,
      pools,
      statements,
    })
  }

  pub fn variable(&self, name: &str) -> Option<&Variable> {
    self.variables.get(name)
  }

  pub fn rule(&self, name: &str) -> Option<&Rule> {
    self.rules.get(name)
  }

  /// The placeholder handle for argument `arg` of rule `rule`.
  pub fn rule_argument(&self, rule: &str, arg: &str) -> Option<&Variable> {
    self.rule_args.get(rule)?.get(arg)
  }

  pub fn pool(&self, name: &str) -> Option<&Pool> {
    self.pools.get(name)
  }

  pub fn variables(&self) -> impl Iterator<Item = &Variable> {
    self.variables.values()
  }

  pub fn statements(&self) -> &[BuildStatement] {
    &self.statements
  }
}

/// Templates parsed against a package see its global variables.
impl VariableLookup for Package {
  fn lookup(&self, name: &str) -> Option<Variable> {
    self.variables.get(name).cloned()
  }
}

/// Defines global variables in dependency order, so that every static
/// template holds handles to fully defined variables.
struct VariableBuilder<'m> {
  decls: &'m BTreeMap<String, VariableDecl>,
  defined: BTreeMap<String, Variable>,
  visiting: Vec<String>,
}

impl<'m> VariableBuilder<'m> {
  fn new(decls: &'m BTreeMap<String, VariableDecl>) -> Self {
    Self {
      decls,
      defined: BTreeMap::new(),
      visiting: Vec::new(),
    }
  }

  fn build_all(mut self) -> Result<BTreeMap<String, Variable>, ManifestError> {
    let decls = self.decls;
    for name in decls.keys() {
      self.define(name)?;
    }
    Ok(self.defined)
  }

  fn define(&mut self, name: &str) -> Result<Variable, ManifestError> {
    if let Some(v) = self.defined.get(name) {
      return Ok(v.clone());
    }
    if let Some(start) = self.visiting.iter().position(|n| n == name) {
      let mut chain = self.visiting[start..].to_vec();
      chain.push(name.to_string());
      return Err(ManifestError::VariableCycle(chain));
    }
    if name == "in" || name == "out" {
      return Err(ManifestError::ReservedName(name.to_string()));
    }

    let decls = self.decls;
    let decl = decls
      .get(name)
      .ok_or_else(|| TemplateError::UndefinedVariable(name.to_string()))?;

    self.visiting.push(name.to_string());
    let result = self.build(name, decl);
    self.visiting.pop();

    let v = match result {
      Ok(v) => v,
      Err(e @ (ManifestError::VariableCycle(_) | ManifestError::InVariable { .. })) => return Err(e),
      Err(e) => {
        return Err(ManifestError::InVariable {
          name: name.to_string(),
          source: Box::new(e),
        });
      }
    };
    self.defined.insert(name.to_string(), v.clone());
    Ok(v)
  }

  fn build(&mut self, name: &str, decl: &'m VariableDecl) -> Result<Variable, ManifestError> {
    match decl {
      VariableDecl::Value(text) => Ok(Variable::new_static(name, self.parse(text)?)),
      VariableDecl::Config { config: key, default } => {
        let default = default.as_deref().map(|text| self.parse(text)).transpose()?;
        let key = key.clone();
        Ok(Variable::new_func(
          name,
          move |_ctx: &VariableFuncContext<'_>, config: &Config| match config.get(&key) {
            Some(value) => Ok(LazyTemplate::literal(value.to_string())),
            None => default.clone().ok_or_else(|| ConfigError::Missing(key.clone()).into()),
          },
        ))
      }
      VariableDecl::Glob { glob, exclude } => {
        let pattern = glob.clone();
        let excludes = exclude.clone();
        Ok(Variable::new_func(
          name,
          move |ctx: &VariableFuncContext<'_>, _config: &Config| {
            let matches = ctx.glob(&pattern, &excludes)?;
            Ok(LazyTemplate::literal(matches.join(" ")))
          },
        ))
      }
    }
  }

  fn parse(&mut self, text: &str) -> Result<LazyTemplate, ManifestError> {
    LazyTemplate::parse_with(text, |name| self.define(name))
  }
}

fn load_rule(
  name: &str,
  decl: &RuleDecl,
  globals: &BTreeMap<String, Variable>,
  pools: &BTreeMap<String, Pool>,
) -> Result<(Rule, BTreeMap<String, Variable>), ManifestError> {
  if name == "phony" {
    return Err(ManifestError::ReservedName(name.to_string()));
  }

  let mut args = BTreeMap::from([
    ("in".to_string(), Variable::input()),
    ("out".to_string(), Variable::output()),
  ]);
  for arg in &decl.args {
    if args.contains_key(arg) {
      return Err(ManifestError::ReservedName(arg.clone()));
    }
    if globals.contains_key(arg) {
      return Err(ManifestError::ArgumentShadowsVariable(arg.clone()));
    }
    args.insert(arg.clone(), Variable::argument(arg));
  }

  let scope = ScopeChain {
    inner: &args,
    outer: globals,
  };
  let parse = |text: &str| LazyTemplate::parse(text, &scope);
  let parse_opt = |text: &Option<String>| text.as_deref().map(|t| parse(t)).transpose();
  let parse_list = |texts: &[String]| texts.iter().map(|t| parse(t)).collect::<Result<Vec<_>, _>>();

  let pool = match decl.pool.as_deref() {
    None => None,
    Some("console") => Some(Pool::console()),
    Some(pool) => Some(
      pools
        .get(pool)
        .cloned()
        .ok_or_else(|| ManifestError::UnknownPool(pool.to_string()))?,
    ),
  };

  let params = RuleParams {
    comment: decl.comment.clone(),
    command: parse(&decl.command)?,
    description: parse_opt(&decl.description)?,
    depfile: parse_opt(&decl.depfile)?,
    deps: decl.deps.clone(),
    rspfile: parse_opt(&decl.rspfile)?,
    rspfile_content: parse_opt(&decl.rspfile_content)?,
    restat: decl.restat,
    generator: decl.generator,
    pool,
    command_deps: parse_list(&decl.command_deps)?,
    command_order_only: parse_list(&decl.command_order_only)?,
    args: decl.args.clone(),
  };
  args.remove("in");
  args.remove("out");
  Ok((Rule::new_static(name, params), args))
}

fn load_build(
  decl: &BuildDecl,
  globals: &BTreeMap<String, Variable>,
  rules: &BTreeMap<String, Rule>,
  rule_args: &BTreeMap<String, BTreeMap<String, Variable>>,
) -> Result<BuildStatement, ManifestError> {
  let no_args = BTreeMap::new();
  let (rule, declared_args) = if decl.rule == "phony" {
    (Rule::phony(), &no_args)
  } else {
    let rule = rules
      .get(&decl.rule)
      .cloned()
      .ok_or_else(|| ManifestError::UnknownRule(decl.rule.clone()))?;
    (rule, rule_args.get(&decl.rule).unwrap_or(&no_args))
  };
  if decl.outputs.is_empty() {
    return Err(ManifestError::NoOutputs);
  }

  let parse = |text: &str| LazyTemplate::parse(text, globals);
  let parse_list = |texts: &[String]| texts.iter().map(|t| parse(t)).collect::<Result<Vec<_>, _>>();

  let mut stmt = BuildStatement::new(rule);
  stmt.outputs = parse_list(&decl.outputs)?;
  stmt.implicit_outputs = parse_list(&decl.implicit_outputs)?;
  stmt.inputs = parse_list(&decl.inputs)?;
  stmt.implicits = parse_list(&decl.implicits)?;
  stmt.order_only = parse_list(&decl.order_only)?;
  stmt.validations = parse_list(&decl.validations)?;
  stmt.default = decl.default;

  for (name, text) in &decl.variables {
    stmt.variables.insert(name.clone(), parse(text)?);
  }
  for (name, text) in &decl.args {
    let arg = declared_args
      .get(name)
      .ok_or_else(|| ManifestError::UnknownArgument(name.clone()))?;
    stmt.args.insert(arg.clone(), parse(text)?);
  }
  Ok(stmt)
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use super::*;
  use crate::context::EvalContext;
  use crate::entity::RuleKind;
  use crate::live::LiveTracker;
  use crate::template::Segment;

  fn load(toml: &str) -> Result<Package, ManifestError> {
    Package::from_manifest(&Manifest::from_toml_str(toml).unwrap())
  }

  #[test]
  fn forward_references_resolve() {
    let package = load(
      r#"
        [variables]
        a = "$z/a"
        z = "root"
      "#,
    )
    .unwrap();

    let a = package.variable("a").unwrap();
    let z = package.variable("z").unwrap();
    match a.kind() {
      crate::entity::VariableKind::Static(value) => {
        assert_eq!(value.segments()[0], Segment::Variable(z.clone()));
      }
      _ => panic!("expected a static variable"),
    }
  }

  #[test]
  fn static_cycle_is_rejected() {
    let err = load(
      r#"
        [variables]
        a = "$b"
        b = "$c"
        c = "$a"
      "#,
    )
    .unwrap_err();

    match err {
      ManifestError::VariableCycle(chain) => assert_eq!(chain, vec!["a", "b", "c", "a"]),
      other => panic!("expected cycle, got {}", other),
    }
  }

  #[test]
  fn undefined_reference_names_the_variable() {
    let err = load("[variables]\na = \"$nope\"\n").unwrap_err();
    assert_eq!(err.to_string(), "in variable 'a': invalid template: undefined variable: nope");
  }

  #[test]
  fn rule_sees_arguments_and_globals() {
    let package = load(
      r#"
        [variables]
        cc = "gcc"

        [pools.link]
        depth = 2

        [rules.cc]
        command = "$cc $flags -c $in -o $out"
        pool = "link"
        args = ["flags"]

        [[builds]]
        rule = "cc"
        outputs = ["a.o"]
        inputs = ["a.c"]
        args = { flags = "-g" }
      "#,
    )
    .unwrap();

    let stmt = &package.statements()[0];
    assert_eq!(stmt.rule, *package.rule("cc").unwrap());
    let flags = package.rule_argument("cc", "flags").unwrap();
    assert_eq!(stmt.args[flags], LazyTemplate::literal("-g"));
    let RuleKind::Static(params) = package.rule("cc").unwrap().kind() else {
      panic!("cc should be a static rule");
    };
    assert!(params.command.referenced_variables().contains(flags));
    assert!(package.pool("link").is_some());
  }

  #[test]
  fn invalid_references_are_reported() {
    let unknown_pool = load("[rules.r]\ncommand = \"x\"\npool = \"nope\"\n").unwrap_err();
    assert!(matches!(
      unknown_pool,
      ManifestError::InRule { ref source, .. } if matches!(**source, ManifestError::UnknownPool(_))
    ));

    let unknown_rule = load("[[builds]]\nrule = \"nope\"\noutputs = [\"x\"]\n").unwrap_err();
    assert!(matches!(
      unknown_rule,
      ManifestError::InBuild { index: 0, ref source } if matches!(**source, ManifestError::UnknownRule(_))
    ));

    let unknown_arg = load("[rules.r]\ncommand = \"x\"\n[[builds]]\nrule = \"r\"\noutputs = [\"x\"]\nargs = { y = \"1\" }\n")
      .unwrap_err();
    assert!(unknown_arg.to_string().contains("not an argument"));

    let shadow = load("[variables]\nflags = \"\"\n[rules.r]\ncommand = \"x\"\nargs = [\"flags\"]\n").unwrap_err();
    assert!(shadow.to_string().contains("shadows"));

    let no_outputs = load("[[builds]]\nrule = \"phony\"\n").unwrap_err();
    assert!(no_outputs.to_string().contains("no outputs"));
  }

  #[test]
  fn config_variable_uses_override_or_default() {
    let package = load(
      r#"
        [variables]
        opt = "O"
        cflags = { config = "cc.flags", default = "-${opt}2" }
      "#,
    )
    .unwrap();
    let cflags = package.variable("cflags").unwrap().clone();
    let template = LazyTemplate::parse("$cflags", &package).unwrap();

    let defaulted = LiveTracker::new(Arc::new(Config::new()), Arc::new(EvalContext::new(".")));
    defaulted.add_variable(&cflags).unwrap();
    assert_eq!(defaulted.expand(&template).unwrap(), "-O2");

    let config = Config::new().set("cc.flags", vec!["-O3".to_string(), "-g".to_string()]);
    let configured = LiveTracker::new(Arc::new(config), Arc::new(EvalContext::new(".")));
    configured.add_variable(&cflags).unwrap();
    assert_eq!(configured.expand(&template).unwrap(), "-O3 -g");
  }

  #[test]
  fn config_variable_without_default_requires_key() {
    let package = load("[variables]\ntarget = { config = \"target\" }\n").unwrap();
    let tracker = LiveTracker::new(Arc::new(Config::new()), Arc::new(EvalContext::new(".")));

    let err = tracker.add_variable(package.variable("target").unwrap()).unwrap_err();
    assert!(err.to_string().contains("missing config key 'target'"), "{}", err);
  }

  #[test]
  fn glob_variable_lists_matches() {
    let temp = tempfile::TempDir::new().unwrap();
    std::fs::create_dir_all(temp.path().join("src")).unwrap();
    for file in ["a.c", "b.c", "skip.c"] {
      std::fs::write(temp.path().join("src").join(file), "").unwrap();
    }

    let package = load("[variables]\nsrcs = { glob = \"src/*.c\", exclude = [\"src/skip.c\"] }\n").unwrap();
    let tracker = LiveTracker::new(Arc::new(Config::new()), Arc::new(EvalContext::new(temp.path())));
    tracker.add_variable(package.variable("srcs").unwrap()).unwrap();

    let template = LazyTemplate::parse("$srcs", &package).unwrap();
    assert_eq!(tracker.expand(&template).unwrap(), "src/a.c src/b.c");
  }
}
