//! Manifest types.
//!
//! # Example
//!
//! ```toml
//! [variables]
//! cc = "gcc"
//! cflags = { config = "cc.flags", default = "-O2" }
//! srcs = { glob = "src/*.c", exclude = ["src/skip.c"] }
//!
//! [pools.link]
//! depth = 1
//!
//! [rules.cc]
//! command = "$cc $cflags -c $in -o $out"
//! description = "CC $out"
//!
//! [[builds]]
//! rule = "cc"
//! outputs = ["out/main.o"]
//! inputs = ["src/main.c"]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ManifestError;

/// The complete declarative build description.
///
/// Uses [`BTreeMap`] so declarations are processed in a deterministic order.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
  #[serde(default)]
  pub variables: BTreeMap<String, VariableDecl>,
  #[serde(default)]
  pub pools: BTreeMap<String, PoolDecl>,
  #[serde(default)]
  pub rules: BTreeMap<String, RuleDecl>,
  #[serde(default)]
  pub builds: Vec<BuildDecl>,
}

impl Manifest {
  pub fn load(path: &Path) -> Result<Self, ManifestError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_toml_str(&contents)
  }

  pub fn from_toml_str(contents: &str) -> Result<Self, ManifestError> {
    Ok(toml::from_str(contents)?)
  }
}

/// How a global variable gets its value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableDecl {
  /// A template, e.g. `"$root/out"`.
  Value(String),

  /// The value of a config key, or `default` when the key is unset.
  Config {
    config: String,
    #[serde(default)]
    default: Option<String>,
  },

  /// Space-separated glob matches, relative to the source root.
  Glob {
    glob: String,
    #[serde(default)]
    exclude: Vec<String>,
  },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolDecl {
  pub depth: u32,
  #[serde(default)]
  pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleDecl {
  pub command: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub depfile: Option<String>,
  #[serde(default)]
  pub deps: Option<String>,
  #[serde(default)]
  pub rspfile: Option<String>,
  #[serde(default)]
  pub rspfile_content: Option<String>,
  #[serde(default)]
  pub restat: bool,
  #[serde(default)]
  pub generator: bool,
  /// A declared pool name, or `console`.
  #[serde(default)]
  pub pool: Option<String>,
  #[serde(default)]
  pub command_deps: Vec<String>,
  #[serde(default)]
  pub command_order_only: Vec<String>,
  /// Extra argument names beyond `in` and `out`.
  #[serde(default)]
  pub args: Vec<String>,
  #[serde(default)]
  pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildDecl {
  /// A declared rule name, or `phony`.
  pub rule: String,
  #[serde(default)]
  pub outputs: Vec<String>,
  #[serde(default)]
  pub implicit_outputs: Vec<String>,
  #[serde(default)]
  pub inputs: Vec<String>,
  #[serde(default)]
  pub implicits: Vec<String>,
  #[serde(default)]
  pub order_only: Vec<String>,
  #[serde(default)]
  pub validations: Vec<String>,
  #[serde(default)]
  pub variables: BTreeMap<String, String>,
  #[serde(default)]
  pub args: BTreeMap<String, String>,
  #[serde(default)]
  pub default: bool,
}
