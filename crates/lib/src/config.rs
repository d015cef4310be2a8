//! Generation configuration.
//!
//! A [`Config`] is the read-only input every entity resolves against. It is a
//! flat map from dotted keys to simple values; TOML tables are flattened on
//! load, so `[cc] flags = "-O2"` becomes the key `cc.flags`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
  Bool(bool),
  Integer(i64),
  String(String),
  List(Vec<String>),
}

impl ConfigValue {
  fn kind(&self) -> &'static str {
    match self {
      ConfigValue::Bool(_) => "bool",
      ConfigValue::Integer(_) => "integer",
      ConfigValue::String(_) => "string",
      ConfigValue::List(_) => "list",
    }
  }
}

/// Lists render space separated, which is how ninja consumes them.
impl fmt::Display for ConfigValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      ConfigValue::Bool(b) => write!(f, "{b}"),
      ConfigValue::Integer(i) => write!(f, "{i}"),
      ConfigValue::String(s) => f.write_str(s),
      ConfigValue::List(items) => f.write_str(&items.join(" ")),
    }
  }
}

impl From<&str> for ConfigValue {
  fn from(value: &str) -> Self {
    ConfigValue::String(value.to_string())
  }
}

impl From<String> for ConfigValue {
  fn from(value: String) -> Self {
    ConfigValue::String(value)
  }
}

impl From<bool> for ConfigValue {
  fn from(value: bool) -> Self {
    ConfigValue::Bool(value)
  }
}

impl From<i64> for ConfigValue {
  fn from(value: i64) -> Self {
    ConfigValue::Integer(value)
  }
}

impl From<Vec<String>> for ConfigValue {
  fn from(value: Vec<String>) -> Self {
    ConfigValue::List(value)
  }
}

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read config {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse config: {0}")]
  Parse(#[from] toml::de::Error),

  #[error("unsupported {kind} value for config key '{key}'")]
  UnsupportedValue { key: String, kind: &'static str },

  #[error("missing config key '{0}'")]
  Missing(String),

  #[error("config key '{key}' is a {actual}, expected {expected}")]
  WrongType {
    key: String,
    expected: &'static str,
    actual: &'static str,
  },

  #[error("invalid assignment '{0}': expected key=value")]
  InvalidAssignment(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Config {
  values: BTreeMap<String, ConfigValue>,
}

impl Config {
  pub fn new() -> Self {
    Self::default()
  }

  /// Load a TOML config file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
      path: path.to_path_buf(),
      source,
    })?;
    Self::from_toml_str(&contents)
  }

  pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
    let table: toml::Table = toml::from_str(contents)?;
    let mut config = Self::new();
    flatten_into("", &table, &mut config.values)?;
    Ok(config)
  }

  /// Builder-style insert.
  pub fn set(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
    self.insert(key, value);
    self
  }

  pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
    self.values.insert(key.into(), value.into());
  }

  /// Parse a `key=value` override as given on the command line.
  ///
  /// `true`/`false` become booleans and integers become integers; anything
  /// else is kept as a string.
  pub fn parse_assignment(assignment: &str) -> Result<(String, ConfigValue), ConfigError> {
    let (key, value) = assignment
      .split_once('=')
      .filter(|(key, _)| !key.trim().is_empty())
      .ok_or_else(|| ConfigError::InvalidAssignment(assignment.to_string()))?;

    let value = match value {
      "true" => ConfigValue::Bool(true),
      "false" => ConfigValue::Bool(false),
      other => match other.parse::<i64>() {
        Ok(i) => ConfigValue::Integer(i),
        Err(_) => ConfigValue::String(other.to_string()),
      },
    };
    Ok((key.trim().to_string(), value))
  }

  pub fn get(&self, key: &str) -> Option<&ConfigValue> {
    self.values.get(key)
  }

  pub fn get_str(&self, key: &str) -> Option<&str> {
    match self.values.get(key) {
      Some(ConfigValue::String(s)) => Some(s),
      _ => None,
    }
  }

  pub fn get_bool(&self, key: &str) -> Option<bool> {
    match self.values.get(key) {
      Some(ConfigValue::Bool(b)) => Some(*b),
      _ => None,
    }
  }

  pub fn get_integer(&self, key: &str) -> Option<i64> {
    match self.values.get(key) {
      Some(ConfigValue::Integer(i)) => Some(*i),
      _ => None,
    }
  }

  pub fn get_list(&self, key: &str) -> Option<&[String]> {
    match self.values.get(key) {
      Some(ConfigValue::List(items)) => Some(items),
      _ => None,
    }
  }

  /// Like [`Config::get_str`], but missing or mistyped keys are errors.
  pub fn require_str(&self, key: &str) -> Result<&str, ConfigError> {
    match self.values.get(key) {
      Some(ConfigValue::String(s)) => Ok(s),
      Some(other) => Err(ConfigError::WrongType {
        key: key.to_string(),
        expected: "string",
        actual: other.kind(),
      }),
      None => Err(ConfigError::Missing(key.to_string())),
    }
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
    self.values.iter().map(|(k, v)| (k.as_str(), v))
  }
}

fn flatten_into(
  prefix: &str,
  table: &toml::Table,
  out: &mut BTreeMap<String, ConfigValue>,
) -> Result<(), ConfigError> {
  for (key, value) in table {
    let key = if prefix.is_empty() {
      key.clone()
    } else {
      format!("{prefix}.{key}")
    };

    let converted = match value {
      toml::Value::Table(nested) => {
        flatten_into(&key, nested, out)?;
        continue;
      }
      toml::Value::String(s) => ConfigValue::String(s.clone()),
      toml::Value::Boolean(b) => ConfigValue::Bool(*b),
      toml::Value::Integer(i) => ConfigValue::Integer(*i),
      toml::Value::Array(items) => {
        let mut list = Vec::with_capacity(items.len());
        for item in items {
          match item {
            toml::Value::String(s) => list.push(s.clone()),
            _ => {
              return Err(ConfigError::UnsupportedValue {
                key,
                kind: "non-string list",
              });
            }
          }
        }
        ConfigValue::List(list)
      }
      toml::Value::Float(_) => return Err(ConfigError::UnsupportedValue { key, kind: "float" }),
      toml::Value::Datetime(_) => return Err(ConfigError::UnsupportedValue { key, kind: "datetime" }),
    };
    out.insert(key, converted);
  }
  Ok(())
}
