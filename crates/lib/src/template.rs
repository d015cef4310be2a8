//! Lazily expanded text templates.
//!
//! A [`LazyTemplate`] is literal text interleaved with references to
//! [`Variable`]s. Templates are parsed once, never mutated, and expanded only
//! after every referenced variable has been made live.
//!
//! # Syntax
//!
//! Templates use the ninja string syntax:
//!
//! - `$name` - reference to a variable (name chars: `[A-Za-z0-9_-]`)
//! - `${name}` - reference to a variable (name chars also allow `.`)
//! - `$$` - a literal `$`
//! - `$ ` - a literal space
//! - `$:` - a literal colon
//!
//! Any other character after `$` is an error.
//!
//! # Example
//!
//! ```
//! use std::collections::{BTreeMap, HashMap};
//! use ninjagen_lib::entity::Variable;
//! use ninjagen_lib::template::LazyTemplate;
//!
//! let dir = Variable::new_static("dir", LazyTemplate::literal("build"));
//! let scope = BTreeMap::from([("dir".to_string(), dir.clone())]);
//!
//! let tpl = LazyTemplate::parse("out/$dir/file", &scope).unwrap();
//! let values = HashMap::from([(dir, LazyTemplate::literal("build"))]);
//! assert_eq!(tpl.expand(&values).unwrap(), "out/build/file");
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::entity::Variable;

/// A segment of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
  /// Literal text, stored unescaped.
  Literal(String),

  /// A reference to a variable.
  Variable(Variable),
}

/// Errors that can occur while parsing or expanding a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
  #[error("unexpected character '{ch}' after '$' at position {pos}")]
  UnexpectedChar { ch: char, pos: usize },

  #[error("trailing '$' at position {0}")]
  TrailingDollar(usize),

  #[error("unclosed variable reference at position {0}")]
  Unclosed(usize),

  #[error("empty variable name at position {0}")]
  EmptyName(usize),

  #[error("invalid character '{ch}' in variable name at position {pos}")]
  InvalidName { ch: char, pos: usize },

  #[error("undefined variable: {0}")]
  UndefinedVariable(String),

  #[error("variable '{0}' is not live")]
  UnresolvedVariable(String),

  #[error("variable expansion cycle: {}", .0.join(" -> "))]
  ExpansionCycle(Vec<String>),
}

/// How literal text is escaped when rendering a template back to ninja syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escape {
  /// Right-hand side of a variable assignment: only `$` is escaped.
  Value,

  /// A path on a build line: `$`, space and `:` are escaped.
  Path,
}

/// Maps variable names to handles while parsing.
pub trait VariableLookup {
  fn lookup(&self, name: &str) -> Option<Variable>;
}

impl VariableLookup for () {
  fn lookup(&self, _name: &str) -> Option<Variable> {
    None
  }
}

impl VariableLookup for BTreeMap<String, Variable> {
  fn lookup(&self, name: &str) -> Option<Variable> {
    self.get(name).cloned()
  }
}

impl VariableLookup for HashMap<String, Variable> {
  fn lookup(&self, name: &str) -> Option<Variable> {
    self.get(name).cloned()
  }
}

impl<L: VariableLookup + ?Sized> VariableLookup for &L {
  fn lookup(&self, name: &str) -> Option<Variable> {
    (**self).lookup(name)
  }
}

/// Two scopes searched in order: `inner` shadows `outer`.
pub struct ScopeChain<'a> {
  pub inner: &'a dyn VariableLookup,
  pub outer: &'a dyn VariableLookup,
}

impl VariableLookup for ScopeChain<'_> {
  fn lookup(&self, name: &str) -> Option<Variable> {
    self.inner.lookup(name).or_else(|| self.outer.lookup(name))
  }
}

/// An immutable template of literal text and variable references.
///
/// Cloning is cheap; clones share storage, which [`LazyTemplate::ptr_eq`]
/// can observe.
#[derive(Clone)]
pub struct LazyTemplate {
  segments: Arc<[Segment]>,
}

impl LazyTemplate {
  /// A template with no variable references.
  pub fn literal(text: impl Into<String>) -> Self {
    Self::from_segments(vec![Segment::Literal(text.into())])
  }

  /// Build a template from segments, merging adjacent literals and dropping
  /// empty ones.
  pub fn from_segments(segments: impl IntoIterator<Item = Segment>) -> Self {
    let mut merged: Vec<Segment> = Vec::new();
    for segment in segments {
      match segment {
        Segment::Literal(s) if s.is_empty() => {}
        Segment::Literal(s) => match merged.last_mut() {
          Some(Segment::Literal(prev)) => prev.push_str(&s),
          _ => merged.push(Segment::Literal(s)),
        },
        var => merged.push(var),
      }
    }
    Self {
      segments: merged.into(),
    }
  }

  /// Parse ninja syntax, looking each referenced name up in `scope`.
  ///
  /// # Errors
  ///
  /// Fails on malformed `$` sequences and on names `scope` does not know.
  pub fn parse(input: &str, scope: &(impl VariableLookup + ?Sized)) -> Result<Self, TemplateError> {
    Self::parse_with(input, |name| {
      scope
        .lookup(name)
        .ok_or_else(|| TemplateError::UndefinedVariable(name.to_string()))
    })
  }

  /// Parse ninja syntax, mapping each referenced name through `resolve`.
  ///
  /// `resolve` is called once per reference, in order of appearance.
  pub fn parse_with<E>(input: &str, mut resolve: impl FnMut(&str) -> Result<Variable, E>) -> Result<Self, E>
  where
    E: From<TemplateError>,
  {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = input.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
      if ch != '$' {
        literal.push(ch);
        continue;
      }

      let name = match chars.next() {
        Some((_, '$')) => {
          literal.push('$');
          continue;
        }
        Some((_, ' ')) => {
          literal.push(' ');
          continue;
        }
        Some((_, ':')) => {
          literal.push(':');
          continue;
        }
        Some((_, '{')) => {
          let mut name = String::new();
          let mut closed = false;
          for (name_pos, c) in chars.by_ref() {
            if c == '}' {
              closed = true;
              break;
            }
            if !is_braced_name_char(c) {
              return Err(TemplateError::InvalidName { ch: c, pos: name_pos }.into());
            }
            name.push(c);
          }
          if !closed {
            return Err(TemplateError::Unclosed(pos).into());
          }
          if name.is_empty() {
            return Err(TemplateError::EmptyName(pos).into());
          }
          name
        }
        Some((_, c)) if is_simple_name_char(c) => {
          let mut name = String::from(c);
          while let Some(&(_, c)) = chars.peek() {
            if !is_simple_name_char(c) {
              break;
            }
            name.push(c);
            chars.next();
          }
          name
        }
        Some((next_pos, c)) => return Err(TemplateError::UnexpectedChar { ch: c, pos: next_pos }.into()),
        None => return Err(TemplateError::TrailingDollar(pos).into()),
      };

      if !literal.is_empty() {
        segments.push(Segment::Literal(std::mem::take(&mut literal)));
      }
      segments.push(Segment::Variable(resolve(&name)?));
    }

    if !literal.is_empty() {
      segments.push(Segment::Literal(literal));
    }

    Ok(Self::from_segments(segments))
  }

  pub fn segments(&self) -> &[Segment] {
    &self.segments
  }

  /// Whether the template references no variables.
  pub fn is_literal(&self) -> bool {
    self.segments.iter().all(|s| matches!(s, Segment::Literal(_)))
  }

  /// Distinct referenced variables, in order of first use.
  pub fn referenced_variables(&self) -> Vec<Variable> {
    let mut seen: Vec<Variable> = Vec::new();
    for segment in self.segments.iter() {
      if let Segment::Variable(v) = segment
        && !seen.contains(v)
      {
        seen.push(v.clone());
      }
    }
    seen
  }

  /// Expand to final text using `values` for every referenced variable.
  ///
  /// Variable values are themselves templates and are expanded recursively.
  ///
  /// # Errors
  ///
  /// Returns `UnresolvedVariable` if a reference (direct or transitive) is
  /// missing from `values`, and `ExpansionCycle` if a variable's value
  /// refers back to itself.
  pub fn expand(&self, values: &HashMap<Variable, LazyTemplate>) -> Result<String, TemplateError> {
    let mut out = String::new();
    let mut stack = Vec::new();
    self.expand_into(values, &mut stack, &mut out)?;
    Ok(out)
  }

  fn expand_into(
    &self,
    values: &HashMap<Variable, LazyTemplate>,
    stack: &mut Vec<Variable>,
    out: &mut String,
  ) -> Result<(), TemplateError> {
    for segment in self.segments.iter() {
      match segment {
        Segment::Literal(s) => out.push_str(s),
        Segment::Variable(v) => {
          if let Some(start) = stack.iter().position(|s| s == v) {
            let mut chain: Vec<String> = stack[start..].iter().map(|s| s.name().to_string()).collect();
            chain.push(v.name().to_string());
            return Err(TemplateError::ExpansionCycle(chain));
          }
          let value = values
            .get(v)
            .ok_or_else(|| TemplateError::UnresolvedVariable(v.name().to_string()))?;
          stack.push(v.clone());
          value.expand_into(values, stack, out)?;
          stack.pop();
        }
      }
    }
    Ok(())
  }

  /// Render back to ninja syntax with references written as `${name}`.
  pub fn to_ninja(&self, escape: Escape) -> String {
    let mut out = String::new();
    for segment in self.segments.iter() {
      match segment {
        Segment::Literal(s) => escape_into(s, escape, &mut out),
        Segment::Variable(v) => {
          out.push_str("${");
          out.push_str(v.name());
          out.push('}');
        }
      }
    }
    out
  }

  /// Whether both templates share the same storage.
  pub fn ptr_eq(a: &Self, b: &Self) -> bool {
    Arc::ptr_eq(&a.segments, &b.segments)
  }
}

/// Escape already expanded text for the given ninja context.
pub fn escape(text: &str, escape: Escape) -> String {
  let mut out = String::with_capacity(text.len());
  escape_into(text, escape, &mut out);
  out
}

fn escape_into(text: &str, escape: Escape, out: &mut String) {
  for ch in text.chars() {
    match ch {
      '$' => out.push_str("$$"),
      ' ' if escape == Escape::Path => out.push_str("$ "),
      ':' if escape == Escape::Path => out.push_str("$:"),
      c => out.push(c),
    }
  }
}

fn is_simple_name_char(c: char) -> bool {
  c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn is_braced_name_char(c: char) -> bool {
  is_simple_name_char(c) || c == '.'
}

impl PartialEq for LazyTemplate {
  fn eq(&self, other: &Self) -> bool {
    self.segments == other.segments
  }
}

impl Eq for LazyTemplate {}

impl fmt::Debug for LazyTemplate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("LazyTemplate").field(&self.to_ninja(Escape::Value)).finish()
  }
}

impl fmt::Display for LazyTemplate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.to_ninja(Escape::Value))
  }
}

impl serde::Serialize for LazyTemplate {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.to_ninja(Escape::Value))
  }
}
