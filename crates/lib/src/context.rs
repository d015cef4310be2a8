//! Evaluation context shared by every entity resolution in a run.
//!
//! The context owns filesystem glob expansion. Globbing is expensive and
//! depends on the environment, so each distinct `(pattern, excludes)` pair is
//! walked at most once per context; later calls get the recorded result.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Error)]
pub enum GlobError {
  #[error("invalid glob pattern '{pattern}': {source}")]
  Pattern {
    pattern: String,
    #[source]
    source: glob::PatternError,
  },

  #[error("glob '{pattern}' failed to read {path}: {message}")]
  Io {
    pattern: String,
    path: PathBuf,
    message: String,
  },

  #[error("glob pattern must be relative to the source root: {0}")]
  AbsolutePattern(String),
}

/// A glob evaluated during the run, recorded so generated files can list
/// their regeneration inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobRecord {
  pub pattern: String,
  pub excludes: Vec<String>,
  pub matches: Vec<String>,
}

type GlobKey = (String, Vec<String>);

/// Per-run evaluation context.
pub struct EvalContext {
  root: PathBuf,
  globs: Mutex<BTreeMap<GlobKey, Vec<String>>>,
  walks: AtomicUsize,
}

impl EvalContext {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      globs: Mutex::new(BTreeMap::new()),
      walks: AtomicUsize::new(0),
    }
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  /// Expand `pattern` relative to the root.
  ///
  /// Returns sorted, `/`-separated paths relative to the root, minus any path
  /// matching one of `excludes`.
  pub fn glob(&self, pattern: &str, excludes: &[String]) -> Result<Vec<String>, GlobError> {
    if Path::new(pattern).is_absolute() {
      return Err(GlobError::AbsolutePattern(pattern.to_string()));
    }

    let key = (pattern.to_string(), excludes.to_vec());
    // Held across the walk so concurrent callers never walk the same key twice.
    let mut globs = self.globs.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(matches) = globs.get(&key) {
      trace!(pattern, "glob cache hit");
      return Ok(matches.clone());
    }

    let matches = self.walk(pattern, excludes)?;
    self.walks.fetch_add(1, Ordering::Relaxed);
    debug!(pattern, count = matches.len(), "expanded glob");
    globs.insert(key, matches.clone());
    Ok(matches)
  }

  fn walk(&self, pattern: &str, excludes: &[String]) -> Result<Vec<String>, GlobError> {
    let exclude_patterns = excludes
      .iter()
      .map(|ex| {
        glob::Pattern::new(ex).map_err(|source| GlobError::Pattern {
          pattern: ex.clone(),
          source,
        })
      })
      .collect::<Result<Vec<_>, _>>()?;

    let full = self.root.join(pattern);
    let paths = glob::glob(&full.to_string_lossy()).map_err(|source| GlobError::Pattern {
      pattern: pattern.to_string(),
      source,
    })?;

    let mut matches = Vec::new();
    for entry in paths {
      let path = entry.map_err(|err| GlobError::Io {
        pattern: pattern.to_string(),
        path: err.path().to_path_buf(),
        message: err.error().to_string(),
      })?;
      let relative = path.strip_prefix(&self.root).unwrap_or(&path);
      let relative = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");
      if exclude_patterns.iter().any(|ex| ex.matches(&relative)) {
        continue;
      }
      matches.push(relative);
    }
    matches.sort();
    Ok(matches)
  }

  /// Every glob evaluated so far, ordered by pattern.
  pub fn globs(&self) -> Vec<GlobRecord> {
    let globs = self.globs.lock().unwrap_or_else(PoisonError::into_inner);
    globs
      .iter()
      .map(|((pattern, excludes), matches)| GlobRecord {
        pattern: pattern.clone(),
        excludes: excludes.clone(),
        matches: matches.clone(),
      })
      .collect()
  }

  /// Number of filesystem walks performed (cache misses).
  pub fn glob_walks(&self) -> usize {
    self.walks.load(Ordering::Relaxed)
  }
}

/// The view of the evaluation context handed to variable functions.
#[derive(Clone, Copy)]
pub struct VariableFuncContext<'a> {
  ctx: &'a EvalContext,
}

impl<'a> VariableFuncContext<'a> {
  pub fn new(ctx: &'a EvalContext) -> Self {
    Self { ctx }
  }

  pub fn glob(&self, pattern: &str, excludes: &[String]) -> Result<Vec<String>, GlobError> {
    self.ctx.glob(pattern, excludes)
  }

  pub fn root(&self) -> &Path {
    self.ctx.root()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn tree(files: &[&str]) -> TempDir {
    let temp = TempDir::new().unwrap();
    for file in files {
      let path = temp.path().join(file);
      std::fs::create_dir_all(path.parent().unwrap()).unwrap();
      std::fs::write(&path, "").unwrap();
    }
    temp
  }

  #[test]
  fn matches_are_relative_and_sorted() {
    let temp = tree(&["src/b.c", "src/a.c", "src/a.h", "src/sub/c.c"]);
    let ctx = EvalContext::new(temp.path());

    assert_eq!(ctx.glob("src/*.c", &[]).unwrap(), vec!["src/a.c", "src/b.c"]);
    assert_eq!(
      ctx.glob("src/**/*.c", &[]).unwrap(),
      vec!["src/a.c", "src/b.c", "src/sub/c.c"]
    );
  }

  #[test]
  fn excludes_are_removed() {
    let temp = tree(&["src/a.c", "src/a_test.c"]);
    let ctx = EvalContext::new(temp.path());

    let matches = ctx.glob("src/*.c", &["src/*_test.c".to_string()]).unwrap();
    assert_eq!(matches, vec!["src/a.c"]);
  }

  #[test]
  fn repeated_glob_walks_once() {
    let temp = tree(&["src/a.c"]);
    let ctx = EvalContext::new(temp.path());

    ctx.glob("src/*.c", &[]).unwrap();
    // Files added after the first walk are not seen: the result is memoized.
    std::fs::write(temp.path().join("src/b.c"), "").unwrap();
    assert_eq!(ctx.glob("src/*.c", &[]).unwrap(), vec!["src/a.c"]);
    assert_eq!(ctx.glob_walks(), 1);

    ctx.glob("src/*.c", &["src/a.c".to_string()]).unwrap();
    assert_eq!(ctx.glob_walks(), 2);
    assert_eq!(ctx.globs().len(), 2);
  }

  #[test]
  fn invalid_and_absolute_patterns() {
    let ctx = EvalContext::new(".");
    assert!(matches!(ctx.glob("src/[", &[]), Err(GlobError::Pattern { .. })));

    let absolute = if cfg!(windows) { "C:\\src\\*.c" } else { "/src/*.c" };
    assert!(matches!(ctx.glob(absolute, &[]), Err(GlobError::AbsolutePattern(_))));
  }
}
