//! CLI output formatting utilities.
//!
//! Provides consistent formatting for terminal output: colored status
//! messages, labelled stats and JSON.

use anyhow::Context;
use owo_colors::{OwoColorize, Stream};

use ninjagen_lib::live::LiveStats;

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
}

fn count(n: usize, noun: &str) -> String {
  if n == 1 { format!("1 {noun}") } else { format!("{n} {noun}s") }
}

/// Summarize live set sizes, e.g. `3 variables, 1 rule, 0 pools`.
pub fn format_live(stats: &LiveStats) -> String {
  format!(
    "{}, {}, {}",
    count(stats.variables, "variable"),
    count(stats.rules, "rule"),
    count(stats.pools, "pool")
  )
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_format_live() {
    let stats = LiveStats {
      variables: 3,
      rules: 1,
      pools: 0,
    };
    assert_eq!(format_live(&stats), "3 variables, 1 rule, 0 pools");
  }

  #[test]
  fn test_count() {
    assert_eq!(count(1, "glob"), "1 glob");
    assert_eq!(count(2, "glob"), "2 globs");
  }
}
