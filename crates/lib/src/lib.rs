//! ninjagen-lib: liveness tracking and ninja generation
//!
//! This crate turns declared build entities into a ninja file, evaluating
//! only what submitted build statements actually reach:
//! - `Variable`, `Rule`, `Pool`: named entity handles that resolve against a `Config`
//! - `BuildStatement`: one build edge referencing entities through templates
//! - `LiveTracker`: computes and memoizes the live closure of submitted statements
//! - `Manifest`/`Package`: the TOML build description and its loaded handles
//! - `Generator`/`NinjaWriter`: the submission pipeline and ninja output

pub mod config;
pub mod context;
pub mod entity;
pub mod generate;
pub mod live;
pub mod manifest;
pub mod ninja;
pub mod statement;
pub mod template;
#[cfg(test)]
mod util;
