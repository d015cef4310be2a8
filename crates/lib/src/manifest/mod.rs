//! Declarative build descriptions.
//!
//! A manifest is a TOML file declaring variables, pools, rules and build
//! statements by name. Loading it produces a [`Package`]: the entity handles
//! and statements the live tracker works on.

mod load;
mod types;

pub use load::{ManifestError, Package};
pub use types::*;
