//! Build-graph entities: variables, rules and pools.
//!
//! Each entity is an opaque, cheaply cloned handle that knows how to compute
//! its own definition against a [`Config`](crate::config::Config). Handles
//! compare by identity, so a clone is the same entity and a second handle
//! with the same name is not; the live tracker keys its memo tables on them.

mod pool;
mod rule;
mod types;
mod variable;

pub use pool::{Pool, PoolDefinition, PoolFunc, PoolKind, PoolParams};
pub use rule::{Rule, RuleDefinition, RuleFunc, RuleKind, RuleParams};
pub use types::{ResolveError, Resolvable, Resolved};
pub use variable::{Variable, VariableFunc, VariableKind, VariableValue};
