//! Configurable trigger rules deciding which sub-agents fire after a step.
//!
//! The engine is a pure function of `(context, rules)`: the same snapshot
//! and rule set always produce the same decisions and reasoning strings,
//! so any logged decision can be reproduced exactly.

pub mod context;
pub mod engine;
pub mod rules;

pub use context::{ComplexitySignal, TriggerContext};
pub use engine::{TriggerDecision, evaluate};
pub use rules::{ExecutionMode, RuleSet, Thresholds, TriggerRule};
