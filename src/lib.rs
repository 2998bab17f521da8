//! Venture: a crash-resumable orchestrator for multi-step analysis
//! pipelines.
//!
//! The pipeline executes an ordered plan of steps, checkpointing the
//! workflow state after each one. Step-reported signals feed a declarative
//! trigger rule engine that decides which auxiliary agents to run, silently
//! or behind an interactive approval gate, and every decision and execution
//! is recorded in an append-only audit log.

pub mod audit;
pub mod checkpoint;
pub mod cmd;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod invoke;
pub mod pipeline;
pub mod trigger;
pub mod ui;
pub mod workflow;
