//! Workflow state machine for a single pipeline run.
//!
//! A `WorkflowState` tracks which steps of the analysis pipeline have
//! completed and what each one produced. It is a plain serializable value:
//! persistence is delegated to the checkpoint manager, which snapshots the
//! whole struct after every mutation.

use crate::errors::WorkflowError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle status of a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    InProgress,
    Paused,
    Completed,
    Crashed,
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InProgress => "in_progress",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Crashed => "crashed",
        };
        write!(f, "{}", s)
    }
}

/// The ordered list of step identifiers a workflow will execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepPlan {
    steps: Vec<String>,
}

impl StepPlan {
    pub fn new(steps: Vec<String>) -> Self {
        Self { steps }
    }

    pub fn step_ids(&self) -> &[String] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn contains(&self, step_id: &str) -> bool {
        self.steps.iter().any(|s| s == step_id)
    }
}

/// In-memory progress of one pipeline run.
///
/// Invariants:
/// - `completed_steps` is append-only and prefix-consistent with the plan.
/// - `current_step` always indexes the next step to run, except when a
///   resume operation reconstructs the struct from a checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub project_id: String,
    pub plan: StepPlan,
    /// Index into `plan` of the next step to execute.
    pub current_step: usize,
    pub completed_steps: Vec<String>,
    pub step_outputs: BTreeMap<String, serde_json::Value>,
    pub status: WorkflowStatus,
    pub last_updated: DateTime<Utc>,
}

impl WorkflowState {
    /// Start a fresh run for a project.
    pub fn new(project_id: impl Into<String>, plan: StepPlan) -> Self {
        Self {
            project_id: project_id.into(),
            plan,
            current_step: 0,
            completed_steps: Vec::new(),
            step_outputs: BTreeMap::new(),
            status: WorkflowStatus::InProgress,
            last_updated: Utc::now(),
        }
    }

    /// The identifier of the next step to execute, or `None` when the plan
    /// is exhausted.
    pub fn current_step_id(&self) -> Option<&str> {
        self.plan.step_ids().get(self.current_step).map(|s| s.as_str())
    }

    /// The most recently completed step, if any.
    pub fn last_completed_step(&self) -> Option<&str> {
        self.completed_steps.last().map(|s| s.as_str())
    }

    pub fn is_finished(&self) -> bool {
        self.current_step >= self.plan.len()
    }

    /// Record completion of a step.
    ///
    /// Rejects duplicates and out-of-order completions: `step_id` must be
    /// exactly the next step in the plan. On success the output is stored,
    /// the cursor advances, and the status flips to `Completed` when the
    /// plan is exhausted.
    pub fn complete_step(
        &mut self,
        step_id: &str,
        output: serde_json::Value,
    ) -> Result<(), WorkflowError> {
        if !self.plan.contains(step_id) {
            return Err(WorkflowError::UnknownStep {
                step: step_id.to_string(),
            });
        }
        if self.completed_steps.iter().any(|s| s == step_id) {
            return Err(WorkflowError::DuplicateStep {
                step: step_id.to_string(),
            });
        }
        let expected = match self.current_step_id() {
            Some(expected) => expected.to_string(),
            None => {
                return Err(WorkflowError::NoRemainingSteps {
                    step: step_id.to_string(),
                });
            }
        };
        if step_id != expected {
            return Err(WorkflowError::OutOfOrderStep {
                step: step_id.to_string(),
                expected,
            });
        }

        self.completed_steps.push(step_id.to_string());
        self.step_outputs.insert(step_id.to_string(), output);
        self.current_step += 1;
        if self.is_finished() {
            self.status = WorkflowStatus::Completed;
        }
        self.touch();
        Ok(())
    }

    /// Mark the run as gracefully paused (operator-driven stop).
    pub fn mark_paused(&mut self) {
        self.status = WorkflowStatus::Paused;
        self.touch();
    }

    /// Mark the run as crashed. Persisted via the next checkpoint so that
    /// resume-with-retry can surface the failure point.
    pub fn mark_crashed(&mut self) {
        self.status = WorkflowStatus::Crashed;
        self.touch();
    }

    /// Resume a previously paused or crashed run.
    pub fn mark_resumed(&mut self) {
        self.status = WorkflowStatus::InProgress;
        self.touch();
    }

    fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}
