//! Typed error hierarchy for the Venture orchestrator.
//!
//! Three top-level enums cover the three subsystems:
//! - `WorkflowError` — illegal step transitions in the workflow state machine
//! - `CheckpointError` — checkpoint lookup and storage failures
//! - `AgentError` — sub-agent invocation failures (recorded, not pipeline-fatal)

use thiserror::Error;

/// Errors from the workflow state machine.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Step '{step}' already completed; duplicate completion rejected")]
    DuplicateStep { step: String },

    #[error("Out-of-order completion: got '{step}', expected '{expected}'")]
    OutOfOrderStep { step: String, expected: String },

    #[error("Step '{step}' completed but workflow has no remaining steps")]
    NoRemainingSteps { step: String },

    #[error("Step '{step}' is not part of this workflow's step plan")]
    UnknownStep { step: String },
}

/// Errors from the checkpoint store and manager.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("No checkpoints found for project '{project_id}'")]
    ProjectNotFound { project_id: String },

    #[error("Checkpoint {checkpoint_id} not found for project '{project_id}'")]
    CheckpointNotFound {
        project_id: String,
        checkpoint_id: u64,
    },

    #[error("Storage failure at {path}: {source}")]
    Storage {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt checkpoint at {path}: {source}")]
    Corrupt {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Latest pointer for project '{project_id}' references missing checkpoint {checkpoint_id}")]
    DanglingLatestPointer {
        project_id: String,
        checkpoint_id: u64,
    },

    #[error("Corrupt latest pointer at {path}: contents are not a checkpoint id")]
    CorruptLatestPointer { path: std::path::PathBuf },

    #[error("Retention limit must keep at least one checkpoint")]
    InvalidRetention,
}

/// Errors from a single sub-agent invocation.
///
/// For silent tasks these are caught by the coordinator and recorded in the
/// execution record; they never abort the primary pipeline step.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Agent '{agent_name}' failed: {message}")]
    Failed { agent_name: String, message: String },

    #[error("Agent '{agent_name}' has no configured command")]
    NotConfigured { agent_name: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
