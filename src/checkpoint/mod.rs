//! Versioned, crash-safe checkpointing of workflow state.
//!
//! Checkpoints are immutable JSON snapshots written under
//! `.venture/checkpoints/<project>/`, one file per checkpoint, with a
//! per-project `latest` pointer file that is swapped atomically
//! (write-new-then-rename) after every successful save.

use crate::workflow::{WorkflowState, WorkflowStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod manager;
pub mod store;

pub use manager::{CheckpointManager, ResumeReport};
pub use store::CheckpointStore;

/// An immutable snapshot of workflow progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Strictly increasing per project.
    pub checkpoint_id: u64,
    pub project_id: String,
    pub created_at: DateTime<Utc>,
    pub state: WorkflowState,
}

impl Checkpoint {
    pub fn new(checkpoint_id: u64, state: WorkflowState) -> Self {
        Self {
            checkpoint_id,
            project_id: state.project_id.clone(),
            created_at: Utc::now(),
            state,
        }
    }
}

/// Lightweight listing entry for a stored checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub checkpoint_id: u64,
    pub created_at: DateTime<Utc>,
    pub status: WorkflowStatus,
    pub steps_completed: usize,
    pub last_completed_step: Option<String>,
    pub is_latest: bool,
}

impl CheckpointMeta {
    fn from_checkpoint(cp: &Checkpoint, latest_id: Option<u64>) -> Self {
        Self {
            checkpoint_id: cp.checkpoint_id,
            created_at: cp.created_at,
            status: cp.state.status,
            steps_completed: cp.state.completed_steps.len(),
            last_completed_step: cp.state.last_completed_step().map(|s| s.to_string()),
            is_latest: latest_id == Some(cp.checkpoint_id),
        }
    }
}
