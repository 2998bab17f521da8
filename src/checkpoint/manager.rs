//! Checkpoint lifecycle: save, load, list, crash detection, resume, and
//! explicit retention pruning.

use super::store::CheckpointStore;
use super::{Checkpoint, CheckpointMeta};
use crate::errors::CheckpointError;
use crate::workflow::{WorkflowState, WorkflowStatus};
use std::path::Path;
use tracing::{debug, info, warn};

pub struct CheckpointManager {
    store: CheckpointStore,
}

/// What `resume_workflow` found: the reconstructed state plus whether the
/// last recorded run ended without a graceful shutdown marker.
#[derive(Debug, Clone)]
pub struct ResumeReport {
    pub state: WorkflowState,
    pub checkpoint_id: u64,
    pub crash_detected: bool,
}

impl CheckpointManager {
    pub fn new(checkpoint_dir: impl AsRef<Path>) -> Self {
        Self {
            store: CheckpointStore::new(checkpoint_dir),
        }
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Serialize `state` as a new immutable checkpoint and swap the
    /// project's latest pointer to it. Returns the new checkpoint id.
    ///
    /// I/O failures propagate to the caller, which decides retry vs abort.
    pub fn save_checkpoint(&self, state: &WorkflowState) -> Result<u64, CheckpointError> {
        let id = self.store.next_id(&state.project_id)?;
        let checkpoint = Checkpoint::new(id, state.clone());
        self.store.write(&checkpoint)?;
        debug!(
            project_id = %state.project_id,
            checkpoint_id = id,
            status = %state.status,
            "checkpoint saved"
        );
        Ok(id)
    }

    /// Load a specific checkpoint, or the latest when `checkpoint_id` is
    /// `None`. Fails with `CheckpointNotFound`/`ProjectNotFound` rather
    /// than inventing an empty state.
    pub fn load_checkpoint(
        &self,
        project_id: &str,
        checkpoint_id: Option<u64>,
    ) -> Result<WorkflowState, CheckpointError> {
        let checkpoint = match checkpoint_id {
            Some(id) => self.store.read(project_id, id)?,
            None => self.store.read_latest(project_id)?,
        };
        Ok(checkpoint.state)
    }

    /// Metadata for every stored checkpoint, newest first.
    pub fn list_checkpoints(
        &self,
        project_id: &str,
    ) -> Result<Vec<CheckpointMeta>, CheckpointError> {
        let latest = self.store.latest_id(project_id)?;
        let mut metas = Vec::new();
        for id in self.store.checkpoint_ids(project_id)? {
            let checkpoint = self.store.read(project_id, id)?;
            metas.push(CheckpointMeta::from_checkpoint(&checkpoint, latest));
        }
        metas.reverse();
        Ok(metas)
    }

    /// True when the last known state was mid-step with no graceful
    /// shutdown marker: the latest checkpoint says `in_progress`.
    pub fn detect_crash(&self, project_id: &str) -> Result<bool, CheckpointError> {
        if !self.store.project_exists(project_id) {
            return Ok(false);
        }
        let latest = self.store.read_latest(project_id)?;
        Ok(latest.state.status == WorkflowStatus::InProgress && !latest.state.is_finished())
    }

    /// Convenience composition of `detect_crash` + load-latest.
    pub fn resume_workflow(&self, project_id: &str) -> Result<ResumeReport, CheckpointError> {
        let crash_detected = self.detect_crash(project_id)?;
        let checkpoint = self.store.read_latest(project_id)?;
        if crash_detected {
            warn!(
                project_id,
                checkpoint_id = checkpoint.checkpoint_id,
                last_step = ?checkpoint.state.last_completed_step(),
                "previous run did not shut down gracefully"
            );
        } else {
            info!(
                project_id,
                checkpoint_id = checkpoint.checkpoint_id,
                "resuming from latest checkpoint"
            );
        }
        Ok(ResumeReport {
            checkpoint_id: checkpoint.checkpoint_id,
            state: checkpoint.state,
            crash_detected,
        })
    }

    /// Explicit retention policy: delete all but the newest `keep_last`
    /// checkpoints for a project. Returns how many were removed. Never
    /// runs automatically.
    ///
    /// `keep_last` must be at least 1: pruning everything would leave the
    /// `latest` pointer dangling.
    pub fn prune(&self, project_id: &str, keep_last: usize) -> Result<usize, CheckpointError> {
        if keep_last == 0 {
            return Err(CheckpointError::InvalidRetention);
        }
        let ids = self.store.checkpoint_ids(project_id)?;
        if ids.len() <= keep_last {
            return Ok(0);
        }
        let cutoff = ids.len() - keep_last;
        let mut removed = 0;
        for id in &ids[..cutoff] {
            self.store.remove(project_id, *id)?;
            removed += 1;
        }
        info!(project_id, removed, keep_last, "pruned old checkpoints");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::StepPlan;
    use serde_json::json;
    use tempfile::tempdir;

    fn plan() -> StepPlan {
        StepPlan::new(vec!["intake".to_string(), "scoring".to_string()])
    }

    fn make_manager() -> (CheckpointManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        (CheckpointManager::new(dir.path()), dir)
    }

    #[test]
    fn test_save_returns_strictly_increasing_ids() {
        let (mgr, _dir) = make_manager();
        let state = WorkflowState::new("idea-1", plan());

        let first = mgr.save_checkpoint(&state).unwrap();
        let second = mgr.save_checkpoint(&state).unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_load_latest_reflects_most_recent_save() {
        let (mgr, _dir) = make_manager();
        let mut state = WorkflowState::new("idea-1", plan());
        mgr.save_checkpoint(&state).unwrap();

        state.complete_step("intake", json!({"score": 7})).unwrap();
        mgr.save_checkpoint(&state).unwrap();

        let loaded = mgr.load_checkpoint("idea-1", None).unwrap();
        assert_eq!(loaded.completed_steps, vec!["intake"]);
        assert_eq!(loaded.step_outputs["intake"], json!({"score": 7}));
    }

    #[test]
    fn test_load_specific_checkpoint() {
        let (mgr, _dir) = make_manager();
        let mut state = WorkflowState::new("idea-1", plan());
        let first = mgr.save_checkpoint(&state).unwrap();
        state.complete_step("intake", json!(null)).unwrap();
        mgr.save_checkpoint(&state).unwrap();

        let old = mgr.load_checkpoint("idea-1", Some(first)).unwrap();
        assert!(old.completed_steps.is_empty());
    }

    #[test]
    fn test_load_unknown_project_fails() {
        let (mgr, _dir) = make_manager();
        let err = mgr.load_checkpoint("ghost", None).unwrap_err();
        assert!(matches!(err, CheckpointError::ProjectNotFound { .. }));
    }

    #[test]
    fn test_list_checkpoints_newest_first() {
        let (mgr, _dir) = make_manager();
        let mut state = WorkflowState::new("idea-1", plan());
        mgr.save_checkpoint(&state).unwrap();
        state.complete_step("intake", json!(null)).unwrap();
        mgr.save_checkpoint(&state).unwrap();

        let metas = mgr.list_checkpoints("idea-1").unwrap();
        assert_eq!(metas.len(), 2);
        assert_eq!(metas[0].checkpoint_id, 2);
        assert!(metas[0].is_latest);
        assert_eq!(metas[0].steps_completed, 1);
        assert_eq!(metas[1].checkpoint_id, 1);
        assert!(!metas[1].is_latest);
    }

    #[test]
    fn test_detect_crash_on_in_progress_state() {
        let (mgr, _dir) = make_manager();
        let mut state = WorkflowState::new("idea-1", plan());
        state.complete_step("intake", json!(null)).unwrap();
        mgr.save_checkpoint(&state).unwrap();

        // Mid-run, no graceful shutdown marker.
        assert!(mgr.detect_crash("idea-1").unwrap());
    }

    #[test]
    fn test_detect_crash_false_after_pause() {
        let (mgr, _dir) = make_manager();
        let mut state = WorkflowState::new("idea-1", plan());
        state.complete_step("intake", json!(null)).unwrap();
        state.mark_paused();
        mgr.save_checkpoint(&state).unwrap();

        assert!(!mgr.detect_crash("idea-1").unwrap());
    }

    #[test]
    fn test_detect_crash_false_after_completion() {
        let (mgr, _dir) = make_manager();
        let mut state = WorkflowState::new("idea-1", plan());
        state.complete_step("intake", json!(null)).unwrap();
        state.complete_step("scoring", json!(null)).unwrap();
        mgr.save_checkpoint(&state).unwrap();

        assert!(!mgr.detect_crash("idea-1").unwrap());
    }

    #[test]
    fn test_detect_crash_false_for_unknown_project() {
        let (mgr, _dir) = make_manager();
        assert!(!mgr.detect_crash("ghost").unwrap());
    }

    #[test]
    fn test_resume_reports_crash_and_state() {
        let (mgr, _dir) = make_manager();
        let mut state = WorkflowState::new("idea-1", plan());
        state.complete_step("intake", json!({"n": 1})).unwrap();
        mgr.save_checkpoint(&state).unwrap();

        let report = mgr.resume_workflow("idea-1").unwrap();
        assert!(report.crash_detected);
        assert_eq!(report.state.completed_steps, vec!["intake"]);
        assert_eq!(report.state.current_step_id(), Some("scoring"));
    }

    #[test]
    fn test_resume_survives_process_restart() {
        let dir = tempdir().unwrap();
        {
            let mgr = CheckpointManager::new(dir.path());
            let mut state = WorkflowState::new("idea-1", plan());
            state.complete_step("intake", json!({"n": 1})).unwrap();
            mgr.save_checkpoint(&state).unwrap();
        }
        {
            let mgr = CheckpointManager::new(dir.path());
            let report = mgr.resume_workflow("idea-1").unwrap();
            assert!(report.crash_detected);
            assert_eq!(report.state.step_outputs["intake"], json!({"n": 1}));
        }
    }

    #[test]
    fn test_prune_keeps_newest() {
        let (mgr, _dir) = make_manager();
        let state = WorkflowState::new("idea-1", plan());
        for _ in 0..5 {
            mgr.save_checkpoint(&state).unwrap();
        }

        let removed = mgr.prune("idea-1", 2).unwrap();
        assert_eq!(removed, 3);

        let metas = mgr.list_checkpoints("idea-1").unwrap();
        let ids: Vec<u64> = metas.iter().map(|m| m.checkpoint_id).collect();
        assert_eq!(ids, vec![5, 4]);
        // Latest pointer is untouched by pruning.
        assert_eq!(mgr.load_checkpoint("idea-1", None).unwrap(), state.clone());
    }

    #[test]
    fn test_prune_noop_when_under_limit() {
        let (mgr, _dir) = make_manager();
        let state = WorkflowState::new("idea-1", plan());
        mgr.save_checkpoint(&state).unwrap();
        assert_eq!(mgr.prune("idea-1", 5).unwrap(), 0);
    }

    #[test]
    fn test_prune_rejects_zero_retention() {
        let (mgr, _dir) = make_manager();
        let state = WorkflowState::new("idea-1", plan());
        mgr.save_checkpoint(&state).unwrap();
        mgr.save_checkpoint(&state).unwrap();

        let err = mgr.prune("idea-1", 0).unwrap_err();
        assert!(matches!(err, CheckpointError::InvalidRetention));
        // Nothing was deleted; the latest pointer still resolves.
        assert_eq!(mgr.list_checkpoints("idea-1").unwrap().len(), 2);
        assert_eq!(mgr.store().read_latest("idea-1").unwrap().checkpoint_id, 2);
    }
}
