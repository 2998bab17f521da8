//! Sequential pipeline runner.
//!
//! Drives a workflow from its current position to completion: execute the
//! step, commit the output to the workflow state, checkpoint, evaluate
//! trigger rules against the step's reported signals, then run the
//! triggered sub-agents before advancing. A step failure marks the state
//! crashed and persists it, so the next `resume` starts from the last
//! durable position.

use crate::audit::DecisionLog;
use crate::checkpoint::manager::CheckpointManager;
use crate::coordinator::{
    AgentContext, AgentInvoker, AgentOutcome, ApprovalPrompt, SubAgentCoordinator,
    SubAgentExecutionRecord,
};
use crate::trigger::{RuleSet, TriggerContext, TriggerDecision, evaluate};
use crate::workflow::{WorkflowState, WorkflowStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// What a step receives: prior outputs and previously merged agent results.
#[derive(Debug, Clone, Serialize)]
pub struct StepInputs {
    pub project_id: String,
    pub prior_outputs: BTreeMap<String, serde_json::Value>,
    pub agent_results: BTreeMap<String, serde_json::Value>,
}

/// What a step produces: its output payload plus the signals the trigger
/// engine evaluates.
#[derive(Debug, Clone)]
pub struct StepReport {
    pub payload: serde_json::Value,
    pub signals: TriggerContext,
}

/// The opaque per-step business logic.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute(&self, step_id: &str, inputs: &StepInputs) -> Result<StepReport>;
}

/// Everything that happened during one step, reported to the caller for
/// display.
#[derive(Debug, Clone)]
pub struct StepSummary {
    pub step_id: String,
    pub checkpoint_id: Option<u64>,
    pub decisions: Vec<TriggerDecision>,
    pub agent_records: Vec<SubAgentExecutionRecord>,
}

/// Outcome of a full run (or resumed run) of the pipeline.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub steps: Vec<StepSummary>,
}

impl RunReport {
    pub fn agents_run(&self) -> usize {
        self.steps.iter().map(|s| s.agent_records.len()).sum()
    }
}

pub struct PipelineRunner<'a, S, I, P> {
    executor: &'a S,
    coordinator: &'a SubAgentCoordinator<I, P>,
    rules: &'a RuleSet,
    audit: &'a DecisionLog,
    /// `None` disables checkpointing for this run.
    checkpoints: Option<&'a CheckpointManager>,
}

impl<'a, S, I, P> PipelineRunner<'a, S, I, P>
where
    S: StepExecutor,
    I: AgentInvoker,
    P: ApprovalPrompt,
{
    pub fn new(
        executor: &'a S,
        coordinator: &'a SubAgentCoordinator<I, P>,
        rules: &'a RuleSet,
        audit: &'a DecisionLog,
        checkpoints: Option<&'a CheckpointManager>,
    ) -> Self {
        Self {
            executor,
            coordinator,
            rules,
            audit,
            checkpoints,
        }
    }

    /// Run every remaining step. The state is mutated in place and
    /// checkpointed after each completed step; on step failure it is
    /// marked crashed and persisted before the error propagates.
    pub async fn run(&self, state: &mut WorkflowState) -> Result<RunReport> {
        let mut report = RunReport::default();
        if matches!(state.status, WorkflowStatus::Paused | WorkflowStatus::Crashed) {
            state.mark_resumed();
        }
        // Agent results already merged in earlier steps of this run.
        let mut agent_results: BTreeMap<String, serde_json::Value> = BTreeMap::new();

        while let Some(step_id) = state.current_step_id().map(str::to_string) {
            let summary = self.run_step(state, &step_id, &mut agent_results).await?;
            report.steps.push(summary);
        }

        info!(
            project = %state.project_id,
            steps = report.steps.len(),
            agents = report.agents_run(),
            "pipeline finished"
        );
        Ok(report)
    }

    async fn run_step(
        &self,
        state: &mut WorkflowState,
        step_id: &str,
        agent_results: &mut BTreeMap<String, serde_json::Value>,
    ) -> Result<StepSummary> {
        info!(project = %state.project_id, step = %step_id, "executing step");

        let inputs = StepInputs {
            project_id: state.project_id.clone(),
            prior_outputs: state.step_outputs.clone(),
            agent_results: agent_results.clone(),
        };

        let step_report = match self.executor.execute(step_id, &inputs).await {
            Ok(report) => report,
            Err(err) => {
                self.persist_crash(state);
                return Err(err).with_context(|| format!("Step '{}' failed", step_id));
            }
        };

        state
            .complete_step(step_id, step_report.payload.clone())
            .with_context(|| format!("Failed to commit step '{}'", step_id))?;

        let checkpoint_id = match self.checkpoints {
            Some(manager) => Some(
                manager
                    .save_checkpoint(state)
                    .with_context(|| format!("Failed to checkpoint after step '{}'", step_id))?,
            ),
            None => None,
        };

        let decisions = evaluate(&step_report.signals, self.rules);
        for decision in &decisions {
            self.audit.log_decision(decision)?;
        }

        let agent_context = AgentContext {
            project_id: state.project_id.clone(),
            step_id: step_id.to_string(),
            trigger: step_report.signals.clone(),
            step_outputs: state.step_outputs.clone(),
            agent_results: agent_results.clone(),
        };
        let records = self.coordinator.execute_batch(&decisions, &agent_context).await;

        for record in &records {
            self.audit.log_execution(record)?;
            match record.outcome {
                AgentOutcome::Success => {
                    if let Some(payload) = &record.result_payload {
                        agent_results.insert(record.agent_name.clone(), payload.clone());
                    }
                }
                AgentOutcome::Failure => {
                    warn!(
                        agent = %record.agent_name,
                        error = record.error.as_deref().unwrap_or("unknown"),
                        "sub-agent failed; pipeline continues"
                    );
                }
                AgentOutcome::SkippedByUser => {
                    info!(agent = %record.agent_name, "sub-agent skipped by user");
                }
            }
        }

        Ok(StepSummary {
            step_id: step_id.to_string(),
            checkpoint_id,
            decisions,
            agent_records: records,
        })
    }

    /// Best-effort durable record of the crash; the original step error is
    /// the one worth surfacing even if this write also fails.
    fn persist_crash(&self, state: &mut WorkflowState) {
        state.mark_crashed();
        if let Some(manager) = self.checkpoints
            && let Err(err) = manager.save_checkpoint(state)
        {
            warn!(project = %state.project_id, error = %err, "failed to checkpoint crashed state");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{AgentPlan, ApprovalDecision};
    use crate::errors::AgentError;
    use crate::trigger::TriggerRule;
    use crate::workflow::{StepPlan, WorkflowStatus};
    use anyhow::bail;
    use serde_json::json;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Executor with canned per-step reports; steps listed in `fail_on`
    /// error out.
    struct ScriptedExecutor {
        signals: BTreeMap<String, TriggerContext>,
        fail_on: Vec<String>,
        seen_inputs: Mutex<Vec<StepInputs>>,
    }

    impl ScriptedExecutor {
        fn new() -> Self {
            Self {
                signals: BTreeMap::new(),
                fail_on: Vec::new(),
                seen_inputs: Mutex::new(Vec::new()),
            }
        }

        fn with_signals(mut self, step_id: &str, signals: TriggerContext) -> Self {
            self.signals.insert(step_id.to_string(), signals);
            self
        }

        fn failing_on(mut self, step_id: &str) -> Self {
            self.fail_on.push(step_id.to_string());
            self
        }
    }

    #[async_trait]
    impl StepExecutor for ScriptedExecutor {
        async fn execute(&self, step_id: &str, inputs: &StepInputs) -> Result<StepReport> {
            self.seen_inputs.lock().unwrap().push(inputs.clone());
            if self.fail_on.iter().any(|s| s == step_id) {
                bail!("scripted failure in {}", step_id);
            }
            Ok(StepReport {
                payload: json!({"step": step_id}),
                signals: self.signals.get(step_id).cloned().unwrap_or_default(),
            })
        }
    }

    struct OkInvoker;

    #[async_trait]
    impl AgentInvoker for OkInvoker {
        async fn invoke(
            &self,
            agent_name: &str,
            _context: &AgentContext,
        ) -> Result<serde_json::Value, AgentError> {
            if agent_name.contains("fail") {
                Err(AgentError::Failed {
                    agent_name: agent_name.to_string(),
                    message: "agent down".to_string(),
                })
            } else {
                Ok(json!({"from": agent_name}))
            }
        }
    }

    struct AutoApprove;

    #[async_trait]
    impl ApprovalPrompt for AutoApprove {
        async fn request_approval(&self, _plan: &AgentPlan) -> anyhow::Result<ApprovalDecision> {
            Ok(ApprovalDecision::Approved)
        }
    }

    fn plan() -> StepPlan {
        StepPlan::new(vec![
            "intake".to_string(),
            "market-research".to_string(),
            "scoring".to_string(),
        ])
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        manager: CheckpointManager,
        audit: DecisionLog,
        rules: RuleSet,
    }

    fn fixture(rules: Vec<TriggerRule>) -> Fixture {
        let dir = tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path().join("checkpoints"));
        std::fs::create_dir_all(dir.path().join("audit")).unwrap();
        let audit = DecisionLog::new(&dir.path().join("audit"), "idea-1");
        Fixture {
            _dir: dir,
            manager,
            audit,
            rules: RuleSet::new(rules).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_full_run_completes_and_checkpoints_each_step() {
        let fx = fixture(vec![]);
        let executor = ScriptedExecutor::new();
        let coordinator = SubAgentCoordinator::new(OkInvoker, AutoApprove);
        let runner = PipelineRunner::new(
            &executor,
            &coordinator,
            &fx.rules,
            &fx.audit,
            Some(&fx.manager),
        );

        let mut state = WorkflowState::new("idea-1", plan());
        let report = runner.run(&mut state).await.unwrap();

        assert_eq!(state.status, WorkflowStatus::Completed);
        assert_eq!(report.steps.len(), 3);
        assert_eq!(
            report.steps.iter().filter_map(|s| s.checkpoint_id).count(),
            3
        );
        assert_eq!(fx.manager.list_checkpoints("idea-1").unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_step_failure_persists_crashed_state() {
        let fx = fixture(vec![]);
        let executor = ScriptedExecutor::new().failing_on("market-research");
        let coordinator = SubAgentCoordinator::new(OkInvoker, AutoApprove);
        let runner = PipelineRunner::new(
            &executor,
            &coordinator,
            &fx.rules,
            &fx.audit,
            Some(&fx.manager),
        );

        let mut state = WorkflowState::new("idea-1", plan());
        let err = runner.run(&mut state).await.unwrap_err();
        assert!(err.to_string().contains("market-research"));
        assert_eq!(state.status, WorkflowStatus::Crashed);

        // The failure was recorded durably, so a fresh process sees a
        // marked crash rather than an ambiguous in_progress snapshot.
        assert!(!fx.manager.detect_crash("idea-1").unwrap());
        let resumed = fx.manager.resume_workflow("idea-1").unwrap();
        assert_eq!(resumed.state.status, WorkflowStatus::Crashed);
        assert_eq!(resumed.state.completed_steps, vec!["intake"]);
    }

    #[tokio::test]
    async fn test_resume_after_crash_finishes_remaining_steps() {
        let fx = fixture(vec![]);
        let coordinator = SubAgentCoordinator::new(OkInvoker, AutoApprove);

        let mut state = WorkflowState::new("idea-1", plan());
        {
            let executor = ScriptedExecutor::new().failing_on("market-research");
            let runner = PipelineRunner::new(
                &executor,
                &coordinator,
                &fx.rules,
                &fx.audit,
                Some(&fx.manager),
            );
            runner.run(&mut state).await.unwrap_err();
        }

        // New process: load the latest checkpoint and run to completion.
        let mut state = fx.manager.resume_workflow("idea-1").unwrap().state;
        assert_eq!(state.status, WorkflowStatus::Crashed);
        let executor = ScriptedExecutor::new();
        let runner = PipelineRunner::new(
            &executor,
            &coordinator,
            &fx.rules,
            &fx.audit,
            Some(&fx.manager),
        );
        let report = runner.run(&mut state).await.unwrap();

        assert_eq!(state.status, WorkflowStatus::Completed);
        // Only the remaining two steps ran; intake's output survived.
        assert_eq!(report.steps.len(), 2);
        assert!(state.step_outputs.contains_key("intake"));
        assert_eq!(state.completed_steps.len(), 3);
    }

    #[tokio::test]
    async fn test_triggered_agents_logged_and_merged() {
        let fx = fixture(vec![TriggerRule::silent("explorer").with_files_threshold(2)]);
        let executor = ScriptedExecutor::new()
            .with_signals("intake", TriggerContext::new().with_files_touched(3));
        let coordinator = SubAgentCoordinator::new(OkInvoker, AutoApprove);
        let runner = PipelineRunner::new(
            &executor,
            &coordinator,
            &fx.rules,
            &fx.audit,
            Some(&fx.manager),
        );

        let mut state = WorkflowState::new("idea-1", plan());
        let report = runner.run(&mut state).await.unwrap();

        // One decision per rule per step; one agent run on intake only.
        let intake = &report.steps[0];
        assert_eq!(intake.decisions.len(), 1);
        assert!(intake.decisions[0].triggered);
        assert_eq!(intake.agent_records.len(), 1);
        assert_eq!(intake.agent_records[0].outcome, AgentOutcome::Success);
        assert!(report.steps[1].agent_records.is_empty());

        // The merged result is offered to the next step's inputs.
        let seen = executor.seen_inputs.lock().unwrap();
        assert!(seen[1].agent_results.contains_key("explorer"));
        assert!(seen[0].agent_results.is_empty());

        // Audit trail: 3 decisions (one per step) + 1 execution.
        let entries = fx.audit.read_all().unwrap();
        assert_eq!(entries.len(), 4);
    }

    #[tokio::test]
    async fn test_agent_failure_does_not_stop_pipeline() {
        let fx = fixture(vec![TriggerRule::silent("fail-agent").with_files_threshold(1)]);
        let executor = ScriptedExecutor::new()
            .with_signals("intake", TriggerContext::new().with_files_touched(5));
        let coordinator = SubAgentCoordinator::new(OkInvoker, AutoApprove);
        let runner = PipelineRunner::new(
            &executor,
            &coordinator,
            &fx.rules,
            &fx.audit,
            Some(&fx.manager),
        );

        let mut state = WorkflowState::new("idea-1", plan());
        let report = runner.run(&mut state).await.unwrap();

        assert_eq!(state.status, WorkflowStatus::Completed);
        assert_eq!(report.steps[0].agent_records[0].outcome, AgentOutcome::Failure);
        // Failed agent contributes no result downstream.
        let seen = executor.seen_inputs.lock().unwrap();
        assert!(seen[1].agent_results.is_empty());
    }

    #[tokio::test]
    async fn test_checkpointing_disabled_leaves_no_snapshots() {
        let fx = fixture(vec![]);
        let executor = ScriptedExecutor::new();
        let coordinator = SubAgentCoordinator::new(OkInvoker, AutoApprove);
        let runner = PipelineRunner::new(&executor, &coordinator, &fx.rules, &fx.audit, None);

        let mut state = WorkflowState::new("idea-1", plan());
        let report = runner.run(&mut state).await.unwrap();

        assert_eq!(state.status, WorkflowStatus::Completed);
        assert!(report.steps.iter().all(|s| s.checkpoint_id.is_none()));
        assert!(fx.manager.list_checkpoints("idea-1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prior_outputs_flow_to_later_steps() {
        let fx = fixture(vec![]);
        let executor = ScriptedExecutor::new();
        let coordinator = SubAgentCoordinator::new(OkInvoker, AutoApprove);
        let runner = PipelineRunner::new(
            &executor,
            &coordinator,
            &fx.rules,
            &fx.audit,
            Some(&fx.manager),
        );

        let mut state = WorkflowState::new("idea-1", plan());
        runner.run(&mut state).await.unwrap();

        let seen = executor.seen_inputs.lock().unwrap();
        assert!(seen[0].prior_outputs.is_empty());
        assert_eq!(seen[1].prior_outputs["intake"], json!({"step": "intake"}));
        assert_eq!(seen[2].prior_outputs.len(), 2);
    }
}
