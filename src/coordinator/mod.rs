//! Sub-agent execution under two disciplines.
//!
//! Silent tasks run immediately and concurrently with each other; their
//! failures are recorded, never propagated, and the batch is joined before
//! the pipeline advances. Interactive tasks present a plan and block at an
//! explicit suspension point until the operator approves or declines.
//!
//! A single invocation moves through:
//! `pending -> running -> {success, failure}` (silent), or
//! `pending -> awaiting_approval -> {running -> {success, failure}, skipped_by_user}`
//! (interactive). No retries happen here; a caller wanting retry invokes
//! again explicitly.

use crate::errors::AgentError;
use crate::trigger::{ExecutionMode, TriggerContext, TriggerDecision};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Everything an auxiliary agent may look at: the triggering step, prior
/// step outputs, and results already merged from earlier agents. Immutable
/// during a batch, so it is safely shared across concurrent silent tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentContext {
    pub project_id: String,
    pub step_id: String,
    pub trigger: TriggerContext,
    pub step_outputs: BTreeMap<String, serde_json::Value>,
    pub agent_results: BTreeMap<String, serde_json::Value>,
}

/// The opaque auxiliary-task business logic. Every agent implements this
/// one contract; there is no runtime capability probing.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    async fn invoke(
        &self,
        agent_name: &str,
        context: &AgentContext,
    ) -> Result<serde_json::Value, AgentError>;
}

/// Operator answer to an interactive plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    Approved,
    Declined,
}

/// External interactive collaborator (CLI/UI). The call blocks until the
/// operator answers; there is no timeout.
#[async_trait]
pub trait ApprovalPrompt: Send + Sync {
    async fn request_approval(&self, plan: &AgentPlan) -> anyhow::Result<ApprovalDecision>;
}

/// Human-readable plan summary presented before an interactive task runs.
#[derive(Debug, Clone)]
pub struct AgentPlan {
    pub agent_name: String,
    pub step_id: String,
    pub reasoning: String,
    pub context_summary: String,
}

impl AgentPlan {
    fn from_decision(decision: &TriggerDecision, context: &AgentContext) -> Self {
        Self {
            agent_name: decision.agent_name.clone(),
            step_id: context.step_id.clone(),
            reasoning: decision.reasoning.clone(),
            context_summary: context.trigger.summary(),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "Agent '{}' wants to run after step '{}'\n  Trigger: {}\n  Context: {}",
            self.agent_name, self.step_id, self.reasoning, self.context_summary
        )
    }
}

/// Terminal state of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentOutcome {
    Success,
    Failure,
    SkippedByUser,
}

/// Audit record for one sub-agent invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubAgentExecutionRecord {
    pub agent_name: String,
    pub execution_mode: ExecutionMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: AgentOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubAgentExecutionRecord {
    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Per-agent counters. Observability only, not load-bearing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentMetrics {
    pub invocations: u64,
    pub successes: u64,
    pub failures: u64,
    pub skips: u64,
    pub total_duration_secs: f64,
}

impl AgentMetrics {
    pub fn mean_duration_secs(&self) -> f64 {
        if self.invocations == 0 {
            0.0
        } else {
            self.total_duration_secs / self.invocations as f64
        }
    }

    fn record(&mut self, record: &SubAgentExecutionRecord) {
        self.invocations += 1;
        self.total_duration_secs += record.duration().as_secs_f64();
        match record.outcome {
            AgentOutcome::Success => self.successes += 1,
            AgentOutcome::Failure => self.failures += 1,
            AgentOutcome::SkippedByUser => self.skips += 1,
        }
    }
}

pub struct SubAgentCoordinator<I, P> {
    invoker: I,
    approval: P,
    metrics: Mutex<BTreeMap<String, AgentMetrics>>,
}

impl<I: AgentInvoker, P: ApprovalPrompt> SubAgentCoordinator<I, P> {
    pub fn new(invoker: I, approval: P) -> Self {
        Self {
            invoker,
            approval,
            metrics: Mutex::new(BTreeMap::new()),
        }
    }

    /// Execute one triggered agent under its configured discipline.
    ///
    /// Never returns an error: failures and declines become terminal
    /// outcomes in the record, leaving the pipeline free to proceed.
    pub async fn execute_agent(
        &self,
        decision: &TriggerDecision,
        context: &AgentContext,
    ) -> SubAgentExecutionRecord {
        let record = match decision.execution_mode {
            ExecutionMode::Silent => self.run_silent(decision, context).await,
            ExecutionMode::Interactive => self.run_interactive(decision, context).await,
        };
        self.metrics
            .lock()
            .expect("metrics lock poisoned")
            .entry(record.agent_name.clone())
            .or_default()
            .record(&record);
        record
    }

    /// Execute a whole triggered set for one step: silent tasks run
    /// concurrently and are joined; interactive tasks then run one at a
    /// time, each blocking on its approval prompt.
    pub async fn execute_batch(
        &self,
        decisions: &[TriggerDecision],
        context: &AgentContext,
    ) -> Vec<SubAgentExecutionRecord> {
        let (silent, interactive): (Vec<_>, Vec<_>) = decisions
            .iter()
            .filter(|d| d.triggered)
            .partition(|d| d.execution_mode == ExecutionMode::Silent);

        let mut records =
            futures::future::join_all(silent.iter().map(|d| self.execute_agent(d, context))).await;

        for decision in interactive {
            records.push(self.execute_agent(decision, context).await);
        }
        records
    }

    async fn run_silent(
        &self,
        decision: &TriggerDecision,
        context: &AgentContext,
    ) -> SubAgentExecutionRecord {
        let started_at = Utc::now();
        debug!(agent = %decision.agent_name, "running silent agent");
        let result = self.invoker.invoke(&decision.agent_name, context).await;
        finish(decision, started_at, result)
    }

    async fn run_interactive(
        &self,
        decision: &TriggerDecision,
        context: &AgentContext,
    ) -> SubAgentExecutionRecord {
        let started_at = Utc::now();
        let plan = AgentPlan::from_decision(decision, context);

        match self.approval.request_approval(&plan).await {
            Ok(ApprovalDecision::Approved) => {
                debug!(agent = %decision.agent_name, "approved, running interactive agent");
                let result = self.invoker.invoke(&decision.agent_name, context).await;
                finish(decision, started_at, result)
            }
            Ok(ApprovalDecision::Declined) => SubAgentExecutionRecord {
                agent_name: decision.agent_name.clone(),
                execution_mode: decision.execution_mode,
                started_at,
                finished_at: Utc::now(),
                outcome: AgentOutcome::SkippedByUser,
                result_payload: None,
                error: None,
            },
            Err(err) => {
                // The prompt collaborator itself failed; without an
                // affirmative approval the agent must not run.
                warn!(agent = %decision.agent_name, error = %err, "approval prompt failed");
                SubAgentExecutionRecord {
                    agent_name: decision.agent_name.clone(),
                    execution_mode: decision.execution_mode,
                    started_at,
                    finished_at: Utc::now(),
                    outcome: AgentOutcome::Failure,
                    result_payload: None,
                    error: Some(format!("approval prompt failed: {}", err)),
                }
            }
        }
    }

    /// Snapshot of per-agent counters.
    pub fn metrics(&self) -> BTreeMap<String, AgentMetrics> {
        self.metrics.lock().expect("metrics lock poisoned").clone()
    }
}

fn finish(
    decision: &TriggerDecision,
    started_at: DateTime<Utc>,
    result: Result<serde_json::Value, AgentError>,
) -> SubAgentExecutionRecord {
    match result {
        Ok(payload) => SubAgentExecutionRecord {
            agent_name: decision.agent_name.clone(),
            execution_mode: decision.execution_mode,
            started_at,
            finished_at: Utc::now(),
            outcome: AgentOutcome::Success,
            result_payload: Some(payload),
            error: None,
        },
        Err(err) => {
            warn!(agent = %decision.agent_name, error = %err, "sub-agent failed");
            SubAgentExecutionRecord {
                agent_name: decision.agent_name.clone(),
                execution_mode: decision.execution_mode,
                started_at,
                finished_at: Utc::now(),
                outcome: AgentOutcome::Failure,
                result_payload: None,
                error: Some(err.to_string()),
            }
        }
    }
}
