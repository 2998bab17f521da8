//! Terminal output and interactive approval.

use crate::checkpoint::CheckpointMeta;
use crate::coordinator::{
    AgentMetrics, AgentOutcome, AgentPlan, ApprovalDecision, ApprovalPrompt,
    SubAgentExecutionRecord,
};
use crate::pipeline::RunReport;
use crate::workflow::WorkflowState;
use async_trait::async_trait;
use console::style;
use dialoguer::{Select, theme::ColorfulTheme};

pub struct PipelineUI {
    pub verbose: bool,
}

impl PipelineUI {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn print_run_header(&self, project_id: &str, state: &WorkflowState) {
        println!(
            "{} project {} ({}/{} steps done)",
            style("venture").bold().cyan(),
            style(project_id).bold(),
            state.completed_steps.len(),
            state.plan.len()
        );
    }

    pub fn print_crash_notice(&self, checkpoint_id: u64, last_step: Option<&str>) {
        println!(
            "{} previous run did not shut down cleanly; resuming from checkpoint {} (last completed: {})",
            style("!").bold().yellow(),
            checkpoint_id,
            last_step.unwrap_or("none")
        );
    }

    pub fn print_run_report(&self, report: &RunReport) {
        for step in &report.steps {
            println!("{} {}", style("✓").green(), style(&step.step_id).bold());
            if self.verbose {
                for decision in &step.decisions {
                    let marker = if decision.triggered {
                        style("fired").yellow()
                    } else {
                        style("quiet").dim()
                    };
                    println!("    {} {}: {}", marker, decision.agent_name, decision.reasoning);
                }
            }
            for record in &step.agent_records {
                self.print_agent_record(record);
            }
        }
        println!(
            "{} {} steps, {} agent runs",
            style("done").bold().green(),
            report.steps.len(),
            report.agents_run()
        );
    }

    fn print_agent_record(&self, record: &SubAgentExecutionRecord) {
        let line = match record.outcome {
            AgentOutcome::Success => format!(
                "    {} agent {} ({:.1}s)",
                style("✓").green(),
                record.agent_name,
                record.duration().as_secs_f64()
            ),
            AgentOutcome::Failure => format!(
                "    {} agent {}: {}",
                style("✗").red(),
                record.agent_name,
                record.error.as_deref().unwrap_or("failed")
            ),
            AgentOutcome::SkippedByUser => format!(
                "    {} agent {} skipped",
                style("-").dim(),
                record.agent_name
            ),
        };
        println!("{}", line);
    }

    pub fn print_status(&self, state: &WorkflowState) {
        println!("Project:   {}", style(&state.project_id).bold());
        println!("Status:    {}", state.status);
        println!(
            "Progress:  {}/{} steps",
            state.completed_steps.len(),
            state.plan.len()
        );
        if let Some(step) = state.last_completed_step() {
            println!("Last step: {}", step);
        }
        if let Some(next) = state.current_step_id() {
            println!("Next step: {}", next);
        }
        println!("Updated:   {}", state.last_updated.to_rfc3339());
    }

    pub fn print_checkpoint_list(&self, project_id: &str, metas: &[CheckpointMeta]) {
        println!(
            "{} checkpoints for {}",
            metas.len(),
            style(project_id).bold()
        );
        for meta in metas {
            let latest = if meta.is_latest { " (latest)" } else { "" };
            println!(
                "  #{:<6} {}  {:<11} {} steps  last: {}{}",
                meta.checkpoint_id,
                meta.created_at.format("%Y-%m-%d %H:%M:%S"),
                meta.status.to_string(),
                meta.steps_completed,
                meta.last_completed_step.as_deref().unwrap_or("-"),
                style(latest).dim()
            );
        }
    }

    pub fn print_metrics(&self, metrics: &std::collections::BTreeMap<String, AgentMetrics>) {
        if metrics.is_empty() {
            return;
        }
        println!("{}", style("agent metrics").bold());
        for (name, m) in metrics {
            println!(
                "  {:<20} {} runs ({} ok, {} failed, {} skipped), mean {:.1}s",
                name,
                m.invocations,
                m.successes,
                m.failures,
                m.skips,
                m.mean_duration_secs()
            );
        }
    }

    pub fn print_warnings(&self, warnings: &[String]) {
        for warning in warnings {
            println!("{} {}", style("warning:").bold().yellow(), warning);
        }
    }
}

/// Interactive approval backed by a terminal prompt. With `auto_approve`
/// (the --yes flag) every plan is approved without prompting.
pub struct ConsoleApproval {
    pub auto_approve: bool,
}

impl ConsoleApproval {
    pub fn new(auto_approve: bool) -> Self {
        Self { auto_approve }
    }
}

#[async_trait]
impl ApprovalPrompt for ConsoleApproval {
    async fn request_approval(&self, plan: &AgentPlan) -> anyhow::Result<ApprovalDecision> {
        println!("\n{}", plan.render());
        if self.auto_approve {
            println!("  {} (--yes flag)", style("Auto-approved").dim());
            return Ok(ApprovalDecision::Approved);
        }

        // Blocking prompt; the pipeline is suspended until answered.
        let plan = plan.clone();
        let selection = tokio::task::spawn_blocking(move || {
            Select::with_theme(&ColorfulTheme::default())
                .with_prompt(format!("Run agent '{}'?", plan.agent_name))
                .items(&["Yes, run it", "No, skip it"])
                .default(0)
                .interact()
        })
        .await??;

        match selection {
            0 => Ok(ApprovalDecision::Approved),
            _ => Ok(ApprovalDecision::Declined),
        }
    }
}
