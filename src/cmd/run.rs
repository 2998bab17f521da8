//! `run` and `resume`.

use super::{load_config, resolve_project};
use crate::audit::DecisionLog;
use crate::checkpoint::CheckpointManager;
use crate::config::Config;
use crate::coordinator::SubAgentCoordinator;
use crate::invoke::{CommandAgentInvoker, CommandStepExecutor};
use crate::pipeline::PipelineRunner;
use crate::trigger::RuleSet;
use crate::ui::{ConsoleApproval, PipelineUI};
use crate::workflow::{WorkflowState, WorkflowStatus};
use anyhow::{Result, bail};
use std::path::Path;

pub struct RunOptions {
    pub project: Option<String>,
    pub yes: bool,
    pub no_checkpoint: bool,
    pub verbose: bool,
}

/// Start a fresh run of the configured pipeline.
pub async fn cmd_run(project_dir: &Path, opts: RunOptions) -> Result<()> {
    let config = load_config(project_dir)?;
    let project_id = resolve_project(&config, opts.project.clone());
    let manager = CheckpointManager::new(config.checkpoint_dir());

    // Refuse to silently fork history: an unfinished run must be resumed
    // (or reset) explicitly.
    if manager.store().project_exists(&project_id) {
        let latest = manager.load_checkpoint(&project_id, None)?;
        if latest.status != WorkflowStatus::Completed {
            bail!(
                "Project '{}' has an unfinished run ({}). Use `venture resume` to continue it, or `venture reset` to discard it.",
                project_id,
                latest.status
            );
        }
    }

    let plan = config.step_plan();
    if plan.is_empty() {
        bail!(
            "No steps configured in {}. Run `venture init` or add [[steps]] entries.",
            config.config_path().display()
        );
    }

    let mut state = WorkflowState::new(&project_id, plan);
    execute(&config, &mut state, &opts, &manager).await
}

/// Continue from a checkpoint, latest by default.
pub async fn cmd_resume(
    project_dir: &Path,
    checkpoint: Option<u64>,
    opts: RunOptions,
) -> Result<()> {
    let config = load_config(project_dir)?;
    let project_id = resolve_project(&config, opts.project.clone());
    let manager = CheckpointManager::new(config.checkpoint_dir());
    let ui = PipelineUI::new(opts.verbose);

    let mut state = match checkpoint {
        Some(id) => manager.load_checkpoint(&project_id, Some(id))?,
        None => {
            let report = manager.resume_workflow(&project_id)?;
            if report.crash_detected {
                ui.print_crash_notice(report.checkpoint_id, report.state.last_completed_step());
            }
            report.state
        }
    };

    if state.is_finished() {
        println!("Project '{}' already completed; nothing to resume.", project_id);
        return Ok(());
    }
    if state.status == WorkflowStatus::Crashed {
        println!(
            "Previous run failed after step '{}'; retrying from '{}'.",
            state.last_completed_step().unwrap_or("none"),
            state.current_step_id().unwrap_or("?")
        );
    }

    execute(&config, &mut state, &opts, &manager).await
}

async fn execute(
    config: &Config,
    state: &mut WorkflowState,
    opts: &RunOptions,
    manager: &CheckpointManager,
) -> Result<()> {
    config.ensure_directories()?;
    let ui = PipelineUI::new(opts.verbose);

    let rules = RuleSet::load_or_default(&config.rules_path())?;
    ui.print_warnings(&config.validate());
    ui.print_warnings(&rules.validate());

    let audit = DecisionLog::new(&config.audit_dir(), &state.project_id);
    let executor = CommandStepExecutor::new(&config.project_dir, config.step_commands());
    let invoker = CommandAgentInvoker::new(&config.project_dir, config.agent_commands());
    let coordinator = SubAgentCoordinator::new(invoker, ConsoleApproval::new(opts.yes));

    let checkpointing = config.settings.checkpointing && !opts.no_checkpoint;
    let runner = PipelineRunner::new(
        &executor,
        &coordinator,
        &rules,
        &audit,
        checkpointing.then_some(manager),
    );

    ui.print_run_header(&state.project_id, state);
    let report = runner.run(state).await?;
    ui.print_run_report(&report);
    ui.print_metrics(&coordinator.metrics());
    Ok(())
}
