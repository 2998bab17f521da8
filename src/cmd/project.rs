//! `init`, `status`, and `reset`.

use super::{load_config, resolve_project};
use crate::checkpoint::CheckpointManager;
use crate::ui::PipelineUI;
use anyhow::{Context, Result, bail};
use console::style;
use dialoguer::Confirm;
use std::fs;
use std::path::Path;

pub fn cmd_init(project_dir: &Path) -> Result<()> {
    let config = load_config(project_dir)?;
    config.write_starter_files()?;
    println!(
        "{} initialized {}",
        style("✓").green(),
        config.venture_dir().display()
    );
    println!("  Edit {} to define your pipeline steps,", config.config_path().display());
    println!("  and {} to configure trigger rules.", config.rules_path().display());
    Ok(())
}

pub fn cmd_status(project_dir: &Path, project: Option<String>, verbose: bool) -> Result<()> {
    let config = load_config(project_dir)?;
    let project_id = resolve_project(&config, project);
    let manager = CheckpointManager::new(config.checkpoint_dir());

    if !manager.store().project_exists(&project_id) {
        println!("No checkpoints for project '{}'; nothing has run yet.", project_id);
        return Ok(());
    }

    let report = manager.resume_workflow(&project_id)?;
    let ui = PipelineUI::new(verbose);
    if report.crash_detected {
        ui.print_crash_notice(report.checkpoint_id, report.state.last_completed_step());
    }
    ui.print_status(&report.state);
    Ok(())
}

/// Delete all recorded state (checkpoints and audit log) for a project.
pub fn cmd_reset(project_dir: &Path, project: Option<String>, force: bool) -> Result<()> {
    let config = load_config(project_dir)?;
    let project_id = resolve_project(&config, project);

    let checkpoint_dir = config.checkpoint_dir().join(&project_id);
    let audit_file = config.audit_dir().join(format!("{}.jsonl", project_id));
    if !checkpoint_dir.exists() && !audit_file.exists() {
        println!("Nothing to reset for project '{}'.", project_id);
        return Ok(());
    }

    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete all checkpoints and audit history for '{}'?",
                project_id
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            bail!("Reset aborted");
        }
    }

    if checkpoint_dir.exists() {
        fs::remove_dir_all(&checkpoint_dir)
            .with_context(|| format!("Failed to remove {}", checkpoint_dir.display()))?;
    }
    if audit_file.exists() {
        fs::remove_file(&audit_file)
            .with_context(|| format!("Failed to remove {}", audit_file.display()))?;
    }
    println!("{} reset project '{}'", style("✓").green(), project_id);
    Ok(())
}
