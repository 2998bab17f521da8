//! `checkpoints list|show|prune`.

use super::{load_config, resolve_project};
use crate::checkpoint::CheckpointManager;
use crate::ui::PipelineUI;
use anyhow::{Context, Result, bail};
use std::path::Path;

pub fn cmd_list(project_dir: &Path, project: Option<String>, verbose: bool) -> Result<()> {
    let config = load_config(project_dir)?;
    let project_id = resolve_project(&config, project);
    let manager = CheckpointManager::new(config.checkpoint_dir());

    if !manager.store().project_exists(&project_id) {
        println!("No checkpoints for project '{}'.", project_id);
        return Ok(());
    }
    let metas = manager.list_checkpoints(&project_id)?;
    PipelineUI::new(verbose).print_checkpoint_list(&project_id, &metas);
    Ok(())
}

/// Dump one checkpoint's full workflow state as pretty JSON.
pub fn cmd_show(project_dir: &Path, project: Option<String>, checkpoint_id: u64) -> Result<()> {
    let config = load_config(project_dir)?;
    let project_id = resolve_project(&config, project);
    let manager = CheckpointManager::new(config.checkpoint_dir());

    let state = manager.load_checkpoint(&project_id, Some(checkpoint_id))?;
    let json = serde_json::to_string_pretty(&state).context("Failed to render checkpoint")?;
    println!("{}", json);
    Ok(())
}

pub fn cmd_prune(project_dir: &Path, project: Option<String>, keep: Option<usize>) -> Result<()> {
    let config = load_config(project_dir)?;
    let project_id = resolve_project(&config, project);
    let manager = CheckpointManager::new(config.checkpoint_dir());

    let Some(keep_last) = keep.or(config.settings.keep_last) else {
        bail!("No retention limit given: pass --keep <n> or set keep_last in venture.toml");
    };
    if keep_last == 0 {
        bail!("Refusing to prune every checkpoint; use `venture reset` to discard a project");
    }

    let removed = manager.prune(&project_id, keep_last)?;
    println!(
        "Pruned {} checkpoint(s) for '{}', kept the newest {}.",
        removed, project_id, keep_last
    );
    Ok(())
}
