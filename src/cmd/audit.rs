//! `audit export`.

use super::{load_config, resolve_project};
use crate::audit::DecisionLog;
use anyhow::Result;
use console::style;
use std::path::{Path, PathBuf};

pub fn cmd_export(project_dir: &Path, project: Option<String>, output: PathBuf) -> Result<()> {
    let config = load_config(project_dir)?;
    let project_id = resolve_project(&config, project);

    let log = DecisionLog::new(&config.audit_dir(), &project_id);
    let count = log.export_json(&output)?;
    println!(
        "{} exported {} audit entries to {}",
        style("✓").green(),
        count,
        output.display()
    );
    Ok(())
}
