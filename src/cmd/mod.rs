//! CLI subcommand implementations.

pub mod audit;
pub mod checkpoints;
pub mod config;
pub mod project;
pub mod run;

use crate::config::Config;
use anyhow::Result;
use std::path::Path;

/// Resolve the project id: explicit flag wins, then the configured
/// default.
pub(crate) fn resolve_project(config: &Config, project: Option<String>) -> String {
    project.unwrap_or_else(|| config.settings.project.clone())
}

pub(crate) fn load_config(project_dir: &Path) -> Result<Config> {
    Config::load(project_dir)
}
