//! `config show|validate|init`.

use super::load_config;
use crate::trigger::RuleSet;
use crate::ui::PipelineUI;
use anyhow::{Context, Result};
use console::style;
use std::path::Path;

pub fn cmd_show(project_dir: &Path) -> Result<()> {
    let config = load_config(project_dir)?;
    if !config.is_initialized() {
        println!(
            "No {} found; showing defaults.",
            config.config_path().display()
        );
    }
    let toml =
        toml::to_string_pretty(&config.settings).context("Failed to render configuration")?;
    print!("{}", toml);
    Ok(())
}

/// Validate venture.toml and rules.toml together, including the
/// cross-reference: every rule's agent needs a configured command.
pub fn cmd_validate(project_dir: &Path, verbose: bool) -> Result<()> {
    let config = load_config(project_dir)?;
    let rules = RuleSet::load_or_default(&config.rules_path())?;

    let mut warnings = config.validate();
    warnings.extend(rules.validate());
    for rule in &rules.rules {
        if !config.settings.agents.contains_key(&rule.agent_name) {
            warnings.push(format!(
                "Rule for agent '{}' has no [agents.{}] command in venture.toml",
                rule.agent_name, rule.agent_name
            ));
        }
    }

    let ui = PipelineUI::new(verbose);
    ui.print_warnings(&warnings);
    if warnings.is_empty() {
        println!(
            "{} configuration valid: {} steps, {} rules ({} enabled)",
            style("✓").green(),
            config.settings.steps.len(),
            rules.rules.len(),
            rules.enabled_rule_count()
        );
    }
    Ok(())
}

pub fn cmd_init(project_dir: &Path) -> Result<()> {
    super::project::cmd_init(project_dir)
}
