//! Project configuration.
//!
//! A venture project keeps everything under `.venture/` in the project
//! directory:
//!
//! ```text
//! .venture/
//!   venture.toml     project settings, step plan, agent commands
//!   rules.toml       trigger rules
//!   checkpoints/     one subdirectory per project id
//!   audit/           one JSONL decision log per project id
//! ```

use crate::invoke::CommandSpec;
use crate::workflow::StepPlan;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const VENTURE_DIR: &str = ".venture";
pub const CONFIG_FILE: &str = "venture.toml";
pub const RULES_FILE: &str = "rules.toml";

fn default_project() -> String {
    "default".to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    600
}

/// One entry of the `[[steps]]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    pub id: String,

    /// Display name; falls back to the id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub command: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl StepSpec {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    fn command_spec(&self) -> CommandSpec {
        CommandSpec {
            command: self.command.clone(),
            working_dir: self.working_dir.clone(),
            timeout_secs: self.timeout_secs,
        }
    }
}

/// Contents of `venture.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Default project id when the CLI is not given one.
    #[serde(default = "default_project")]
    pub project: String,

    /// Checkpoint after every completed step.
    #[serde(default = "default_true")]
    pub checkpointing: bool,

    /// Retention limit applied by `checkpoints prune` when no --keep is
    /// given. `None` keeps everything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_last: Option<usize>,

    /// Ordered pipeline steps.
    #[serde(default)]
    pub steps: Vec<StepSpec>,

    /// Commands for the auxiliary agents named by trigger rules.
    #[serde(default)]
    pub agents: BTreeMap<String, CommandSpec>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            project: default_project(),
            checkpointing: true,
            keep_last: None,
            steps: Vec::new(),
            agents: BTreeMap::new(),
        }
    }
}

/// Resolved configuration for one project directory.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub settings: Settings,
}

impl Config {
    /// Load `.venture/venture.toml`, or defaults when it does not exist.
    pub fn load(project_dir: impl AsRef<Path>) -> Result<Self> {
        let project_dir = project_dir.as_ref().to_path_buf();
        let path = project_dir.join(VENTURE_DIR).join(CONFIG_FILE);

        let settings = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let settings: Settings = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config: {}", path.display()))?;
            check_unique_steps(&settings)?;
            settings
        } else {
            Settings::default()
        };

        Ok(Self {
            project_dir,
            settings,
        })
    }

    pub fn venture_dir(&self) -> PathBuf {
        self.project_dir.join(VENTURE_DIR)
    }

    pub fn config_path(&self) -> PathBuf {
        self.venture_dir().join(CONFIG_FILE)
    }

    pub fn rules_path(&self) -> PathBuf {
        self.venture_dir().join(RULES_FILE)
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        self.venture_dir().join("checkpoints")
    }

    pub fn audit_dir(&self) -> PathBuf {
        self.venture_dir().join("audit")
    }

    pub fn is_initialized(&self) -> bool {
        self.config_path().exists()
    }

    /// Create the `.venture/` tree. Idempotent.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [self.venture_dir(), self.checkpoint_dir(), self.audit_dir()] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }

    pub fn step_plan(&self) -> StepPlan {
        StepPlan::new(self.settings.steps.iter().map(|s| s.id.clone()).collect())
    }

    pub fn step_commands(&self) -> BTreeMap<String, CommandSpec> {
        self.settings
            .steps
            .iter()
            .map(|s| (s.id.clone(), s.command_spec()))
            .collect()
    }

    pub fn agent_commands(&self) -> BTreeMap<String, CommandSpec> {
        self.settings.agents.clone()
    }

    /// Soft misconfiguration checks, returned as human-readable warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.settings.steps.is_empty() {
            warnings.push("No steps configured; `run` will complete immediately".to_string());
        }
        for step in &self.settings.steps {
            if step.command.trim().is_empty() {
                warnings.push(format!("Step '{}' has an empty command", step.id));
            }
        }
        if self.settings.keep_last == Some(0) {
            warnings.push("keep_last of 0 would delete every checkpoint on prune".to_string());
        }
        warnings
    }

    /// Write the starter `venture.toml` and `rules.toml`. Refuses to
    /// overwrite an existing configuration.
    pub fn write_starter_files(&self) -> Result<()> {
        if self.is_initialized() {
            bail!(
                "Project already initialized: {} exists",
                self.config_path().display()
            );
        }
        self.ensure_directories()?;
        fs::write(self.config_path(), STARTER_CONFIG)
            .with_context(|| format!("Failed to write {}", self.config_path().display()))?;
        fs::write(self.rules_path(), STARTER_RULES)
            .with_context(|| format!("Failed to write {}", self.rules_path().display()))?;
        Ok(())
    }
}

fn check_unique_steps(settings: &Settings) -> Result<()> {
    let mut seen = std::collections::BTreeSet::new();
    for step in &settings.steps {
        if !seen.insert(step.id.as_str()) {
            bail!("Duplicate step id '{}' in venture.toml", step.id);
        }
    }
    Ok(())
}

const STARTER_CONFIG: &str = r#"# Venture pipeline configuration.
#
# Each step runs as a shell command. It receives a JSON object on stdin
# with the project id, prior step outputs, and merged agent results, and
# answers on stdout with either a bare JSON payload or an envelope:
#   {"payload": {...}, "signals": {"confidence_score": 0.8, ...}}

project = "default"
checkpointing = true
# keep_last = 10

[[steps]]
id = "intake"
name = "Idea intake"
command = "echo '{}'"

[[steps]]
id = "market-research"
command = "echo '{}'"

[[steps]]
id = "scoring"
command = "echo '{}'"

# Agents referenced by rules.toml run the same stdin/stdout protocol.
# [agents.deep-research]
# command = "./agents/deep_research.sh"
"#;

const STARTER_RULES: &str = r#"# Trigger rules: after every step the reported signals are checked
# against each rule. A rule fires when ANY of its thresholds is met.
#
# [[rules]]
# agent_name = "deep-research"
# execution_mode = "interactive"   # or "silent" (the default)
#
# [rules.thresholds]
# confidence_threshold = 0.6       # fires when confidence <= 0.6
# files_threshold = 5              # fires when files_touched >= 5
# risk_tags = ["security", "payment"]
"#;
