//! Trigger rule configuration.
//!
//! Rules are loaded once at startup from `.venture/rules.toml` and treated
//! as read-only by the engine. Each rule is a typed struct with named
//! threshold fields, validated at load time so misconfiguration surfaces
//! before any pipeline run.

use super::context::ComplexitySignal;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How a triggered agent is executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Run immediately, result merged without operator involvement.
    #[default]
    Silent,
    /// Present a plan and block for operator approval first.
    Interactive,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Silent => write!(f, "silent"),
            Self::Interactive => write!(f, "interactive"),
        }
    }
}

/// Named threshold conditions for one rule.
///
/// Comparison directions are fixed: counts fire at `>=`, confidence fires
/// at `<=` (low confidence invites review), complexity fires at-or-above
/// the configured level, risk tags fire on any overlap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_threshold: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc_threshold: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity_at_least: Option<ComplexitySignal>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub risk_tags: Vec<String>,

    /// Fire when the step reports an external data dependency.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub on_external_dependency: bool,
}

impl Thresholds {
    pub fn is_empty(&self) -> bool {
        self.files_threshold.is_none()
            && self.loc_threshold.is_none()
            && self.confidence_threshold.is_none()
            && self.complexity_at_least.is_none()
            && self.risk_tags.is_empty()
            && !self.on_external_dependency
    }
}

/// One rule governing one auxiliary agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRule {
    pub agent_name: String,

    #[serde(default)]
    pub execution_mode: ExecutionMode,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub thresholds: Thresholds,
}

fn default_enabled() -> bool {
    true
}

impl TriggerRule {
    /// Create a new silent rule.
    pub fn silent(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            execution_mode: ExecutionMode::Silent,
            enabled: true,
            thresholds: Thresholds::default(),
        }
    }

    /// Create a new interactive rule.
    pub fn interactive(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            execution_mode: ExecutionMode::Interactive,
            enabled: true,
            thresholds: Thresholds::default(),
        }
    }

    pub fn with_files_threshold(mut self, n: u64) -> Self {
        self.thresholds.files_threshold = Some(n);
        self
    }

    pub fn with_loc_threshold(mut self, n: u64) -> Self {
        self.thresholds.loc_threshold = Some(n);
        self
    }

    pub fn with_confidence_threshold(mut self, score: f64) -> Self {
        self.thresholds.confidence_threshold = Some(score);
        self
    }

    pub fn with_complexity_at_least(mut self, level: ComplexitySignal) -> Self {
        self.thresholds.complexity_at_least = Some(level);
        self
    }

    pub fn with_risk_tag(mut self, tag: impl Into<String>) -> Self {
        self.thresholds.risk_tags.push(tag.into());
        self
    }

    pub fn on_external_dependency(mut self) -> Self {
        self.thresholds.on_external_dependency = true;
        self
    }

    /// Disable this rule without deleting it.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Validate this rule, returning human-readable warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.thresholds.is_empty() {
            warnings.push(format!(
                "Rule for agent '{}' has no thresholds configured and can never fire",
                self.agent_name
            ));
        }
        if let Some(score) = self.thresholds.confidence_threshold
            && !(0.0..=1.0).contains(&score)
        {
            warnings.push(format!(
                "Rule for agent '{}' has confidence_threshold {} outside 0.0-1.0",
                self.agent_name, score
            ));
        }
        if self.thresholds.files_threshold == Some(0) {
            warnings.push(format!(
                "Rule for agent '{}' has files_threshold of 0 and fires on every step",
                self.agent_name
            ));
        }
        if self.thresholds.loc_threshold == Some(0) {
            warnings.push(format!(
                "Rule for agent '{}' has loc_threshold of 0 and fires on every step",
                self.agent_name
            ));
        }
        warnings
    }
}

/// The full rule configuration: exactly one rule per agent name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    #[serde(default)]
    pub rules: Vec<TriggerRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<TriggerRule>) -> Result<Self> {
        let set = Self { rules };
        set.check_unique_agents()?;
        Ok(set)
    }

    /// Parse rules from a TOML string. Duplicate agent names are a hard
    /// error; soft misconfiguration surfaces via `validate`.
    pub fn parse(content: &str) -> Result<Self> {
        let set: Self = toml::from_str(content).context("Failed to parse trigger rules")?;
        set.check_unique_agents()?;
        Ok(set)
    }

    /// Load rules from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rules file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Load rules from the default location, or an empty set if the file
    /// does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    fn check_unique_agents(&self) -> Result<()> {
        let mut seen = std::collections::BTreeSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.agent_name.as_str()) {
                bail!(
                    "Duplicate trigger rule for agent '{}': exactly one rule per agent is allowed",
                    rule.agent_name
                );
            }
        }
        Ok(())
    }

    /// Validate all rules and return accumulated warnings.
    pub fn validate(&self) -> Vec<String> {
        self.rules.iter().flat_map(|r| r.validate()).collect()
    }

    pub fn enabled_rule_count(&self) -> usize {
        self.rules.iter().filter(|r| r.enabled).count()
    }

    pub fn rule_for(&self, agent_name: &str) -> Option<&TriggerRule> {
        self.rules.iter().find(|r| r.agent_name == agent_name)
    }
}
