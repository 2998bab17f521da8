//! Execution context snapshot fed to trigger evaluation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Categorical complexity signal reported by a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexitySignal {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for ComplexitySignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        write!(f, "{}", s)
    }
}

/// A snapshot of what the last step touched and how confident it was.
///
/// Built fresh before each trigger evaluation and never persisted on its
/// own; it travels inside the decision records written to the audit log.
/// Every field is optional (or empty): a missing signal can never satisfy
/// a threshold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_touched: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lines_changed: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<ComplexitySignal>,

    /// Step self-assessed confidence in its result, 0.0 to 1.0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,

    /// Free-form risk tags such as "security", "auth", "payment".
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub risk_indicators: BTreeSet<String>,

    /// Whether the step's result depends on an external data source.
    #[serde(default)]
    pub external_dependency: bool,
}

impl TriggerContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files_touched(mut self, count: u64) -> Self {
        self.files_touched = Some(count);
        self
    }

    pub fn with_lines_changed(mut self, count: u64) -> Self {
        self.lines_changed = Some(count);
        self
    }

    pub fn with_complexity(mut self, signal: ComplexitySignal) -> Self {
        self.complexity = Some(signal);
        self
    }

    pub fn with_confidence(mut self, score: f64) -> Self {
        self.confidence_score = Some(score);
        self
    }

    pub fn with_risk_indicator(mut self, tag: impl Into<String>) -> Self {
        self.risk_indicators.insert(tag.into());
        self
    }

    pub fn with_external_dependency(mut self) -> Self {
        self.external_dependency = true;
        self
    }

    /// Short human-readable summary used in plan presentations.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(n) = self.files_touched {
            parts.push(format!("files_touched={}", n));
        }
        if let Some(n) = self.lines_changed {
            parts.push(format!("lines_changed={}", n));
        }
        if let Some(c) = self.complexity {
            parts.push(format!("complexity={}", c));
        }
        if let Some(s) = self.confidence_score {
            parts.push(format!("confidence={}", s));
        }
        if !self.risk_indicators.is_empty() {
            let tags: Vec<&str> = self.risk_indicators.iter().map(|s| s.as_str()).collect();
            parts.push(format!("risk=[{}]", tags.join(",")));
        }
        if self.external_dependency {
            parts.push("external_dependency".to_string());
        }
        if parts.is_empty() {
            "no signals".to_string()
        } else {
            parts.join(", ")
        }
    }
}
