//! Append-only decision/execution audit log.
//!
//! One JSONL file per project holds every `TriggerDecision` and every
//! `SubAgentExecutionRecord`, each stamped with the run it belongs to.
//! The log supports append and full scan only; richer querying happens in
//! whatever tool the export lands in.

use crate::coordinator::SubAgentExecutionRecord;
use crate::trigger::TriggerDecision;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One line in the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub run_id: Uuid,
    pub project_id: String,
    pub logged_at: DateTime<Utc>,
    #[serde(flatten)]
    pub record: AuditRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditRecord {
    Decision(TriggerDecision),
    Execution(SubAgentExecutionRecord),
}

/// Append-only writer/reader for one project's decision log.
pub struct DecisionLog {
    path: PathBuf,
    run_id: Uuid,
    project_id: String,
}

impl DecisionLog {
    /// Open (or lazily create) the log for a project, starting a new run.
    pub fn new(audit_dir: &Path, project_id: impl Into<String>) -> Self {
        let project_id = project_id.into();
        Self {
            path: audit_dir.join(format!("{}.jsonl", project_id)),
            run_id: Uuid::new_v4(),
            project_id,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn log_decision(&self, decision: &TriggerDecision) -> Result<()> {
        self.append(AuditRecord::Decision(decision.clone()))
    }

    pub fn log_execution(&self, record: &SubAgentExecutionRecord) -> Result<()> {
        self.append(AuditRecord::Execution(record.clone()))
    }

    fn append(&self, record: AuditRecord) -> Result<()> {
        let entry = AuditEntry {
            run_id: self.run_id,
            project_id: self.project_id.clone(),
            logged_at: Utc::now(),
            record,
        };
        let line = serde_json::to_string(&entry).context("Failed to serialize audit entry")?;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open audit log: {}", self.path.display()))?;
        writeln!(file, "{}", line).context("Failed to append audit entry")?;
        Ok(())
    }

    /// Full scan of every entry, oldest first. Unparsable lines are
    /// skipped so one torn write cannot hide the rest of the history.
    pub fn read_all(&self) -> Result<Vec<AuditEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read audit log: {}", self.path.display()))?;
        Ok(content
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    /// Export the whole log as a single pretty-printed JSON array.
    pub fn export_json(&self, output: &Path) -> Result<usize> {
        let entries = self.read_all()?;
        let json =
            serde_json::to_string_pretty(&entries).context("Failed to serialize audit export")?;
        fs::write(output, json)
            .with_context(|| format!("Failed to write audit export: {}", output.display()))?;
        Ok(entries.len())
    }
}
