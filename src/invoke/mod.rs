//! Command-backed collaborators.
//!
//! The core treats step and agent business logic as opaque callables.
//! This module provides the default implementations: each step or agent
//! maps to a shell command that receives its context as JSON on stdin and
//! answers with JSON on stdout. Non-zero exit is an error.

use crate::coordinator::{AgentContext, AgentInvoker};
use crate::errors::AgentError;
use crate::pipeline::{StepExecutor, StepInputs, StepReport};
use crate::trigger::TriggerContext;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

fn default_timeout() -> u64 {
    600
}

/// One configured external command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
    pub command: String,

    /// Relative to the project directory unless absolute.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl CommandSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            working_dir: None,
            timeout_secs: default_timeout(),
        }
    }
}

/// Spawn a command, feed it `input` on stdin, and return trimmed stdout.
async fn run_command(
    spec: &CommandSpec,
    project_dir: &Path,
    input: &str,
    envs: &[(&str, String)],
) -> Result<String> {
    let working_dir = spec
        .working_dir
        .as_ref()
        .map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                project_dir.join(p)
            }
        })
        .unwrap_or_else(|| project_dir.to_path_buf());

    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(&spec.command)
        .current_dir(&working_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    for (key, value) in envs {
        cmd.env(key, value);
    }

    let mut child = cmd
        .spawn()
        .with_context(|| format!("Failed to spawn command: {}", spec.command))?;

    if let Some(mut stdin) = child.stdin.take() {
        // Commands are not required to consume stdin; a child that exits or
        // closes its end early yields EPIPE here, which is not a failure.
        if let Err(err) = stdin.write_all(input.as_bytes()).await {
            if err.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(err).context("Failed to write context to command stdin");
            }
        }
        // Dropping stdin closes the pipe.
    }

    let output = match timeout(Duration::from_secs(spec.timeout_secs), child.wait_with_output()).await
    {
        Ok(result) => result.context("Failed to wait for command")?,
        Err(_) => bail!(
            "Command timed out after {} seconds: {}",
            spec.timeout_secs,
            spec.command
        ),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "Command exited with code {}: {}",
            output.status.code().unwrap_or(-1),
            stderr.trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Wire format a step command answers with. Plain (non-object or
/// signal-less) JSON output is accepted as a bare payload.
#[derive(Debug, Deserialize)]
struct StepReply {
    payload: serde_json::Value,
    #[serde(default)]
    signals: TriggerContext,
}

fn parse_step_reply(stdout: &str) -> Result<StepReport> {
    if stdout.is_empty() {
        return Ok(StepReport {
            payload: serde_json::Value::Null,
            signals: TriggerContext::default(),
        });
    }
    let value: serde_json::Value =
        serde_json::from_str(stdout).context("Step command produced invalid JSON")?;

    // Preferred envelope: {"payload": ..., "signals": {...}}.
    if value.get("payload").is_some() {
        let reply: StepReply = serde_json::from_value(value)?;
        return Ok(StepReport {
            payload: reply.payload,
            signals: reply.signals,
        });
    }
    Ok(StepReport {
        payload: value,
        signals: TriggerContext::default(),
    })
}

/// Runs each pipeline step as a configured shell command.
pub struct CommandStepExecutor {
    project_dir: PathBuf,
    commands: BTreeMap<String, CommandSpec>,
}

impl CommandStepExecutor {
    pub fn new(project_dir: impl AsRef<Path>, commands: BTreeMap<String, CommandSpec>) -> Self {
        Self {
            project_dir: project_dir.as_ref().to_path_buf(),
            commands,
        }
    }
}

#[async_trait]
impl StepExecutor for CommandStepExecutor {
    async fn execute(&self, step_id: &str, inputs: &StepInputs) -> Result<StepReport> {
        let spec = self
            .commands
            .get(step_id)
            .with_context(|| format!("No command configured for step '{}'", step_id))?;

        let input = serde_json::to_string(inputs).context("Failed to serialize step inputs")?;
        let envs = [
            ("VENTURE_PROJECT", inputs.project_id.clone()),
            ("VENTURE_STEP", step_id.to_string()),
        ];
        let stdout = run_command(spec, &self.project_dir, &input, &envs).await?;
        parse_step_reply(&stdout)
    }
}

/// Runs each auxiliary agent as a configured shell command.
pub struct CommandAgentInvoker {
    project_dir: PathBuf,
    commands: BTreeMap<String, CommandSpec>,
}

impl CommandAgentInvoker {
    pub fn new(project_dir: impl AsRef<Path>, commands: BTreeMap<String, CommandSpec>) -> Self {
        Self {
            project_dir: project_dir.as_ref().to_path_buf(),
            commands,
        }
    }
}

#[async_trait]
impl AgentInvoker for CommandAgentInvoker {
    async fn invoke(
        &self,
        agent_name: &str,
        context: &AgentContext,
    ) -> Result<serde_json::Value, AgentError> {
        let spec = self
            .commands
            .get(agent_name)
            .ok_or_else(|| AgentError::NotConfigured {
                agent_name: agent_name.to_string(),
            })?;

        let input = serde_json::to_string(context)
            .context("Failed to serialize agent context")
            .map_err(AgentError::Other)?;
        let envs = [
            ("VENTURE_PROJECT", context.project_id.clone()),
            ("VENTURE_AGENT", agent_name.to_string()),
            ("VENTURE_STEP", context.step_id.clone()),
        ];

        let stdout = run_command(spec, &self.project_dir, &input, &envs)
            .await
            .map_err(|err| AgentError::Failed {
                agent_name: agent_name.to_string(),
                message: err.to_string(),
            })?;

        if stdout.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_str(&stdout).map_err(|err| AgentError::Failed {
            agent_name: agent_name.to_string(),
            message: format!("invalid JSON result: {}", err),
        })
    }
}
