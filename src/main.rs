use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use venture::cmd;
use venture::cmd::run::RunOptions;

#[derive(Parser)]
#[command(name = "venture")]
#[command(version, about = "Crash-resumable orchestrator for multi-step analysis pipelines")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Auto-approve interactive agent prompts.
    #[arg(long, global = true)]
    pub yes: bool,

    /// Directory containing the `.venture/` tree. Defaults to the current
    /// directory.
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new venture project
    Init,

    /// Run the pipeline from the beginning
    Run {
        /// Project id (defaults to the configured project)
        #[arg(long)]
        project: Option<String>,

        /// Do not write checkpoints during this run
        #[arg(long)]
        no_checkpoint: bool,
    },

    /// Resume an interrupted run from a checkpoint
    Resume {
        #[arg(long)]
        project: Option<String>,

        /// Resume from a specific checkpoint instead of the latest
        #[arg(long)]
        checkpoint: Option<u64>,

        #[arg(long)]
        no_checkpoint: bool,
    },

    /// Inspect stored checkpoints
    Checkpoints {
        #[command(subcommand)]
        command: CheckpointCommands,
    },

    /// Show current progress from the latest checkpoint
    Status {
        #[arg(long)]
        project: Option<String>,
    },

    /// Audit log operations
    Audit {
        #[command(subcommand)]
        command: AuditCommands,
    },

    /// Configuration operations
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Delete all checkpoints and audit history for a project
    Reset {
        #[arg(long)]
        project: Option<String>,

        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
pub enum CheckpointCommands {
    /// List checkpoints, newest first
    List {
        #[arg(long)]
        project: Option<String>,
    },

    /// Print one checkpoint's full state as JSON
    Show {
        checkpoint_id: u64,

        #[arg(long)]
        project: Option<String>,
    },

    /// Delete all but the newest checkpoints
    Prune {
        /// How many to keep (defaults to keep_last from venture.toml)
        #[arg(long)]
        keep: Option<usize>,

        #[arg(long)]
        project: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Export the JSONL audit log as a JSON array
    Export {
        output: PathBuf,

        #[arg(long)]
        project: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the resolved configuration
    Show,
    /// Check venture.toml and rules.toml for problems
    Validate,
    /// Write starter configuration files
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let project_dir = cli
        .project_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));

    match cli.command {
        Commands::Init => cmd::project::cmd_init(&project_dir),
        Commands::Run {
            project,
            no_checkpoint,
        } => {
            cmd::run::cmd_run(
                &project_dir,
                RunOptions {
                    project,
                    yes: cli.yes,
                    no_checkpoint,
                    verbose: cli.verbose,
                },
            )
            .await
        }
        Commands::Resume {
            project,
            checkpoint,
            no_checkpoint,
        } => {
            cmd::run::cmd_resume(
                &project_dir,
                checkpoint,
                RunOptions {
                    project,
                    yes: cli.yes,
                    no_checkpoint,
                    verbose: cli.verbose,
                },
            )
            .await
        }
        Commands::Checkpoints { command } => match command {
            CheckpointCommands::List { project } => {
                cmd::checkpoints::cmd_list(&project_dir, project, cli.verbose)
            }
            CheckpointCommands::Show {
                checkpoint_id,
                project,
            } => cmd::checkpoints::cmd_show(&project_dir, project, checkpoint_id),
            CheckpointCommands::Prune { keep, project } => {
                cmd::checkpoints::cmd_prune(&project_dir, project, keep)
            }
        },
        Commands::Status { project } => cmd::project::cmd_status(&project_dir, project, cli.verbose),
        Commands::Audit { command } => match command {
            AuditCommands::Export { output, project } => {
                cmd::audit::cmd_export(&project_dir, project, output)
            }
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show => cmd::config::cmd_show(&project_dir),
            ConfigCommands::Validate => cmd::config::cmd_validate(&project_dir, cli.verbose),
            ConfigCommands::Init => cmd::config::cmd_init(&project_dir),
        },
        Commands::Reset { project, force } => {
            cmd::project::cmd_reset(&project_dir, project, force)
        }
    }
}
