//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Pipelog - cached access to CI pipeline run logs.
#[derive(Parser, Debug, Clone)]
#[command(name = "pipelog")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Base URL of the pipelines service, including the organization.
    #[arg(short = 'u', long, env = "PIPELOG_BASE_URL")]
    pub base_url: Option<String>,

    /// Bearer token for the pipelines service.
    #[arg(short, long, env = "PIPELOG_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// JSON configuration file.
    #[arg(short, long, env = "PIPELOG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cache directory, overriding configuration and environment.
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Human-readable output.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Download a run's logs into the local cache.
    Fetch(RunRef),

    /// Print one log, optionally a window of it.
    Read(ReadArgs),

    /// Search a run's logs with a regular expression.
    Search(SearchArgs),

    /// List the files cached for a run.
    Files(FilesArgs),

    /// Delete a run from the local cache.
    Invalidate(RunRef),
}

/// Identifies a pipeline run.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct RunRef {
    /// Project name or id.
    pub project: String,

    /// Pipeline id.
    pub pipeline_id: u64,

    /// Run id.
    pub run_id: u64,
}

/// Arguments for the read command.
#[derive(Args, Debug, Clone)]
pub struct ReadArgs {
    /// Run holding the log.
    #[command(flatten)]
    pub run: RunRef,

    /// Log id within the run.
    pub log_id: u32,

    /// First line to return (0-based).
    #[arg(short, long)]
    pub offset: Option<usize>,

    /// Maximum number of lines to return.
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Arguments for the search command.
#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Run to search.
    #[command(flatten)]
    pub run: RunRef,

    /// Regular expression to match against each line.
    pub pattern: String,

    /// Match case-insensitively.
    #[arg(short, long)]
    pub ignore_case: bool,

    /// Select lines that do not match.
    #[arg(short = 'v', long)]
    pub invert_match: bool,

    /// Lines of context before each match (0-10).
    #[arg(short = 'B', long, value_name = "N")]
    pub before_context: Option<usize>,

    /// Lines of context after each match (0-10).
    #[arg(short = 'A', long, value_name = "N")]
    pub after_context: Option<usize>,

    /// Lines of context on both sides; -A and -B take precedence.
    #[arg(short = 'C', long, value_name = "N")]
    pub context: Option<usize>,

    /// Stop after this many matches across all logs.
    #[arg(short, long, value_name = "N")]
    pub max_matches: Option<usize>,

    /// Only search these logs (comma-separated ids).
    #[arg(long = "log-ids", value_delimiter = ',', value_name = "IDS")]
    pub log_ids: Vec<u32>,
}

/// Arguments for the files command.
#[derive(Args, Debug, Clone)]
pub struct FilesArgs {
    /// Project name or id.
    #[arg(required_unless_present = "dir")]
    pub project: Option<String>,

    /// Pipeline id.
    #[arg(required_unless_present = "dir")]
    pub pipeline_id: Option<u64>,

    /// Run id.
    #[arg(required_unless_present = "dir")]
    pub run_id: Option<u64>,

    /// List this directory instead of resolving a run.
    #[arg(long, conflicts_with_all = ["project", "pipeline_id", "run_id"])]
    pub dir: Option<PathBuf>,
}

impl FilesArgs {
    /// The run named on the command line, if any.
    #[must_use]
    pub fn run(&self) -> Option<RunRef> {
        Some(RunRef {
            project: self.project.clone()?,
            pipeline_id: self.pipeline_id?,
            run_id: self.run_id?,
        })
    }
}
