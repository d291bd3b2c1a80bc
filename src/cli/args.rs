//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    activity::ActivityCommands, completions::CompletionsArgs, employee::EmployeeCommands,
    export::ExportArgs, init::InitArgs, job::JobCommands, leave::LeaveCommands,
    notify::NotifyCommands, team::TeamCommands,
};

#[derive(Parser)]
#[command(name = "floor")]
#[command(author, version, about = "Floor - workshop floor management")]
#[command(long_about = "Notifications, an activity audit trail and tabular exports for a drilling-bit workshop, backed by plain YAML records and a local SQLite store.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Project root (default: auto-detect by finding .floor/)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,

    /// Act as this roster username (default: config, then git user.name)
    #[arg(long, global = true)]
    pub actor: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new Floor project
    Init(InitArgs),

    /// Notification inbox and dispatch
    #[command(subcommand)]
    Notify(NotifyCommands),

    /// Activity audit trail
    #[command(subcommand)]
    Activity(ActivityCommands),

    /// Export records to CSV, XLSX or PDF
    Export(ExportArgs),

    /// Employee records
    #[command(subcommand)]
    Employee(EmployeeCommands),

    /// Production job cards
    #[command(subcommand)]
    Job(JobCommands),

    /// Leave requests and approvals
    #[command(subcommand)]
    Leave(LeaveCommands),

    /// Team roster management
    #[command(subcommand)]
    Team(TeamCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Output format for list and show commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Automatically detect based on context (yaml for show, tsv for list)
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// Tab-separated values (for piping)
    Tsv,
    /// JSON format (for programming)
    Json,
    /// CSV format (for spreadsheets)
    Csv,
    /// Markdown tables
    Md,
    /// Just IDs, one per line
    Id,
}
