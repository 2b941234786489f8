//! Top-level argument definitions

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    completions::CompletionsArgs, init::InitArgs, metrics::MetricsCommands, opp::OppCommands,
    task::TaskCommands, tech::TechCommands, wf::WfCommands,
};

#[derive(Parser, Debug)]
#[command(
    name = "bodyshop",
    version,
    about = "Repair-order lifecycle coordinator for auto-body shops",
    long_about = "Track leads from first call to estimate, turn approved estimates into \
                  workfiles, and walk each repair through its gated lifecycle. \
                  Records are plain YAML files, one per entity."
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command
#[derive(clap::Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'o', global = true, value_enum, default_value = "auto")]
    pub output: OutputFormat,

    /// Data directory (defaults to the current directory)
    #[arg(long, global = true, env = "BODYSHOP_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Log lifecycle events and decisions
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// YAML for single records, TSV for lists
    Auto,
    Yaml,
    Json,
    Tsv,
    Csv,
    /// Boxed table
    Table,
    /// Ids only, one per line
    Id,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a data directory
    Init(InitArgs),

    /// Opportunities (leads, estimates)
    #[command(subcommand)]
    Opp(OppCommands),

    /// Workfiles (active repairs)
    #[command(subcommand)]
    Wf(WfCommands),

    /// Tasks linked to opportunities and workfiles
    #[command(subcommand)]
    Task(TaskCommands),

    /// Technician workload
    #[command(subcommand)]
    Tech(TechCommands),

    /// Shop metrics
    #[command(subcommand)]
    Metrics(MetricsCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}
