use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::types::QueueOrder;

/// Bentobox - idempotent installer for a curated desktop bundle
#[derive(Parser, Debug)]
#[command(name = "bentobox")]
#[command(about = "Install the selected desktop bundle, skipping what is already present")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Configuration document (defaults to ~/.bentobox-config.yaml)
    pub config: Option<PathBuf>,

    /// Queue ordering, overriding the unit manifest
    /// (discovery or prerequisites)
    #[arg(long)]
    pub order: Option<QueueOrder>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the install queue without running anything (probes still run)
    Plan(RunArgs),
    /// Print the persisted run state
    Status,
}

impl Cli {
    pub fn parse_args() -> Self {
        <Self as clap::Parser>::parse()
    }
}
