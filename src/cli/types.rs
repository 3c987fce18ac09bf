//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};

use super::commands::{branch::BranchArgs, classify::ClassifyArgs, config::ConfigArgs, run::RunArgs};

#[derive(Parser, Debug)]
#[command(name = "fixloop")]
#[command(about = "fixloop - autonomous test repair loop", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Clone a repository and repair it until its tests pass
    Run(RunArgs),

    /// Classify a saved test log with the built-in rules
    Classify(ClassifyArgs),

    /// Print the branch name used for a team and leader
    Branch(BranchArgs),

    /// Inspect the effective configuration
    Config(ConfigArgs),
}
