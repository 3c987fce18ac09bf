//! Offline classification of a saved test log.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::domain::models::ErrorRecord;
use crate::services::RuleClassifier;

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Path to a file holding raw test output
    pub log_file: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct ClassifyOutput {
    pub errors: Vec<ErrorRecord>,
    pub total: usize,
}

impl CommandOutput for ClassifyOutput {
    fn to_human(&self) -> String {
        if self.errors.is_empty() {
            return "No errors recognised.".to_string();
        }
        format!(
            "Found {} error(s):\n{}",
            self.total,
            TableFormatter::new().format_errors(&self.errors)
        )
    }
}

pub fn execute(args: ClassifyArgs, json_mode: bool) -> Result<()> {
    let bytes = std::fs::read(&args.log_file)
        .with_context(|| format!("Failed to read log file {}", args.log_file.display()))?;
    let logs = String::from_utf8_lossy(&bytes);

    let errors = RuleClassifier::new().classify(&logs);
    output(
        &ClassifyOutput {
            total: errors.len(),
            errors,
        },
        json_mode,
    );
    Ok(())
}
