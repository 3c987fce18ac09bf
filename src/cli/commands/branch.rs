//! Branch name preview.

use anyhow::Result;
use clap::Args;

use crate::cli::output::{output, CommandOutput};
use crate::services::format_branch_name;

#[derive(Args, Debug)]
pub struct BranchArgs {
    /// Team name
    pub team: String,
    /// Team leader name
    pub leader: String,
}

#[derive(Debug, serde::Serialize)]
pub struct BranchOutput {
    pub team: String,
    pub leader: String,
    pub branch_name: String,
}

impl CommandOutput for BranchOutput {
    fn to_human(&self) -> String {
        self.branch_name.clone()
    }
}

pub fn execute(args: BranchArgs, json_mode: bool) -> Result<()> {
    let branch_name = format_branch_name(&args.team, &args.leader);
    output(
        &BranchOutput {
            team: args.team,
            leader: args.leader,
            branch_name,
        },
        json_mode,
    );
    Ok(())
}
