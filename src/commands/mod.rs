//! Command handler layer.
//!
//! This module owns CLI-oriented wiring: it builds the stores, clients and deployment driver for
//! one invocation, hands them to the services and prints the result.
//!
//! ## Files
//! - `lifecycle.rs`: integrate/modify/delete/reset.
//! - `admin.rs`: show-integrated/new-config/check.

pub mod admin;
pub mod lifecycle;

use crate::cli::{Cli, Commands};
use crate::domain::constants::RECORDS_FILE_NAME;
use crate::services::confirm::{AssumeAnswer, Confirm, Prompt};
use anyhow::Context;
use std::path::PathBuf;
use std::process::ExitCode;

pub use admin::handle_admin_commands;
pub use lifecycle::handle_lifecycle_commands;

pub fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    match &cli.command {
        Commands::Integrate { .. }
        | Commands::Modify { .. }
        | Commands::Delete { .. }
        | Commands::Reset { .. } => handle_lifecycle_commands(cli),
        Commands::ShowIntegrated | Commands::NewConfig | Commands::Check => {
            handle_admin_commands(cli)
        }
    }
}

pub(crate) fn records_path(cli: &Cli) -> anyhow::Result<PathBuf> {
    let dir = match &cli.state_dir {
        Some(dir) => dir.clone(),
        None => {
            let home = std::env::var("HOME").context("HOME is not set; pass --state-dir")?;
            PathBuf::from(home).join(".config").join("cb-bdti")
        }
    };
    Ok(dir.join(RECORDS_FILE_NAME))
}

pub(crate) fn confirm_policy(cli: &Cli) -> Box<dyn Confirm> {
    if cli.yes {
        Box::new(AssumeAnswer(true))
    } else if cli.no {
        Box::new(AssumeAnswer(false))
    } else {
        Box::new(Prompt::stdin())
    }
}

pub(crate) fn exit_code(failed: bool) -> ExitCode {
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
