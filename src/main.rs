use cb_bdti::cli::Cli;
use cb_bdti::commands;
use cb_bdti::services::{logging, output};
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    match commands::run(&cli) {
        Ok(code) => code,
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            output::print_error(cli.json, &err);
            ExitCode::FAILURE
        }
    }
}
