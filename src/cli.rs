use crate::domain::constants::{DEFAULT_ARTIFACTS_DIR, DEFAULT_CONFIG_PATH};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "cb-bdti",
    version,
    about = "Integrates FIWARE data models between Orion LD and Cygnus/HDFS"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Output machine-readable JSON")]
    pub json: bool,
    #[arg(
        short = 'c',
        long,
        global = true,
        default_value = DEFAULT_CONFIG_PATH,
        help = "Desired configuration file"
    )]
    pub config: PathBuf,
    #[arg(
        long,
        global = true,
        help = "Directory holding the integration records (default: $HOME/.config/cb-bdti)"
    )]
    pub state_dir: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        default_value = DEFAULT_ARTIFACTS_DIR,
        help = "Directory where agent.conf and grouping_rules.conf are written"
    )]
    pub artifacts_dir: PathBuf,
    #[arg(long, global = true, conflicts_with = "no", help = "Answer yes to every question")]
    pub yes: bool,
    #[arg(long, global = true, help = "Answer no to every question")]
    pub no: bool,
    #[arg(long, global = true, default_value = "info", help = "Log level when RUST_LOG is unset")]
    pub log_level: String,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct DataModelArgs {
    #[arg(
        short = 'd',
        long = "datamodels",
        num_args = 1..,
        required = true,
        help = "Data model names, or `all`"
    )]
    pub datamodels: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Subscribe data models and redeploy Cygnus.
    Integrate {
        #[command(flatten)]
        target: DataModelArgs,
    },
    /// Replace the subscription of integrated data models.
    Modify {
        #[command(flatten)]
        target: DataModelArgs,
        #[arg(long, help = "Continue when the old subscription cannot be removed")]
        force: bool,
    },
    /// Remove data model subscriptions.
    Delete {
        #[command(flatten)]
        target: DataModelArgs,
        #[arg(long, help = "Regenerate artifacts and redeploy Cygnus afterwards")]
        deploy: bool,
        #[arg(long, help = "Drop the record even when the broker refuses the removal")]
        force: bool,
    },
    /// List integrated data models.
    ShowIntegrated,
    /// Write a configuration template and an empty record store.
    NewConfig,
    /// Remove the configuration file and every integration.
    Reset {
        #[arg(long, help = "Drop records even when the broker refuses the removal")]
        force: bool,
    },
    /// Validate the configuration without side effects.
    Check,
}
