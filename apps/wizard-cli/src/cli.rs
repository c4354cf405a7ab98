//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "reportflow")]
#[command(version)]
#[command(about = "Upload vulnerability reports, follow processing and fetch the results")]
pub struct Cli {
    /// Base URL of the service. Overrides the config file.
    #[arg(long, env = "REPORTFLOW_API", global = true)]
    pub api: Option<String>,

    /// Config file to use instead of the default location.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a session, upload files, process them and fetch the results.
    Run(RunArgs),

    /// Follow the event feed of an existing session until it finishes.
    Watch {
        /// Session to follow.
        session_id: String,
    },

    /// Print the config file location and the effective settings.
    Config,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Client label. Empty means "DEFAULT".
    #[arg(long, default_value = "")]
    pub client: String,

    /// Optional sub-client label.
    #[arg(long)]
    pub sub_client: Option<String>,

    /// Report files to upload, in order.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Save the results archive to this path.
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Load the results into Elasticsearch using the configured indices.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub ingest: bool,
}
