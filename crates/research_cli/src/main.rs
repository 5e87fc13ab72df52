mod commands;
mod logging;
mod render;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use client_logging::{client_error, client_info};
use research_client::{ClientConfig, ResearchClient};

use crate::logging::LogDestination;

/// Terminal client for the research report service.
#[derive(Debug, Parser)]
#[command(name = "research", version)]
struct Cli {
    /// Where log output goes.
    #[arg(long, value_enum, default_value = "file", global = true)]
    log_to: LogDestination,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in with email and password.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Create an account and sign in.
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign out and clear every locally stored credential and cached result.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// Print the URL that starts external sign-in.
    OauthStart,
    /// Finish external sign-in from the URL the browser was redirected to.
    OauthCallback { url: String },
    /// Submit a research topic and, unless told otherwise, wait for the report.
    Submit {
        topic: String,
        #[arg(long)]
        context: Option<String>,
        #[arg(long)]
        no_wait: bool,
    },
    /// Wait for a submitted job to finish. Ctrl-C stops watching.
    Watch { id: String },
    /// Print a report.
    Show { id: String },
    /// List past research.
    History,
    /// Save a report as PDF.
    Pdf {
        id: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Warm the local cache with history and reports.
    Prefetch,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ClientConfig::from_env().context("loading configuration")?;
    logging::initialize(cli.log_to, config.log_level);
    client_info!("research client starting");

    let client = ResearchClient::from_config(&config).context("starting client")?;
    let result = commands::run(&client, cli.command).await;
    if let Err(err) = &result {
        client_error!("Command failed: {:#}", err);
    }
    result
}
