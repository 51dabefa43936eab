//! DrSync CLI - Command-line interface for DrSync
//!
//! Provides commands for:
//! - Authorizing DrSync with Dropbox or Google Drive
//! - Uploading or downloading editor configuration and packages
//! - Previewing what a sync would transfer
//! - Viewing and editing the configuration file

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use drsync_core::config::Config;
use drsync_core::domain::BackendKind;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    auth::AuthCommand, completions::CompletionsCommand, config::ConfigCommand, plan::PlanCommand,
    sync::SyncCommand, GlobalOptions,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "drsync",
    version,
    about = "Sync editor settings and packages through Dropbox or Google Drive"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Backend to use instead of the configured one (dropbox or drive)
    #[arg(long, global = true)]
    backend: Option<BackendKind>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Authorization commands
    #[command(subcommand)]
    Auth(AuthCommand),
    /// Upload or download synchronized data
    Sync(SyncCommand),
    /// Show which files a sync would transfer
    Plan(PlanCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path);

    let filter = match (cli.quiet, cli.verbose) {
        (true, _) => "warn".to_string(),
        // a malformed file is reported by the command itself
        (false, 0) => Config::load_if_exists(&config_path)
            .unwrap_or_default()
            .logging
            .level,
        (false, 1) => "debug".to_string(),
        (false, _) => "trace".to_string(),
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // stdout carries command output, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let options = GlobalOptions {
        format,
        config_path,
        backend: cli.backend,
    };

    match cli.command {
        Commands::Auth(cmd) => cmd.execute(&options).await,
        Commands::Sync(cmd) => cmd.execute(&options).await,
        Commands::Plan(cmd) => cmd.execute(&options).await,
        Commands::Config(cmd) => cmd.execute(&options).await,
        Commands::Completions(cmd) => cmd.execute(&options).await,
    }
}
