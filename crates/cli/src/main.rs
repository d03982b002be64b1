use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nfcauth_reader::ReaderConfig;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

mod commands;
mod utils;

use commands::*;

#[derive(Parser)]
#[command(version, about = "NFC reader for registering and authenticating nfcauth tokens")]
struct Cli {
    /// Config file (defaults to ./nfcauth.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// PC/SC reader to use (first available if not specified)
    #[arg(short, long)]
    reader: Option<String>,

    /// Credential store, overriding the configured path
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Debug level output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wait for a token and register it
    Register,

    /// Wait for a token and authenticate it
    Auth,

    /// List registered devices
    List,

    /// Remove a registered device
    Remove {
        /// User id of the device to remove
        #[arg(required = true)]
        user_id: String,
    },

    /// List available PC/SC readers
    Readers,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match cli.command {
        Commands::Readers => utils::reader::list_readers(),
        Commands::Register => {
            register_command(load_config(cli.config, cli.store)?, cli.reader).await
        }
        Commands::Auth => auth_command(load_config(cli.config, cli.store)?, cli.reader).await,
        Commands::List => list_command(&load_config(cli.config, cli.store)?),
        Commands::Remove { user_id } => {
            remove_command(&load_config(cli.config, cli.store)?, &user_id)
        }
    }
}

fn load_config(path: Option<PathBuf>, store: Option<PathBuf>) -> eyre::Result<ReaderConfig> {
    let mut config = ReaderConfig::load(path.as_deref())?;
    if let Some(store) = store {
        config.session.store_path = store;
    }
    debug!(?config, "Loaded configuration");
    Ok(config)
}

fn setup_logging(verbose: bool) {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose, &directives))
        .with_ansi(true)
        .init();
}

/// `RUST_LOG` style directives on top of a default of INFO, or DEBUG when verbose
fn log_filter(verbose: bool, directives: &str) -> EnvFilter {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    EnvFilter::builder()
        .with_default_directive(level.into())
        .parse_lossy(directives)
}
