use std::path::PathBuf;

use anyhow::Context;
use bitpaste::commands::{self, create::CreateArgs};
use bitpaste::config::Config;
use bitpaste::App;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Minimal pastebin with expiring pastes.
#[derive(Parser)]
#[command(name = "bitpaste", version, about)]
struct Cli {
    /// Path to the TOML config file
    #[arg(long, global = true, env = "BITPASTE_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server and the background sweeper
    Serve,
    /// Delete all expired pastes once and exit
    PurgeExpired,
    /// Create a paste in the configured storage
    Create(CreateArgs),
    /// Print a paste by id
    Get {
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // logs go to stderr so command output stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::load(&cli.config).await?;
    let app = App::load(config)
        .await
        .context("failed to open paste storage")?;

    match cli.command {
        Command::Serve => commands::serve::run(app).await,
        Command::PurgeExpired => commands::purge_expired::run(app).await,
        Command::Create(args) => commands::create::run(app, args).await,
        Command::Get { id } => commands::get::run(app, &id).await,
    }
}
