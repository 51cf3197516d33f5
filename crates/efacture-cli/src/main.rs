//! `efacture` - submit invoice files to the e-invoicing platform from a terminal.
//!
//! Configuration comes from the environment (a `.env` file is honored);
//! see `efacture_core::config` for the variables.

mod commands;

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use efacture_core::Config;

#[derive(Parser)]
#[command(name = "efacture", version, about = "E-invoicing platform upload client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Obtain a bearer token and store it for the configured subscription
    Authenticate {
        /// Account login (defaults to the last login used)
        #[arg(long)]
        login: Option<String>,
    },
    /// Open an upload session and send one or more invoice files
    Upload {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Finalize the upload once the content is accepted
        #[arg(long)]
        complete: bool,
    },
    /// Finalize a previously uploaded session
    Complete {
        /// Upload session id
        upload_id: String,
    },
    /// Show the stored token for the configured subscription
    Token,
}

fn env_filter() -> EnvFilter {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// Logs go to stderr, and additionally to a daily file when
/// `EFACTURE_LOG_DIR` is set. The returned guard must live until exit.
fn init_tracing() -> Option<WorkerGuard> {
    let (file_layer, guard) = match std::env::var("EFACTURE_LOG_DIR") {
        Ok(dir) if !dir.trim().is_empty() => {
            let appender = tracing_appender::rolling::daily(dir.trim(), "efacture.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(env_filter());
            (Some(layer), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(fmt::layer().with_writer(io::stderr).with_filter(env_filter()))
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();
    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to read configuration from the environment")?;
    config.validate().context("Invalid configuration")?;
    let client = commands::connect(config)?;

    match cli.command {
        Commands::Authenticate { login } => commands::authenticate(&client, login).await,
        Commands::Upload { files, complete } => commands::upload(client, &files, complete).await,
        Commands::Complete { upload_id } => commands::complete(&client, &upload_id).await,
        Commands::Token => commands::token(&client).await,
    }
}
