//! Tally CLI - Track how much the accounts you follow post
//!
//! `tally fetch <handle>` syncs recent posts; `tally stats <handle>` counts them.

mod cli;
mod commands;
mod error;


use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::common::{resolve_data_dir, SyncLimits};
use crate::commands::fetch::{run_fetch, FetchArgs};
use crate::commands::stats::run_stats;
use crate::error::CliError;

const DEFAULT_LOG_FILTER: &str = "tally=info";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let data_dir = resolve_data_dir(cli.data_dir, std::env::var_os("TALLY_DATA_DIR"))?;

    match cli.command {
        Commands::Fetch {
            handle,
            credentials,
            refresh_minutes,
            days,
            owner_timeout_secs,
            max_pages,
        } => {
            let args = FetchArgs {
                credentials,
                limits: SyncLimits {
                    refresh_minutes,
                    days,
                    owner_timeout_secs,
                    max_pages: max_pages
                        .map(|pages| usize::try_from(pages).unwrap_or(usize::MAX)),
                },
            };
            run_fetch(&handle, args, &data_dir).await?;
        }
        Commands::Stats { handle, json } => run_stats(&handle, json, &data_dir)?,
    }

    Ok(())
}
