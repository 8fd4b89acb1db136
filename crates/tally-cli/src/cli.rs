use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Keep a local copy of what the accounts you follow post, and count it")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding one database per handle
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download recent posts from every account a handle follows
    Fetch {
        /// Handle whose followed accounts are synced
        handle: String,
        /// Path to the JSON file holding the application key and secret
        #[arg(long, value_name = "PATH")]
        credentials: Option<PathBuf>,
        /// Skip accounts refreshed less than this many minutes ago
        #[arg(long, value_name = "MINUTES")]
        refresh_minutes: Option<u64>,
        /// How many days of history to keep complete
        #[arg(long, value_name = "DAYS")]
        days: Option<u32>,
        /// Stop paging a single account after this many seconds
        #[arg(long, value_name = "SECS")]
        owner_timeout_secs: Option<u64>,
        /// Stop paging a single account after this many timeline requests
        #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
        max_pages: Option<u64>,
    },
    /// Show per-user post counts for today and the previous week
    Stats {
        /// Handle whose database is read
        handle: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
