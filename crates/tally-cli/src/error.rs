use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] tally_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Handle cannot be empty")]
    EmptyHandle,
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),
    #[error("No data for {0} yet. Run `tally fetch {0}` first.")]
    NoData(String),
    #[error("Configuration error: {0}")]
    Config(String),
}
