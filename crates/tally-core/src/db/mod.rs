//! Database layer for tally

mod connection;
mod migrations;
mod repository;

pub use connection::Database;
pub use repository::{InsertOutcome, SqliteStore, Store, NO_POSTS_WATERMARK};
