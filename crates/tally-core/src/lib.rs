//! tally-core - Core library for Tally
//!
//! This crate contains the models, local store, remote API client and sync
//! logic used to keep a per-handle copy of followed accounts' posts and to
//! report how much each of them posts per day.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod report;
pub mod sync;

pub use error::{Error, Result};
pub use models::{Post, User};
