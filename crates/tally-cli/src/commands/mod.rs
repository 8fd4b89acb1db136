pub mod common;
pub mod fetch;
pub mod stats;
