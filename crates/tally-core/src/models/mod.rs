//! Data models for tally

mod post;
mod user;

pub use post::{parse_remote_timestamp, Post, RawPost};
pub use user::User;
