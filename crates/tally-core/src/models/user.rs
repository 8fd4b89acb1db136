//! User model

use serde::{Deserialize, Serialize};

/// A known account: either a followed owner or anyone resolved by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Remote numeric id
    pub id: i64,
    /// Screen name shown in reports; never overwritten once stored
    pub display_name: String,
}

impl User {
    #[must_use]
    pub fn new(id: i64, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}
