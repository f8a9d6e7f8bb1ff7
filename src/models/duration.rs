//! Duration model
//!
//! A purchasable block of fishing time (e.g. "1 hour", "Half day").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Duration catalog entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Duration {
    pub id: i64,
    /// Display name
    pub name: String,
    pub length_in_seconds: i64,
    pub created_at: DateTime<Utc>,
}

impl Duration {
    /// Length as a chrono delta, used to derive a session's end time
    pub fn length(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.length_in_seconds)
    }
}

/// Input for creating a duration
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDurationInput {
    pub name: String,
    pub length_in_seconds: i64,
}
