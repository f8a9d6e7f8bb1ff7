//! Table model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A physical fishing station
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableNumber {
    pub id: i64,
    /// Display label, e.g. "A3"
    pub label: String,
    pub created_at: DateTime<Utc>,
}
