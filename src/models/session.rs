//! Session model
//!
//! A session is one time-bounded occupancy of a table by a user for a
//! purchased duration (stored as `user_selected_durations`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted session status.
///
/// `critical` is never stored; it is derived at read time from the remaining
/// time (see `services::countdown::DisplayState`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Active,
    Completed,
}

impl SessionStatus {
    /// Whether moving from `self` to `next` respects `active -> completed`
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        !(self == Self::Completed && next == Self::Active)
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Completed
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            _ => Err(anyhow::anyhow!("Invalid session status: {}", s)),
        }
    }
}

/// Session record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: i64,
    pub table_id: i64,
    pub duration_id: i64,
    pub user_id: i64,
    /// Set once at creation
    pub start_time: DateTime<Utc>,
    /// `start_time + duration.length_in_seconds`, fixed at creation
    pub end_time: DateTime<Utc>,
    pub status: SessionStatus,
    /// When the session was reconciled as completed
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn is_completed(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Values needed to insert a session
#[derive(Debug, Clone)]
pub struct NewSession {
    pub table_id: i64,
    pub duration_id: i64,
    pub user_id: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Display snapshot of the user holding a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSnapshot {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Session with its external references resolved for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub session: Session,
    pub table_label: String,
    pub duration_name: String,
    pub user: UserSnapshot,
}

impl SessionView {
    pub fn id(&self) -> i64 {
        self.session.id
    }
}

/// Input for creating a session
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSessionInput {
    pub table_id: i64,
    pub duration_id: i64,
    pub user_id: i64,
    /// Defaults to the current time
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
}

/// Input for a manual status change
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusInput {
    pub status: SessionStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_and_display() {
        assert_eq!("active".parse::<SessionStatus>().unwrap(), SessionStatus::Active);
        assert_eq!("Completed".parse::<SessionStatus>().unwrap(), SessionStatus::Completed);
        assert!("critical".parse::<SessionStatus>().is_err());
        assert_eq!(SessionStatus::Completed.to_string(), "completed");
    }

    #[test]
    fn test_transitions_are_monotonic() {
        assert!(SessionStatus::Active.can_transition_to(SessionStatus::Completed));
        assert!(SessionStatus::Active.can_transition_to(SessionStatus::Active));
        assert!(SessionStatus::Completed.can_transition_to(SessionStatus::Completed));
        assert!(!SessionStatus::Completed.can_transition_to(SessionStatus::Active));
    }

    #[test]
    fn test_status_json_is_lowercase() {
        let json = serde_json::to_string(&SessionStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");

        let input: UpdateStatusInput = serde_json::from_str(r#"{"status":"active"}"#).unwrap();
        assert_eq!(input.status, SessionStatus::Active);
    }
}
