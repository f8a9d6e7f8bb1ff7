//! Countdown arithmetic for sessions
//!
//! Pure functions shared by the lifecycle monitor and the query service:
//! - remaining time from `(now, end_time)`
//! - display classification (`active`, `critical`, `completed`)
//! - summary counts and set filtering
//!
//! None of this touches the store or the clock; callers pass `now` in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{SessionStatus, SessionView};

/// Default remaining time at or below which an open session is critical
pub const DEFAULT_CRITICAL_THRESHOLD_SECS: i64 = 600;

/// Remaining whole seconds until `end_time`, never negative.
pub fn remaining(now: DateTime<Utc>, end_time: DateTime<Utc>) -> i64 {
    (end_time - now).num_seconds().max(0)
}

/// Remaining whole seconds for a session.
///
/// A `now` earlier than `start_time` counts as the start, so skewed clocks
/// see the full duration and never more.
pub fn session_remaining(
    now: DateTime<Utc>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> i64 {
    remaining(now.max(start_time), end_time)
}

/// Whether a session with this much time left is due for reconciliation
pub fn is_expired(remaining_secs: i64) -> bool {
    remaining_secs <= 0
}

/// Display state of a session, derived at read time and never persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayState {
    Active,
    Critical,
    Completed,
}

/// Labels sessions from their remaining time and persisted status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classifier {
    critical_threshold_secs: i64,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DEFAULT_CRITICAL_THRESHOLD_SECS)
    }
}

impl Classifier {
    pub fn new(critical_threshold_secs: i64) -> Self {
        Self {
            critical_threshold_secs: critical_threshold_secs.max(0),
        }
    }

    pub fn critical_threshold_secs(&self) -> i64 {
        self.critical_threshold_secs
    }

    /// Classify from remaining seconds and the persisted status.
    ///
    /// A persisted `completed` always wins. An expired but not yet reconciled
    /// session reads as `completed` using the same rule the monitor uses to
    /// reconcile it. The critical boundary is inclusive.
    pub fn classify(&self, remaining_secs: i64, status: SessionStatus) -> DisplayState {
        if status.is_terminal() || is_expired(remaining_secs) {
            DisplayState::Completed
        } else if remaining_secs <= self.critical_threshold_secs {
            DisplayState::Critical
        } else {
            DisplayState::Active
        }
    }

    pub fn state_of(&self, view: &SessionView, now: DateTime<Utc>) -> DisplayState {
        let session = &view.session;
        self.classify(
            session_remaining(now, session.start_time, session.end_time),
            session.status,
        )
    }

    /// Counts for the dashboard header
    pub fn summarize(
        &self,
        active: &[SessionView],
        completed: &[SessionView],
        now: DateTime<Utc>,
    ) -> SessionSummary {
        let critical = active
            .iter()
            .filter(|view| self.state_of(view, now) == DisplayState::Critical)
            .count();

        SessionSummary {
            total: active.len() + completed.len(),
            active: active.len(),
            completed: completed.len(),
            critical,
        }
    }

    /// Select sessions from a set the caller already holds
    pub fn filter(
        &self,
        sessions: &[SessionView],
        criterion: SessionFilter,
        now: DateTime<Utc>,
    ) -> Vec<SessionView> {
        sessions
            .iter()
            .filter(|view| match criterion {
                SessionFilter::Active => !view.session.is_completed(),
                SessionFilter::Completed => view.session.is_completed(),
                SessionFilter::Critical => {
                    !view.session.is_completed()
                        && self.state_of(view, now) == DisplayState::Critical
                }
            })
            .cloned()
            .collect()
    }
}

/// Aggregate counts over the current session sets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
    pub critical: usize,
}

/// Client-side selection criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionFilter {
    /// All open sessions
    Active,
    /// All closed sessions
    Completed,
    /// Open sessions nearing expiry
    Critical,
}

impl std::str::FromStr for SessionFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "critical" => Ok(Self::Critical),
            _ => Err(anyhow::anyhow!("Invalid session filter: {}", s)),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::models::{Session, UserSnapshot};

    /// Standalone view for pure tests
    pub fn view(id: i64, end_time: DateTime<Utc>, status: SessionStatus) -> SessionView {
        let start_time = end_time - chrono::Duration::hours(1);
        SessionView {
            session: Session {
                id,
                table_id: 1,
                duration_id: 1,
                user_id: 1,
                start_time,
                end_time,
                status,
                completed_at: status.is_terminal().then_some(end_time),
                created_at: start_time,
            },
            table_label: format!("T{}", id),
            duration_name: "1 hour".to_string(),
            user: UserSnapshot {
                id: 1,
                name: "Ada Angler".to_string(),
                avatar_url: None,
            },
        }
    }
}
