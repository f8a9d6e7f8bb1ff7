//! Session query service
//!
//! The boundary the HTTP layer talks to. Reads come from the monitor's
//! working sets; writes go through the same `SessionRepository` the monitor
//! uses so manual and automatic completions converge in the store.

use anyhow::Context;
use std::sync::Arc;

use crate::db::repositories::{
    DurationRepository, SessionRepository, StatusUpdate, TableNumberRepository, UserRepository,
};
use crate::models::{
    CreateSessionInput, Duration, NewSession, SessionStatus, SessionView, TableNumber,
};
use crate::services::countdown::{SessionFilter, SessionSummary};
use crate::services::monitor::{SessionMonitor, WorkingSet};

/// Error types for session service operations
#[derive(Debug, thiserror::Error)]
pub enum SessionServiceError {
    /// Session id does not exist
    #[error("Session not found: {0}")]
    NotFound(i64),

    /// Status change would move a session backwards
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    /// Bad input on session creation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Store read or write failed
    #[error("Store unavailable: {0:#}")]
    StoreUnavailable(#[from] anyhow::Error),
}

/// Lookups needed to open a session
pub struct Catalog {
    pub tables: Arc<dyn TableNumberRepository>,
    pub durations: Arc<dyn DurationRepository>,
    pub users: Arc<dyn UserRepository>,
}

pub struct SessionService {
    repo: Arc<dyn SessionRepository>,
    catalog: Catalog,
    monitor: Arc<SessionMonitor>,
}

impl SessionService {
    pub fn new(
        repo: Arc<dyn SessionRepository>,
        catalog: Catalog,
        monitor: Arc<SessionMonitor>,
    ) -> Self {
        Self {
            repo,
            catalog,
            monitor,
        }
    }

    pub fn monitor(&self) -> &Arc<SessionMonitor> {
        &self.monitor
    }

    /// Sessions not yet reconciled as completed, soonest to expire first
    pub async fn list_active(&self) -> Vec<SessionView> {
        self.monitor.snapshot().await.active
    }

    /// Completed sessions, most recently completed first
    pub async fn list_completed(&self) -> Vec<SessionView> {
        self.monitor.snapshot().await.completed
    }

    /// Re-fetch both sets from the store out of band
    pub async fn refresh(&self) -> Result<WorkingSet, SessionServiceError> {
        self.monitor
            .refresh()
            .await
            .context("Failed to refresh sessions")
            .map_err(Into::into)
    }

    /// Manual status change.
    ///
    /// Completing a completed session succeeds without touching it.
    /// Reactivating a completed session fails with `InvalidTransition`.
    pub async fn set_status(
        &self,
        id: i64,
        status: SessionStatus,
    ) -> Result<SessionView, SessionServiceError> {
        let outcome = self
            .repo
            .update_status(id, status, self.monitor.now())
            .await
            .context("Failed to update session status")?;

        match outcome {
            StatusUpdate::NotFound => return Err(SessionServiceError::NotFound(id)),
            StatusUpdate::Rejected(session) => {
                return Err(SessionServiceError::InvalidTransition {
                    from: session.status,
                    to: status,
                })
            }
            StatusUpdate::Changed(session) => {
                tracing::info!(session_id = id, status = %session.status, "Session status changed manually");
                self.refresh_quietly().await;
            }
            StatusUpdate::Unchanged(_) => {
                tracing::debug!(session_id = id, status = %status, "Status change was a no-op");
            }
        }

        self.repo
            .get_view(id)
            .await
            .context("Failed to load session")?
            .ok_or(SessionServiceError::NotFound(id))
    }

    /// Open a new session for a table
    pub async fn create_session(
        &self,
        input: CreateSessionInput,
    ) -> Result<SessionView, SessionServiceError> {
        if self
            .catalog
            .tables
            .get_by_id(input.table_id)
            .await
            .context("Failed to look up table")?
            .is_none()
        {
            return Err(SessionServiceError::Validation(format!(
                "Unknown table: {}",
                input.table_id
            )));
        }

        let duration = self
            .catalog
            .durations
            .get_by_id(input.duration_id)
            .await
            .context("Failed to look up duration")?
            .ok_or_else(|| {
                SessionServiceError::Validation(format!("Unknown duration: {}", input.duration_id))
            })?;

        if duration.length_in_seconds <= 0 {
            return Err(SessionServiceError::Validation(format!(
                "Duration {} has no length",
                duration.id
            )));
        }

        if self
            .catalog
            .users
            .get_snapshot(input.user_id)
            .await
            .context("Failed to look up user")?
            .is_none()
        {
            return Err(SessionServiceError::Validation(format!(
                "Unknown user: {}",
                input.user_id
            )));
        }

        let start_time = input.start_time.unwrap_or_else(|| self.monitor.now());
        let session = self
            .repo
            .create(&NewSession {
                table_id: input.table_id,
                duration_id: duration.id,
                user_id: input.user_id,
                start_time,
                end_time: start_time + duration.length(),
            })
            .await
            .context("Failed to create session")?;

        tracing::info!(
            session_id = session.id,
            table_id = session.table_id,
            end_time = %session.end_time,
            "Session opened"
        );
        self.refresh_quietly().await;

        self.repo
            .get_view(session.id)
            .await
            .context("Failed to load session")?
            .ok_or(SessionServiceError::NotFound(session.id))
    }

    /// Tables a session can be opened on
    pub async fn list_tables(&self) -> Result<Vec<TableNumber>, SessionServiceError> {
        self.catalog
            .tables
            .list()
            .await
            .context("Failed to list tables")
            .map_err(Into::into)
    }

    /// Durations a session can be bought for
    pub async fn list_durations(&self) -> Result<Vec<Duration>, SessionServiceError> {
        self.catalog
            .durations
            .list()
            .await
            .context("Failed to list durations")
            .map_err(Into::into)
    }

    /// Counts over the current working sets
    pub async fn summary(&self) -> SessionSummary {
        let sets = self.monitor.snapshot().await;
        self.monitor
            .classifier()
            .summarize(&sets.active, &sets.completed, self.monitor.now())
    }

    /// Select from the sets already held, without touching the store
    pub async fn filter(&self, criterion: SessionFilter) -> Vec<SessionView> {
        let sets = self.monitor.snapshot().await;
        let held = match criterion {
            SessionFilter::Completed => sets.completed,
            SessionFilter::Active | SessionFilter::Critical => sets.active,
        };
        self.monitor
            .classifier()
            .filter(&held, criterion, self.monitor.now())
    }

    async fn refresh_quietly(&self) {
        if let Err(e) = self.monitor.refresh().await {
            tracing::warn!("Session refresh after write failed: {:#}", e);
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Service wired against an in-memory store and a manual clock

    use super::*;
    use crate::config::TrackerConfig;
    use crate::db::repositories::test_support::{seeded, Fixtures};
    use crate::db::repositories::{
        SqlxDurationRepository, SqlxSessionRepository, SqlxTableNumberRepository,
        SqlxUserRepository,
    };
    use crate::services::clock::ManualClock;
    use chrono::{DateTime, TimeZone, Utc};

    pub fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    pub struct TestService {
        pub fx: Fixtures,
        pub clock: Arc<ManualClock>,
        pub service: Arc<SessionService>,
    }

    pub async fn service() -> TestService {
        let fx = seeded().await;
        let clock = Arc::new(ManualClock::new(t0()));
        let repo = SqlxSessionRepository::boxed(fx.pool.clone());
        let monitor = Arc::new(SessionMonitor::new(
            repo.clone(),
            clock.clone(),
            TrackerConfig::default(),
        ));
        let catalog = Catalog {
            tables: SqlxTableNumberRepository::boxed(fx.pool.clone()),
            durations: SqlxDurationRepository::boxed(fx.pool.clone()),
            users: SqlxUserRepository::boxed(fx.pool.clone()),
        };
        let service = Arc::new(SessionService::new(repo, catalog, monitor));
        TestService { fx, clock, service }
    }

    impl TestService {
        pub fn input(&self) -> CreateSessionInput {
            CreateSessionInput {
                table_id: self.fx.table.id,
                duration_id: self.fx.duration.id,
                user_id: self.fx.user.id,
                start_time: None,
            }
        }
    }
}
