//! Session lifecycle monitor
//!
//! Owns the in-memory working sets (open and completed sessions) and
//! reconciles them against the clock on a fixed tick:
//!
//! 1. read `now` once
//! 2. split the open set into still-open and expired sessions
//! 3. persist `completed` for every expired session
//! 4. move the ones the store confirmed into the completed set
//!
//! A failed write leaves the session in the open set so the next tick
//! retries it. The store treats completing a completed session as a no-op,
//! which makes retries safe.
//!
//! The monitor is the only writer of its working sets. `start` spawns the
//! timer loop and returns a `MonitorHandle`; stopping or dropping the handle
//! ends the loop after any tick already in progress.

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::TrackerConfig;
use crate::db::repositories::{SessionRepository, StatusUpdate};
use crate::models::{SessionStatus, SessionView};
use crate::services::clock::Clock;
use crate::services::countdown::{is_expired, session_remaining, Classifier};

/// Open and completed sessions as last seen by the monitor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkingSet {
    /// Open sessions, soonest to expire first
    pub active: Vec<SessionView>,
    /// Completed sessions, most recently completed first
    pub completed: Vec<SessionView>,
}

/// What a single tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub now: Option<DateTime<Utc>>,
    /// Sessions moved to the completed set
    pub completed: Vec<i64>,
    /// Expired sessions whose write failed; retried next tick
    pub retrying: Vec<i64>,
    /// Sessions still open after this tick
    pub still_open: usize,
}

pub struct SessionMonitor {
    repo: Arc<dyn SessionRepository>,
    clock: Arc<dyn Clock>,
    classifier: Classifier,
    config: TrackerConfig,
    sets: Mutex<WorkingSet>,
}

impl SessionMonitor {
    pub fn new(
        repo: Arc<dyn SessionRepository>,
        clock: Arc<dyn Clock>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            repo,
            clock,
            classifier: Classifier::new(config.critical_threshold_secs),
            config,
            sets: Mutex::new(WorkingSet::default()),
        }
    }

    pub fn classifier(&self) -> Classifier {
        self.classifier
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Copy of the current working sets
    pub async fn snapshot(&self) -> WorkingSet {
        self.sets.lock().await.clone()
    }

    /// Re-fetch both sets from the store and replace the working sets.
    ///
    /// On failure the previous working sets are kept.
    pub async fn refresh(&self) -> Result<WorkingSet> {
        let mut sets = self.sets.lock().await;

        let active = self.repo.get_active().await?;
        let completed = self.repo.get_completed().await?;

        tracing::debug!(
            active = active.len(),
            completed = completed.len(),
            "Session sets refreshed"
        );

        *sets = WorkingSet { active, completed };
        Ok(sets.clone())
    }

    /// Run one reconciliation pass over the open set.
    pub async fn tick(&self) -> TickReport {
        let now = self.clock.now();
        let mut sets = self.sets.lock().await;

        let (expired, still_open): (Vec<SessionView>, Vec<SessionView>) =
            std::mem::take(&mut sets.active)
                .into_iter()
                .partition(|view| {
                    let session = &view.session;
                    is_expired(session_remaining(now, session.start_time, session.end_time))
                });

        let mut report = TickReport {
            now: Some(now),
            still_open: still_open.len(),
            ..TickReport::default()
        };

        if expired.is_empty() {
            sets.active = still_open;
            return report;
        }

        let writes = expired
            .iter()
            .map(|view| self.repo.update_status(view.id(), SessionStatus::Completed, now));
        let outcomes = join_all(writes).await;

        let mut retained = Vec::new();
        let mut newly_completed = Vec::new();

        for (mut view, outcome) in expired.into_iter().zip(outcomes) {
            match outcome {
                Ok(StatusUpdate::Changed(session)) | Ok(StatusUpdate::Unchanged(session)) => {
                    report.completed.push(session.id);
                    view.session = session;
                    newly_completed.push(view);
                }
                Ok(StatusUpdate::NotFound) => {
                    tracing::warn!(session_id = view.id(), "Expired session no longer in store, dropping");
                }
                Ok(StatusUpdate::Rejected(session)) => {
                    tracing::error!(
                        session_id = session.id,
                        status = %session.status,
                        "Store rejected completion, will retry"
                    );
                    report.retrying.push(view.id());
                    retained.push(view);
                }
                Err(e) => {
                    tracing::warn!(session_id = view.id(), "Failed to complete session, will retry: {:#}", e);
                    report.retrying.push(view.id());
                    retained.push(view);
                }
            }
        }

        retained.extend(still_open);
        sets.active = retained;

        newly_completed.append(&mut sets.completed);
        sort_newest_first(&mut newly_completed);
        sets.completed = newly_completed;

        if !report.completed.is_empty() {
            tracing::info!(
                completed = ?report.completed,
                still_open = report.still_open,
                "Sessions reached their end time"
            );
        }

        report
    }

    /// Spawn the timer loop.
    ///
    /// The loop refreshes immediately, then ticks every `tick_interval` and
    /// re-fetches every `refresh_interval`. Failures are logged and the loop
    /// keeps going.
    pub fn start(self: &Arc<Self>) -> MonitorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let monitor = Arc::clone(self);
        let task = tokio::spawn(async move { monitor.run(shutdown_rx).await });
        MonitorHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "Session monitor started, tick={}ms refresh={}ms",
            self.config.tick_interval_ms,
            self.config.refresh_interval_ms
        );

        let mut tick = time::interval(self.config.tick_interval());
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut refresh = time::interval(self.config.refresh_interval());
        refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = refresh.tick() => {
                    if let Err(e) = self.refresh().await {
                        tracing::warn!("Session refresh failed: {:#}", e);
                    }
                }
                _ = tick.tick() => {
                    self.tick().await;
                }
            }
        }

        tracing::info!("Session monitor stopped");
    }
}

/// Running monitor loop. Dropping the handle also stops the loop.
pub struct MonitorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Stop scheduling ticks and wait for the loop to exit
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!("Session monitor task failed: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

fn sort_newest_first(sessions: &mut [SessionView]) {
    sessions.sort_by(|a, b| {
        b.session
            .completed_at
            .cmp(&a.session.completed_at)
            .then_with(|| b.id().cmp(&a.id()))
    });
}
