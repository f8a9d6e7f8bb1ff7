//! Session repository
//!
//! The Session Record Store. Rows live in `user_selected_durations`; reads
//! join the table, duration and user so callers get display-ready views.
//!
//! Status changes are decided by the store, not the caller: completion is a
//! single conditional `UPDATE ... WHERE status = 'active'`, so a manual
//! completion and a monitor tick racing on the same row converge on one
//! transition.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{ColumnIndex, Decode, Row, Type};
use std::sync::Arc;

use super::{on_backend, InsertedId};
use crate::db::DynDatabasePool;
use crate::models::{NewSession, Session, SessionStatus, SessionView, UserSnapshot};

/// Outcome of a status update as decided by the store
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    /// The row moved to the requested status
    Changed(Session),
    /// The row already had the requested status; nothing was written
    Unchanged(Session),
    /// The requested change would move a completed session back to active
    Rejected(Session),
    NotFound,
}

/// Session Record Store
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &NewSession) -> Result<Session>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Session>>;

    async fn get_view(&self, id: i64) -> Result<Option<SessionView>>;

    /// Open sessions, soonest to expire first
    async fn get_active(&self) -> Result<Vec<SessionView>>;

    /// Completed sessions, most recently completed first
    async fn get_completed(&self) -> Result<Vec<SessionView>>;

    /// Move a session to `status`, stamping `completed_at` with `at` on completion
    async fn update_status(
        &self,
        id: i64,
        status: SessionStatus,
        at: DateTime<Utc>,
    ) -> Result<StatusUpdate>;
}

/// SQLx-based session repository (SQLite and MySQL)
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

const SESSION_COLUMNS: &str =
    "id, table_id, duration_id, user_id, start_time, end_time, status, completed_at, created_at";

const VIEW_SELECT: &str = r#"
    SELECT s.id, s.table_id, s.duration_id, s.user_id, s.start_time, s.end_time,
           s.status, s.completed_at, s.created_at,
           t.label AS table_label, d.name AS duration_name,
           u.name AS user_name, u.avatar_url AS user_avatar_url
    FROM user_selected_durations s
    JOIN table_numbers t ON t.id = s.table_id
    JOIN durations d ON d.id = s.duration_id
    JOIN users u ON u.id = s.user_id
"#;

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &NewSession) -> Result<Session> {
        let now = Utc::now();
        let id = on_backend!(&self.pool, |conn| {
            sqlx::query(
                r#"
                INSERT INTO user_selected_durations
                    (table_id, duration_id, user_id, start_time, end_time, status, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(session.table_id)
            .bind(session.duration_id)
            .bind(session.user_id)
            .bind(session.start_time)
            .bind(session.end_time)
            .bind(SessionStatus::Active.to_string())
            .bind(now)
            .execute(conn)
            .await
            .context("Failed to create session")?
            .inserted_id()
        });

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Session {} not found after insert", id))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Session>> {
        let sql = format!("SELECT {} FROM user_selected_durations WHERE id = ?", SESSION_COLUMNS);
        on_backend!(&self.pool, |conn| {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(conn)
                .await
                .context("Failed to get session by ID")?;
            row.as_ref().map(session_from_row).transpose()
        })
    }

    async fn get_view(&self, id: i64) -> Result<Option<SessionView>> {
        let sql = format!("{} WHERE s.id = ?", VIEW_SELECT);
        on_backend!(&self.pool, |conn| {
            let row = sqlx::query(&sql)
                .bind(id)
                .fetch_optional(conn)
                .await
                .context("Failed to get session view")?;
            row.as_ref().map(view_from_row).transpose()
        })
    }

    async fn get_active(&self) -> Result<Vec<SessionView>> {
        let sql = format!(
            "{} WHERE s.status = 'active' ORDER BY s.end_time ASC, s.id ASC",
            VIEW_SELECT
        );
        on_backend!(&self.pool, |conn| {
            let rows = sqlx::query(&sql)
                .fetch_all(conn)
                .await
                .context("Failed to list active sessions")?;
            rows.iter().map(view_from_row).collect()
        })
    }

    async fn get_completed(&self) -> Result<Vec<SessionView>> {
        let sql = format!(
            "{} WHERE s.status = 'completed' ORDER BY s.completed_at DESC, s.id DESC",
            VIEW_SELECT
        );
        on_backend!(&self.pool, |conn| {
            let rows = sqlx::query(&sql)
                .fetch_all(conn)
                .await
                .context("Failed to list completed sessions")?;
            rows.iter().map(view_from_row).collect()
        })
    }

    async fn update_status(
        &self,
        id: i64,
        status: SessionStatus,
        at: DateTime<Utc>,
    ) -> Result<StatusUpdate> {
        if status == SessionStatus::Completed {
            let affected = on_backend!(&self.pool, |conn| {
                sqlx::query(
                    r#"
                    UPDATE user_selected_durations
                    SET status = ?, completed_at = ?
                    WHERE id = ? AND status = ?
                    "#,
                )
                .bind(SessionStatus::Completed.to_string())
                .bind(at)
                .bind(id)
                .bind(SessionStatus::Active.to_string())
                .execute(conn)
                .await
                .context("Failed to complete session")?
                .rows_affected()
            });

            let current = self.get_by_id(id).await?;
            return Ok(match current {
                None => StatusUpdate::NotFound,
                Some(session) if affected > 0 => StatusUpdate::Changed(session),
                Some(session) => StatusUpdate::Unchanged(session),
            });
        }

        // Nothing is ever written for a request to be active: an open session
        // is already active and a completed one may not go back.
        Ok(match self.get_by_id(id).await? {
            None => StatusUpdate::NotFound,
            Some(session) if session.status.can_transition_to(status) => {
                StatusUpdate::Unchanged(session)
            }
            Some(session) => StatusUpdate::Rejected(session),
        })
    }
}

fn session_from_row<'r, R>(row: &'r R) -> Result<Session>
where
    R: Row,
    &'static str: ColumnIndex<R>,
    i64: Decode<'r, R::Database> + Type<R::Database>,
    String: Decode<'r, R::Database> + Type<R::Database>,
    DateTime<Utc>: Decode<'r, R::Database> + Type<R::Database>,
{
    let status: String = row.try_get("status")?;
    Ok(Session {
        id: row.try_get("id")?,
        table_id: row.try_get("table_id")?,
        duration_id: row.try_get("duration_id")?,
        user_id: row.try_get("user_id")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        status: status.parse()?,
        completed_at: row.try_get::<Option<DateTime<Utc>>, _>("completed_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn view_from_row<'r, R>(row: &'r R) -> Result<SessionView>
where
    R: Row,
    &'static str: ColumnIndex<R>,
    i64: Decode<'r, R::Database> + Type<R::Database>,
    String: Decode<'r, R::Database> + Type<R::Database>,
    DateTime<Utc>: Decode<'r, R::Database> + Type<R::Database>,
{
    let session = session_from_row(row)?;
    Ok(SessionView {
        table_label: row.try_get("table_label")?,
        duration_name: row.try_get("duration_name")?,
        user: UserSnapshot {
            id: session.user_id,
            name: row.try_get("user_name")?,
            avatar_url: row.try_get::<Option<String>, _>("user_avatar_url")?,
        },
        session,
    })
}
