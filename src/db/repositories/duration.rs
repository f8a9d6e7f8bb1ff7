//! Duration repository
//!
//! Read access to the duration catalog. Durations are edited by the admin
//! CMS; sessions copy what they need at creation time.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{ColumnIndex, Decode, Row, Type};
use std::sync::Arc;

use super::{on_backend, InsertedId};
use crate::db::DynDatabasePool;
use crate::models::{CreateDurationInput, Duration};

#[async_trait]
pub trait DurationRepository: Send + Sync {
    async fn create(&self, input: &CreateDurationInput) -> Result<Duration>;
    async fn get_by_id(&self, id: i64) -> Result<Option<Duration>>;
    async fn list(&self) -> Result<Vec<Duration>>;
}

pub struct SqlxDurationRepository {
    pool: DynDatabasePool,
}

impl SqlxDurationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn DurationRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl DurationRepository for SqlxDurationRepository {
    async fn create(&self, input: &CreateDurationInput) -> Result<Duration> {
        let id = on_backend!(&self.pool, |conn| {
            sqlx::query("INSERT INTO durations (name, length_in_seconds, created_at) VALUES (?, ?, ?)")
                .bind(&input.name)
                .bind(input.length_in_seconds)
                .bind(Utc::now())
                .execute(conn)
                .await
                .context("Failed to create duration")?
                .inserted_id()
        });
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Duration not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Duration>> {
        on_backend!(&self.pool, |conn| {
            let row = sqlx::query(
                "SELECT id, name, length_in_seconds, created_at FROM durations WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(conn)
            .await
            .context("Failed to get duration")?;
            row.as_ref().map(duration_from_row).transpose()
        })
    }

    async fn list(&self) -> Result<Vec<Duration>> {
        on_backend!(&self.pool, |conn| {
            let rows = sqlx::query(
                "SELECT id, name, length_in_seconds, created_at FROM durations ORDER BY length_in_seconds",
            )
            .fetch_all(conn)
            .await
            .context("Failed to list durations")?;
            rows.iter().map(duration_from_row).collect()
        })
    }
}

fn duration_from_row<'r, R>(row: &'r R) -> Result<Duration>
where
    R: Row,
    &'static str: ColumnIndex<R>,
    i64: Decode<'r, R::Database> + Type<R::Database>,
    String: Decode<'r, R::Database> + Type<R::Database>,
    DateTime<Utc>: Decode<'r, R::Database> + Type<R::Database>,
{
    Ok(Duration {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        length_in_seconds: row.try_get("length_in_seconds")?,
        created_at: row.try_get("created_at")?,
    })
}
