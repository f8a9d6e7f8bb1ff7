//! Table repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{ColumnIndex, Decode, Row, Type};
use std::sync::Arc;

use super::{on_backend, InsertedId};
use crate::db::DynDatabasePool;
use crate::models::TableNumber;

#[async_trait]
pub trait TableNumberRepository: Send + Sync {
    async fn create(&self, label: &str) -> Result<TableNumber>;
    async fn get_by_id(&self, id: i64) -> Result<Option<TableNumber>>;
    async fn list(&self) -> Result<Vec<TableNumber>>;
}

pub struct SqlxTableNumberRepository {
    pool: DynDatabasePool,
}

impl SqlxTableNumberRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TableNumberRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl TableNumberRepository for SqlxTableNumberRepository {
    async fn create(&self, label: &str) -> Result<TableNumber> {
        let id = on_backend!(&self.pool, |conn| {
            sqlx::query("INSERT INTO table_numbers (label, created_at) VALUES (?, ?)")
                .bind(label)
                .bind(Utc::now())
                .execute(conn)
                .await
                .with_context(|| format!("Failed to create table '{}'", label))?
                .inserted_id()
        });
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Table not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<TableNumber>> {
        on_backend!(&self.pool, |conn| {
            let row = sqlx::query("SELECT id, label, created_at FROM table_numbers WHERE id = ?")
                .bind(id)
                .fetch_optional(conn)
                .await
                .context("Failed to get table")?;
            row.as_ref().map(table_from_row).transpose()
        })
    }

    async fn list(&self) -> Result<Vec<TableNumber>> {
        on_backend!(&self.pool, |conn| {
            let rows = sqlx::query("SELECT id, label, created_at FROM table_numbers ORDER BY label")
                .fetch_all(conn)
                .await
                .context("Failed to list tables")?;
            rows.iter().map(table_from_row).collect()
        })
    }
}

fn table_from_row<'r, R>(row: &'r R) -> Result<TableNumber>
where
    R: Row,
    &'static str: ColumnIndex<R>,
    i64: Decode<'r, R::Database> + Type<R::Database>,
    String: Decode<'r, R::Database> + Type<R::Database>,
    DateTime<Utc>: Decode<'r, R::Database> + Type<R::Database>,
{
    Ok(TableNumber {
        id: row.try_get("id")?,
        label: row.try_get("label")?,
        created_at: row.try_get("created_at")?,
    })
}
