//! User repository
//!
//! Only what the tracker needs: enough to resolve a session holder's name
//! and avatar, plus inserts for seeding.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{ColumnIndex, Decode, Row, Type};
use std::sync::Arc;

use super::{on_backend, InsertedId};
use crate::db::DynDatabasePool;
use crate::models::{CreateUserInput, User, UserSnapshot};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, input: &CreateUserInput) -> Result<User>;
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_snapshot(&self, id: i64) -> Result<Option<UserSnapshot>> {
        Ok(self.get_by_id(id).await?.map(|user| user.snapshot()))
    }
}

pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, input: &CreateUserInput) -> Result<User> {
        let id = on_backend!(&self.pool, |conn| {
            sqlx::query("INSERT INTO users (name, email, avatar_url, created_at) VALUES (?, ?, ?, ?)")
                .bind(&input.name)
                .bind(&input.email)
                .bind(&input.avatar_url)
                .bind(Utc::now())
                .execute(conn)
                .await
                .context("Failed to create user")?
                .inserted_id()
        });
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        on_backend!(&self.pool, |conn| {
            let row = sqlx::query(
                "SELECT id, name, email, avatar_url, created_at FROM users WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(conn)
            .await
            .context("Failed to get user")?;
            row.as_ref().map(user_from_row).transpose()
        })
    }
}

fn user_from_row<'r, R>(row: &'r R) -> Result<User>
where
    R: Row,
    &'static str: ColumnIndex<R>,
    i64: Decode<'r, R::Database> + Type<R::Database>,
    String: Decode<'r, R::Database> + Type<R::Database>,
    DateTime<Utc>: Decode<'r, R::Database> + Type<R::Database>,
{
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        avatar_url: row.try_get::<Option<String>, _>("avatar_url")?,
        created_at: row.try_get("created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::seeded;

    #[tokio::test]
    async fn test_snapshot_carries_avatar() {
        let fx = seeded().await;
        let repo = SqlxUserRepository::new(fx.pool.clone());

        let user = repo
            .create(&CreateUserInput {
                name: "Bo Bait".to_string(),
                email: "bo@example.com".to_string(),
                avatar_url: Some("avatars/bo.png".to_string()),
            })
            .await
            .unwrap();

        let snapshot = repo.get_snapshot(user.id).await.unwrap().unwrap();
        assert_eq!(snapshot.name, "Bo Bait");
        assert_eq!(snapshot.avatar_url.as_deref(), Some("avatars/bo.png"));
        assert!(repo.get_snapshot(999).await.unwrap().is_none());
    }
}
