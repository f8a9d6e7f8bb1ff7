//! Database repositories
//!
//! Repository pattern implementations for database access. The session
//! repository is the Session Record Store; the others are read-mostly
//! lookups for data owned by the storefront.

use anyhow::Result;
use sqlx::{MySqlPool, SqlitePool};

use crate::db::DynDatabasePool;

pub mod duration;
pub mod session;
pub mod table_number;
pub mod user;

pub use duration::{DurationRepository, SqlxDurationRepository};
pub use session::{SessionRepository, SqlxSessionRepository, StatusUpdate};
pub use table_number::{SqlxTableNumberRepository, TableNumberRepository};
pub use user::{SqlxUserRepository, UserRepository};

/// Dialect-specific pool borrowed from a `DynDatabasePool`
pub(crate) enum Backend<'a> {
    Sqlite(&'a SqlitePool),
    Mysql(&'a MySqlPool),
}

pub(crate) fn backend(pool: &DynDatabasePool) -> Result<Backend<'_>> {
    if let Some(sqlite) = pool.as_sqlite() {
        Ok(Backend::Sqlite(sqlite))
    } else if let Some(mysql) = pool.as_mysql() {
        Ok(Backend::Mysql(mysql))
    } else {
        anyhow::bail!("Database pool exposes neither SQLite nor MySQL")
    }
}

/// Run the same query code against whichever backend the pool wraps.
///
/// The body is expanded once per dialect, so row types are resolved
/// separately for SQLite and MySQL while the SQL text stays shared.
/// Repositories import it by path (`use super::on_backend`).
macro_rules! on_backend {
    ($pool:expr, |$conn:ident| $body:expr) => {
        match $crate::db::repositories::backend($pool)? {
            $crate::db::repositories::Backend::Sqlite($conn) => $body,
            $crate::db::repositories::Backend::Mysql($conn) => $body,
        }
    };
}
pub(crate) use on_backend;

/// Auto-increment id of the row just inserted
pub(crate) trait InsertedId {
    fn inserted_id(&self) -> i64;
}

impl InsertedId for sqlx::sqlite::SqliteQueryResult {
    fn inserted_id(&self) -> i64 {
        self.last_insert_rowid()
    }
}

impl InsertedId for sqlx::mysql::MySqlQueryResult {
    fn inserted_id(&self) -> i64 {
        self.last_insert_id() as i64
    }
}
