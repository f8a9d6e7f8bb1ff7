//! Database layer
//!
//! SQLite (default, single-binary deployment) or MySQL (shared with the
//! storefront), selected by configuration. Repositories receive a
//! `DynDatabasePool` and never name a concrete backend.

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase};
