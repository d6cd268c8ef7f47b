#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! RMP facility data served from the relational RMP tables.
//!
//! Works against Postgres or `SQLite` through `switchy_database`. Every
//! query is raw SQL with `$n` placeholders via `query_raw_params()`, so
//! the same text runs on both engines.

pub mod db;
pub mod queries;
pub mod rows;
pub mod schema;
pub mod store;

pub use schema::ensure_schema;
pub use store::RelationalStore;

use rmp_search::StoreError;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// The connection could not be opened.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

impl From<DbError> for StoreError {
    fn from(e: DbError) -> Self {
        Self::Database(e.to_string())
    }
}
