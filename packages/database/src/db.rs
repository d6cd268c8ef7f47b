//! Database connection utilities.

use std::path::Path;

use switchy_database::Database;
use switchy_database_connection::{Credentials, init_sqlite_rusqlite};

use crate::{DbError, schema};

/// Connects to Postgres at `url`.
///
/// # Errors
///
/// * If the URL cannot be parsed
/// * If the connection fails
pub async fn connect_postgres(url: &str) -> Result<Box<dyn Database>, DbError> {
    // Credentials doesn't understand query parameters such as
    // `?sslmode=require`; TLS is negotiated by the native-tls connector.
    let url_base = url.split('?').next().unwrap_or(url);

    let creds = Credentials::from_url(url_base).map_err(|e| DbError::Connection(e.to_string()))?;
    let db = switchy_database_connection::init_postgres_raw_native_tls(creds)
        .await
        .map_err(|e| DbError::Connection(e.to_string()))?;

    Ok(db)
}

/// Opens (or creates) a `SQLite` database at `path` and ensures the RMP
/// tables exist.
///
/// # Errors
///
/// * If the parent directory cannot be created
/// * If the database cannot be opened or the schema cannot be created
pub async fn open_sqlite(path: &Path) -> Result<Box<dyn Database>, DbError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| DbError::Connection(e.to_string()))?;
    }

    let db = init_sqlite_rusqlite(Some(path)).map_err(|e| DbError::Connection(e.to_string()))?;

    schema::ensure_schema(db.as_ref()).await?;

    Ok(db)
}
