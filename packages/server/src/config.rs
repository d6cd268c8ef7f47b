//! Server configuration, read once from the environment at startup.

use std::path::PathBuf;
use std::time::Duration;

use rmp_search::geo::GEO_CACHE_TTL_SECS;
use strum_macros::{AsRefStr, Display, EnumString};

use crate::error::ServerError;

/// Which storage strategy serves the data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Backend {
    /// Per-state JSON documents from `RMP_DATA_DIR` or `RMP_DATA_URL`.
    #[default]
    Documents,
    /// Postgres at `DATABASE_URL`.
    Postgres,
    /// `SQLite` file at `RMP_SQLITE_PATH`.
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    pub backend: Backend,
    pub database_url: Option<String>,
    pub sqlite_path: PathBuf,
    /// Root holding the `by-state/` documents.
    pub data_dir: PathBuf,
    /// Remote base URL for state documents; takes precedence over
    /// `data_dir` when set.
    pub data_url: Option<String>,
    pub geo_cache_ttl: Duration,
    /// Built frontend to serve at `/`, if any.
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 8080,
            backend: Backend::Documents,
            database_url: None,
            sqlite_path: PathBuf::from("data/rmp.db"),
            data_dir: PathBuf::from("data"),
            data_url: None,
            geo_cache_ttl: Duration::from_secs(GEO_CACHE_TTL_SECS),
            static_dir: None,
        }
    }
}

impl ServerConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// * If `RMP_BACKEND` names an unknown backend
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`. Empty values count as
    /// unset and unparsable numbers fall back to defaults.
    ///
    /// # Errors
    ///
    /// * If `RMP_BACKEND` names an unknown backend
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ServerError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let backend = match get("RMP_BACKEND") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ServerError::UnknownBackend(raw))?,
            None => defaults.backend,
        };

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: get("PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            backend,
            database_url: get("DATABASE_URL"),
            sqlite_path: get("RMP_SQLITE_PATH").map_or(defaults.sqlite_path, PathBuf::from),
            data_dir: get("RMP_DATA_DIR").map_or(defaults.data_dir, PathBuf::from),
            data_url: get("RMP_DATA_URL"),
            geo_cache_ttl: get("RMP_GEO_CACHE_TTL_SECS")
                .and_then(|s| s.trim().parse().ok())
                .map_or(defaults.geo_cache_ttl, Duration::from_secs),
            static_dir: get("RMP_STATIC_DIR").map(PathBuf::from),
        })
    }
}
