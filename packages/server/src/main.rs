#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! RMP facility search API server binary.

use std::path::PathBuf;

use clap::Parser;
use rmp_server::{Backend, ServerConfig, ServerError};

#[derive(Parser)]
#[command(name = "rmp_server", about = "RMP facility search API server")]
struct Cli {
    /// Address to bind (overrides `BIND_ADDR`)
    #[arg(long)]
    bind_addr: Option<String>,

    /// Port to listen on (overrides `PORT`)
    #[arg(long)]
    port: Option<u16>,

    /// `documents`, `postgres`, or `sqlite` (overrides `RMP_BACKEND`)
    #[arg(long)]
    backend: Option<Backend>,

    /// Postgres connection URL (overrides `DATABASE_URL`)
    #[arg(long)]
    database_url: Option<String>,

    /// `SQLite` database file (overrides `RMP_SQLITE_PATH`)
    #[arg(long)]
    sqlite_path: Option<PathBuf>,

    /// Directory containing `by-state/` documents (overrides `RMP_DATA_DIR`)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Base URL for remote state documents (overrides `RMP_DATA_URL`)
    #[arg(long)]
    data_url: Option<String>,

    /// Built frontend directory to serve at `/` (overrides `RMP_STATIC_DIR`)
    #[arg(long)]
    static_dir: Option<PathBuf>,
}

impl Cli {
    fn apply(self, mut config: ServerConfig) -> ServerConfig {
        if let Some(bind_addr) = self.bind_addr {
            config.bind_addr = bind_addr;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        config.database_url = self.database_url.or(config.database_url);
        if let Some(path) = self.sqlite_path {
            config.sqlite_path = path;
        }
        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        config.data_url = self.data_url.or(config.data_url);
        config.static_dir = self.static_dir.or(config.static_dir);
        config
    }
}

#[actix_web::main]
async fn main() -> Result<(), ServerError> {
    let cli = Cli::parse();
    let config = cli.apply(ServerConfig::from_env()?);
    rmp_server::run_server(config).await
}
