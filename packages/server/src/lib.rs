#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for RMP facility search.
//!
//! Serves the REST API for searching, mapping, and exporting EPA Risk
//! Management Plan facilities. Data comes from whichever
//! [`FacilityStore`] the configuration selects: per-state JSON documents,
//! Postgres, or a `SQLite` file. Map layers are cached in memory for a few
//! minutes since they are expensive to build and change rarely.

pub mod config;
pub mod error;
mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{App, HttpServer, middleware, web};
use geojson::FeatureCollection;
use rmp_database::RelationalStore;
use rmp_database::db::{connect_postgres, open_sqlite};
use rmp_documents::DocumentStore;
use rmp_search::{FacilityStore, TtlCache};

pub use config::{Backend, ServerConfig};
pub use error::{ApiError, ServerError};

/// Shared application state.
pub struct AppState {
    /// The backend serving facility data.
    pub store: Arc<dyn FacilityStore>,
    /// Rendered map layers keyed by layer and query.
    pub geo_cache: TtlCache<String, Arc<FeatureCollection>>,
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/search", web::get().to(handlers::search))
            .route("/export", web::get().to(handlers::export))
            .route("/facilities/geo", web::get().to(handlers::facilities_geo))
            .route("/facilities/{id}", web::get().to(handlers::facility))
            .route("/facility/{id}", web::get().to(handlers::facility))
            .route("/submissions/{id}", web::get().to(handlers::submission))
            .route("/accidents/geo", web::get().to(handlers::accidents_geo))
            .route("/accidents/count", web::get().to(handlers::accidents_count))
            .route("/states", web::get().to(handlers::states))
            .route("/state/{abbr}", web::get().to(handlers::state_by_abbr)),
    );
}

/// Opens the store selected by `config.backend`.
///
/// The document store loads lazily on its first request; the relational
/// backends connect immediately.
///
/// # Errors
///
/// * If the postgres backend is selected without a `DATABASE_URL`
/// * If the database connection fails
pub async fn open_store(config: &ServerConfig) -> Result<Arc<dyn FacilityStore>, ServerError> {
    Ok(match config.backend {
        Backend::Documents => {
            if let Some(url) = &config.data_url {
                log::info!("Serving state documents from {url}");
                Arc::new(DocumentStore::remote(url.clone()))
            } else {
                log::info!("Serving state documents from {}", config.data_dir.display());
                Arc::new(DocumentStore::directory(&config.data_dir))
            }
        }
        Backend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or(ServerError::MissingDatabaseUrl)?;
            log::info!("Connecting to Postgres...");
            let db = connect_postgres(url).await?;
            Arc::new(RelationalStore::postgres(Arc::from(db)))
        }
        Backend::Sqlite => {
            log::info!("Opening SQLite database {}", config.sqlite_path.display());
            let db = open_sqlite(&config.sqlite_path).await?;
            Arc::new(RelationalStore::sqlite(Arc::from(db)))
        }
    })
}

/// Starts the RMP facility search API server.
///
/// Initializes logging, opens the configured store, and runs the Actix-Web
/// HTTP server until shutdown. The caller provides the async runtime
/// (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// * If the store cannot be opened
/// * If the HTTP server fails to bind or encounters a runtime error
#[allow(clippy::future_not_send)]
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let store = open_store(&config).await?;
    log::info!("Using {} backend", store.backend());

    let state = web::Data::new(AppState {
        store,
        geo_cache: TtlCache::new(config.geo_cache_ttl),
    });
    let static_dir = config.static_dir.clone();

    log::info!("Starting server on {}:{}", config.bind_addr, config.port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        let app = App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure);

        // Serve frontend static files (production)
        match &static_dir {
            Some(dir) => app.service(Files::new("/", dir).index_file("index.html")),
            None => app,
        }
    })
    .bind((config.bind_addr.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
