#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! RMP facility data served from per-state JSON documents.
//!
//! Each document groups a state's facilities by county. The whole data
//! set is read once, from a local data directory or a remote base URL,
//! and answered from memory afterwards.

pub mod document;
pub mod loader;
pub mod paths;
pub mod store;

pub use document::{CountyGroup, StateDocument};
pub use store::{DocumentSource, DocumentStore};

use rmp_search::StoreError;
use thiserror::Error;

/// Errors from loading state documents.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("No state documents could be fetched from {base_url}")]
    NoDocuments { base_url: String },

    /// A document did not match the expected shape.
    #[error("Failed to parse {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },
}

impl From<DocumentError> for StoreError {
    fn from(e: DocumentError) -> Self {
        Self::Document(e.to_string())
    }
}
