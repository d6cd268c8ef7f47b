#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! HTTP client for the RMP facility search API.
//!
//! [`FacilitiesClient`] runs searches against `/api/search` and remembers
//! the last page of results, the pagination metadata, and the filters that
//! produced them, so a table or map view can re-render from it and page
//! through results without rebuilding the query.

pub mod filters;

pub use filters::SearchFilters;

use rmp_facility_models::summary::FacilitySummary;
use rmp_server_models::SearchResponse;
use thiserror::Error;
use tokio::sync::RwLock;

/// Page size assumed before the first search.
pub const DEFAULT_PER_PAGE: u64 = 10;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("Search failed with status {status}")]
    Status { status: u16 },
}

/// The client's view of the last search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchState {
    /// Facilities on the current page.
    pub results: Vec<FacilitySummary>,
    pub total: u64,
    pub page: u32,
    pub per_page: u64,
    /// Filters of the last search, including `page`/`perPage` if given.
    pub filters: SearchFilters,
    /// Whether a search is in flight.
    pub loading: bool,
}

impl Default for SearchState {
    fn default() -> Self {
        Self {
            results: Vec::new(),
            total: 0,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            filters: SearchFilters::default(),
            loading: false,
        }
    }
}

pub struct FacilitiesClient {
    client: reqwest::Client,
    base_url: String,
    state: RwLock<SearchState>,
}

impl FacilitiesClient {
    /// Client for the API served at `base_url`, e.g.
    /// `http://localhost:8080`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            state: RwLock::new(SearchState::default()),
        }
    }

    /// A snapshot of the last search.
    pub async fn state(&self) -> SearchState {
        self.state.read().await.clone()
    }

    /// Runs a search and stores its results.
    ///
    /// The filters are remembered even when the request fails; on failure
    /// the previous results and pagination are kept.
    ///
    /// # Errors
    ///
    /// * If the request fails or the server answers with an error status
    pub async fn search(&self, filters: SearchFilters) -> Result<(), ClientError> {
        {
            let mut state = self.state.write().await;
            state.loading = true;
            state.filters = filters.clone();
        }

        let result = self.fetch(&filters).await;

        let mut state = self.state.write().await;
        state.loading = false;
        match result {
            Ok(response) => {
                state.results = response.facilities;
                state.total = response.total;
                state.page = response.page;
                state.per_page = response.per_page;
                Ok(())
            }
            Err(e) => {
                log::error!("Search API error: {e}");
                Err(e)
            }
        }
    }

    /// Re-runs the last search on another page.
    ///
    /// # Errors
    ///
    /// * If the request fails or the server answers with an error status
    pub async fn go_to_page(&self, page: u32) -> Result<(), ClientError> {
        let mut filters = self.state.read().await.filters.clone();
        filters.set("page", page);
        self.search(filters).await
    }

    async fn fetch(&self, filters: &SearchFilters) -> Result<SearchResponse, ClientError> {
        let url = format!("{}/api/search", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&filters.to_query())
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(ClientError::Status {
                status: resp.status().as_u16(),
            });
        }

        Ok(resp.json().await?)
    }
}
