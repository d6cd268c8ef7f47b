#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the RMP facility search server.
//!
//! These types are serialized to JSON for the REST API. They wrap the
//! domain shapes from `rmp_facility_models` so the API contract can evolve
//! independently of storage.

use rmp_facility_models::summary::FacilitySummary;
use rmp_search::{FacilityFilter, Page, PageRequest};
use serde::{Deserialize, Serialize};

/// Parsed `/api/search` and `/api/export` query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchParams {
    pub filter: FacilityFilter,
    pub page: PageRequest,
}

impl SearchParams {
    /// Reads filters and paging from decoded query pairs. Unknown keys are
    /// ignored.
    #[must_use]
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let iter = || pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()));
        Self {
            filter: FacilityFilter::from_pairs(iter()),
            page: PageRequest::from_pairs(iter()),
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    /// Size of the full filtered set.
    pub total: u64,
    pub page: u32,
    /// Page size; equals `total` when everything was requested.
    pub per_page: u64,
    pub facilities: Vec<FacilitySummary>,
}

impl From<Page<FacilitySummary>> for SearchResponse {
    fn from(page: Page<FacilitySummary>) -> Self {
        Self {
            total: page.total,
            page: page.page,
            per_page: page.per_page,
            facilities: page.items,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
    /// Which storage backend is serving data.
    pub backend: String,
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Short error kind, e.g. `"Not Found"`.
    pub error: String,
    pub message: String,
}

/// `GET /api/accidents/count` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccidentCounts {
    /// Plottable accidents of all time.
    pub total_accidents: u64,
    /// Plottable accidents within the recent window.
    pub latest_accidents: u64,
}

/// Query parameters for `GET /api/states`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatesQuery {
    /// Exact state name, case-insensitive.
    pub name: Option<String>,
    /// Exact abbreviation, case-insensitive.
    pub abbr: Option<String>,
}

/// One line of the CSV export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRow {
    pub epa_id: String,
    pub name: String,
    pub state: String,
    pub city: String,
    pub parent: Option<String>,
}

impl From<&FacilitySummary> for ExportRow {
    fn from(f: &FacilitySummary) -> Self {
        Self {
            epa_id: f.epa_facility_id.clone(),
            name: f.name.clone(),
            state: f.state.abbr.clone(),
            city: f.city.clone(),
            parent: f.parent_company.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rmp_search::PerPage;

    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn search_params_split_filters_from_paging() {
        let params = SearchParams::from_pairs(&pairs(&[
            ("state", "oh"),
            ("programLevel", "2"),
            ("perPage", "10"),
            ("page", "2"),
            ("color", "red"),
        ]));
        assert_eq!(params.filter.state.as_deref(), Some("OH"));
        assert_eq!(params.filter.process.program_level, Some(2));
        assert_eq!(params.page, PageRequest::new(2, PerPage::Limited(10)));
    }

    #[test]
    fn search_response_uses_camel_case() {
        let response = SearchResponse {
            total: 25,
            page: 2,
            per_page: 10,
            facilities: Vec::new(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["perPage"], 10);
        assert_eq!(json["total"], 25);
        assert!(json["facilities"].as_array().unwrap().is_empty());
    }

    #[test]
    fn accident_counts_field_names() {
        let json = serde_json::to_value(AccidentCounts {
            total_accidents: 7,
            latest_accidents: 3,
        })
        .unwrap();
        assert_eq!(json["totalAccidents"], 7);
        assert_eq!(json["latestAccidents"], 3);
    }
}
