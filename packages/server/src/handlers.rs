//! HTTP handler functions for the RMP facility search API.

use std::sync::Arc;

use actix_web::http::header;
use actix_web::{HttpResponse, web};
use chrono::NaiveDate;
use geojson::FeatureCollection;
use rmp_search::{GeoQuery, PageRequest, geo};
use rmp_server_models::{
    AccidentCounts, ApiHealth, ExportRow, SearchParams, SearchResponse, StatesQuery,
};

use crate::AppState;
use crate::error::ApiError;

type QueryPairs = web::Query<Vec<(String, String)>>;

fn pairs(query: &[(String, String)]) -> impl Iterator<Item = (&str, &str)> {
    query.iter().map(|(k, v)| (k.as_str(), v.as_str()))
}

fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

fn geo_response(state: &AppState, collection: &FeatureCollection) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((
            header::CACHE_CONTROL,
            format!("public, max-age={}", state.geo_cache.ttl().as_secs()),
        ))
        .json(collection)
}

/// `GET /api/health`
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: state.store.backend().to_string(),
    })
}

/// `GET /api/search`
///
/// Filtered, paginated facility summaries.
pub async fn search(
    state: web::Data<AppState>,
    query: QueryPairs,
) -> Result<HttpResponse, ApiError> {
    let params = SearchParams::from_pairs(&query);
    let page = state.store.search(&params.filter, &params.page).await?;

    log::debug!(
        "search matched {} facilities, returning {}",
        page.total,
        page.items.len()
    );

    Ok(HttpResponse::Ok().json(SearchResponse::from(page)))
}

/// `GET /api/facility/{id}` and `GET /api/facilities/{id}`
pub async fn facility(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let facility = state
        .store
        .facility(id.trim())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Facility not found: {id}")))?;

    Ok(HttpResponse::Ok().json(facility))
}

/// `GET /api/submissions/{id}`
pub async fn submission(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let raw = path.into_inner();
    let id: i64 = raw
        .trim()
        .parse()
        .map_err(|_| ApiError::BadInput(format!("Invalid submission id: {raw}")))?;

    let detail = state
        .store
        .submission(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Submission not found: {id}")))?;

    Ok(HttpResponse::Ok().json(detail))
}

/// `GET /api/facilities/geo`
///
/// Facility markers as `GeoJSON` points, cached per query.
pub async fn facilities_geo(
    state: web::Data<AppState>,
    query: QueryPairs,
) -> Result<HttpResponse, ApiError> {
    let geo_query = GeoQuery::from_pairs(pairs(&query));
    let key = geo_query.cache_key("facilities");

    let collection = if let Some(hit) = state.geo_cache.get(&key).await {
        hit
    } else {
        let markers = state.store.facility_markers().await?;
        let collection = Arc::new(geo::facility_features(
            &markers,
            state.store.coordinate_policy(),
            &geo_query,
        ));
        state.geo_cache.insert(key, Arc::clone(&collection)).await;
        collection
    };

    Ok(geo_response(&state, &collection))
}

/// `GET /api/accidents/geo`
///
/// Accident markers as `GeoJSON` points, restricted to the requested date
/// window and cached per query.
pub async fn accidents_geo(
    state: web::Data<AppState>,
    query: QueryPairs,
) -> Result<HttpResponse, ApiError> {
    let geo_query = GeoQuery::from_pairs(pairs(&query));
    let key = geo_query.cache_key("accidents");

    let collection = if let Some(hit) = state.geo_cache.get(&key).await {
        hit
    } else {
        let markers = state.store.accident_markers().await?;
        let collection = Arc::new(geo::accident_features(
            &markers,
            state.store.coordinate_policy(),
            &geo_query,
            today(),
        ));
        state.geo_cache.insert(key, Arc::clone(&collection)).await;
        collection
    };

    Ok(geo_response(&state, &collection))
}

/// `GET /api/accidents/count`
pub async fn accidents_count(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let markers = state.store.accident_markers().await?;
    let (total_accidents, latest_accidents) =
        geo::accident_counts(&markers, state.store.coordinate_policy(), today());

    Ok(HttpResponse::Ok().json(AccidentCounts {
        total_accidents,
        latest_accidents,
    }))
}

/// `GET /api/export`
///
/// Every facility matching the filters as a CSV attachment.
pub async fn export(
    state: web::Data<AppState>,
    query: QueryPairs,
) -> Result<HttpResponse, ApiError> {
    let params = SearchParams::from_pairs(&query);
    let page = state
        .store
        .search(&params.filter, &PageRequest::unlimited())
        .await?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    for facility in &page.items {
        writer.serialize(ExportRow::from(facility))?;
    }
    let body = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;

    log::info!("Exported {} facilities", page.items.len());

    Ok(HttpResponse::Ok()
        .content_type("text/csv; charset=utf-8")
        .insert_header((
            header::CONTENT_DISPOSITION,
            "attachment; filename=\"facilities.csv\"",
        ))
        .body(body))
}

/// `GET /api/states`
///
/// State summaries, optionally narrowed to an exact name or abbreviation.
pub async fn states(
    state: web::Data<AppState>,
    query: web::Query<StatesQuery>,
) -> Result<HttpResponse, ApiError> {
    let name = query.name.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let abbr = query.abbr.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let summaries: Vec<_> = state
        .store
        .states()
        .await?
        .into_iter()
        .filter(|s| name.is_none_or(|n| s.name.eq_ignore_ascii_case(n)))
        .filter(|s| abbr.is_none_or(|a| s.abbr.eq_ignore_ascii_case(a)))
        .collect();

    Ok(HttpResponse::Ok().json(summaries))
}

/// `GET /api/state/{abbr}`
pub async fn state_by_abbr(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let abbr = path.into_inner().trim().to_ascii_uppercase();
    let summary = state
        .store
        .states()
        .await?
        .into_iter()
        .find(|s| s.abbr.eq_ignore_ascii_case(&abbr))
        .ok_or_else(|| ApiError::NotFound(format!("State not found: {abbr}")))?;

    Ok(HttpResponse::Ok().json(summary))
}
