//! Read queries over the RMP tables.
//!
//! A facility is represented by its latest `tbl_s1_facilities` row: the
//! submission with the most recent inspection date, undated last, ties
//! going to the higher submission ID. Every query starts from that
//! `latest` view, so filters and listings agree on facility attributes.

use std::collections::BTreeMap;

use moosicbox_json_utils::database::ToValue as _;
use rmp_facility_models::summary::{
    AccidentMarker, CountySummary, FacilityMarker, FacilitySummary, StateSummary,
    SubmissionDetail,
};
use rmp_facility_models::{CoordinateValue, Facility, date_key, states};
use rmp_search::assemble::assemble;
use rmp_search::sql::date_key_sql;
use rmp_search::{FacilityFilter, Page, PageRequest};
use switchy_database::{Database, DatabaseValue};

use crate::DbError;
use crate::rows::{self, ACCIDENT_FLAGS, FacilityAttrs, FlatRow, YES_VALUES};

/// Canonical submission order for rows of `tbl_s1_facilities` aliased as
/// `alias`.
fn submission_order(alias: &str) -> String {
    let key = date_key_sql(&format!("{alias}.safety_inspection_date"));
    format!(
        "CASE WHEN {key} IS NULL THEN 1 ELSE 0 END, \
         {key} DESC, \
         {alias}.facility_id DESC"
    )
}

/// `WITH` prefix defining `latest`: one row per facility.
fn latest_cte() -> String {
    format!(
        "WITH ranked AS (
            SELECT f.*,
                   ROW_NUMBER() OVER (
                       PARTITION BY f.epa_facility_id
                       ORDER BY {}
                   ) AS rn
            FROM tbl_s1_facilities f
        ),
        latest AS (SELECT * FROM ranked WHERE rn = 1)",
        submission_order("f")
    )
}

fn yes_list() -> String {
    YES_VALUES
        .iter()
        .map(|v| format!("'{v}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

const FACILITY_COLUMNS: &str = "latest.epa_facility_id, latest.facility_name, \
    latest.facility_str_1, latest.facility_city, latest.facility_state, \
    latest.facility_zip_code, latest.facility_county_fips, latest.parent_company_name, \
    latest.facility_duns, latest.operator_name, latest.facility_lat_dec_degs, \
    latest.facility_long_dec_degs, latest.valid_lat_long_flag";

/// The full facility × submission × child join over facilities listed in
/// the `targets` CTE, in canonical order.
fn join_query(prefix: &str) -> String {
    let flags: String = ACCIDENT_FLAGS
        .iter()
        .map(|(column, _)| format!(", a.{column}"))
        .collect();

    format!(
        "{prefix}
        SELECT {FACILITY_COLUMNS},
               s.facility_id AS submission_id,
               s.safety_inspection_date,
               s.deregistration_date,
               p.process_id,
               p.program_level,
               p.mh_toxic_release,
               pn.naics_code,
               pc.chemical_id,
               pc.quantity,
               c.chemical_name,
               a.accident_history_id,
               a.accident_date,
               a.accident_time,
               a.naics_code AS accident_naics_code{flags}
        FROM targets
        JOIN latest ON latest.epa_facility_id = targets.epa_facility_id
        JOIN tbl_s1_facilities s ON s.epa_facility_id = latest.epa_facility_id
        LEFT JOIN tbl_s1_processes p ON p.facility_id = s.facility_id
        LEFT JOIN tbl_s1_process_naics pn ON pn.process_id = p.process_id
        LEFT JOIN tbl_s1_process_chemicals pc ON pc.process_id = p.process_id
        LEFT JOIN tlkp_chemicals c ON c.chemical_id = pc.chemical_id
        LEFT JOIN tbl_s6_accident_history a ON a.facility_id = s.facility_id
        ORDER BY latest.epa_facility_id, {}, p.process_id, pn.naics_code, pc.chemical_id,
                 a.accident_history_id",
        submission_order("s")
    )
}

async fn flat_rows(
    db: &dyn Database,
    query: &str,
    params: &[DatabaseValue],
) -> Result<Vec<FlatRow>, DbError> {
    let rows = db.query_raw_params(query, params).await?;
    rows.iter().map(FlatRow::read).collect()
}

/// Counts facilities matching `filter`.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn count_facilities(db: &dyn Database, filter: &FacilityFilter) -> Result<u64, DbError> {
    let clause = filter.to_sql(0);
    let params: Vec<DatabaseValue> = clause
        .params
        .into_iter()
        .map(rows::to_database_value)
        .collect();

    let query = format!(
        "{} SELECT COUNT(*) AS total FROM latest WHERE {}",
        latest_cte(),
        clause.sql
    );
    let rows = db.query_raw_params(&query, &params).await?;

    let total: i64 = rows
        .first()
        .and_then(|r| r.to_value("total").ok())
        .unwrap_or(0);

    Ok(u64::try_from(total).unwrap_or(0))
}

/// Returns one page of facility summaries matching `filter`, ordered by
/// `EPAFacilityID`.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn search(
    db: &dyn Database,
    filter: &FacilityFilter,
    page: &PageRequest,
) -> Result<Page<FacilitySummary>, DbError> {
    let total = count_facilities(db, filter).await?;

    let clause = filter.to_sql(0);
    let mut params: Vec<DatabaseValue> = clause
        .params
        .into_iter()
        .map(rows::to_database_value)
        .collect();

    let window = match page.limit() {
        Some(limit) => {
            let n = params.len();
            params.push(DatabaseValue::Int64(i64::try_from(limit).unwrap_or(i64::MAX)));
            params.push(DatabaseValue::Int64(
                i64::try_from(page.offset()).unwrap_or(i64::MAX),
            ));
            format!(" LIMIT ${} OFFSET ${}", n + 1, n + 2)
        }
        None => String::new(),
    };

    let prefix = format!(
        "{}, targets AS (
            SELECT latest.epa_facility_id FROM latest
            WHERE {}
            ORDER BY latest.epa_facility_id{window}
        )",
        latest_cte(),
        clause.sql
    );

    let rows = flat_rows(db, &join_query(&prefix), &params).await?;
    let join_rows: Vec<_> = rows.iter().map(FlatRow::to_join_row).collect();

    Ok(page.finish(total, assemble(&join_rows)))
}

/// Loads one facility with every submission, process, chemical, and
/// accident.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn get_facility(
    db: &dyn Database,
    epa_facility_id: &str,
) -> Result<Option<Facility>, DbError> {
    let prefix = format!(
        "{}, targets AS (
            SELECT latest.epa_facility_id FROM latest
            WHERE latest.epa_facility_id = $1
        )",
        latest_cte()
    );

    let rows = flat_rows(
        db,
        &join_query(&prefix),
        &[DatabaseValue::String(epa_facility_id.trim().to_string())],
    )
    .await?;

    Ok(rows::nest_facility(&rows))
}

/// Loads one submission together with its facility's identity.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn get_submission(
    db: &dyn Database,
    submission_id: i64,
) -> Result<Option<SubmissionDetail>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT epa_facility_id FROM tbl_s1_facilities WHERE facility_id = $1",
            &[DatabaseValue::Int64(submission_id)],
        )
        .await?;

    let Some(epa_facility_id) = rows.first().and_then(|r| rows::text(r, "epa_facility_id")) else {
        return Ok(None);
    };

    let Some(facility) = get_facility(db, &epa_facility_id).await? else {
        return Ok(None);
    };

    Ok(facility
        .submissions
        .iter()
        .find(|s| s.id == submission_id)
        .map(|s| SubmissionDetail::new(&facility, s)))
}

/// Lists every facility as a map marker, ordered by `EPAFacilityID`.
/// Coordinates are returned raw.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn list_facility_markers(db: &dyn Database) -> Result<Vec<FacilityMarker>, DbError> {
    let query = format!(
        "{}
        SELECT {FACILITY_COLUMNS},
               latest.safety_inspection_date,
               latest.deregistration_date,
               (SELECT COUNT(DISTINCT a.accident_history_id)
                FROM tbl_s6_accident_history a
                JOIN tbl_s1_facilities s ON s.facility_id = a.facility_id
                WHERE s.epa_facility_id = latest.epa_facility_id) AS accident_count,
               (SELECT MAX(p.program_level)
                FROM tbl_s1_processes p
                JOIN tbl_s1_facilities s ON s.facility_id = p.facility_id
                WHERE s.epa_facility_id = latest.epa_facility_id) AS program_level,
               (SELECT COUNT(*)
                FROM tbl_s1_processes p
                JOIN tbl_s1_facilities s ON s.facility_id = p.facility_id
                WHERE s.epa_facility_id = latest.epa_facility_id
                  AND UPPER(TRIM(p.mh_toxic_release)) IN ({})) AS toxic_processes
        FROM latest
        ORDER BY latest.epa_facility_id",
        latest_cte(),
        yes_list()
    );

    let rows = db.query_raw_params(&query, &[]).await?;

    rows.iter()
        .map(|row| {
            let attrs = FacilityAttrs::read(row)?;
            let inspection = rows::text(row, "safety_inspection_date");
            let deregistration = rows::text(row, "deregistration_date");
            let active = inspection.as_deref().and_then(date_key).is_some()
                && deregistration.as_deref().is_none_or(|d| d.trim_matches(' ').is_empty());

            Ok(FacilityMarker {
                epa_facility_id: attrs.epa_facility_id,
                name: attrs.name,
                city: attrs.city,
                state: attrs.state.trim().to_uppercase(),
                last_date: inspection,
                accident_count: u64::try_from(rows::int(row, "accident_count").unwrap_or(0))
                    .unwrap_or(0),
                program_level: rows::int(row, "program_level"),
                toxic_release: rows::int(row, "toxic_processes").unwrap_or(0) > 0,
                active,
                latitude: attrs.latitude.map(CoordinateValue::Text),
                longitude: attrs.longitude.map(CoordinateValue::Text),
                valid_lat_long: attrs.valid_lat_long,
            })
        })
        .collect()
}

/// Lists every accident positioned at its facility, ordered by facility,
/// submission (latest first), then accident ID. Coordinates are returned
/// raw.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn list_accident_markers(db: &dyn Database) -> Result<Vec<AccidentMarker>, DbError> {
    let query = format!(
        "{}
        SELECT {FACILITY_COLUMNS},
               a.accident_history_id,
               a.facility_id AS submission_id,
               a.accident_date,
               a.accident_time,
               a.naics_code AS accident_naics_code
        FROM tbl_s6_accident_history a
        JOIN tbl_s1_facilities s ON s.facility_id = a.facility_id
        JOIN latest ON latest.epa_facility_id = s.epa_facility_id
        ORDER BY latest.epa_facility_id, {}, a.accident_history_id",
        latest_cte(),
        submission_order("s")
    );

    let rows = db.query_raw_params(&query, &[]).await?;

    rows.iter()
        .map(|row| {
            let attrs = FacilityAttrs::read(row)?;
            Ok(AccidentMarker {
                id: rows::required(rows::int(row, "accident_history_id"), "accident_history_id")?,
                epa_facility_id: attrs.epa_facility_id,
                facility_name: attrs.name,
                submission_id: rows::required(rows::int(row, "submission_id"), "submission_id")?,
                date: rows::text(row, "accident_date"),
                time: rows::text(row, "accident_time"),
                naics_code: rows::text(row, "accident_naics_code"),
                latitude: attrs.latitude.map(CoordinateValue::Text),
                longitude: attrs.longitude.map(CoordinateValue::Text),
                valid_lat_long: attrs.valid_lat_long,
            })
        })
        .collect()
}

/// Per-state and per-county facility counts, ordered by abbreviation and
/// FIPS code.
///
/// # Errors
///
/// Returns [`DbError`] if the database operation fails.
pub async fn list_states(db: &dyn Database) -> Result<Vec<StateSummary>, DbError> {
    let query = format!(
        "{}
        SELECT UPPER(TRIM(COALESCE(latest.facility_state, ''))) AS abbr,
               TRIM(COALESCE(latest.facility_county_fips, '')) AS fips,
               COUNT(*) AS facility_count
        FROM latest
        GROUP BY UPPER(TRIM(COALESCE(latest.facility_state, ''))),
                 TRIM(COALESCE(latest.facility_county_fips, ''))
        ORDER BY abbr, fips",
        latest_cte()
    );

    let rows = db.query_raw_params(&query, &[]).await?;

    let mut by_state: BTreeMap<String, Vec<CountySummary>> = BTreeMap::new();
    for row in &rows {
        let abbr = rows::text(row, "abbr").unwrap_or_default();
        by_state.entry(abbr).or_default().push(CountySummary {
            fips: rows::text(row, "fips").unwrap_or_default(),
            name: None,
            facility_count: u64::try_from(rows::int(row, "facility_count").unwrap_or(0))
                .unwrap_or(0),
        });
    }

    Ok(by_state
        .into_iter()
        .map(|(abbr, counties)| StateSummary {
            name: states::display_name(&abbr),
            facility_count: counties.iter().map(|c| c.facility_count).sum(),
            abbr,
            counties,
        })
        .collect())
}
