//! The subset of the RMP tables this crate reads.
//!
//! Production Postgres databases are loaded out of band and already carry
//! these tables. [`ensure_schema`] creates them for local `SQLite`
//! databases and tests.

use switchy_database::Database;

use crate::DbError;
use crate::rows::ACCIDENT_FLAGS;

const TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS tbl_s1_facilities (
        facility_id             BIGINT PRIMARY KEY,
        epa_facility_id         TEXT NOT NULL,
        facility_name           TEXT,
        facility_str_1          TEXT,
        facility_city           TEXT,
        facility_state          TEXT,
        facility_zip_code       TEXT,
        facility_county_fips    TEXT,
        parent_company_name     TEXT,
        facility_duns           TEXT,
        operator_name           TEXT,
        facility_lat_dec_degs   TEXT,
        facility_long_dec_degs  TEXT,
        valid_lat_long_flag     TEXT,
        safety_inspection_date  TEXT,
        deregistration_date     TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_s1_facilities_epa
     ON tbl_s1_facilities (epa_facility_id)",
    "CREATE TABLE IF NOT EXISTS tbl_s1_processes (
        process_id        BIGINT PRIMARY KEY,
        facility_id       BIGINT NOT NULL,
        program_level     BIGINT,
        mh_toxic_release  TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_s1_processes_facility
     ON tbl_s1_processes (facility_id)",
    "CREATE TABLE IF NOT EXISTS tbl_s1_process_naics (
        process_naics_id  BIGINT PRIMARY KEY,
        process_id        BIGINT NOT NULL,
        naics_code        TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_s1_process_naics_process
     ON tbl_s1_process_naics (process_id)",
    "CREATE TABLE IF NOT EXISTS tlkp_chemicals (
        chemical_id    BIGINT PRIMARY KEY,
        chemical_name  TEXT
    )",
    "CREATE TABLE IF NOT EXISTS tbl_s1_process_chemicals (
        process_chemical_id  BIGINT PRIMARY KEY,
        process_id           BIGINT NOT NULL,
        chemical_id          BIGINT NOT NULL,
        quantity             DOUBLE PRECISION
    )",
    "CREATE INDEX IF NOT EXISTS idx_s1_process_chemicals_process
     ON tbl_s1_process_chemicals (process_id)",
];

/// Creates the RMP tables and indexes if they don't already exist.
///
/// # Errors
///
/// * If any statement fails
pub async fn ensure_schema(db: &dyn Database) -> Result<(), DbError> {
    for statement in TABLES {
        db.exec_raw(statement).await?;
    }

    let flag_columns: String = ACCIDENT_FLAGS
        .iter()
        .map(|(column, _)| format!(",\n        {column} TEXT"))
        .collect();

    db.exec_raw(&format!(
        "CREATE TABLE IF NOT EXISTS tbl_s6_accident_history (
        accident_history_id  BIGINT PRIMARY KEY,
        facility_id          BIGINT NOT NULL,
        accident_date        TEXT,
        accident_time        TEXT,
        naics_code           TEXT{flag_columns}
    )"
    ))
    .await?;

    db.exec_raw(
        "CREATE INDEX IF NOT EXISTS idx_s6_accident_history_facility
         ON tbl_s6_accident_history (facility_id)",
    )
    .await?;

    log::debug!("RMP schema ensured");

    Ok(())
}
