//! Reading RMP rows into domain records.

use std::collections::BTreeMap;

use moosicbox_json_utils::database::ToValue as _;
use rmp_facility_models::{
    Accident, Chemical, CoordinateValue, Facility, Process, StateRef, Submission,
};
use rmp_search::SqlParam;
use rmp_search::assemble::JoinRow;
use switchy_database::{DatabaseValue, Row};

use crate::DbError;

/// Accident cause and consequence columns, with the flag name each one is
/// reported under.
pub const ACCIDENT_FLAGS: &[(&str, &str)] = &[
    ("rt_gas", "gasRelease"),
    ("rt_spill", "spill"),
    ("rt_fire", "fire"),
    ("rt_explosion", "explosion"),
    ("rt_uncontrolled_rxn", "uncontrolledReaction"),
    ("cf_equipment_failure", "equipmentFailure"),
    ("cf_human_error", "humanError"),
    ("cf_improper_procedure", "improperProcedure"),
    ("cf_overpressurization", "overpressurization"),
    ("cf_upset_condition", "upsetCondition"),
    ("cf_bypass_condition", "bypassCondition"),
    ("cf_maintenance", "maintenance"),
    ("cf_process_design", "processDesign"),
    ("cf_unsuitable_equipment", "unsuitableEquipment"),
    ("cf_unusual_weather", "unusualWeather"),
    ("cf_management_error", "managementError"),
];

/// Spellings of a set flag in the RMP text columns. SQL comparisons use
/// the same list.
pub const YES_VALUES: &[&str] = &["YES", "Y", "TRUE", "1"];

/// Whether an RMP text flag is set.
#[must_use]
pub fn is_yes(value: &str) -> bool {
    let value = value.trim().to_uppercase();
    YES_VALUES.contains(&value.as_str())
}

/// Converts a rendered filter parameter for binding.
#[must_use]
pub fn to_database_value(param: SqlParam) -> DatabaseValue {
    match param {
        SqlParam::Text(s) => DatabaseValue::String(s),
        SqlParam::Int(n) => DatabaseValue::Int64(n),
    }
}

/// Reads a nullable text column.
#[must_use]
pub fn text(row: &Row, col: &str) -> Option<String> {
    row.to_value::<Option<String>>(col).unwrap_or(None)
}

/// Reads a nullable integer column.
#[must_use]
pub fn int(row: &Row, col: &str) -> Option<i64> {
    row.to_value::<Option<i64>>(col).unwrap_or(None)
}

/// Reads a nullable text flag as `Some(true)` / `Some(false)`.
#[must_use]
pub fn flag(row: &Row, col: &str) -> Option<bool> {
    text(row, col).map(|v| is_yes(&v))
}

/// Reads a required column, naming it on failure.
///
/// # Errors
///
/// * If `value` is `None`
pub fn required<T>(value: Option<T>, col: &str) -> Result<T, DbError> {
    value.ok_or_else(|| DbError::Conversion {
        message: format!("Missing required column {col}"),
    })
}

/// Facility attributes from a `tbl_s1_facilities` row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacilityAttrs {
    pub epa_facility_id: String,
    pub name: String,
    pub address: Option<String>,
    pub city: String,
    pub state: String,
    pub county_fips: Option<String>,
    pub zip: Option<String>,
    pub parent_company: Option<String>,
    pub facility_duns: Option<String>,
    pub operator_name: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub valid_lat_long: Option<bool>,
}

impl FacilityAttrs {
    /// Reads the facility columns of `row`.
    ///
    /// # Errors
    ///
    /// * If `epa_facility_id` is null
    pub fn read(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            epa_facility_id: required(text(row, "epa_facility_id"), "epa_facility_id")?,
            name: text(row, "facility_name").unwrap_or_default(),
            address: text(row, "facility_str_1"),
            city: text(row, "facility_city").unwrap_or_default(),
            state: text(row, "facility_state").unwrap_or_default(),
            county_fips: text(row, "facility_county_fips"),
            zip: text(row, "facility_zip_code"),
            parent_company: text(row, "parent_company_name"),
            facility_duns: text(row, "facility_duns"),
            operator_name: text(row, "operator_name"),
            latitude: text(row, "facility_lat_dec_degs"),
            longitude: text(row, "facility_long_dec_degs"),
            valid_lat_long: flag(row, "valid_lat_long_flag"),
        })
    }
}

/// One row of the facility × submission × process × NAICS × chemical ×
/// accident join.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRow {
    pub facility: FacilityAttrs,
    pub submission_id: i64,
    pub inspection_date: Option<String>,
    pub deregistration_date: Option<String>,
    pub process_id: Option<i64>,
    pub program_level: Option<i64>,
    pub toxic_release: bool,
    pub naics_code: Option<String>,
    pub chemical: Option<Chemical>,
    pub accident: Option<Accident>,
}

impl FlatRow {
    /// Reads one joined row.
    ///
    /// # Errors
    ///
    /// * If the facility or submission key is null
    pub fn read(row: &Row) -> Result<Self, DbError> {
        let chemical = int(row, "chemical_id").map(|id| Chemical {
            id,
            name: text(row, "chemical_name"),
            quantity: row.to_value::<Option<f64>>("quantity").unwrap_or(None),
        });

        let accident = int(row, "accident_history_id").map(|id| Accident {
            id,
            date: text(row, "accident_date"),
            time: text(row, "accident_time"),
            naics_code: text(row, "accident_naics_code"),
            flags: ACCIDENT_FLAGS
                .iter()
                .filter_map(|(column, name)| flag(row, column).map(|v| ((*name).to_string(), v)))
                .collect::<BTreeMap<_, _>>(),
        });

        Ok(Self {
            facility: FacilityAttrs::read(row)?,
            submission_id: required(int(row, "submission_id"), "submission_id")?,
            inspection_date: text(row, "safety_inspection_date"),
            deregistration_date: text(row, "deregistration_date"),
            process_id: int(row, "process_id"),
            program_level: int(row, "program_level"),
            toxic_release: text(row, "mh_toxic_release").is_some_and(|v| is_yes(&v)),
            naics_code: text(row, "naics_code"),
            chemical,
            accident,
        })
    }

    /// The row in the shape the result assembler consumes.
    #[must_use]
    pub fn to_join_row(&self) -> JoinRow {
        let f = &self.facility;
        JoinRow {
            epa_facility_id: f.epa_facility_id.clone(),
            name: f.name.clone(),
            address: f.address.clone(),
            city: f.city.clone(),
            state: f.state.clone(),
            county_fips: f.county_fips.clone(),
            zip: f.zip.clone(),
            parent_company: f.parent_company.clone(),
            facility_duns: f.facility_duns.clone(),
            operator_name: f.operator_name.clone(),
            latitude: f.latitude.clone().map(CoordinateValue::Text),
            longitude: f.longitude.clone().map(CoordinateValue::Text),
            submission_id: self.submission_id,
            inspection_date: self.inspection_date.clone(),
            deregistration_date: self.deregistration_date.clone(),
            program_level: self.program_level,
            toxic_release: self.toxic_release,
            naics_code: self.naics_code.clone(),
            chemical: self.chemical.clone(),
            accident: self.accident.clone(),
        }
    }
}

/// Rebuilds one nested, normalized facility from its joined rows. The
/// first row supplies the facility attributes.
#[must_use]
pub fn nest_facility(rows: &[FlatRow]) -> Option<Facility> {
    let first = rows.first()?;
    let attrs = &first.facility;

    let mut submissions: BTreeMap<i64, Submission> = BTreeMap::new();
    let mut processes: BTreeMap<(i64, i64), Process> = BTreeMap::new();

    for row in rows {
        let submission = submissions
            .entry(row.submission_id)
            .or_insert_with(|| Submission {
                id: row.submission_id,
                inspection_date: row.inspection_date.clone(),
                deregistration_date: row.deregistration_date.clone(),
                processes: Vec::new(),
                accidents: Vec::new(),
            });

        if let Some(accident) = &row.accident
            && !submission.accidents.iter().any(|a| a.id == accident.id)
        {
            submission.accidents.push(accident.clone());
        }

        let Some(process_id) = row.process_id else {
            continue;
        };
        let process = processes
            .entry((row.submission_id, process_id))
            .or_insert_with(|| Process {
                id: process_id,
                program_level: row.program_level.unwrap_or_default(),
                naics_codes: Vec::new(),
                chemicals: Vec::new(),
                toxic_release: row.toxic_release,
            });

        if let Some(code) = &row.naics_code
            && !process.naics_codes.contains(code)
        {
            process.naics_codes.push(code.clone());
        }
        if let Some(chemical) = &row.chemical
            && !process.chemicals.iter().any(|c| c.id == chemical.id)
        {
            process.chemicals.push(chemical.clone());
        }
    }

    for ((submission_id, _), process) in processes {
        if let Some(submission) = submissions.get_mut(&submission_id) {
            submission.processes.push(process);
        }
    }

    let mut facility = Facility {
        epa_facility_id: attrs.epa_facility_id.clone(),
        name: attrs.name.clone(),
        address: attrs.address.clone(),
        city: attrs.city.clone(),
        state: StateRef::from_abbr(&attrs.state),
        county_fips: attrs.county_fips.clone(),
        zip: attrs.zip.clone(),
        parent_company: attrs.parent_company.clone(),
        facility_duns: attrs.facility_duns.clone(),
        operator_name: attrs.operator_name.clone(),
        latitude: attrs.latitude.clone().map(CoordinateValue::Text),
        longitude: attrs.longitude.clone().map(CoordinateValue::Text),
        valid_lat_long: attrs.valid_lat_long,
        submissions: submissions.into_values().collect(),
    };
    facility.normalize();

    Some(facility)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(submission: i64, process: Option<i64>, chemical: Option<i64>, accident: Option<i64>) -> FlatRow {
        FlatRow {
            facility: FacilityAttrs {
                epa_facility_id: "100".to_string(),
                name: "Plant".to_string(),
                state: "wv".to_string(),
                latitude: Some(" 38.35 ".to_string()),
                longitude: Some("-81.63".to_string()),
                valid_lat_long: Some(true),
                ..FacilityAttrs::default()
            },
            submission_id: submission,
            inspection_date: Some(format!("20{submission:02}-01-01")),
            deregistration_date: None,
            process_id: process,
            program_level: process.map(|_| 2),
            toxic_release: false,
            naics_code: process.map(|_| "325199".to_string()),
            chemical: chemical.map(|id| Chemical {
                id,
                name: None,
                quantity: Some(1000.0),
            }),
            accident: accident.map(|id| Accident {
                id,
                date: Some("2012-02-02".to_string()),
                time: None,
                naics_code: None,
                flags: BTreeMap::new(),
            }),
        }
    }

    #[test]
    fn yes_spellings() {
        assert!(is_yes("Yes"));
        assert!(is_yes(" y "));
        assert!(is_yes("1"));
        assert!(!is_yes("No"));
        assert!(!is_yes(""));
    }

    #[test]
    fn nesting_dedups_cartesian_children() {
        let rows = vec![
            flat(20, Some(1), Some(56), Some(900)),
            flat(20, Some(1), Some(56), Some(901)),
            flat(20, Some(1), Some(77), Some(900)),
            flat(20, Some(1), Some(77), Some(901)),
            flat(10, None, None, None),
        ];
        let f = nest_facility(&rows).unwrap();
        assert_eq!(f.state.name, "West Virginia");
        assert_eq!(f.submissions.len(), 2);
        assert_eq!(f.submissions[0].id, 20);
        assert_eq!(f.submissions[0].processes.len(), 1);
        assert_eq!(f.submissions[0].processes[0].chemicals.len(), 2);
        assert_eq!(f.submissions[0].processes[0].naics_codes, vec!["325199"]);
        assert_eq!(f.submissions[0].accidents.len(), 2);
        assert!(f.submissions[1].processes.is_empty());
        assert_eq!(f.coordinates(), Some((38.35, -81.63)));
    }

    #[test]
    fn no_rows_no_facility() {
        assert!(nest_facility(&[]).is_none());
    }

    #[test]
    fn join_row_keeps_raw_coordinates() {
        let join = flat(20, None, None, None).to_join_row();
        assert_eq!(join.latitude, Some(CoordinateValue::Text(" 38.35 ".to_string())));
        assert_eq!(join.submission_id, 20);
    }
}
