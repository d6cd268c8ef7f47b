//! Public response shapes derived from [`Facility`] records.
//!
//! Both storage backends must produce byte-identical JSON for these types,
//! so the document store builds them with the constructors here and the
//! relational store builds them from grouped join rows with the same field
//! semantics.

use serde::{Deserialize, Serialize};

use crate::{Accident, Chemical, CoordinateValue, Facility, StateRef, Submission};

/// The latest filing of a facility, as shown in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastSubmission {
    /// Submission ID.
    pub id: i64,
    /// Inspection date of the latest submission.
    pub date_val: Option<String>,
    /// Deregistration date of the latest submission.
    pub date_dereg: Option<String>,
    /// Accidents reported with the latest submission.
    pub num_accidents: u64,
}

impl From<&Submission> for LastSubmission {
    fn from(s: &Submission) -> Self {
        Self {
            id: s.id,
            date_val: s.inspection_date.clone(),
            date_dereg: s.deregistration_date.clone(),
            num_accidents: s.accident_count(),
        }
    }
}

/// A facility as listed by the search endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilitySummary {
    /// Stable EPA facility identifier.
    #[serde(rename = "EPAFacilityID")]
    pub epa_facility_id: String,
    /// Facility name.
    pub name: String,
    /// Street address.
    pub address: Option<String>,
    /// City.
    pub city: String,
    /// State.
    pub state: StateRef,
    /// County FIPS code.
    pub county_fips: Option<String>,
    /// ZIP code.
    pub zip: Option<String>,
    /// Parent company name.
    pub parent_company: Option<String>,
    /// Facility DUNS number.
    #[serde(rename = "facilityDUNS")]
    pub facility_duns: Option<String>,
    /// Operator name.
    pub operator_name: Option<String>,
    /// Latitude, when finite.
    pub latitude: Option<f64>,
    /// Longitude, when finite.
    pub longitude: Option<f64>,
    /// Latest submission.
    pub sub_last: Option<LastSubmission>,
    /// Highest program level across all processes.
    pub program_level: Option<i64>,
    /// First NAICS code seen.
    pub naics_code: Option<String>,
    /// Distinct chemicals across all processes.
    pub chemicals: Vec<Chemical>,
    /// Whether any process has a toxic worst-case release.
    pub toxic_release: bool,
    /// Total accidents on record.
    pub accident_count: u64,
    /// Accidents on record; absent (not empty) when there are none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accidents: Option<Vec<Accident>>,
}

impl FacilitySummary {
    /// Summarizes a normalized facility record.
    #[must_use]
    pub fn from_facility(f: &Facility) -> Self {
        let accidents: Vec<Accident> = f.accidents().into_iter().cloned().collect();
        let (latitude, longitude) = f.coordinates().unzip();

        Self {
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
            latitude,
            longitude,
            sub_last: f.latest_submission().map(LastSubmission::from),
            program_level: f.max_program_level(),
            naics_code: f.first_naics().map(ToString::to_string),
            chemicals: f.chemicals(),
            toxic_release: f.toxic_release(),
            accident_count: accidents.len() as u64,
            accidents: (!accidents.is_empty()).then_some(accidents),
        }
    }
}

/// The minimal facility fields needed to draw and tooltip a map point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacilityMarker {
    /// Stable EPA facility identifier.
    pub epa_facility_id: String,
    /// Facility name.
    pub name: String,
    /// City.
    pub city: String,
    /// State abbreviation.
    pub state: String,
    /// Inspection date of the latest submission.
    pub last_date: Option<String>,
    /// Total accidents on record.
    pub accident_count: u64,
    /// Highest program level.
    pub program_level: Option<i64>,
    /// Whether any process has a toxic worst-case release.
    pub toxic_release: bool,
    /// Whether the latest submission is active.
    pub active: bool,
    /// Raw latitude.
    pub latitude: Option<CoordinateValue>,
    /// Raw longitude.
    pub longitude: Option<CoordinateValue>,
    /// The source's coordinate validity flag.
    pub valid_lat_long: Option<bool>,
}

impl From<&Facility> for FacilityMarker {
    fn from(f: &Facility) -> Self {
        Self {
            epa_facility_id: f.epa_facility_id.clone(),
            name: f.name.clone(),
            city: f.city.clone(),
            state: f.state.abbr.clone(),
            last_date: f
                .latest_submission()
                .and_then(|s| s.inspection_date.clone()),
            accident_count: f.accident_count(),
            program_level: f.max_program_level(),
            toxic_release: f.toxic_release(),
            active: f.is_active(),
            latitude: f.latitude.clone(),
            longitude: f.longitude.clone(),
            valid_lat_long: f.valid_lat_long,
        }
    }
}

/// One accident positioned at its facility's coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccidentMarker {
    /// Accident history ID.
    pub id: i64,
    /// Owning facility.
    pub epa_facility_id: String,
    /// Owning facility's name.
    pub facility_name: String,
    /// Submission the accident was reported in.
    pub submission_id: i64,
    /// Accident date.
    pub date: Option<String>,
    /// Accident time.
    pub time: Option<String>,
    /// NAICS code of the process involved.
    pub naics_code: Option<String>,
    /// Raw facility latitude.
    pub latitude: Option<CoordinateValue>,
    /// Raw facility longitude.
    pub longitude: Option<CoordinateValue>,
    /// The facility's coordinate validity flag.
    pub valid_lat_long: Option<bool>,
}

impl AccidentMarker {
    /// Builds one marker per distinct accident of the facility.
    #[must_use]
    pub fn for_facility(f: &Facility) -> Vec<Self> {
        let mut seen = std::collections::BTreeSet::new();
        f.submissions
            .iter()
            .flat_map(|s| s.accidents.iter().map(move |a| (s.id, a)))
            .filter(|(_, a)| seen.insert(a.id))
            .map(|(submission_id, a)| Self {
                id: a.id,
                epa_facility_id: f.epa_facility_id.clone(),
                facility_name: f.name.clone(),
                submission_id,
                date: a.date.clone(),
                time: a.time.clone(),
                naics_code: a.naics_code.clone(),
                latitude: f.latitude.clone(),
                longitude: f.longitude.clone(),
                valid_lat_long: f.valid_lat_long,
            })
            .collect()
    }
}

/// Facility count for one county within a state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountySummary {
    /// County FIPS code.
    pub fips: String,
    /// County name, when the source provides one.
    pub name: Option<String>,
    /// Number of facilities in the county.
    pub facility_count: u64,
}

/// Facility counts for one state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSummary {
    /// Two-letter abbreviation.
    pub abbr: String,
    /// Display name.
    pub name: String,
    /// Number of facilities in the state.
    pub facility_count: u64,
    /// Per-county breakdown, ordered by FIPS code.
    pub counties: Vec<CountySummary>,
}

/// A single submission with enough facility context to display it alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionDetail {
    /// Owning facility.
    #[serde(rename = "EPAFacilityID")]
    pub epa_facility_id: String,
    /// Owning facility's name.
    pub facility_name: String,
    /// Owning facility's state.
    pub state: StateRef,
    /// Accidents reported with this submission.
    pub num_accidents: u64,
    /// The submission itself.
    #[serde(flatten)]
    pub submission: Submission,
}

impl SubmissionDetail {
    /// Pairs a submission with its facility.
    #[must_use]
    pub fn new(f: &Facility, submission: &Submission) -> Self {
        Self {
            epa_facility_id: f.epa_facility_id.clone(),
            facility_name: f.name.clone(),
            state: f.state.clone(),
            num_accidents: submission.accident_count(),
            submission: submission.clone(),
        }
    }
}
