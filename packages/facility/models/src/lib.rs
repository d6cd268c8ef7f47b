#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! RMP facility record types.
//!
//! A [`Facility`] is one regulated site keyed by its `EPAFacilityID`. It owns
//! the historical [`Submission`]s filed for it, each declaring chemical
//! [`Process`]es and carrying the [`Accident`] history reported with it.
//! Both storage backends normalize into these records, so every derived
//! aggregate (latest submission, accident count, max program level) is
//! computed here exactly once.

pub mod states;
pub mod summary;

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// The leading `YYYY-MM-DD` portion of an RMP date string, when it has
/// that shape (digits, month `01`-`12`, day `01`-`31`).
///
/// Source dates come both as plain dates and as `YYYY-MM-DD HH:MM:SS`
/// timestamps. Keys compare chronologically as plain strings, and the
/// relational store checks the same shape in SQL, so presence and ordering
/// of dates agree between backends.
#[must_use]
pub fn date_key(value: &str) -> Option<&str> {
    let key = value.trim_matches(' ').get(..10)?;
    let shaped = key.bytes().enumerate().all(|(i, c)| {
        if i == 4 || i == 7 {
            c == b'-'
        } else {
            c.is_ascii_digit()
        }
    });
    if !shaped {
        return None;
    }
    let month = &key[5..7];
    let day = &key[8..10];
    (("01"..="12").contains(&month) && ("01"..="31").contains(&day)).then_some(key)
}

/// Parses the leading `YYYY-MM-DD` portion of an RMP date string.
/// Anything else, including impossible calendar dates, is treated as
/// missing.
#[must_use]
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date_key(value)?, "%Y-%m-%d").ok()
}

/// A latitude or longitude as found in the source data.
///
/// The RMP tables store coordinates as padded text; the JSON documents
/// carry either numbers or strings. Parsing is deferred until a finite
/// value is actually needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CoordinateValue {
    /// Already numeric.
    Number(f64),
    /// Text, possibly padded or non-numeric.
    Text(String),
}

impl CoordinateValue {
    /// Returns the coordinate in decimal degrees if it is a finite number.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        value.is_finite().then_some(value)
    }
}

impl From<f64> for CoordinateValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for CoordinateValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CoordinateValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Which slice of history a map request covers.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum GeoRange {
    /// Only recent records.
    Latest,
    /// The full history.
    #[default]
    All,
}

/// A state as attached to a facility.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRef {
    /// Two-letter postal abbreviation.
    pub abbr: String,
    /// Display name.
    pub name: String,
}

impl StateRef {
    /// Builds a state reference from an abbreviation, resolving the display
    /// name.
    #[must_use]
    pub fn from_abbr(abbr: &str) -> Self {
        Self {
            abbr: abbr.trim().to_uppercase(),
            name: states::display_name(abbr),
        }
    }
}

/// A chemical held in a process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chemical {
    /// Chemical lookup ID.
    pub id: i64,
    /// Chemical name, when the lookup table has one.
    #[serde(default)]
    pub name: Option<String>,
    /// Quantity held in the process, in pounds.
    #[serde(default)]
    pub quantity: Option<f64>,
}

/// A historical accident reported in a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accident {
    /// Accident history ID.
    pub id: i64,
    /// Date of the accident.
    #[serde(default)]
    pub date: Option<String>,
    /// Time of day, as reported.
    #[serde(default)]
    pub time: Option<String>,
    /// NAICS code of the process involved.
    #[serde(default)]
    pub naics_code: Option<String>,
    /// Cause and consequence flags (`fire`, `explosion`,
    /// `equipmentFailure`, ...). Only flags present in the source appear.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub flags: BTreeMap<String, bool>,
}

/// A chemical-handling process declared in a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Process {
    /// Process ID.
    pub id: i64,
    /// Program level (1-3).
    pub program_level: i64,
    /// NAICS industry codes attached to the process.
    #[serde(default)]
    pub naics_codes: Vec<String>,
    /// Chemicals held in the process.
    #[serde(default)]
    pub chemicals: Vec<Chemical>,
    /// Whether the worst-case scenario is a toxic release.
    #[serde(default)]
    pub toxic_release: bool,
}

impl Process {
    /// Whether any of the process's chemicals has one of the given IDs.
    #[must_use]
    pub fn has_chemical_in(&self, ids: &BTreeSet<i64>) -> bool {
        self.chemicals.iter().any(|c| ids.contains(&c.id))
    }

    /// Whether any of the process's NAICS codes is in `codes`.
    #[must_use]
    pub fn has_naics_in(&self, codes: &BTreeSet<String>) -> bool {
        self.naics_codes.iter().any(|n| codes.contains(n.trim()))
    }
}

/// One regulatory filing for a facility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    /// Submission ID (the RMP `FacilityID`).
    pub id: i64,
    /// Safety inspection date.
    #[serde(default)]
    pub inspection_date: Option<String>,
    /// Deregistration date, when the facility left the program.
    #[serde(default)]
    pub deregistration_date: Option<String>,
    /// Declared processes.
    #[serde(default)]
    pub processes: Vec<Process>,
    /// Accident history reported with this submission.
    #[serde(default)]
    pub accidents: Vec<Accident>,
}

impl Submission {
    /// The inspection date's `YYYY-MM-DD` key, see [`date_key`].
    #[must_use]
    pub fn inspection_key(&self) -> Option<&str> {
        self.inspection_date.as_deref().and_then(date_key)
    }

    /// Whether a deregistration date is on record.
    #[must_use]
    pub fn is_deregistered(&self) -> bool {
        self.deregistration_date
            .as_deref()
            .is_some_and(|d| !d.trim_matches(' ').is_empty())
    }

    /// Number of accidents reported with this submission.
    #[must_use]
    pub fn accident_count(&self) -> u64 {
        self.accidents.len() as u64
    }

    /// Orders submissions latest first: most recent inspection date first,
    /// missing dates last, ties broken by the higher submission ID.
    #[must_use]
    pub fn cmp_latest_first(&self, other: &Self) -> Ordering {
        let by_date = match (self.inspection_key(), other.inspection_key()) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_date.then_with(|| other.id.cmp(&self.id))
    }
}

/// A regulated facility and its filing history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facility {
    /// Stable EPA facility identifier.
    #[serde(rename = "EPAFacilityID")]
    pub epa_facility_id: String,
    /// Facility name.
    pub name: String,
    /// Street address.
    #[serde(default)]
    pub address: Option<String>,
    /// City.
    #[serde(default)]
    pub city: String,
    /// State, injected from the enclosing partition for documents.
    #[serde(default)]
    pub state: StateRef,
    /// County FIPS code.
    #[serde(default)]
    pub county_fips: Option<String>,
    /// ZIP code.
    #[serde(default)]
    pub zip: Option<String>,
    /// Parent company name.
    #[serde(default)]
    pub parent_company: Option<String>,
    /// Facility DUNS number.
    #[serde(default, rename = "facilityDUNS")]
    pub facility_duns: Option<String>,
    /// Operator name.
    #[serde(default)]
    pub operator_name: Option<String>,
    /// Latitude in decimal degrees.
    #[serde(default)]
    pub latitude: Option<CoordinateValue>,
    /// Longitude in decimal degrees.
    #[serde(default)]
    pub longitude: Option<CoordinateValue>,
    /// The source's own "coordinates are valid" flag.
    #[serde(default)]
    pub valid_lat_long: Option<bool>,
    /// Filings, latest first once normalized.
    #[serde(default)]
    pub submissions: Vec<Submission>,
}

impl Facility {
    /// Puts the record into canonical order: submissions latest first,
    /// processes, chemicals, and accidents by ID, NAICS codes sorted.
    ///
    /// First-seen aggregates ([`Self::first_naics`], [`Self::chemicals`])
    /// depend on this order, and the relational store reproduces it with
    /// `ORDER BY`.
    pub fn normalize(&mut self) {
        self.submissions.sort_by(Submission::cmp_latest_first);
        for submission in &mut self.submissions {
            submission.processes.sort_by_key(|p| p.id);
            submission.accidents.sort_by_key(|a| a.id);
            for process in &mut submission.processes {
                process.chemicals.sort_by_key(|c| c.id);
                process.naics_codes.sort();
            }
        }
    }

    /// The latest submission, assuming [`Self::normalize`] has run.
    #[must_use]
    pub fn latest_submission(&self) -> Option<&Submission> {
        self.submissions.first()
    }

    /// Whether the latest submission has an inspection date and no
    /// deregistration date.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.latest_submission()
            .is_some_and(|s| s.inspection_key().is_some() && !s.is_deregistered())
    }

    /// Iterates every process across every submission, latest submission
    /// first.
    pub fn processes(&self) -> impl Iterator<Item = &Process> {
        self.submissions.iter().flat_map(|s| s.processes.iter())
    }

    /// Accidents across all submissions, deduplicated by ID.
    #[must_use]
    pub fn accidents(&self) -> Vec<&Accident> {
        let mut seen = BTreeSet::new();
        self.submissions
            .iter()
            .flat_map(|s| s.accidents.iter())
            .filter(|a| seen.insert(a.id))
            .collect()
    }

    /// Total accident count across submissions.
    #[must_use]
    pub fn accident_count(&self) -> u64 {
        self.accidents().len() as u64
    }

    /// Highest program level among all processes.
    #[must_use]
    pub fn max_program_level(&self) -> Option<i64> {
        self.processes().map(|p| p.program_level).max()
    }

    /// First NAICS code seen in canonical order.
    #[must_use]
    pub fn first_naics(&self) -> Option<&str> {
        self.processes()
            .flat_map(|p| p.naics_codes.iter())
            .map(|n| n.trim())
            .find(|n| !n.is_empty())
    }

    /// Distinct chemicals across all processes, first occurrence wins.
    #[must_use]
    pub fn chemicals(&self) -> Vec<Chemical> {
        let mut seen = BTreeSet::new();
        self.processes()
            .flat_map(|p| p.chemicals.iter())
            .filter(|c| seen.insert(c.id))
            .cloned()
            .collect()
    }

    /// Whether any process has a toxic worst-case release.
    #[must_use]
    pub fn toxic_release(&self) -> bool {
        self.processes().any(|p| p.toxic_release)
    }

    /// Latitude and longitude, when both parse to finite numbers.
    #[must_use]
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        let lat = self.latitude.as_ref()?.as_f64()?;
        let lon = self.longitude.as_ref()?.as_f64()?;
        Some((lat, lon))
    }
}

/// Record builders for tests in this and downstream crates.
#[cfg(any(test, feature = "test-utils"))]
pub mod fixtures {
    use super::*;

    #[must_use]
    pub fn process(id: i64, level: i64, naics: &[&str], chemicals: &[i64]) -> Process {
        Process {
            id,
            program_level: level,
            naics_codes: naics.iter().map(ToString::to_string).collect(),
            chemicals: chemicals
                .iter()
                .map(|&id| Chemical {
                    id,
                    name: None,
                    quantity: None,
                })
                .collect(),
            toxic_release: false,
        }
    }

    #[must_use]
    pub fn accident(id: i64, date: &str) -> Accident {
        Accident {
            id,
            date: Some(date.to_string()),
            time: None,
            naics_code: None,
            flags: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn submission(id: i64, inspection: Option<&str>, dereg: Option<&str>) -> Submission {
        Submission {
            id,
            inspection_date: inspection.map(ToString::to_string),
            deregistration_date: dereg.map(ToString::to_string),
            processes: Vec::new(),
            accidents: Vec::new(),
        }
    }

    #[must_use]
    pub fn facility(id: &str, submissions: Vec<Submission>) -> Facility {
        let mut facility = Facility {
            epa_facility_id: id.to_string(),
            name: format!("Facility {id}"),
            address: None,
            city: "Columbus".to_string(),
            state: StateRef::from_abbr("OH"),
            county_fips: None,
            zip: None,
            parent_company: None,
            facility_duns: None,
            operator_name: None,
            latitude: Some(CoordinateValue::Number(39.96)),
            longitude: Some(CoordinateValue::Number(-83.0)),
            valid_lat_long: Some(true),
            submissions,
        };
        facility.normalize();
        facility
    }

    #[must_use]
    pub fn facility_named(id: &str, name: &str) -> Facility {
        let mut facility = facility(id, vec![submission(1, Some("2020-01-01"), None)]);
        facility.name = name.to_string();
        facility
    }
}
