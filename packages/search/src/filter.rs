//! Facility filter predicates.
//!
//! [`FacilityFilter`] is the typed form of the search query string. It is
//! evaluated in-process by the document store through
//! [`FacilityFilter::matches`] and rendered to SQL by the relational store;
//! both must agree on every rule below.
//!
//! Facility-level filters are conjunctive. Process-level filters
//! (`programLevel`, `naicsCodes`, `chemicals`) must all hold on one and the
//! same process.

use std::collections::BTreeSet;

use rmp_facility_models::{Facility, Process};
use strum_macros::EnumString;

/// How a free-text filter compares against its field. The needle is
/// stored trimmed and lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextMatch {
    /// Case-insensitive substring.
    Contains(String),
    /// Case-insensitive equality after trimming.
    Exact(String),
}

impl TextMatch {
    fn new(needle: &str, exact: bool) -> Self {
        let needle = needle.trim().to_lowercase();
        if exact {
            Self::Exact(needle)
        } else {
            Self::Contains(needle)
        }
    }

    /// The lowercased needle.
    #[must_use]
    pub fn needle(&self) -> &str {
        match self {
            Self::Contains(s) | Self::Exact(s) => s,
        }
    }

    /// Tests a field value. A missing field never matches.
    #[must_use]
    pub fn matches(&self, field: Option<&str>) -> bool {
        let Some(field) = field else {
            return false;
        };
        let field = field.to_lowercase();
        match self {
            Self::Contains(needle) => field.contains(needle.as_str()),
            Self::Exact(needle) => field.trim() == needle,
        }
    }
}

/// Filters that must co-occur on a single process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessFilter {
    /// Exact program level.
    pub program_level: Option<i64>,
    /// Any of these NAICS codes.
    pub naics_codes: BTreeSet<String>,
    /// Any of these chemical IDs.
    pub chemicals: BTreeSet<i64>,
}

impl ProcessFilter {
    /// Whether no process-level constraint was supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.program_level.is_none() && self.naics_codes.is_empty() && self.chemicals.is_empty()
    }

    /// Whether `process` satisfies every supplied constraint.
    #[must_use]
    pub fn matches(&self, process: &Process) -> bool {
        self.program_level
            .is_none_or(|level| process.program_level == level)
            && (self.naics_codes.is_empty() || process.has_naics_in(&self.naics_codes))
            && (self.chemicals.is_empty() || process.has_chemical_in(&self.chemicals))
    }
}

/// The full set of recognized search filters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacilityFilter {
    /// Facility name.
    pub facility_name: Option<TextMatch>,
    /// Exact EPA facility ID.
    pub facility_id: Option<String>,
    /// Parent company name.
    pub parent_company: Option<TextMatch>,
    /// Exact facility DUNS.
    pub facility_duns: Option<String>,
    /// Street address.
    pub address: Option<TextMatch>,
    /// City, lowercased, matched exactly.
    pub city: Option<String>,
    /// State abbreviation, uppercased.
    pub state: Option<String>,
    /// County FIPS code.
    pub county: Option<String>,
    /// ZIP code.
    pub zip: Option<String>,
    /// Keep only facilities whose latest submission is active.
    pub active_only: bool,
    /// Process-level constraints.
    pub process: ProcessFilter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
enum FilterKey {
    #[strum(serialize = "facilityName")]
    FacilityName,
    #[strum(serialize = "exactFacilityName", serialize = "exactName")]
    ExactFacilityName,
    #[strum(serialize = "facilityId")]
    FacilityId,
    #[strum(serialize = "parentCompany")]
    ParentCompany,
    #[strum(serialize = "exactParent", serialize = "exactParentCompany")]
    ExactParent,
    #[strum(serialize = "facilityDUNS")]
    FacilityDuns,
    #[strum(serialize = "address")]
    Address,
    #[strum(serialize = "exactAddress")]
    ExactAddress,
    #[strum(serialize = "city")]
    City,
    #[strum(serialize = "state")]
    State,
    #[strum(serialize = "county")]
    County,
    #[strum(serialize = "zip")]
    Zip,
    #[strum(serialize = "activeOnly")]
    ActiveOnly,
    #[strum(serialize = "programLevel")]
    ProgramLevel,
    #[strum(serialize = "naicsCodes")]
    NaicsCodes,
    #[strum(serialize = "chemicals")]
    Chemicals,
}

fn is_true(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Default)]
struct RawFilter {
    facility_name: Option<String>,
    exact_name: bool,
    parent_company: Option<String>,
    exact_parent: bool,
    address: Option<String>,
    exact_address: bool,
}

impl FacilityFilter {
    /// Builds a filter from decoded query-string pairs.
    ///
    /// Unknown keys are ignored. Scalar filters take their first non-empty
    /// value; set filters accumulate repeated keys and comma-separated
    /// values. Values that fail to parse as numbers are dropped.
    #[must_use]
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut filter = Self::default();
        let mut raw = RawFilter::default();

        for (key, value) in pairs {
            let Ok(key) = key.parse::<FilterKey>() else {
                continue;
            };

            match key {
                FilterKey::FacilityName => {
                    raw.facility_name = raw.facility_name.or_else(|| non_empty(value));
                }
                FilterKey::ExactFacilityName => raw.exact_name |= is_true(value),
                FilterKey::FacilityId => {
                    filter.facility_id = filter.facility_id.or_else(|| non_empty(value));
                }
                FilterKey::ParentCompany => {
                    raw.parent_company = raw.parent_company.or_else(|| non_empty(value));
                }
                FilterKey::ExactParent => raw.exact_parent |= is_true(value),
                FilterKey::FacilityDuns => {
                    filter.facility_duns = filter.facility_duns.or_else(|| non_empty(value));
                }
                FilterKey::Address => raw.address = raw.address.or_else(|| non_empty(value)),
                FilterKey::ExactAddress => raw.exact_address |= is_true(value),
                FilterKey::City => {
                    filter.city = filter
                        .city
                        .or_else(|| non_empty(value).map(|v| v.to_lowercase()));
                }
                FilterKey::State => {
                    filter.state = filter
                        .state
                        .or_else(|| non_empty(value).map(|v| v.to_uppercase()));
                }
                FilterKey::County => filter.county = filter.county.or_else(|| non_empty(value)),
                FilterKey::Zip => filter.zip = filter.zip.or_else(|| non_empty(value)),
                FilterKey::ActiveOnly => filter.active_only |= is_true(value),
                FilterKey::ProgramLevel => {
                    if filter.process.program_level.is_none() {
                        filter.process.program_level = value.trim().parse().ok();
                    }
                }
                FilterKey::NaicsCodes => {
                    filter
                        .process
                        .naics_codes
                        .extend(split_list(value).map(ToString::to_string));
                }
                FilterKey::Chemicals => {
                    filter
                        .process
                        .chemicals
                        .extend(split_list(value).filter_map(|v| v.parse::<i64>().ok()));
                }
            }
        }

        filter.facility_name = raw
            .facility_name
            .map(|v| TextMatch::new(&v, raw.exact_name));
        filter.parent_company = raw
            .parent_company
            .map(|v| TextMatch::new(&v, raw.exact_parent));
        filter.address = raw.address.map(|v| TextMatch::new(&v, raw.exact_address));

        filter
    }

    /// Whether the filter constrains nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Evaluates the filter against a normalized facility.
    #[must_use]
    pub fn matches(&self, f: &Facility) -> bool {
        fn eq_trimmed(expected: Option<&String>, actual: Option<&str>) -> bool {
            expected.is_none_or(|e| actual.is_some_and(|a| a.trim() == e))
        }

        if let Some(m) = &self.facility_name
            && !m.matches(Some(&f.name))
        {
            return false;
        }
        if let Some(m) = &self.parent_company
            && !m.matches(f.parent_company.as_deref())
        {
            return false;
        }
        if let Some(m) = &self.address
            && !m.matches(f.address.as_deref())
        {
            return false;
        }
        if let Some(city) = &self.city
            && f.city.trim().to_lowercase() != *city
        {
            return false;
        }
        if let Some(state) = &self.state
            && f.state.abbr.trim().to_uppercase() != *state
        {
            return false;
        }
        if !eq_trimmed(self.facility_id.as_ref(), Some(&f.epa_facility_id))
            || !eq_trimmed(self.facility_duns.as_ref(), f.facility_duns.as_deref())
            || !eq_trimmed(self.county.as_ref(), f.county_fips.as_deref())
            || !eq_trimmed(self.zip.as_ref(), f.zip.as_deref())
        {
            return false;
        }
        if self.active_only && !f.is_active() {
            return false;
        }

        self.process.is_empty() || f.processes().any(|p| self.process.matches(p))
    }
}
