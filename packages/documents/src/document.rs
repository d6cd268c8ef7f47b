//! The per-state document format.

use rmp_facility_models::summary::{CountySummary, StateSummary};
use rmp_facility_models::{Facility, StateRef, states};
use serde::{Deserialize, Serialize};

/// Facilities of one county within a state document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CountyGroup {
    /// County FIPS code.
    pub fips: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub facilities: Vec<Facility>,
}

/// One `<ABBR>.json` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    pub abbr: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub counties: Vec<CountyGroup>,
}

impl StateDocument {
    /// The state's display name, falling back to the name table.
    #[must_use]
    pub fn display_name(&self) -> String {
        let name = self.name.trim();
        if name.is_empty() {
            states::display_name(&self.abbr)
        } else {
            name.to_string()
        }
    }

    /// Per-county facility counts, counties ordered by FIPS code.
    #[must_use]
    pub fn summary(&self) -> StateSummary {
        let mut counties: Vec<CountySummary> = self
            .counties
            .iter()
            .map(|c| CountySummary {
                fips: c.fips.clone(),
                name: c.name.clone(),
                facility_count: c.facilities.len() as u64,
            })
            .collect();
        counties.sort_by(|a, b| a.fips.cmp(&b.fips));

        StateSummary {
            abbr: self.abbr.trim().to_uppercase(),
            name: self.display_name(),
            facility_count: counties.iter().map(|c| c.facility_count).sum(),
            counties,
        }
    }

    /// Consumes the document, returning its facilities with the enclosing
    /// state and county written into each one and child records put into
    /// canonical order.
    #[must_use]
    pub fn into_facilities(self) -> Vec<Facility> {
        let state = StateRef {
            abbr: self.abbr.trim().to_uppercase(),
            name: self.display_name(),
        };

        self.counties
            .into_iter()
            .flat_map(|county| {
                let state = state.clone();
                let fips = county.fips;
                county.facilities.into_iter().map(move |mut f| {
                    f.state = state.clone();
                    f.county_fips = Some(fips.clone());
                    f.normalize();
                    f
                })
            })
            .collect()
    }
}
