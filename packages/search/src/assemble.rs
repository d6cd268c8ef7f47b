//! Regrouping of denormalized join rows into [`FacilitySummary`] records.
//!
//! Outer-joining a facility against its processes, NAICS codes, chemicals,
//! and accidents repeats the parent columns once per child combination.
//! The assembler collapses that blow-up back into one summary per
//! facility.

use std::collections::{BTreeSet, HashMap};

use rmp_facility_models::summary::{FacilitySummary, LastSubmission};
use rmp_facility_models::{Accident, Chemical, CoordinateValue, StateRef};

/// One row of the facility × submission × process × NAICS × chemical ×
/// accident join. Child columns are `None` where an outer join found
/// nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinRow {
    /// Stable EPA facility identifier.
    pub epa_facility_id: String,
    /// Facility name from this row's submission.
    pub name: String,
    /// Street address.
    pub address: Option<String>,
    /// City.
    pub city: String,
    /// State abbreviation.
    pub state: String,
    /// County FIPS code.
    pub county_fips: Option<String>,
    /// ZIP code.
    pub zip: Option<String>,
    /// Parent company name.
    pub parent_company: Option<String>,
    /// Facility DUNS number.
    pub facility_duns: Option<String>,
    /// Operator name.
    pub operator_name: Option<String>,
    /// Raw latitude.
    pub latitude: Option<CoordinateValue>,
    /// Raw longitude.
    pub longitude: Option<CoordinateValue>,
    /// Submission this row belongs to.
    pub submission_id: i64,
    /// The submission's inspection date.
    pub inspection_date: Option<String>,
    /// The submission's deregistration date.
    pub deregistration_date: Option<String>,
    /// Program level of the joined process.
    pub program_level: Option<i64>,
    /// Toxic-release flag of the joined process.
    pub toxic_release: bool,
    /// Joined NAICS code.
    pub naics_code: Option<String>,
    /// Joined chemical.
    pub chemical: Option<Chemical>,
    /// Joined accident.
    pub accident: Option<Accident>,
}

struct Group {
    summary: FacilitySummary,
    latest_submission: i64,
    chemical_ids: BTreeSet<i64>,
    accident_ids: BTreeSet<i64>,
    latest_accident_ids: BTreeSet<i64>,
    accidents: Vec<Accident>,
}

impl Group {
    fn start(row: &JoinRow) -> Self {
        let latitude = row.latitude.as_ref().and_then(CoordinateValue::as_f64);
        let longitude = row.longitude.as_ref().and_then(CoordinateValue::as_f64);
        let (latitude, longitude) = latitude.zip(longitude).unzip();

        Self {
            summary: FacilitySummary {
                epa_facility_id: row.epa_facility_id.clone(),
                name: row.name.clone(),
                address: row.address.clone(),
                city: row.city.clone(),
                state: StateRef::from_abbr(&row.state),
                county_fips: row.county_fips.clone(),
                zip: row.zip.clone(),
                parent_company: row.parent_company.clone(),
                facility_duns: row.facility_duns.clone(),
                operator_name: row.operator_name.clone(),
                latitude,
                longitude,
                sub_last: Some(LastSubmission {
                    id: row.submission_id,
                    date_val: row.inspection_date.clone(),
                    date_dereg: row.deregistration_date.clone(),
                    num_accidents: 0,
                }),
                program_level: None,
                naics_code: None,
                chemicals: Vec::new(),
                toxic_release: false,
                accident_count: 0,
                accidents: None,
            },
            latest_submission: row.submission_id,
            chemical_ids: BTreeSet::new(),
            accident_ids: BTreeSet::new(),
            latest_accident_ids: BTreeSet::new(),
            accidents: Vec::new(),
        }
    }

    fn absorb(&mut self, row: &JoinRow) {
        let summary = &mut self.summary;

        if let Some(level) = row.program_level {
            summary.program_level = Some(summary.program_level.map_or(level, |l| l.max(level)));
        }
        summary.toxic_release |= row.toxic_release;

        if summary.naics_code.is_none()
            && let Some(code) = row.naics_code.as_deref().map(str::trim)
            && !code.is_empty()
        {
            summary.naics_code = Some(code.to_string());
        }

        if let Some(chemical) = &row.chemical
            && self.chemical_ids.insert(chemical.id)
        {
            summary.chemicals.push(chemical.clone());
        }

        if let Some(accident) = &row.accident {
            if self.accident_ids.insert(accident.id) {
                self.accidents.push(accident.clone());
            }
            if row.submission_id == self.latest_submission {
                self.latest_accident_ids.insert(accident.id);
            }
        }
    }

    fn finish(mut self) -> FacilitySummary {
        self.summary.accident_count = self.accidents.len() as u64;
        if let Some(sub_last) = &mut self.summary.sub_last {
            sub_last.num_accidents = self.latest_accident_ids.len() as u64;
        }
        self.summary.accidents = (!self.accidents.is_empty()).then_some(self.accidents);
        self.summary
    }
}

/// Groups join rows by facility and rebuilds one summary per facility, in
/// first-seen order.
///
/// Rows must arrive in canonical order within each facility: latest
/// submission first, then by process, NAICS code, chemical, and accident.
/// The first row of a facility supplies its attributes and latest
/// submission.
#[must_use]
pub fn assemble(rows: &[JoinRow]) -> Vec<FacilitySummary> {
    let mut order: Vec<Group> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for row in rows {
        let slot = *index
            .entry(row.epa_facility_id.as_str())
            .or_insert_with(|| {
                order.push(Group::start(row));
                order.len() - 1
            });
        order[slot].absorb(row);
    }

    order.into_iter().map(Group::finish).collect()
}
