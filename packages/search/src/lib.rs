#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Query semantics shared by every RMP facility backend.
//!
//! Both the relational and document stores parse requests with
//! [`FacilityFilter`] and [`PageRequest`], and both hand their markers to
//! the [`geo`] projections, so the two backends cannot drift apart on what
//! a query means.

pub mod assemble;
pub mod cache;
pub mod filter;
pub mod geo;
pub mod pager;
pub mod sql;
pub mod store;

pub use cache::TtlCache;
pub use filter::{FacilityFilter, ProcessFilter, TextMatch};
pub use geo::{AccidentWindow, BoundingBox, CoordinatePolicy, GeoQuery};
pub use pager::{Page, PageRequest, PerPage};
pub use sql::{SqlClause, SqlParam};
pub use store::{FacilityStore, StoreError};

use rmp_facility_models::Facility;
use rmp_facility_models::summary::FacilitySummary;

/// Applies `filter` to already-normalized facilities and windows the
/// survivors. Input must be ordered by `EPAFacilityID`.
#[must_use]
pub fn search_in_memory<'a, I>(
    facilities: I,
    filter: &FacilityFilter,
    page: &PageRequest,
) -> Page<FacilitySummary>
where
    I: IntoIterator<Item = &'a Facility>,
{
    let matched: Vec<_> = facilities
        .into_iter()
        .filter(|f| filter.matches(f))
        .collect();
    log::debug!("search_in_memory: {} facilities matched", matched.len());
    page.paginate(matched).map(FacilitySummary::from_facility)
}
