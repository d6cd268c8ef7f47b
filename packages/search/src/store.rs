//! The storage seam shared by the relational and document backends.

use async_trait::async_trait;
use rmp_facility_models::Facility;
use rmp_facility_models::summary::{
    AccidentMarker, FacilityMarker, FacilitySummary, StateSummary, SubmissionDetail,
};
use thiserror::Error;

use crate::filter::FacilityFilter;
use crate::geo::CoordinatePolicy;
use crate::pager::{Page, PageRequest};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Document store error: {0}")]
    Document(String),
}

/// Read access to RMP facility data.
///
/// Both implementations must return identical results for identical data:
/// facilities ordered by `EPAFacilityID` ascending, child collections in
/// canonical order, and aggregates computed over every submission.
#[async_trait]
pub trait FacilityStore: Send + Sync {
    /// Short backend identifier reported by the health endpoint.
    fn backend(&self) -> &'static str;

    /// Which plotted coordinates this backend accepts.
    fn coordinate_policy(&self) -> CoordinatePolicy;

    /// Filtered, paginated facility summaries.
    ///
    /// # Errors
    ///
    /// * If the backend cannot be read
    async fn search(
        &self,
        filter: &FacilityFilter,
        page: &PageRequest,
    ) -> Result<Page<FacilitySummary>, StoreError>;

    /// Full record for one facility, `None` if unknown.
    ///
    /// # Errors
    ///
    /// * If the backend cannot be read
    async fn facility(&self, epa_facility_id: &str) -> Result<Option<Facility>, StoreError>;

    /// One submission with its owning facility's identity, `None` if
    /// unknown.
    ///
    /// # Errors
    ///
    /// * If the backend cannot be read
    async fn submission(&self, submission_id: i64)
    -> Result<Option<SubmissionDetail>, StoreError>;

    /// Every facility as a map marker, coordinates unfiltered.
    ///
    /// # Errors
    ///
    /// * If the backend cannot be read
    async fn facility_markers(&self) -> Result<Vec<FacilityMarker>, StoreError>;

    /// Every accident as a map marker, coordinates unfiltered.
    ///
    /// # Errors
    ///
    /// * If the backend cannot be read
    async fn accident_markers(&self) -> Result<Vec<AccidentMarker>, StoreError>;

    /// Per-state and per-county facility counts, ordered by abbreviation.
    ///
    /// # Errors
    ///
    /// * If the backend cannot be read
    async fn states(&self) -> Result<Vec<StateSummary>, StoreError>;
}
