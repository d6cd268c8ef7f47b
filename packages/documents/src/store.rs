//! In-memory [`FacilityStore`] over per-state documents.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use rmp_facility_models::Facility;
use rmp_facility_models::summary::{
    AccidentMarker, FacilityMarker, FacilitySummary, StateSummary, SubmissionDetail,
};
use rmp_search::{
    CoordinatePolicy, FacilityFilter, FacilityStore, Page, PageRequest, StoreError,
    search_in_memory,
};
use tokio::sync::OnceCell;

use crate::DocumentError;
use crate::document::StateDocument;
use crate::loader;

/// Where the state documents come from.
#[derive(Debug, Clone)]
pub enum DocumentSource {
    /// A data directory containing `by-state/<ABBR>.json`.
    Directory(PathBuf),
    /// A base URL serving `<ABBR>.json`.
    Remote {
        client: reqwest::Client,
        base_url: String,
    },
}

/// Everything the store answers from, built once.
#[derive(Debug, Default)]
struct DocumentIndex {
    facilities: Vec<Facility>,
    by_id: BTreeMap<String, usize>,
    submissions: BTreeMap<i64, (usize, usize)>,
    states: Vec<StateSummary>,
}

impl DocumentIndex {
    fn build(documents: Vec<StateDocument>) -> Self {
        let mut states: Vec<StateSummary> = documents.iter().map(StateDocument::summary).collect();
        states.sort_by(|a, b| a.abbr.cmp(&b.abbr));

        let mut by_key: BTreeMap<String, Facility> = BTreeMap::new();
        for facility in documents.into_iter().flat_map(StateDocument::into_facilities) {
            if by_key.contains_key(&facility.epa_facility_id) {
                log::warn!(
                    "Duplicate facility {} in state {}, keeping the first",
                    facility.epa_facility_id,
                    facility.state.abbr
                );
                continue;
            }
            by_key.insert(facility.epa_facility_id.clone(), facility);
        }

        let facilities: Vec<Facility> = by_key.into_values().collect();
        let mut by_id = BTreeMap::new();
        let mut submissions = BTreeMap::new();
        for (fi, facility) in facilities.iter().enumerate() {
            by_id.insert(facility.epa_facility_id.clone(), fi);
            for (si, submission) in facility.submissions.iter().enumerate() {
                submissions.entry(submission.id).or_insert((fi, si));
            }
        }

        log::debug!(
            "Indexed {} facilities and {} submissions across {} states",
            facilities.len(),
            submissions.len(),
            states.len()
        );

        Self {
            facilities,
            by_id,
            submissions,
            states,
        }
    }
}

/// A read-only store over state documents, loaded lazily on first use and
/// never refreshed.
pub struct DocumentStore {
    source: Option<DocumentSource>,
    index: OnceCell<DocumentIndex>,
}

impl DocumentStore {
    #[must_use]
    pub const fn new(source: DocumentSource) -> Self {
        Self {
            source: Some(source),
            index: OnceCell::const_new(),
        }
    }

    /// Store over `<data_dir>/by-state/`.
    #[must_use]
    pub fn directory(data_dir: impl Into<PathBuf>) -> Self {
        Self::new(DocumentSource::Directory(data_dir.into()))
    }

    /// Store over `<base_url>/<ABBR>.json`.
    #[must_use]
    pub fn remote(base_url: impl Into<String>) -> Self {
        Self::new(DocumentSource::Remote {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        })
    }

    /// Store over documents already in memory.
    #[must_use]
    pub fn from_documents(documents: Vec<StateDocument>) -> Self {
        Self {
            source: None,
            index: OnceCell::new_with(Some(DocumentIndex::build(documents))),
        }
    }

    async fn index(&self) -> Result<&DocumentIndex, DocumentError> {
        self.index
            .get_or_try_init(|| async {
                let documents = match &self.source {
                    Some(DocumentSource::Directory(dir)) => loader::load_directory(dir).await?,
                    Some(DocumentSource::Remote { client, base_url }) => {
                        loader::load_remote(client, base_url).await?
                    }
                    None => Vec::new(),
                };
                Ok::<_, DocumentError>(DocumentIndex::build(documents))
            })
            .await
    }

    /// Loads the documents now instead of on the first request.
    ///
    /// # Errors
    ///
    /// * If the documents cannot be loaded
    pub async fn preload(&self) -> Result<usize, DocumentError> {
        Ok(self.index().await?.facilities.len())
    }
}

#[async_trait]
impl FacilityStore for DocumentStore {
    fn backend(&self) -> &'static str {
        "documents"
    }

    fn coordinate_policy(&self) -> CoordinatePolicy {
        CoordinatePolicy::Finite
    }

    async fn search(
        &self,
        filter: &FacilityFilter,
        page: &PageRequest,
    ) -> Result<Page<FacilitySummary>, StoreError> {
        let index = self.index().await?;
        Ok(search_in_memory(&index.facilities, filter, page))
    }

    async fn facility(&self, epa_facility_id: &str) -> Result<Option<Facility>, StoreError> {
        let index = self.index().await?;
        Ok(index
            .by_id
            .get(epa_facility_id.trim())
            .map(|&i| index.facilities[i].clone()))
    }

    async fn submission(
        &self,
        submission_id: i64,
    ) -> Result<Option<SubmissionDetail>, StoreError> {
        let index = self.index().await?;
        Ok(index.submissions.get(&submission_id).map(|&(fi, si)| {
            let facility = &index.facilities[fi];
            SubmissionDetail::new(facility, &facility.submissions[si])
        }))
    }

    async fn facility_markers(&self) -> Result<Vec<FacilityMarker>, StoreError> {
        let index = self.index().await?;
        Ok(index.facilities.iter().map(FacilityMarker::from).collect())
    }

    async fn accident_markers(&self) -> Result<Vec<AccidentMarker>, StoreError> {
        let index = self.index().await?;
        Ok(index
            .facilities
            .iter()
            .flat_map(AccidentMarker::for_facility)
            .collect())
    }

    async fn states(&self) -> Result<Vec<StateSummary>, StoreError> {
        Ok(self.index().await?.states.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use rmp_search::PerPage;

    use super::*;

    fn ohio_and_wv() -> Vec<StateDocument> {
        let wv = r#"{
            "abbr": "WV",
            "name": "West Virginia",
            "counties": [{
                "fips": "54039",
                "facilities": [{
                    "EPAFacilityID": "200",
                    "name": "Kanawha Chemical",
                    "city": "Charleston",
                    "latitude": 38.35,
                    "longitude": -81.63,
                    "submissions": [{
                        "id": 20,
                        "inspectionDate": "2019-05-05",
                        "processes": [
                            { "id": 1, "programLevel": 2, "naicsCodes": ["325199"],
                              "chemicals": [{ "id": 77 }] },
                            { "id": 2, "programLevel": 3, "naicsCodes": ["424690"],
                              "chemicals": [{ "id": 56 }], "toxicRelease": true }
                        ],
                        "accidents": [
                            { "id": 900, "date": "2018-01-01" },
                            { "id": 901, "date": "2001-01-01" }
                        ]
                    }]
                }]
            }]
        }"#;
        let oh = r#"{
            "abbr": "OH",
            "counties": [{
                "fips": "39049",
                "facilities": [
                    { "EPAFacilityID": "300", "name": "Columbus Ammonia", "city": "Columbus",
                      "latitude": "abc", "longitude": "-83.0",
                      "submissions": [{ "id": 30, "inspectionDate": "2020-01-01",
                                        "deregistrationDate": "2022-02-02" }] },
                    { "EPAFacilityID": "100", "name": "Dublin Water", "city": "Dublin",
                      "latitude": 40.1, "longitude": -83.1,
                      "submissions": [{ "id": 10, "inspectionDate": "2021-01-01" }] }
                ]
            }]
        }"#;
        vec![
            serde_json::from_str(wv).unwrap(),
            serde_json::from_str(oh).unwrap(),
        ]
    }

    #[tokio::test]
    async fn search_orders_by_id_and_pages() {
        let store = DocumentStore::from_documents(ohio_and_wv());
        let page = store
            .search(&FacilityFilter::default(), &PageRequest::new(1, PerPage::Limited(2)))
            .await
            .unwrap();
        let ids: Vec<&str> = page.items.iter().map(|f| f.epa_facility_id.as_str()).collect();
        assert_eq!(ids, vec!["100", "200"]);
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn process_filters_hold_on_one_process() {
        let store = DocumentStore::from_documents(ohio_and_wv());
        let split = FacilityFilter::from_pairs([("programLevel", "2"), ("chemicals", "56")]);
        let page = store.search(&split, &PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 0);

        let same = FacilityFilter::from_pairs([("programLevel", "3"), ("chemicals", "56")]);
        let page = store.search(&same, &PageRequest::default()).await.unwrap();
        assert_eq!(page.total, 1);
        let s = &page.items[0];
        assert_eq!(s.program_level, Some(3));
        assert_eq!(s.naics_code.as_deref(), Some("325199"));
        assert_eq!(s.accident_count, 2);
        assert!(s.toxic_release);
    }

    #[tokio::test]
    async fn active_only_excludes_deregistered() {
        let store = DocumentStore::from_documents(ohio_and_wv());
        let filter = FacilityFilter::from_pairs([("activeOnly", "true"), ("state", "oh")]);
        let page = store.search(&filter, &PageRequest::unlimited()).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.per_page, 1);
        assert_eq!(page.items[0].epa_facility_id, "100");
    }

    #[tokio::test]
    async fn detail_lookups() {
        let store = DocumentStore::from_documents(ohio_and_wv());
        let f = store.facility("200").await.unwrap().unwrap();
        assert_eq!(f.state.name, "West Virginia");
        assert_eq!(f.county_fips.as_deref(), Some("54039"));
        assert!(store.facility("nope").await.unwrap().is_none());

        let s = store.submission(30).await.unwrap().unwrap();
        assert_eq!(s.epa_facility_id, "300");
        assert!(store.submission(31).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn markers_and_states() {
        let store = DocumentStore::from_documents(ohio_and_wv());
        assert_eq!(store.facility_markers().await.unwrap().len(), 3);
        assert_eq!(store.accident_markers().await.unwrap().len(), 2);

        let states = store.states().await.unwrap();
        let abbrs: Vec<&str> = states.iter().map(|s| s.abbr.as_str()).collect();
        assert_eq!(abbrs, vec!["OH", "WV"]);
        assert_eq!(states[0].name, "Ohio");
        assert_eq!(states[0].facility_count, 2);
    }

    #[tokio::test]
    async fn missing_directory_surfaces_as_store_error() {
        let dir = std::env::temp_dir().join("rmp_documents_store_missing");
        let _ = std::fs::remove_dir_all(&dir);
        let store = DocumentStore::directory(&dir);
        assert!(store.preload().await.is_err());
        assert!(matches!(store.states().await, Err(StoreError::Document(_))));
    }

    #[tokio::test]
    async fn failed_remote_load_is_retried_on_next_request() {
        let ready = Arc::new(AtomicBool::new(false));
        let base = loader::test_server::serve_ohio(Arc::clone(&ready)).await;
        let store = DocumentStore::remote(base);

        assert!(matches!(
            store.preload().await,
            Err(DocumentError::NoDocuments { .. })
        ));
        assert!(matches!(store.states().await, Err(StoreError::Document(_))));

        ready.store(true, Ordering::SeqCst);
        assert_eq!(store.preload().await.unwrap(), 0);
        let states = store.states().await.unwrap();
        assert_eq!(states.iter().map(|s| s.abbr.as_str()).collect::<Vec<_>>(), vec!["OH"]);
    }
}
