//! [`FacilityStore`] over the relational RMP tables.

use std::sync::Arc;

use async_trait::async_trait;
use rmp_facility_models::Facility;
use rmp_facility_models::summary::{
    AccidentMarker, FacilityMarker, FacilitySummary, StateSummary, SubmissionDetail,
};
use rmp_search::{CoordinatePolicy, FacilityFilter, FacilityStore, Page, PageRequest, StoreError};
use switchy_database::Database;

use crate::queries;

/// Serves facility queries from Postgres or `SQLite`.
///
/// Plotted coordinates additionally have to pass the RMP sanity check:
/// validity flag set, latitude north of the equator, longitude west of
/// Greenwich.
pub struct RelationalStore {
    db: Arc<dyn Database>,
    backend: &'static str,
}

impl RelationalStore {
    #[must_use]
    pub fn new(db: Arc<dyn Database>, backend: &'static str) -> Self {
        Self { db, backend }
    }

    #[must_use]
    pub fn postgres(db: Arc<dyn Database>) -> Self {
        Self::new(db, "postgres")
    }

    #[must_use]
    pub fn sqlite(db: Arc<dyn Database>) -> Self {
        Self::new(db, "sqlite")
    }
}

#[async_trait]
impl FacilityStore for RelationalStore {
    fn backend(&self) -> &'static str {
        self.backend
    }

    fn coordinate_policy(&self) -> CoordinatePolicy {
        CoordinatePolicy::WesternHemisphere
    }

    async fn search(
        &self,
        filter: &FacilityFilter,
        page: &PageRequest,
    ) -> Result<Page<FacilitySummary>, StoreError> {
        Ok(queries::search(self.db.as_ref(), filter, page).await?)
    }

    async fn facility(&self, epa_facility_id: &str) -> Result<Option<Facility>, StoreError> {
        Ok(queries::get_facility(self.db.as_ref(), epa_facility_id).await?)
    }

    async fn submission(
        &self,
        submission_id: i64,
    ) -> Result<Option<SubmissionDetail>, StoreError> {
        Ok(queries::get_submission(self.db.as_ref(), submission_id).await?)
    }

    async fn facility_markers(&self) -> Result<Vec<FacilityMarker>, StoreError> {
        Ok(queries::list_facility_markers(self.db.as_ref()).await?)
    }

    async fn accident_markers(&self) -> Result<Vec<AccidentMarker>, StoreError> {
        Ok(queries::list_accident_markers(self.db.as_ref()).await?)
    }

    async fn states(&self) -> Result<Vec<StateSummary>, StoreError> {
        Ok(queries::list_states(self.db.as_ref()).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use rmp_documents::{CountyGroup, DocumentStore, StateDocument};
    use rmp_search::PerPage;
    use switchy_database::DatabaseValue;

    use super::*;
    use crate::db::open_sqlite;

    fn s(v: &str) -> DatabaseValue {
        DatabaseValue::String(v.to_string())
    }

    fn opt(v: Option<&str>) -> DatabaseValue {
        v.map_or(DatabaseValue::Null, s)
    }

    fn i(v: i64) -> DatabaseValue {
        DatabaseValue::Int64(v)
    }

    struct Seed {
        path: PathBuf,
        store: RelationalStore,
    }

    impl Drop for Seed {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn facility_row(
        db: &dyn Database,
        submission: i64,
        epa: &str,
        name: &str,
        city: &str,
        state: &str,
        county: &str,
        lat: &str,
        inspection: Option<&str>,
        dereg: Option<&str>,
    ) {
        db.exec_raw_params(
            "INSERT INTO tbl_s1_facilities (
                facility_id, epa_facility_id, facility_name, facility_str_1, facility_city,
                facility_state, facility_zip_code, facility_county_fips, parent_company_name,
                facility_duns, operator_name, facility_lat_dec_degs, facility_long_dec_degs,
                valid_lat_long_flag, safety_inspection_date, deregistration_date
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
            &[
                i(submission),
                s(epa),
                s(name),
                s("1 Main St"),
                s(city),
                s(state),
                s("00000"),
                s(county),
                s("Acme Holdings"),
                s("123456789"),
                s("Acme Ops"),
                s(lat),
                s(" -82.50 "),
                s("Yes"),
                opt(inspection),
                opt(dereg),
            ],
        )
        .await
        .unwrap();
    }

    async fn process(db: &dyn Database, id: i64, submission: i64, level: i64, naics: &str, chem: i64, toxic: &str) {
        db.exec_raw_params(
            "INSERT INTO tbl_s1_processes (process_id, facility_id, program_level, mh_toxic_release)
             VALUES ($1, $2, $3, $4)",
            &[i(id), i(submission), i(level), s(toxic)],
        )
        .await
        .unwrap();
        db.exec_raw_params(
            "INSERT INTO tbl_s1_process_naics (process_naics_id, process_id, naics_code)
             VALUES ($1, $2, $3)",
            &[i(id), i(id), s(naics)],
        )
        .await
        .unwrap();
        db.exec_raw_params(
            "INSERT INTO tbl_s1_process_chemicals (process_chemical_id, process_id, chemical_id, quantity)
             VALUES ($1, $2, $3, $4)",
            &[i(id), i(id), i(chem), DatabaseValue::Real64(5000.0)],
        )
        .await
        .unwrap();
    }

    async fn accident(db: &dyn Database, id: i64, submission: i64, date: &str, fire: &str) {
        db.exec_raw_params(
            "INSERT INTO tbl_s6_accident_history (
                accident_history_id, facility_id, accident_date, accident_time, naics_code, rt_fire
            ) VALUES ($1, $2, $3, $4, $5, $6)",
            &[i(id), i(submission), s(date), s("0930"), s("325199"), s(fire)],
        )
        .await
        .unwrap();
    }

    async fn seed(name: &str) -> Seed {
        let path = std::env::temp_dir().join(format!("rmp_database_test_{name}.db"));
        let _ = std::fs::remove_file(&path);
        let db = open_sqlite(&path).await.unwrap();
        let d = db.as_ref();

        for (id, chem) in [(56, "Chlorine"), (77, "Ammonia (anhydrous)")] {
            d.exec_raw_params(
                "INSERT INTO tlkp_chemicals (chemical_id, chemical_name) VALUES ($1, $2)",
                &[i(id), s(chem)],
            )
            .await
            .unwrap();
        }

        // 100: two filings, the newer one has processes and accidents.
        facility_row(d, 10, "100", "Old Name", "Columbus", "OH", "39049", "39.90", Some("2010-01-01"), None).await;
        facility_row(d, 20, "100", "Columbus Chemical", "Columbus", "OH", "39049", "39.96", Some("2020-06-01"), None).await;
        process(d, 1, 20, 2, "325199", 77, "No").await;
        process(d, 2, 20, 3, "424690", 56, "Yes").await;
        accident(d, 900, 20, "2018-01-01", "Yes").await;
        accident(d, 901, 20, "1999-05-05", "No").await;

        // 200: deregistered.
        facility_row(d, 30, "200", "Charleston Plant", "Charleston", "WV", "54039", "38.35", Some("2019-01-01"), Some("2021-01-01")).await;
        process(d, 3, 30, 1, "211112", 56, "No").await;

        // 300: undated filing, unusable latitude.
        facility_row(d, 40, "300", "Dayton Water", "Dayton", "oh", "39113", "abc", None, None).await;

        Seed {
            path,
            store: RelationalStore::sqlite(Arc::from(db)),
        }
    }

    #[tokio::test]
    async fn search_assembles_latest_attributes_and_aggregates() {
        let seed = seed("search").await;
        let page = seed
            .store
            .search(&FacilityFilter::default(), &PageRequest::default())
            .await
            .unwrap();

        assert_eq!(page.total, 3);
        let ids: Vec<&str> = page.items.iter().map(|f| f.epa_facility_id.as_str()).collect();
        assert_eq!(ids, vec!["100", "200", "300"]);

        let f = &page.items[0];
        assert_eq!(f.name, "Columbus Chemical");
        assert_eq!(f.state.name, "Ohio");
        assert_eq!(f.program_level, Some(3));
        assert_eq!(f.naics_code.as_deref(), Some("325199"));
        assert_eq!(f.chemicals.iter().map(|c| c.id).collect::<Vec<_>>(), vec![77, 56]);
        assert_eq!(f.chemicals[1].name.as_deref(), Some("Chlorine"));
        assert!(f.toxic_release);
        assert_eq!(f.accident_count, 2);
        assert_eq!(f.accidents.as_ref().unwrap()[0].flags.get("fire"), Some(&true));
        assert_eq!(f.sub_last.as_ref().unwrap().id, 20);
        assert_eq!(f.sub_last.as_ref().unwrap().num_accidents, 2);
        assert_eq!(f.latitude, Some(39.96));
        assert_eq!(f.longitude, Some(-82.5));

        let dayton = &page.items[2];
        assert!(dayton.accidents.is_none());
        assert_eq!(dayton.latitude, None);
        assert_eq!(dayton.state.abbr, "OH");
    }

    #[tokio::test]
    async fn filters_push_down_to_sql() {
        let seed = seed("filters").await;
        let search = |pairs: Vec<(&'static str, &'static str)>| {
            let filter = FacilityFilter::from_pairs(pairs);
            let store = &seed.store;
            async move {
                store
                    .search(&filter, &PageRequest::unlimited())
                    .await
                    .unwrap()
                    .items
                    .into_iter()
                    .map(|f| f.epa_facility_id)
                    .collect::<Vec<_>>()
            }
        };

        assert_eq!(search(vec![("state", "oh")]).await, vec!["100", "300"]);
        assert_eq!(search(vec![("facilityName", "CHEMICAL")]).await, vec!["100"]);
        assert!(search(vec![("facilityName", "old name")]).await.is_empty());
        assert_eq!(search(vec![("activeOnly", "true")]).await, vec!["100"]);
        assert_eq!(search(vec![("city", "charleston")]).await, vec!["200"]);
        assert_eq!(search(vec![("chemicals", "56")]).await, vec!["100", "200"]);
        assert!(search(vec![("programLevel", "2"), ("chemicals", "56")]).await.is_empty());
        assert_eq!(
            search(vec![("programLevel", "3"), ("chemicals", "56")]).await,
            vec!["100"]
        );
        assert_eq!(search(vec![("naicsCodes", "211112,424690")]).await, vec!["100", "200"]);
        assert!(search(vec![("facilityName", "100%")]).await.is_empty());
    }

    #[tokio::test]
    async fn pages_are_windows_over_the_id_order() {
        let seed = seed("pages").await;
        let page = seed
            .store
            .search(&FacilityFilter::default(), &PageRequest::new(2, PerPage::Limited(2)))
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.page, 2);
        assert_eq!(page.per_page, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].epa_facility_id, "300");
    }

    #[tokio::test]
    async fn detail_and_submission_lookup() {
        let seed = seed("detail").await;
        let f = seed.store.facility("100").await.unwrap().unwrap();
        assert_eq!(f.submissions.iter().map(|s| s.id).collect::<Vec<_>>(), vec![20, 10]);
        assert_eq!(f.submissions[0].processes.len(), 2);
        assert_eq!(f.submissions[0].accidents.len(), 2);
        assert!(seed.store.facility("999").await.unwrap().is_none());

        let sub = seed.store.submission(10).await.unwrap().unwrap();
        assert_eq!(sub.epa_facility_id, "100");
        assert_eq!(sub.num_accidents, 0);
        assert!(seed.store.submission(11).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn markers_and_states() {
        let seed = seed("markers").await;
        let markers = seed.store.facility_markers().await.unwrap();
        assert_eq!(markers.len(), 3);
        assert!(markers[0].active);
        assert_eq!(markers[0].accident_count, 2);
        assert!(markers[0].toxic_release);
        assert!(!markers[1].active);
        assert!(!markers[2].active);

        let accidents = seed.store.accident_markers().await.unwrap();
        assert_eq!(accidents.iter().map(|a| a.id).collect::<Vec<_>>(), vec![900, 901]);
        assert_eq!(accidents[0].submission_id, 20);

        let states = seed.store.states().await.unwrap();
        let abbrs: Vec<&str> = states.iter().map(|s| s.abbr.as_str()).collect();
        assert_eq!(abbrs, vec!["OH", "WV"]);
        assert_eq!(states[0].facility_count, 2);
        assert_eq!(states[0].counties.len(), 2);
    }

    /// Mirrors the relational facilities into an in-memory document store.
    async fn mirror(store: &RelationalStore, ids: &[&str]) -> DocumentStore {
        let mut documents: Vec<StateDocument> = Vec::new();
        for id in ids {
            let f = store.facility(id).await.unwrap().unwrap();
            documents.push(StateDocument {
                abbr: f.state.abbr.clone(),
                name: String::new(),
                counties: vec![CountyGroup {
                    fips: f.county_fips.clone().unwrap_or_default(),
                    name: None,
                    facilities: vec![f],
                }],
            });
        }
        DocumentStore::from_documents(documents)
    }

    #[tokio::test]
    async fn both_backends_return_identical_summaries() {
        let seed = seed("parity").await;
        let docs = mirror(&seed.store, &["100", "200", "300"]).await;

        for pairs in [
            vec![],
            vec![("state", "OH")],
            vec![("activeOnly", "true")],
            vec![("programLevel", "3"), ("chemicals", "56")],
            vec![("parentCompany", "acme")],
        ] {
            let filter = FacilityFilter::from_pairs(pairs.clone());
            let page = PageRequest::unlimited();
            let relational = seed.store.search(&filter, &page).await.unwrap();
            let document = docs.search(&filter, &page).await.unwrap();
            assert_eq!(relational, document, "filter {pairs:?}");
        }
    }

    #[tokio::test]
    async fn malformed_and_timestamped_inspection_dates_agree_across_backends() {
        let path = std::env::temp_dir().join("rmp_database_test_dates.db");
        let _ = std::fs::remove_file(&path);
        let db = open_sqlite(&path).await.unwrap();
        let d = db.as_ref();

        // 400: the placeholder filing has the higher ID but no real date.
        facility_row(d, 41, "400", "Dated Filing", "Akron", "OH", "39153", "41.08", Some("2019-01-01"), None).await;
        facility_row(d, 42, "400", "Placeholder Filing", "Akron", "OH", "39153", "41.08", Some("N/A"), None).await;
        // 500: same day, one as a timestamp; the higher ID wins the tie.
        facility_row(d, 51, "500", "Timestamped", "Toledo", "OH", "39095", "41.65", Some("2020-02-02 00:00:00"), None).await;
        facility_row(d, 52, "500", "Plain Date", "Toledo", "OH", "39095", "41.65", Some("2020-02-02"), None).await;
        // 600: never inspected.
        facility_row(d, 61, "600", "Unknown", "Lima", "OH", "39003", "40.74", Some("N/A"), None).await;

        let seed = Seed {
            path,
            store: RelationalStore::sqlite(Arc::from(db)),
        };
        let docs = mirror(&seed.store, &["400", "500", "600"]).await;

        let page = PageRequest::unlimited();
        let all = seed.store.search(&FacilityFilter::default(), &page).await.unwrap();
        let latest: Vec<(String, i64)> = all
            .items
            .iter()
            .map(|f| (f.name.clone(), f.sub_last.as_ref().unwrap().id))
            .collect();
        assert_eq!(
            latest,
            vec![
                ("Dated Filing".to_string(), 41),
                ("Plain Date".to_string(), 52),
                ("Unknown".to_string(), 61),
            ]
        );
        assert_eq!(all, docs.search(&FacilityFilter::default(), &page).await.unwrap());

        let active_only = FacilityFilter::from_pairs([("activeOnly", "true")]);
        let relational = seed.store.search(&active_only, &page).await.unwrap();
        let ids: Vec<&str> = relational.items.iter().map(|f| f.epa_facility_id.as_str()).collect();
        assert_eq!(ids, vec!["400", "500"]);
        assert_eq!(relational, docs.search(&active_only, &page).await.unwrap());

        let markers = seed.store.facility_markers().await.unwrap();
        assert_eq!(markers.iter().map(|m| m.active).collect::<Vec<_>>(), vec![true, true, false]);
        assert_eq!(markers[0].last_date.as_deref(), Some("2019-01-01"));
    }
}
