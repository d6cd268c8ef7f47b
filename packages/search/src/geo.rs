//! Map projection of facilities and accidents into `GeoJSON` points.
//!
//! Markers whose coordinates are missing, non-numeric, or non-finite are
//! dropped silently; a map request never fails because of bad source
//! coordinates.

use chrono::{Months, NaiveDate};
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value, feature::Id};
use rmp_facility_models::summary::{AccidentMarker, FacilityMarker};
use rmp_facility_models::{CoordinateValue, GeoRange, parse_date};
use serde_json::json;

/// How long a geo result stays cached.
pub const GEO_CACHE_TTL_SECS: u64 = 300;

/// Accidents newer than this many months count as "latest".
const LATEST_WINDOW_MONTHS: u32 = 60;

/// Which coordinates a backend considers plottable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatePolicy {
    /// Any finite latitude and longitude.
    Finite,
    /// Finite, flagged valid by the source, latitude ≥ 0 and longitude < 0.
    ///
    /// The RMP tables carry a handful of sign-flipped and placeholder
    /// coordinates; every U.S. facility lies in this quadrant.
    WesternHemisphere,
}

impl CoordinatePolicy {
    /// Returns `(lat, lon)` when the raw values pass this policy.
    #[must_use]
    pub fn accept(
        self,
        latitude: Option<&CoordinateValue>,
        longitude: Option<&CoordinateValue>,
        valid_flag: Option<bool>,
    ) -> Option<(f64, f64)> {
        let lat = latitude?.as_f64()?;
        let lon = longitude?.as_f64()?;
        match self {
            Self::Finite => Some((lat, lon)),
            Self::WesternHemisphere => {
                (valid_flag == Some(true) && lat >= 0.0 && lon < 0.0).then_some((lat, lon))
            }
        }
    }
}

/// A geographic bounding box in WGS84 coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Western longitude boundary.
    pub west: f64,
    /// Southern latitude boundary.
    pub south: f64,
    /// Eastern longitude boundary.
    pub east: f64,
    /// Northern latitude boundary.
    pub north: f64,
}

impl BoundingBox {
    /// Creates a new bounding box from the given coordinates.
    #[must_use]
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Builds a box from `minx`/`miny`/`maxx`/`maxy` query values. Returns
    /// `None` unless all four parse to finite numbers.
    #[must_use]
    pub fn from_params(
        minx: Option<&str>,
        miny: Option<&str>,
        maxx: Option<&str>,
        maxy: Option<&str>,
    ) -> Option<Self> {
        let parse = |v: Option<&str>| {
            v.and_then(|s| s.trim().parse::<f64>().ok())
                .filter(|n| n.is_finite())
        };
        Some(Self::new(
            parse(minx)?,
            parse(miny)?,
            parse(maxx)?,
            parse(maxy)?,
        ))
    }

    /// Whether the point lies inside the box, edges included.
    #[must_use]
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        (self.west..=self.east).contains(&lon) && (self.south..=self.north).contains(&lat)
    }
}

/// Date constraint for accident maps and counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccidentWindow {
    /// No constraint.
    All,
    /// On or after this date.
    Since(NaiveDate),
    /// On or before this date.
    OnOrBefore(NaiveDate),
}

impl AccidentWindow {
    /// The trailing five-year window ending `today`.
    #[must_use]
    pub fn latest(today: NaiveDate) -> Self {
        Self::Since(
            today
                .checked_sub_months(Months::new(LATEST_WINDOW_MONTHS))
                .unwrap_or(NaiveDate::MIN),
        )
    }

    /// Whether an accident with this date falls in the window. Undated
    /// accidents only match [`Self::All`].
    #[must_use]
    pub fn contains(&self, date: Option<NaiveDate>) -> bool {
        match (self, date) {
            (Self::All, _) => true,
            (Self::Since(from), Some(d)) => d >= *from,
            (Self::OnOrBefore(to), Some(d)) => d <= *to,
            (_, None) => false,
        }
    }
}

/// Normalized parameters of a map request; doubles as the cache key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeoQuery {
    /// Requested range.
    pub range: Option<GeoRange>,
    /// Legacy `submissionDate` snapshot: `Some(None)` is `ALL`.
    pub submission_date: Option<Option<NaiveDate>>,
    /// Legacy `latestOnly` flag.
    pub latest_only: bool,
    /// Optional viewport.
    pub bbox: Option<BoundingBox>,
}

impl GeoQuery {
    /// Reads map parameters from decoded query-string pairs. Malformed
    /// values are ignored.
    #[must_use]
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut query = Self::default();
        let (mut minx, mut miny, mut maxx, mut maxy) = (None, None, None, None);

        for (key, value) in pairs {
            match key {
                "range" => query.range = value.parse().ok().or(query.range),
                "submissionDate" => {
                    if value.trim().eq_ignore_ascii_case("all") {
                        query.submission_date = Some(None);
                    } else if let Some(date) = parse_date(value) {
                        query.submission_date = Some(Some(date));
                    }
                }
                "latestOnly" => query.latest_only = value.trim().eq_ignore_ascii_case("true"),
                "minx" => minx = Some(value),
                "miny" => miny = Some(value),
                "maxx" => maxx = Some(value),
                "maxy" => maxy = Some(value),
                _ => {}
            }
        }

        query.bbox = BoundingBox::from_params(minx, miny, maxx, maxy);
        query
    }

    /// Whether the facility layer should only show active facilities.
    #[must_use]
    pub fn facilities_latest_only(&self) -> bool {
        self.range == Some(GeoRange::Latest)
    }

    /// Resolves the accident date window.
    ///
    /// `range` wins over the legacy parameters; `latestOnly` only applies
    /// when no `submissionDate` was given.
    #[must_use]
    pub fn accident_window(&self, today: NaiveDate) -> AccidentWindow {
        match (self.range, self.submission_date) {
            (Some(GeoRange::Latest), _) => AccidentWindow::latest(today),
            (Some(GeoRange::All), _) | (None, Some(None)) => AccidentWindow::All,
            (None, Some(Some(date))) => AccidentWindow::OnOrBefore(date),
            (None, None) if self.latest_only => AccidentWindow::latest(today),
            (None, None) => AccidentWindow::All,
        }
    }

    /// A stable string key for caching the result of this query for one
    /// map layer.
    #[must_use]
    pub fn cache_key(&self, layer: &str) -> String {
        let range = self.range.map(|r| r.to_string()).unwrap_or_default();
        let snapshot = match self.submission_date {
            None => String::new(),
            Some(None) => "ALL".to_string(),
            Some(Some(d)) => d.to_string(),
        };
        let bbox = self.bbox.map_or_else(String::new, |b| {
            format!("{},{},{},{}", b.west, b.south, b.east, b.north)
        });
        format!(
            "{layer}|{range}|{snapshot}|{}|{bbox}",
            self.latest_only
        )
    }
}

fn point_feature(id: String, lat: f64, lon: f64, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Point(vec![lon, lat]))),
        id: Some(Id::String(id)),
        properties: Some(properties),
        foreign_members: None,
    }
}

fn collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

fn to_object(value: serde_json::Value) -> JsonObject {
    match value {
        serde_json::Value::Object(map) => map,
        _ => JsonObject::new(),
    }
}

/// Projects facility markers into a point `FeatureCollection`.
#[must_use]
pub fn facility_features(
    markers: &[FacilityMarker],
    policy: CoordinatePolicy,
    query: &GeoQuery,
) -> FeatureCollection {
    let latest_only = query.facilities_latest_only();
    let features = markers
        .iter()
        .filter(|m| !latest_only || m.active)
        .filter_map(|m| {
            let (lat, lon) =
                policy.accept(m.latitude.as_ref(), m.longitude.as_ref(), m.valid_lat_long)?;
            if query.bbox.is_some_and(|b| !b.contains(lat, lon)) {
                return None;
            }
            let properties = to_object(json!({
                "id": m.epa_facility_id,
                "name": m.name,
                "city": m.city,
                "state": m.state,
                "lastDate": m.last_date,
                "accidents": m.accident_count,
                "programLevel": m.program_level,
                "toxicRelease": m.toxic_release,
            }));
            Some(point_feature(m.epa_facility_id.clone(), lat, lon, properties))
        })
        .collect();

    collection(features)
}

fn plotted_accidents<'a>(
    markers: &'a [AccidentMarker],
    policy: CoordinatePolicy,
    bbox: Option<BoundingBox>,
    window: AccidentWindow,
) -> impl Iterator<Item = (&'a AccidentMarker, f64, f64)> {
    markers.iter().filter_map(move |m| {
        if !window.contains(m.date.as_deref().and_then(parse_date)) {
            return None;
        }
        let (lat, lon) =
            policy.accept(m.latitude.as_ref(), m.longitude.as_ref(), m.valid_lat_long)?;
        if bbox.is_some_and(|b| !b.contains(lat, lon)) {
            return None;
        }
        Some((m, lat, lon))
    })
}

/// Projects accident markers into a point `FeatureCollection`.
#[must_use]
pub fn accident_features(
    markers: &[AccidentMarker],
    policy: CoordinatePolicy,
    query: &GeoQuery,
    today: NaiveDate,
) -> FeatureCollection {
    let window = query.accident_window(today);
    let features = plotted_accidents(markers, policy, query.bbox, window)
        .map(|(m, lat, lon)| {
            let properties = to_object(json!({
                "id": m.id.to_string(),
                "EPAFacilityID": m.epa_facility_id,
                "name": m.facility_name,
                "facilityId": m.submission_id.to_string(),
                "accidentDate": m.date,
                "accidentTime": m.time,
                "naicsCode": m.naics_code,
            }));
            point_feature(m.id.to_string(), lat, lon, properties)
        })
        .collect();

    collection(features)
}

/// Total plottable accidents and those inside the trailing five years.
#[must_use]
pub fn accident_counts(
    markers: &[AccidentMarker],
    policy: CoordinatePolicy,
    today: NaiveDate,
) -> (u64, u64) {
    let total = plotted_accidents(markers, policy, None, AccidentWindow::All).count();
    let latest =
        plotted_accidents(markers, policy, None, AccidentWindow::latest(today)).count();
    (total as u64, latest as u64)
}
