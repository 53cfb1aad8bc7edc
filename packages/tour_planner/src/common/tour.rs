//! Defines the structs which make up a planned tour (the stitched track and
//! the per-leg metrics), along with the builder used to assemble one leg at a
//! time.

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// A single coordinate on a track. Altitude is optional, as not every source
/// of geometry provides it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub lat: f64,
    pub lon: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<f64>,
}

impl TrackPoint {
    pub fn new(lat: f64, lon: f64, alt: Option<f64>) -> TrackPoint {
        TrackPoint { lat, lon, alt }
    }

    /// Two points share a position when their latitude and longitude match,
    /// regardless of altitude
    pub fn same_position(&self, other: &TrackPoint) -> bool {
        self.lat == other.lat && self.lon == other.lon
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && self.alt.is_none_or(|alt| alt.is_finite())
    }

    pub fn to_point(&self) -> geo::Point {
        geo::Point::new(self.lon, self.lat)
    }
}

/// A route as returned by a directions service. Distance is in meters,
/// duration in seconds
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub points: Vec<TrackPoint>,
    pub distance: f64,
    pub duration: f64,
}

/// Metrics for a single leg of a tour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedTourEntry {
    pub from_waypoint_id: String,
    pub to_waypoint_id: String,
    pub distance_in_km: f64,
    pub duration: f64,
    pub track_start_index: usize,
}

/// A complete tour, as handed back to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedTour {
    #[serde(rename = "totalDuration")]
    pub total_duration: f64,
    #[serde(rename = "mapPointList")]
    pub map_points: Vec<TrackPoint>,
    #[serde(rename = "tourEntriesList")]
    pub entries: Vec<PlannedTourEntry>,
}

impl PlannedTour {
    /// Track points belonging to a single entry. The first point of each
    /// entry after the first is shared with the previous entry, so it is
    /// included here to keep each leg's line continuous
    fn entry_points(&self, inx: usize) -> &[TrackPoint] {
        let start = match self.entries.get(inx) {
            Some(entry) => entry.track_start_index,
            None => return &[],
        };
        let end = match self.entries.get(inx + 1) {
            Some(next) => next.track_start_index,
            None => self.map_points.len(),
        };
        let start = if start > 0 { start - 1 } else { start };
        &self.map_points[start.min(end)..end]
    }

    /// Render the tour as a feature collection with one line per leg, or a
    /// point for a leg which doesn't move. Leg metrics are attached as
    /// feature properties so the result can be styled directly on a map
    pub fn to_geojson(&self) -> FeatureCollection {
        let features = self
            .entries
            .iter()
            .enumerate()
            .map(|(inx, entry)| {
                let coords: Vec<Vec<f64>> = self
                    .entry_points(inx)
                    .iter()
                    .map(|point| match point.alt {
                        Some(alt) => vec![point.lon, point.lat, alt],
                        None => vec![point.lon, point.lat],
                    })
                    .collect();

                let properties = match json!({
                    "fromWaypointId": entry.from_waypoint_id,
                    "toWaypointId": entry.to_waypoint_id,
                    "distanceInKm": entry.distance_in_km,
                    "duration": entry.duration,
                    "trackStartIndex": entry.track_start_index,
                }) {
                    serde_json::Value::Object(map) => map,
                    _ => JsonObject::new(),
                };

                // A leg which stays in place has a single position, which
                // can't be drawn as a line
                let geometry = match coords.len() {
                    0 => None,
                    1 => Some(Geometry::new(Value::Point(coords[0].clone()))),
                    _ => Some(Geometry::new(Value::LineString(coords))),
                };

                Feature {
                    bbox: None,
                    geometry,
                    id: None,
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }
}

/// Accumulates legs into a single continuous tour. Legs must be pushed in
/// waypoint order, as the start index of each leg depends on the number of
/// points contributed by every leg before it
#[derive(Debug, Default)]
pub struct TourBuilder {
    points: Vec<TrackPoint>,
    entries: Vec<PlannedTourEntry>,
}

impl TourBuilder {
    pub fn new() -> TourBuilder {
        TourBuilder::default()
    }

    /// Append a leg to the tour. Where the first point of the leg is the
    /// same position as the last point already on the track, it is dropped.
    /// Distance is expected in meters and duration in seconds
    pub fn push_leg(
        &mut self,
        from: &str,
        to: &str,
        distance: f64,
        duration: f64,
        points: Vec<TrackPoint>,
    ) {
        let track_start_index = self.points.len();

        let shares_start = match (self.points.last(), points.first()) {
            (Some(last), Some(first)) => last.same_position(first),
            _ => false,
        };
        self.points
            .extend(points.into_iter().skip(usize::from(shares_start)));

        self.entries.push(PlannedTourEntry {
            from_waypoint_id: from.to_string(),
            to_waypoint_id: to.to_string(),
            distance_in_km: distance / 1000.0,
            duration,
            track_start_index,
        });
    }

    pub fn finalize(self) -> PlannedTour {
        let total_duration =
            self.entries.iter().map(|entry| entry.duration).sum();

        PlannedTour {
            total_duration,
            map_points: self.points,
            entries: self.entries,
        }
    }
}
