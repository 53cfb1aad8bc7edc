use geo::{Distance, Haversine};

use crate::common::config::SpeedModel;
use crate::common::tour::TrackPoint;

/// Sets the data which will be stored as node weights in the graph. Each node
/// is a named placemark from the geodata source
#[derive(Default, Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub id: String,
    pub lat: f64,
    pub lon: f64,
    pub elevation: f64,
}

impl GraphNode {
    pub fn new(id: &str, lat: f64, lon: f64, elevation: f64) -> GraphNode {
        GraphNode {
            id: id.to_string(),
            lat,
            lon,
            elevation,
        }
    }

    pub fn position(&self) -> TrackPoint {
        TrackPoint::new(self.lat, self.lon, Some(self.elevation))
    }
}

/// Container for edge metadata which will be stored in the graph. An edge is
/// always traversed from src to dst; the distance (m) and duration (s) are
/// calculated once when the edge is created
#[derive(Default, Debug, Clone, PartialEq)]
pub struct GraphEdge {
    pub id: String,
    pub src: String,
    pub dst: String,
    pub points: Vec<TrackPoint>,
    pub elevation_gain: f64,
    pub elevation_loss: f64,
    pub distance: f64,
    pub duration: f64,
}

/// Sum of the great circle distances between consecutive points
pub fn polyline_distance(points: &[TrackPoint]) -> f64 {
    points
        .windows(2)
        .map(|pair| Haversine::distance(pair[0].to_point(), pair[1].to_point()))
        .sum()
}

/// Cumulative ascent and descent along a polyline, as (gain, loss). Points
/// without an altitude are skipped
pub fn elevation_change(points: &[TrackPoint]) -> (f64, f64) {
    let mut gain = 0.0;
    let mut loss = 0.0;
    let mut last: Option<f64> = None;

    for alt in points.iter().filter_map(|point| point.alt) {
        if let Some(prev) = last {
            let delta = alt - prev;
            if delta > 0.0 {
                gain += delta;
            } else {
                loss -= delta;
            }
        }
        last = Some(alt);
    }

    (gain, loss)
}

impl GraphEdge {
    /// Create an edge from its geometry, deriving distance, elevation change
    /// and duration from the polyline
    pub fn from_points(
        id: &str,
        src: &str,
        dst: &str,
        points: Vec<TrackPoint>,
        speed: &SpeedModel,
    ) -> GraphEdge {
        let distance = polyline_distance(&points);
        let (elevation_gain, elevation_loss) = elevation_change(&points);
        let duration =
            speed.estimate_duration(distance, elevation_gain, elevation_loss);

        GraphEdge {
            id: id.to_string(),
            src: src.to_string(),
            dst: dst.to_string(),
            points,
            elevation_gain,
            elevation_loss,
            distance,
            duration,
        }
    }

    /// The same path walked in the opposite direction. Ascent and descent
    /// swap over, so the duration is estimated again
    pub fn reversed(&self, id: &str, speed: &SpeedModel) -> GraphEdge {
        let points: Vec<TrackPoint> =
            self.points.iter().rev().copied().collect();

        GraphEdge {
            id: id.to_string(),
            src: self.dst.clone(),
            dst: self.src.clone(),
            points,
            elevation_gain: self.elevation_loss,
            elevation_loss: self.elevation_gain,
            distance: self.distance,
            duration: speed.estimate_duration(
                self.distance,
                self.elevation_loss,
                self.elevation_gain,
            ),
        }
    }
}
