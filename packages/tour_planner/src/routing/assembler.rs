use crate::common::tour::{PlannedTour, TourBuilder, TrackPoint};
use crate::error::PlanningError;
use crate::loading::petgraph::GeoGraph;
use crate::routing::dijkstra::{GraphPath, find_path};

/// Join the polylines of every edge on the path into a single line. Where
/// one edge ends at the point the next begins, the point is kept once. A
/// path with no edges is just the position of its node
fn path_points(graph: &GeoGraph, path: &GraphPath) -> Vec<TrackPoint> {
    if path.edges.is_empty() {
        return path
            .nodes
            .first()
            .and_then(|id| graph.node(id))
            .map(|node| vec![node.position()])
            .unwrap_or_default();
    }

    let mut points = Vec::<TrackPoint>::new();
    for edge in path.edges.iter().filter_map(|id| graph.edge(id)) {
        let shares_start = match (points.last(), edge.points.first()) {
            (Some(last), Some(first)) => last.same_position(first),
            _ => false,
        };
        points.extend(edge.points.iter().skip(usize::from(shares_start)));
    }
    points
}

/// Plan a tour through the provided nodes, visiting them in the order
/// given. Each consecutive pair of waypoints becomes one leg of the tour.
/// If any leg can't be routed the whole tour fails
pub fn assemble_tour(
    graph: &GeoGraph,
    waypoint_ids: &[String],
) -> Result<PlannedTour, PlanningError> {
    if waypoint_ids.len() < 2 {
        return Err(PlanningError::InvalidParameters(format!(
            "at least 2 waypoints are required, got {}",
            waypoint_ids.len()
        )));
    }

    let mut tour = TourBuilder::new();
    for leg in waypoint_ids.windows(2) {
        let (from, to) = (&leg[0], &leg[1]);
        let path = find_path(graph, from, to)?;
        let points = path_points(graph, &path);
        tour.push_leg(from, to, path.distance, path.duration, points);
    }

    Ok(tour.finalize())
}
