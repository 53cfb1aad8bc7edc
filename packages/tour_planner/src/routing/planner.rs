//! Decides, for each request, whether a tour can be planned on the internal
//! path network or has to go to the external directions service, and turns
//! the output of either into a PlannedTour.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::common::params::PlanTourParameters;
use crate::common::tour::{PlannedTour, TourBuilder, Track, TrackPoint};
use crate::error::{GraphFormatError, PlanningError};
use crate::loading::petgraph::GeoGraph;
use crate::loading::shared::SharedGraph;
use crate::routing::assembler::assemble_tour;
use crate::routing::external::DirectionsService;

/// Waypoint ids starting with this prefix refer to nodes of the path network
pub const GRAPH_NODE_PREFIX: &str = "graph:";

/// Where a tour will be planned. Graph holds node ids (without the prefix)
/// in visiting order, External holds the coordinates of every waypoint
#[derive(Debug, Clone, PartialEq)]
pub enum RouteSource {
    Graph(Vec<String>),
    External(Vec<TrackPoint>),
}

fn graph_node_id(waypoint_id: &str) -> Option<&str> {
    waypoint_id.strip_prefix(GRAPH_NODE_PREFIX)
}

/// Work out the coordinates of a waypoint for the external service. Explicit
/// locations take priority; graph waypoints fall back to the position of
/// their node
fn waypoint_position(
    params: &PlanTourParameters,
    graph: Result<&GeoGraph, &GraphFormatError>,
    waypoint_id: &str,
) -> Result<TrackPoint, PlanningError> {
    if let Some(point) = params.locations.get(waypoint_id) {
        return Ok(*point);
    }

    match graph_node_id(waypoint_id) {
        Some(node_id) => match graph {
            Ok(graph) => graph
                .node(node_id)
                .map(|node| node.position())
                .ok_or_else(|| {
                    PlanningError::UnknownNode(waypoint_id.to_string())
                }),
            Err(err) => Err(PlanningError::GraphUnavailable(err.clone())),
        },
        None => Err(PlanningError::InvalidParameters(format!(
            "waypoint '{waypoint_id}' has no location"
        ))),
    }
}

/// Choose how the tour will be planned. The internal graph is only used
/// when every waypoint is one of its nodes; a single waypoint outside of it
/// sends the whole tour to the external service
pub fn select_route_source(
    params: &PlanTourParameters,
    graph: Result<&GeoGraph, &GraphFormatError>,
) -> Result<RouteSource, PlanningError> {
    if params.waypoint_ids.len() < 2 {
        return Err(PlanningError::InvalidParameters(format!(
            "at least 2 waypoints are required, got {}",
            params.waypoint_ids.len()
        )));
    }

    if let Ok(graph) = graph {
        let node_ids: Option<Vec<String>> = params
            .waypoint_ids
            .iter()
            .map(|id| {
                graph_node_id(id)
                    .filter(|node_id| graph.node(node_id).is_some())
                    .map(|node_id| node_id.to_string())
            })
            .collect();

        if let Some(node_ids) = node_ids {
            debug!("All {} waypoints are graph nodes", node_ids.len());
            return Ok(RouteSource::Graph(node_ids));
        }
    }

    let points = params
        .waypoint_ids
        .iter()
        .map(|id| waypoint_position(params, graph, id))
        .collect::<Result<Vec<TrackPoint>, PlanningError>>()?;

    debug!("Routing {} waypoints externally", points.len());
    Ok(RouteSource::External(points))
}

/// Graph tours are searched using bare node ids, so errors from the search
/// get the prefix back to match the ids the caller sent
fn with_waypoint_ids(err: PlanningError) -> PlanningError {
    let waypoint_id = |node_id: String| format!("{GRAPH_NODE_PREFIX}{node_id}");

    match err {
        PlanningError::NoPath { from, to } => PlanningError::NoPath {
            from: waypoint_id(from),
            to: waypoint_id(to),
        },
        PlanningError::UnknownNode(id) => {
            PlanningError::UnknownNode(waypoint_id(id))
        }
        other => other,
    }
}

/// Wrap a track from the external service as a tour with a single leg
/// covering every waypoint
pub fn tour_from_track(from: &str, to: &str, track: Track) -> PlannedTour {
    let mut tour = TourBuilder::new();
    tour.push_leg(from, to, track.distance, track.duration, track.points);
    tour.finalize()
}

/// Plans tours against the shared path network, falling back to the
/// directions service for anything outside of it
pub struct TourPlanner<D> {
    graph: SharedGraph,
    directions: D,
}

impl<D: DirectionsService> TourPlanner<D> {
    pub fn new(graph: SharedGraph, directions: D) -> Self {
        TourPlanner { graph, directions }
    }

    /// Fetch the graph, loading it off the async runtime if this is the
    /// first time it has been needed
    async fn graph(&self) -> Result<Arc<GeoGraph>, GraphFormatError> {
        if let Some(result) = self.graph.try_get() {
            return result;
        }

        let shared = self.graph.clone();
        match tokio::task::spawn_blocking(move || shared.get()).await {
            Ok(result) => result,
            Err(err) => Err(GraphFormatError::Io(err.to_string())),
        }
    }

    pub async fn plan_tour(
        &self,
        params: &PlanTourParameters,
    ) -> Result<PlannedTour, PlanningError> {
        let graph = self.graph().await;
        if let Err(err) = &graph {
            warn!("Planning without the path network: {err}");
        }

        let source = select_route_source(params, graph.as_deref())?;

        let tour = match source {
            RouteSource::Graph(node_ids) => {
                let graph = graph.map_err(PlanningError::GraphUnavailable)?;
                let mut tour = tokio::task::spawn_blocking(move || {
                    assemble_tour(&graph, &node_ids)
                })
                .await
                .map_err(|err| PlanningError::Internal(err.to_string()))?
                .map_err(with_waypoint_ids)?;

                // Entries should carry the ids the caller used
                for (entry, pair) in
                    tour.entries.iter_mut().zip(params.waypoint_ids.windows(2))
                {
                    entry.from_waypoint_id = pair[0].clone();
                    entry.to_waypoint_id = pair[1].clone();
                }
                tour
            }
            RouteSource::External(points) => {
                let track = self
                    .directions
                    .directions(&points, params.profile)
                    .await?;
                // Both exist, selection requires at least 2 waypoints
                let first = &params.waypoint_ids[0];
                let last = &params.waypoint_ids[params.waypoint_ids.len() - 1];
                tour_from_track(first, last, track)
            }
        };

        info!(
            "Planned tour with {} legs, {} points, {:.0}s",
            tour.entries.len(),
            tour.map_points.len(),
            tour.total_duration
        );

        Ok(tour)
    }
}
