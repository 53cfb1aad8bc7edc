//! Builds the path network from a GeoJSON feature collection. Named Point
//! features are placemarks and become graph nodes. Named LineString features
//! are paths between two placemarks, identified either by their `from`/`to`
//! properties or by matching their first/last coordinates to the nearest
//! placemark.

use geojson::{Feature, GeoJson, Value};
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

use crate::common::config::{PlannerConfig, SpeedModel};
use crate::common::graph_data::{GraphEdge, GraphNode};
use crate::common::tour::TrackPoint;
use crate::error::GraphFormatError;
use crate::loading::petgraph::GeoGraph;

/// Suffix applied to the id of the edge which walks a two-way line against
/// its geometry order
pub const REVERSE_SUFFIX: &str = ":reverse";

/// Settings which control how the geodata is turned into a graph
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadOptions {
    pub speed: SpeedModel,
    /// How far (m) a line endpoint may be from a placemark and still be
    /// matched to it
    pub match_tolerance_m: f64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            speed: SpeedModel::default(),
            match_tolerance_m: 25.0,
        }
    }
}

impl From<&PlannerConfig> for LoadOptions {
    fn from(config: &PlannerConfig) -> Self {
        LoadOptions {
            speed: config.speed,
            match_tolerance_m: config.match_tolerance_m,
        }
    }
}

/// A line feature as it appears in the source document
#[derive(Debug, Clone, PartialEq)]
struct LineFeature {
    name: String,
    coords: Vec<TrackPoint>,
    from: Option<String>,
    to: Option<String>,
    oneway: bool,
}

/// A line for which both endpoints have been matched to placemarks
#[derive(Debug, Clone, PartialEq)]
struct ResolvedLine {
    line: LineFeature,
    src: GraphNode,
    dst: GraphNode,
}

fn feature_name(feature: &Feature) -> Option<String> {
    feature
        .property("name")
        .and_then(|name| name.as_str())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

fn feature_str(feature: &Feature, key: &str) -> Option<String> {
    feature
        .property(key)
        .and_then(|val| val.as_str())
        .map(|val| val.to_string())
}

/// Convert a GeoJSON position ([lon, lat, ele?]) into a track point
fn to_track_point(
    position: &[f64],
    feature: &str,
) -> Result<TrackPoint, GraphFormatError> {
    match position {
        [lon, lat] => Ok(TrackPoint::new(*lat, *lon, None)),
        [lon, lat, ele, ..] => Ok(TrackPoint::new(*lat, *lon, Some(*ele))),
        _ => Err(GraphFormatError::InvalidGeometry {
            feature: feature.to_string(),
            reason: "positions need at least a longitude and latitude"
                .to_string(),
        }),
    }
}

fn to_node(
    name: String,
    position: &[f64],
    feature: &Feature,
) -> Result<GraphNode, GraphFormatError> {
    let point = to_track_point(position, &name)?;
    let elevation = point
        .alt
        .or_else(|| feature.property("ele").and_then(|ele| ele.as_f64()))
        .unwrap_or(0.0);

    Ok(GraphNode {
        id: name,
        lat: point.lat,
        lon: point.lon,
        elevation,
    })
}

fn to_line(
    name: String,
    positions: &[Vec<f64>],
    feature: &Feature,
) -> Result<LineFeature, GraphFormatError> {
    if positions.len() < 2 {
        return Err(GraphFormatError::InvalidGeometry {
            feature: name,
            reason: "lines need at least 2 points".to_string(),
        });
    }

    let coords = positions
        .iter()
        .map(|position| to_track_point(position, &name))
        .collect::<Result<Vec<TrackPoint>, GraphFormatError>>()?;

    let oneway = feature
        .property("oneway")
        .and_then(|val| val.as_bool())
        .unwrap_or(false);

    Ok(LineFeature {
        from: feature_str(feature, "from"),
        to: feature_str(feature, "to"),
        name,
        coords,
        oneway,
    })
}

/// Sort all of the features in the collection into placemarks and lines.
/// Features without geometry, or with a geometry type which plays no part in
/// the path network, are skipped
fn split_features(
    features: &[Feature],
) -> Result<(Vec<GraphNode>, Vec<LineFeature>), GraphFormatError> {
    let mut nodes = Vec::<GraphNode>::new();
    let mut lines = Vec::<LineFeature>::new();

    for (index, feature) in features.iter().enumerate() {
        let value = match &feature.geometry {
            Some(geometry) => &geometry.value,
            None => {
                debug!("Skipping feature {index}, it has no geometry");
                continue;
            }
        };

        match value {
            Value::Point(position) => {
                let name = feature_name(feature)
                    .ok_or(GraphFormatError::MissingName { index })?;
                nodes.push(to_node(name, position, feature)?);
            }
            Value::LineString(positions) => {
                let name = feature_name(feature)
                    .ok_or(GraphFormatError::MissingName { index })?;
                lines.push(to_line(name, positions, feature)?);
            }
            _ => match feature_name(feature) {
                Some(name) => {
                    return Err(GraphFormatError::InvalidGeometry {
                        feature: name,
                        reason: "only Point and LineString are supported"
                            .to_string(),
                    });
                }
                None => {
                    debug!("Skipping feature {index}, unsupported geometry")
                }
            },
        }
    }

    Ok((nodes, lines))
}

/// Find the placemark a line endpoint belongs to, either by name or by
/// proximity
fn resolve_endpoint(
    graph: &GeoGraph,
    line: &LineFeature,
    by_name: &Option<String>,
    coord: &TrackPoint,
    tolerance: f64,
) -> Result<GraphNode, GraphFormatError> {
    match by_name {
        Some(name) => graph.node(name).cloned().ok_or_else(|| {
            GraphFormatError::UnknownPlacemark {
                line: line.name.clone(),
                placemark: name.clone(),
            }
        }),
        None => match graph.nearest_node(coord.to_point()) {
            Some((node, dist)) if dist <= tolerance => Ok(node.clone()),
            _ => Err(GraphFormatError::UnmatchedEndpoint {
                line: line.name.clone(),
            }),
        },
    }
}

fn resolve_line(
    graph: &GeoGraph,
    line: LineFeature,
    tolerance: f64,
) -> Result<ResolvedLine, GraphFormatError> {
    // Lines always have at least 2 points by this point
    let first = line.coords[0];
    let last = line.coords[line.coords.len() - 1];

    let src = resolve_endpoint(graph, &line, &line.from, &first, tolerance)?;
    let dst = resolve_endpoint(graph, &line, &line.to, &last, tolerance)?;

    Ok(ResolvedLine { line, src, dst })
}

/// Snap the ends of the line onto its placemarks, so that consecutive edges
/// share exactly the same point, and fill in any missing altitudes by
/// carrying the last known altitude forward
fn prepare_points(resolved: &ResolvedLine) -> Vec<TrackPoint> {
    let mut points = resolved.line.coords.clone();
    let last_inx = points.len() - 1;

    points[0] = resolved.src.position();
    points[last_inx] = resolved.dst.position();

    let mut last_alt = resolved.src.elevation;
    for point in points.iter_mut() {
        match point.alt {
            Some(alt) => last_alt = alt,
            None => point.alt = Some(last_alt),
        }
    }

    points
}

/// Generate the edges for a single line. Two-way lines produce an edge in
/// each direction, each with its own duration
fn build_edges(resolved: ResolvedLine, speed: &SpeedModel) -> Vec<GraphEdge> {
    let points = prepare_points(&resolved);
    let forward = GraphEdge::from_points(
        &resolved.line.name,
        &resolved.src.id,
        &resolved.dst.id,
        points,
        speed,
    );

    if resolved.line.oneway {
        vec![forward]
    } else {
        let reverse_id = format!("{}{REVERSE_SUFFIX}", resolved.line.name);
        let backward = forward.reversed(&reverse_id, speed);
        vec![forward, backward]
    }
}

/// Parse a GeoJSON document from the provided reader and build the path
/// network from it
pub fn load_graph<R: Read>(
    mut reader: R,
    options: &LoadOptions,
) -> Result<GeoGraph, GraphFormatError> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;

    let geojson: GeoJson = text
        .parse()
        .map_err(|err: geojson::Error| {
            GraphFormatError::Malformed(err.to_string())
        })?;

    let collection = match geojson {
        GeoJson::FeatureCollection(collection) => collection,
        _ => {
            return Err(GraphFormatError::Malformed(
                "expected a FeatureCollection".to_string(),
            ));
        }
    };

    let (nodes, lines) = split_features(&collection.features)?;
    if nodes.is_empty() || lines.is_empty() {
        return Err(GraphFormatError::Empty);
    }

    let mut graph = GeoGraph::new();
    for node in nodes {
        graph.add_node(node)?;
    }

    let resolved = lines
        .into_iter()
        .map(|line| resolve_line(&graph, line, options.match_tolerance_m))
        .collect::<Result<Vec<ResolvedLine>, GraphFormatError>>()?;

    // Lines are independent of each other
    let edges: Vec<Vec<GraphEdge>> = resolved
        .into_par_iter()
        .map(|line| build_edges(line, &options.speed))
        .collect();

    for edge in edges.into_iter().flatten() {
        graph.add_edge(edge)?;
    }

    info!(
        "Loaded path network with {} nodes and {} edges",
        graph.node_count(),
        graph.edge_count()
    );

    Ok(graph)
}

/// Read the path network from a file on disk
pub fn load_graph_from_path(
    path: &Path,
    options: &LoadOptions,
) -> Result<GeoGraph, GraphFormatError> {
    let file = File::open(path).map_err(|err| {
        GraphFormatError::Io(format!("{}: {err}", path.display()))
    })?;
    load_graph(BufReader::new(file), options)
}
