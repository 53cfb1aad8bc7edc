//! Error types for every stage of tour planning. Load-time problems with the
//! geodata are reported through GraphFormatError, per-request search failures
//! through PathError, upstream directions failures through
//! RoutingServiceError. PlanningError is what callers of the planner see.

use std::time::Duration;
use thiserror::Error;

/// Raised while building a graph from a geodata document. This is Clone so
/// that a single failed load can be reported to every request which needs
/// the graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphFormatError {
    #[error("Unable to read geodata: {0}")]
    Io(String),

    #[error("Geodata is not a valid feature collection: {0}")]
    Malformed(String),

    #[error("Line '{line}' references unknown placemark '{placemark}'")]
    UnknownPlacemark { line: String, placemark: String },

    #[error("Line '{line}' has an endpoint which matches no placemark")]
    UnmatchedEndpoint { line: String },

    #[error("Feature '{feature}' has invalid geometry: {reason}")]
    InvalidGeometry { feature: String, reason: String },

    #[error("Placemark '{name}' is defined more than once")]
    DuplicatePlacemark { name: String },

    #[error("Line '{name}' is defined more than once")]
    DuplicateLine { name: String },

    #[error("Feature at position {index} has no name")]
    MissingName { index: usize },

    #[error("Geodata contains no placemarks or no line geometries")]
    Empty,
}

impl From<std::io::Error> for GraphFormatError {
    fn from(err: std::io::Error) -> Self {
        GraphFormatError::Io(err.to_string())
    }
}

/// Raised by the shortest path search
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PathError {
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("No path from '{from}' to '{to}'")]
    NoPath { from: String, to: String },
}

/// Raised by the external directions client. Details from the upstream
/// service are kept so they can be shown to the caller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RoutingServiceError {
    #[error("Routing service did not respond within {0:?}")]
    Timeout(Duration),

    #[error("Request to routing service failed: {0}")]
    Request(String),

    #[error("Routing service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Unable to parse routing service response: {0}")]
    MalformedResponse(String),

    #[error("Invalid directions request: {0}")]
    MalformedRequest(String),
}

/// Everything which can go wrong while planning a single tour
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanningError {
    #[error("Invalid tour parameters: {0}")]
    InvalidParameters(String),

    #[error("Unknown waypoint: {0}")]
    UnknownNode(String),

    #[error("No path from '{from}' to '{to}'")]
    NoPath { from: String, to: String },

    #[error(transparent)]
    RoutingService(#[from] RoutingServiceError),

    #[error("Path network is unavailable: {0}")]
    GraphUnavailable(GraphFormatError),

    #[error("Internal planning failure: {0}")]
    Internal(String),
}

impl From<PathError> for PlanningError {
    fn from(err: PathError) -> Self {
        match err {
            PathError::UnknownNode(id) => PlanningError::UnknownNode(id),
            PathError::NoPath { from, to } => {
                PlanningError::NoPath { from, to }
            }
        }
    }
}
