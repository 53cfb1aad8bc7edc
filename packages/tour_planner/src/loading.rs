//! This module focuses on reading the path network from a GeoJSON file and
//! using it to generate a petgraph graph object, which is then shared
//! between requests.

pub mod geojson;
pub mod petgraph;
pub mod shared;
