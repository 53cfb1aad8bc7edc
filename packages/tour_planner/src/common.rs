//! Types shared by every stage of planning: settings, request parameters,
//! graph contents and the tours which are returned.

pub mod config;
pub mod graph_data;
pub mod params;
pub mod tour;
