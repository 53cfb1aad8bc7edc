//! Finding paths through the graph, joining them into tours and handing off
//! anything the graph can't serve to an external directions service.

pub mod assembler;
pub mod dijkstra;
pub mod external;
pub mod planner;
