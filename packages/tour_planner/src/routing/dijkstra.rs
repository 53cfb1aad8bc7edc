//! Shortest path search over the path network. Paths are ranked by their
//! estimated duration, with ties broken by the shorter distance.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use petgraph::graph::{EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::common::graph_data::GraphEdge;
use crate::error::PathError;
use crate::loading::petgraph::GeoGraph;

/// The result of a search. `nodes` runs from the source to the destination
/// inclusive, and `edges` holds the edge taken between each pair of nodes
#[derive(Debug, Clone, PartialEq)]
pub struct GraphPath {
    pub nodes: Vec<String>,
    pub edges: Vec<String>,
    pub distance: f64,
    pub duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct Cost {
    duration: f64,
    distance: f64,
}

impl Cost {
    fn add(&self, edge: &GraphEdge) -> Cost {
        Cost {
            duration: self.duration + edge.duration,
            distance: self.distance + edge.distance,
        }
    }

    fn compare(&self, other: &Cost) -> Ordering {
        self.duration
            .total_cmp(&other.duration)
            .then_with(|| self.distance.total_cmp(&other.distance))
    }
}

/// An entry in the search queue. Ordering is reversed so that the
/// BinaryHeap pops the cheapest entry first, and on equal cost the entry
/// with the smaller node id
#[derive(Debug)]
struct State<'a> {
    cost: Cost,
    node: NodeIndex,
    id: &'a str,
}

impl Ord for State<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .compare(&self.cost)
            .then_with(|| other.id.cmp(self.id))
    }
}

impl PartialOrd for State<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for State<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for State<'_> {}

/// Best known way to reach a node
#[derive(Debug, Clone, Copy)]
struct Label {
    cost: Cost,
    via: Option<(NodeIndex, EdgeIndex)>,
}

/// When two ways of reaching a node cost exactly the same, prefer the one
/// arriving from the node with the smaller id, then the edge with the
/// smaller id
fn prefer_candidate(
    graph: &GeoGraph,
    candidate: (NodeIndex, EdgeIndex),
    current: Option<(NodeIndex, EdgeIndex)>,
) -> bool {
    let (cand_node, cand_edge) = candidate;
    let (cur_node, cur_edge) = match current {
        Some(via) => via,
        None => return false,
    };

    let node_id = |inx| graph.node_at(inx).map(|node| node.id.as_str());
    let edge_id = |inx| graph.edge_at(inx).map(|edge| edge.id.as_str());

    let candidate_key = (node_id(cand_node), edge_id(cand_edge));
    let current_key = (node_id(cur_node), edge_id(cur_edge));
    candidate_key < current_key
}

/// Follow the labels back from the destination to build the path
fn reconstruct(
    graph: &GeoGraph,
    labels: &FxHashMap<NodeIndex, Label>,
    dst: NodeIndex,
) -> Option<GraphPath> {
    let target = labels.get(&dst)?;

    let mut nodes = vec![graph.node_at(dst)?.id.clone()];
    let mut edges = Vec::<String>::new();

    let mut via = target.via;
    while let Some((prev, edge)) = via {
        edges.push(graph.edge_at(edge)?.id.clone());
        nodes.push(graph.node_at(prev)?.id.clone());
        via = labels.get(&prev)?.via;
    }

    nodes.reverse();
    edges.reverse();

    Some(GraphPath {
        nodes,
        edges,
        distance: target.cost.distance,
        duration: target.cost.duration,
    })
}

/// Find the quickest path between two nodes. The search is deterministic:
/// the same graph and endpoints always give back the same path, even when
/// several paths have the same cost
pub fn find_path(
    graph: &GeoGraph,
    source: &str,
    destination: &str,
) -> Result<GraphPath, PathError> {
    let src = graph
        .node_index(source)
        .ok_or_else(|| PathError::UnknownNode(source.to_string()))?;
    let dst = graph
        .node_index(destination)
        .ok_or_else(|| PathError::UnknownNode(destination.to_string()))?;

    let no_path = || PathError::NoPath {
        from: source.to_string(),
        to: destination.to_string(),
    };

    if src == dst {
        return Ok(GraphPath {
            nodes: vec![source.to_string()],
            edges: Vec::new(),
            distance: 0.0,
            duration: 0.0,
        });
    }

    let mut labels = FxHashMap::<NodeIndex, Label>::default();
    let mut settled = FxHashSet::<NodeIndex>::default();
    let mut heap = BinaryHeap::new();

    labels.insert(
        src,
        Label {
            cost: Cost::default(),
            via: None,
        },
    );
    heap.push(State {
        cost: Cost::default(),
        node: src,
        id: source,
    });

    while let Some(State { cost, node, .. }) = heap.pop() {
        if !settled.insert(node) {
            continue;
        }
        if node == dst {
            break;
        }

        for eref in graph.outgoing(node) {
            let next = eref.target();
            if settled.contains(&next) {
                continue;
            }

            let next_cost = cost.add(eref.weight());
            let candidate = (node, eref.id());

            let improves = match labels.get(&next) {
                None => true,
                Some(label) => match next_cost.compare(&label.cost) {
                    Ordering::Less => true,
                    Ordering::Equal => {
                        prefer_candidate(graph, candidate, label.via)
                    }
                    Ordering::Greater => false,
                },
            };

            if improves {
                labels.insert(
                    next,
                    Label {
                        cost: next_cost,
                        via: Some(candidate),
                    },
                );
                heap.push(State {
                    cost: next_cost,
                    node: next,
                    id: &eref.weight().dst,
                });
            }
        }
    }

    if !settled.contains(&dst) {
        return Err(no_path());
    }

    reconstruct(graph, &labels, dst).ok_or_else(no_path)
}
