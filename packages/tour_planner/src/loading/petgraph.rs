use crate::common::graph_data::{GraphEdge, GraphNode};
use crate::error::GraphFormatError;
use geo::{Distance, Haversine, Point};
use petgraph::graph::{EdgeIndex, EdgeReference, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Graph};
use rustc_hash::FxHashMap;

/// The path network. Nodes and edges are held in a petgraph arena, with
/// lookup tables from the string identifiers used by callers to their
/// indexes. Outgoing edges for each node are tracked by petgraph itself, so
/// the adjacency index is always exactly the set of edges in the graph.
///
/// Once built, the graph is only ever read; it is shared between requests
/// behind an Arc.
#[derive(Debug, Default, Clone)]
pub struct GeoGraph {
    graph: Graph<GraphNode, GraphEdge, Directed, u32>,
    node_ids: FxHashMap<String, NodeIndex>,
    edge_ids: FxHashMap<String, EdgeIndex>,
}

impl GeoGraph {
    pub fn new() -> GeoGraph {
        GeoGraph::default()
    }

    /// Add a placemark to the graph. Node identifiers must be unique
    pub fn add_node(
        &mut self,
        node: GraphNode,
    ) -> Result<NodeIndex, GraphFormatError> {
        if self.node_ids.contains_key(&node.id) {
            return Err(GraphFormatError::DuplicatePlacemark { name: node.id });
        }

        let id = node.id.clone();
        let inx = self.graph.add_node(node);
        self.node_ids.insert(id, inx);
        Ok(inx)
    }

    /// Add a path segment to the graph. Both endpoints must already have been
    /// added as nodes
    pub fn add_edge(
        &mut self,
        edge: GraphEdge,
    ) -> Result<EdgeIndex, GraphFormatError> {
        if self.edge_ids.contains_key(&edge.id) {
            return Err(GraphFormatError::DuplicateLine { name: edge.id });
        }

        let src_inx = self.lookup_endpoint(&edge, &edge.src)?;
        let dst_inx = self.lookup_endpoint(&edge, &edge.dst)?;

        let id = edge.id.clone();
        let inx = self.graph.add_edge(src_inx, dst_inx, edge);
        self.edge_ids.insert(id, inx);
        Ok(inx)
    }

    fn lookup_endpoint(
        &self,
        edge: &GraphEdge,
        node_id: &str,
    ) -> Result<NodeIndex, GraphFormatError> {
        self.node_index(node_id)
            .ok_or_else(|| GraphFormatError::UnknownPlacemark {
                line: edge.id.clone(),
                placemark: node_id.to_string(),
            })
    }

    pub fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.node_ids.get(id).copied()
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.node_index(id)
            .and_then(|inx| self.graph.node_weight(inx))
    }

    pub fn edge(&self, id: &str) -> Option<&GraphEdge> {
        self.edge_ids
            .get(id)
            .and_then(|inx| self.graph.edge_weight(*inx))
    }

    /// Retrieve a node by index. Indexes are only handed out by this graph,
    /// so a missing node means the index came from somewhere else
    pub(crate) fn node_at(&self, inx: NodeIndex) -> Option<&GraphNode> {
        self.graph.node_weight(inx)
    }

    pub(crate) fn edge_at(&self, inx: EdgeIndex) -> Option<&GraphEdge> {
        self.graph.edge_weight(inx)
    }

    /// All edges leaving the provided node, ordered by the id of the node
    /// they lead to and then by their own id. The ordering keeps searches
    /// over the graph deterministic
    pub fn outgoing(
        &self,
        inx: NodeIndex,
    ) -> Vec<EdgeReference<'_, GraphEdge>> {
        let mut edges: Vec<EdgeReference<GraphEdge>> =
            self.graph.edges(inx).collect();
        edges.sort_by(|a, b| {
            a.weight()
                .dst
                .cmp(&b.weight().dst)
                .then_with(|| a.weight().id.cmp(&b.weight().id))
        });
        edges
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.graph.node_weights()
    }

    pub fn edges(&self) -> impl Iterator<Item = &GraphEdge> {
        self.graph.edge_weights()
    }

    /// Determine the closest node to the provided point, along with its
    /// distance in meters. Ties go to the node with the smaller id
    pub fn nearest_node(&self, point: Point) -> Option<(&GraphNode, f64)> {
        let mut closest: Option<(&GraphNode, f64)> = None;

        for node in self.graph.node_weights() {
            let node_coords: Point = (node.lon, node.lat).into();
            let dist = Haversine::distance(point, node_coords);

            closest = match closest {
                Some((best, best_dist))
                    if best_dist < dist
                        || (best_dist == dist && best.id <= node.id) =>
                {
                    Some((best, best_dist))
                }
                _ => Some((node, dist)),
            };
        }

        closest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::tour::TrackPoint;

    fn get_test_edge(id: &str, src: &str, dst: &str) -> GraphEdge {
        GraphEdge {
            id: id.to_string(),
            src: src.to_string(),
            dst: dst.to_string(),
            points: vec![TrackPoint::new(0.0, 0.0, None)],
            distance: 1.0,
            duration: 1.0,
            ..Default::default()
        }
    }

    fn get_test_graph() -> GeoGraph {
        let mut graph = GeoGraph::new();
        graph.add_node(GraphNode::new("a", 0.0, 0.0, 0.0)).unwrap();
        graph.add_node(GraphNode::new("b", 0.0, 1.0, 0.0)).unwrap();
        graph.add_node(GraphNode::new("c", 0.0, 2.0, 0.0)).unwrap();
        graph
    }

    mod test_add {
        use super::*;

        #[test]
        fn test_add_edge_ok() {
            let mut graph = get_test_graph();

            graph.add_edge(get_test_edge("ab", "a", "b")).unwrap();

            assert_eq!(graph.edge_count(), 1);
            assert_eq!(graph.edge("ab").unwrap().dst, "b");
        }

        /// An edge pointing at a node which doesn't exist must be rejected,
        /// and must not leave anything behind in the graph
        #[test]
        fn test_add_edge_unknown_node() {
            let mut graph = get_test_graph();

            let result = graph.add_edge(get_test_edge("ax", "a", "x"));

            assert_eq!(
                result,
                Err(GraphFormatError::UnknownPlacemark {
                    line: "ax".to_string(),
                    placemark: "x".to_string()
                })
            );
            assert_eq!(graph.edge_count(), 0);
            assert!(graph.edge("ax").is_none());
        }

        #[test]
        fn test_add_duplicate_node() {
            let mut graph = get_test_graph();

            let result = graph.add_node(GraphNode::new("a", 1.0, 1.0, 0.0));

            assert!(matches!(
                result,
                Err(GraphFormatError::DuplicatePlacemark { .. })
            ));
            assert_eq!(graph.node_count(), 3);
        }

        #[test]
        fn test_add_duplicate_edge() {
            let mut graph = get_test_graph();
            graph.add_edge(get_test_edge("ab", "a", "b")).unwrap();

            let result = graph.add_edge(get_test_edge("ab", "b", "c"));

            assert!(matches!(
                result,
                Err(GraphFormatError::DuplicateLine { .. })
            ));
        }
    }

    /// Outgoing edges should come back sorted by target id, regardless of
    /// the order in which they were added
    #[test]
    fn test_outgoing_order() {
        let mut graph = get_test_graph();
        graph.add_edge(get_test_edge("to_c", "a", "c")).unwrap();
        graph.add_edge(get_test_edge("to_b_2", "a", "b")).unwrap();
        graph.add_edge(get_test_edge("to_b_1", "a", "b")).unwrap();
        graph.add_edge(get_test_edge("ba", "b", "a")).unwrap();

        let inx = graph.node_index("a").unwrap();
        let result: Vec<&str> = graph
            .outgoing(inx)
            .iter()
            .map(|eref| eref.weight().id.as_str())
            .collect();

        assert_eq!(result, vec!["to_b_1", "to_b_2", "to_c"]);
    }

    /// Adjacency is derived from the edges, so every outgoing edge must
    /// start at the node it is listed against
    #[test]
    fn test_adjacency_matches_edges() {
        let mut graph = get_test_graph();
        graph.add_edge(get_test_edge("ab", "a", "b")).unwrap();
        graph.add_edge(get_test_edge("bc", "b", "c")).unwrap();
        graph.add_edge(get_test_edge("cb", "c", "b")).unwrap();

        let mut listed = 0;
        for node in graph.nodes() {
            let inx = graph.node_index(&node.id).unwrap();
            for eref in graph.outgoing(inx) {
                assert_eq!(eref.weight().src, node.id);
                listed += 1;
            }
        }

        assert_eq!(listed, graph.edge_count());
    }

    #[test]
    fn test_nearest_node() {
        let graph = get_test_graph();

        let (node, dist) = graph.nearest_node(Point::new(1.1, 0.0)).unwrap();

        assert_eq!(node.id, "b");
        assert!(dist > 11_000.0 && dist < 11_200.0);
    }

    #[test]
    fn test_nearest_node_empty() {
        let graph = GeoGraph::new();

        assert!(graph.nearest_node(Point::new(0.0, 0.0)).is_none());
    }
}
