//! Read-only directed graph view over canvas nodes and edges.
//!
//! Wraps the editor's node/edge lists in a petgraph structure for
//! traversal. Edges pointing at unknown nodes are dropped and duplicate
//! node ids keep their first occurrence, since canvas state may be shaped
//! arbitrarily by the user.

use std::collections::HashMap;

use petgraph::{
    Direction,
    algo::is_cyclic_directed,
    graph::{DiGraph, EdgeIndex, NodeIndex},
    visit::EdgeRef,
};
use tracing::debug;

use crate::model::{FlowEdge, FlowNode};

pub struct FlowGraph<'a> {
    graph: DiGraph<&'a FlowNode, &'a FlowEdge>,
    index: HashMap<&'a str, NodeIndex>,
}

impl<'a> FlowGraph<'a> {
    pub fn new(
        nodes: &'a [FlowNode],
        edges: &'a [FlowEdge],
    ) -> Self {
        let mut graph = DiGraph::with_capacity(nodes.len(), edges.len());
        let mut index = HashMap::new();

        for node in nodes {
            if index.contains_key(node.id.as_str()) {
                debug!(node_id = %node.id, "duplicate node id ignored");
                continue;
            }
            let idx = graph.add_node(node);
            index.insert(node.id.as_str(), idx);
        }
        for edge in edges {
            match (index.get(edge.source.as_str()), index.get(edge.target.as_str())) {
                (Some(source), Some(target)) => {
                    graph.add_edge(*source, *target, edge);
                }
                _ => debug!(edge_id = %edge.id, "edge with unknown endpoint ignored"),
            }
        }

        Self {
            graph,
            index,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Nodes without incoming edges, in input order.
    pub fn roots(&self) -> Vec<&'a FlowNode> {
        self.graph.node_indices().filter(|idx| self.graph.neighbors_directed(*idx, Direction::Incoming).next().is_none()).map(|idx| self.graph[idx]).collect()
    }

    /// All nodes, in input order.
    pub fn nodes(&self) -> Vec<&'a FlowNode> {
        self.graph.node_indices().map(|idx| self.graph[idx]).collect()
    }

    /// Outgoing edges of a node with their targets, in edge input order.
    pub fn successors(
        &self,
        id: &str,
    ) -> Vec<(&'a FlowNode, &'a FlowEdge)> {
        self.directed(id, Direction::Outgoing).into_iter().map(|(_, target, edge)| (self.graph[target], edge)).collect()
    }

    /// First incoming edge of a node, in edge input order.
    pub fn incoming(
        &self,
        id: &str,
    ) -> Option<&'a FlowEdge> {
        self.directed(id, Direction::Incoming).into_iter().next().map(|(_, _, edge)| edge)
    }

    pub fn has_cycle(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    fn directed(
        &self,
        id: &str,
        direction: Direction,
    ) -> Vec<(EdgeIndex, NodeIndex, &'a FlowEdge)> {
        let Some(idx) = self.index.get(id) else {
            return Vec::new();
        };
        // petgraph walks adjacency newest-first; edge indices follow insertion order
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(*idx, direction)
            .map(|e| {
                let other = match direction {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                (e.id(), other, *e.weight())
            })
            .collect();
        edges.sort_by_key(|(edge_idx, _, _)| edge_idx.index());
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeData, NodeKind};

    fn node(id: &str) -> FlowNode {
        FlowNode {
            id: id.to_string(),
            kind: NodeKind::Step,
            data: NodeData {
                name: id.to_uppercase(),
                ..NodeData::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_successors_keep_edge_order() {
        let nodes = vec![node("a"), node("b"), node("c"), node("d")];
        let edges = vec![FlowEdge::new("a", "c"), FlowEdge::new("a", "b"), FlowEdge::new("a", "d")];
        let graph = FlowGraph::new(&nodes, &edges);
        let ids: Vec<_> = graph.successors("a").into_iter().map(|(n, _)| n.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "d"]);
    }

    #[test]
    fn test_roots_and_dangling_edges() {
        let nodes = vec![node("a"), node("b"), node("z")];
        let edges = vec![FlowEdge::new("a", "b"), FlowEdge::new("ghost", "z")];
        let graph = FlowGraph::new(&nodes, &edges);
        assert_eq!(graph.edge_count(), 1);
        let roots: Vec<_> = graph.roots().into_iter().map(|n| n.id.as_str()).collect();
        assert_eq!(roots, vec!["a", "z"]);
        assert_eq!(graph.incoming("b").map(|e| e.source.as_str()), Some("a"));
        assert!(graph.incoming("a").is_none());
    }

    #[test]
    fn test_cycle_detection() {
        let nodes = vec![node("a"), node("b")];
        let edges = vec![FlowEdge::new("a", "b"), FlowEdge::new("b", "a")];
        let graph = FlowGraph::new(&nodes, &edges);
        assert!(graph.has_cycle());
        assert!(graph.roots().is_empty());
    }
}
