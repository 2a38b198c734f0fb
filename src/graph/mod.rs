//! Conversions between the step tree and the canvas graph, plus auto-layout.

mod flow_graph;
mod graph_to_tree;
mod layout;
mod tree_to_graph;

pub use flow_graph::FlowGraph;
pub use graph_to_tree::graph_to_tree;
pub use layout::layout_nodes;
pub use tree_to_graph::{EDGE_TYPE, tree_to_graph};
