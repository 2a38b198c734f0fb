//! Depth-based auto-layout for canvas nodes.
//!
//! Every node is placed purely from its breadth-first depth below the
//! roots and its rank among nodes of the same depth. Ranks within a level
//! follow the x of each node's parent, then input order, so repeated runs
//! over the same input always give the same positions.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::{
    LayoutConfig,
    graph::FlowGraph,
    model::{FlowEdge, FlowNode, Position},
};

/// Returns a copy of `nodes` with freshly computed positions.
pub fn layout_nodes(
    nodes: &[FlowNode],
    edges: &[FlowEdge],
    layout: &LayoutConfig,
) -> Vec<FlowNode> {
    let graph = FlowGraph::new(nodes, edges);

    // id -> (depth, bfs parent)
    let mut placed: HashMap<&str, (usize, Option<&str>)> = HashMap::new();
    let mut queue = VecDeque::new();

    let mut seeds: Vec<&FlowNode> = graph.roots();
    // nodes only reachable through a cycle get seeded in input order
    seeds.extend(graph.nodes());

    for seed in seeds {
        if placed.contains_key(seed.id.as_str()) {
            continue;
        }
        placed.insert(seed.id.as_str(), (0, None));
        queue.push_back(seed.id.as_str());

        while let Some(id) = queue.pop_front() {
            let depth = placed[id].0;
            for (target, _) in graph.successors(id) {
                if placed.contains_key(target.id.as_str()) {
                    continue;
                }
                placed.insert(target.id.as_str(), (depth + 1, Some(id)));
                queue.push_back(target.id.as_str());
            }
        }
    }

    let mut levels: Vec<Vec<(usize, &str)>> = Vec::new();
    for (order, node) in graph.nodes().into_iter().enumerate() {
        let depth = placed[node.id.as_str()].0;
        if levels.len() <= depth {
            levels.resize_with(depth + 1, Vec::new);
        }
        levels[depth].push((order, node.id.as_str()));
    }

    let mut positions: HashMap<&str, Position> = HashMap::new();
    for (depth, level) in levels.iter_mut().enumerate() {
        level.sort_by(|(a_order, a), (b_order, b)| {
            let a_parent = parent_x(&placed, &positions, a);
            let b_parent = parent_x(&placed, &positions, b);
            a_parent.total_cmp(&b_parent).then(a_order.cmp(b_order))
        });

        let first_x = layout.origin_x - (level.len() as f64 - 1.0) * layout.horizontal_spacing / 2.0;
        let y = layout.origin_y + depth as f64 * layout.vertical_spacing;
        for (rank, (_, id)) in level.iter().enumerate() {
            positions.insert(*id, Position::new(first_x + rank as f64 * layout.horizontal_spacing, y));
        }
    }

    let mut seen = HashSet::new();
    nodes
        .iter()
        .map(|node| {
            let mut node = node.clone();
            // duplicates of an id were ignored by the graph, keep them where they are
            if seen.insert(node.id.clone()) {
                if let Some(position) = positions.get(node.id.as_str()) {
                    node.position = *position;
                }
            }
            node
        })
        .collect()
}

fn parent_x(
    placed: &HashMap<&str, (usize, Option<&str>)>,
    positions: &HashMap<&str, Position>,
    id: &str,
) -> f64 {
    placed.get(id).and_then(|(_, parent)| *parent).and_then(|p| positions.get(p)).map(|p| p.x).unwrap_or(0.0)
}
