//! Step tree to canvas graph conversion.
//!
//! Steps of one sequence are laid out top to bottom. A maximal run of
//! sibling condition steps becomes one branch group: all of its branch nodes
//! share a y level, are spread horizontally around the parent's x, and are
//! each connected from the parent with an edge labelled by the branch kind.
//! Branches are disjoint subtrees; no edge ever crosses between them.

use std::collections::HashSet;

use crate::{
    LayoutConfig,
    model::{ConditionalStep, FlowEdge, FlowNode, GraphModel, NodeData, NodeKind, Position, StepType},
    utils,
};

/// edge type used for every generated edge
pub const EDGE_TYPE: &str = "smoothstep";

/// Renders a step tree as canvas nodes and edges.
pub fn tree_to_graph(
    steps: &[ConditionalStep],
    layout: &LayoutConfig,
) -> GraphModel {
    let mut builder = GraphBuilder {
        layout,
        graph: GraphModel::default(),
        used_ids: HashSet::new(),
    };
    builder.sequence(steps, None, layout.origin_x, layout.origin_y);
    builder.graph
}

struct GraphBuilder<'a> {
    layout: &'a LayoutConfig,
    graph: GraphModel,
    used_ids: HashSet<String>,
}

impl GraphBuilder<'_> {
    /// Emits one sequence hanging off `parent`. Returns the next free y below it.
    fn sequence(
        &mut self,
        steps: &[ConditionalStep],
        parent: Option<&str>,
        x: f64,
        y: f64,
    ) -> f64 {
        let mut prev = parent.map(str::to_string);
        let mut y = y;
        let mut i = 0;

        while i < steps.len() {
            if steps[i].is_condition() {
                let start = i;
                while i < steps.len() && steps[i].is_condition() {
                    i += 1;
                }
                // the next step after a group still hangs off the node the group branches from
                y = self.branch_group(&steps[start..i], prev.as_deref(), x, y);
                continue;
            }

            let step = &steps[i];
            let id = self.node(step, NodeKind::Step, x, y);
            if let Some(p) = &prev {
                self.edge(FlowEdge::new(p.as_str(), id.as_str()));
            }

            y += self.layout.vertical_spacing;
            if !step.children.is_empty() {
                y = self.sequence(&step.children, Some(&id), x, y);
            }

            prev = Some(id);
            i += 1;
        }

        y
    }

    /// Emits a branch group on one y level. Returns the next free y below the deepest branch.
    fn branch_group(
        &mut self,
        branches: &[ConditionalStep],
        parent: Option<&str>,
        x: f64,
        y: f64,
    ) -> f64 {
        let spacing = self.layout.horizontal_spacing;
        let first_x = x - (branches.len() as f64 - 1.0) * spacing / 2.0;
        let mut bottom = y + self.layout.vertical_spacing;

        for (i, branch) in branches.iter().enumerate() {
            let branch_x = first_x + i as f64 * spacing;
            let id = self.node(branch, NodeKind::Condition, branch_x, y);

            if let Some(p) = parent {
                let label = branch.condition_kind().unwrap_or_default().label();
                self.edge(FlowEdge::new(p, id.as_str()).with_label(label));
            }

            let branch_bottom = self.sequence(&branch.children, Some(&id), branch_x, y + self.layout.vertical_spacing);
            bottom = bottom.max(branch_bottom);
        }

        bottom
    }

    fn node(
        &mut self,
        step: &ConditionalStep,
        kind: NodeKind,
        x: f64,
        y: f64,
    ) -> String {
        let id = if step.id.is_empty() || self.used_ids.contains(&step.id) {
            utils::shortid()
        } else {
            step.id.clone()
        };
        self.used_ids.insert(id.clone());

        let step_type = match step.step_type {
            StepType::Condition => None,
            other => Some(other),
        };

        self.graph.nodes.push(FlowNode {
            id: id.clone(),
            kind,
            position: Position::new(x, y),
            data: NodeData {
                name: step.name.clone(),
                description: step.description.clone(),
                step_type,
                condition_type: step.condition_kind(),
                expression: step.expression().map(str::to_string),
                config: step.config.clone(),
                enabled: step.enabled,
                has_issues: step.has_issues.unwrap_or(false),
            },
        });
        id
    }

    fn edge(
        &mut self,
        mut edge: FlowEdge,
    ) {
        edge.edge_type = Some(EDGE_TYPE.to_string());
        self.graph.edges.push(edge);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConditionKind;

    fn layout() -> LayoutConfig {
        LayoutConfig::default()
    }

    fn pos(
        graph: &GraphModel,
        id: &str,
    ) -> Position {
        graph.node(id).map(|n| n.position).unwrap()
    }

    #[test]
    fn test_linear_workflow() {
        let steps = vec![ConditionalStep::instruction("a", "A"), ConditionalStep::instruction("b", "B")];
        let graph = tree_to_graph(&steps, &layout());

        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!((graph.edges[0].source.as_str(), graph.edges[0].target.as_str()), ("a", "b"));
        assert_eq!(graph.edges[0].label, None);
        assert_eq!(pos(&graph, "a").y, 0.0);
        assert_eq!(pos(&graph, "b").y, 120.0);
    }

    #[test]
    fn test_if_else_workflow() {
        let steps = vec![
            ConditionalStep::instruction("a", "A"),
            ConditionalStep::condition("c1", ConditionKind::If, Some("ok")).with_children(vec![ConditionalStep::instruction("x", "X")]),
            ConditionalStep::condition("c2", ConditionKind::Else, None),
        ];
        let graph = tree_to_graph(&steps, &layout());

        let mut ids: Vec<_> = graph.nodes.iter().map(|n| n.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "c1", "c2", "x"]);

        let edges: Vec<_> = graph.edges.iter().map(|e| (e.source.as_str(), e.target.as_str(), e.label.as_deref())).collect();
        assert_eq!(edges, vec![("a", "c1", Some("if")), ("c1", "x", None), ("a", "c2", Some("else"))]);
        assert_eq!(graph.edges_from("c2").count(), 0);
        assert_eq!(graph.node("c1").map(|n| n.kind), Some(NodeKind::Condition));
    }

    #[test]
    fn test_branch_group_shares_level() {
        let steps = vec![
            ConditionalStep::instruction("a", "A"),
            ConditionalStep::condition("c1", ConditionKind::If, Some("x > 1")),
            ConditionalStep::condition("c2", ConditionKind::Elseif, Some("x > 0")),
            ConditionalStep::condition("c3", ConditionKind::Else, None),
        ];
        let graph = tree_to_graph(&steps, &layout());

        let conditions: Vec<_> = graph.nodes.iter().filter(|n| n.kind == NodeKind::Condition).collect();
        assert_eq!(conditions.len(), 3);
        assert!(conditions.iter().all(|n| n.position.y == 120.0));
        assert_eq!(conditions.iter().map(|n| n.position.x).collect::<Vec<_>>(), vec![-300.0, 0.0, 300.0]);

        // all three hang off the parent, never off each other
        assert!(graph.edges.iter().all(|e| e.source == "a"));
        assert_eq!(graph.edges.iter().map(|e| e.label.as_deref().unwrap()).collect::<Vec<_>>(), vec!["if", "else if", "else"]);
    }

    #[test]
    fn test_step_after_group_hangs_off_branching_step() {
        let steps = vec![
            ConditionalStep::instruction("a", "A"),
            ConditionalStep::condition("c1", ConditionKind::If, Some("x")).with_children(vec![
                ConditionalStep::instruction("x1", "X1"),
                ConditionalStep::instruction("x2", "X2"),
            ]),
            ConditionalStep::condition("c2", ConditionKind::Else, None),
            ConditionalStep::instruction("d", "D"),
        ];
        let graph = tree_to_graph(&steps, &layout());

        assert!(graph.edges.iter().any(|e| e.source == "a" && e.target == "d"));
        // placed below the deepest branch
        assert_eq!(pos(&graph, "x2").y, 360.0);
        assert_eq!(pos(&graph, "d").y, 480.0);
    }

    #[test]
    fn test_nested_children_chain() {
        let steps = vec![ConditionalStep::instruction("a", "A").with_children(vec![
            ConditionalStep::instruction("b", "B"),
            ConditionalStep::instruction("c", "C"),
        ])];
        let graph = tree_to_graph(&steps, &layout());
        let edges: Vec<_> = graph.edges.iter().map(|e| (e.source.as_str(), e.target.as_str())).collect();
        assert_eq!(edges, vec![("a", "b"), ("b", "c")]);
    }

    #[test]
    fn test_duplicate_and_empty_ids_regenerated() {
        let steps = vec![ConditionalStep::instruction("a", "A"), ConditionalStep::instruction("a", "Again"), ConditionalStep::instruction("", "Anon")];
        let graph = tree_to_graph(&steps, &layout());
        let ids: HashSet<_> = graph.nodes.iter().map(|n| n.id.clone()).collect();
        assert_eq!(ids.len(), 3);
        assert!(!ids.contains(""));
    }

    #[test]
    fn test_empty_tree() {
        let graph = tree_to_graph(&[], &layout());
        assert!(graph.nodes.is_empty());
        assert!(graph.edges.is_empty());
    }
}
