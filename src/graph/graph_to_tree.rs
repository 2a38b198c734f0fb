//! Canvas graph to step tree conversion.
//!
//! The result is always in flat form: a chain of step nodes becomes a run of
//! siblings, the condition successors of a step become the condition group
//! that directly follows it, and a branch's body becomes the children of its
//! condition step. When a step forks into several step successors, the last
//! one (by edge order) continues the sibling run and the others are nested
//! under the step as child chains.
//!
//! Graphs shaped by hand are converted leniently. Without a single root the
//! result is empty; nodes reached twice (cycles, merges) are emitted once and
//! nodes unreachable from the root are dropped. Branches are emitted as
//! `if`, `elseif`s, `else` whatever order their edges were drawn in, and a
//! group that is still malformed is repaired rather than rejected.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::{
    graph::FlowGraph,
    model::{ConditionKind, ConditionalStep, Conditions, FlowEdge, FlowNode, NodeKind, StepType, condition_groups, renumber},
};

/// Rebuilds the step tree from canvas nodes and edges.
pub fn graph_to_tree(
    nodes: &[FlowNode],
    edges: &[FlowEdge],
) -> Vec<ConditionalStep> {
    let graph = FlowGraph::new(nodes, edges);
    let roots = graph.roots();
    if roots.len() != 1 {
        warn!(roots = roots.len(), node_count = graph.node_count(), edge_count = graph.edge_count(), "graph has no unique root, nothing converted");
        return Vec::new();
    }
    if graph.has_cycle() {
        debug!("graph contains a cycle, converting best effort");
    }

    let mut builder = TreeBuilder {
        graph: &graph,
        visited: HashSet::new(),
    };
    let mut steps = builder.sequence(roots[0], None);

    if builder.visited.len() < graph.node_count() {
        debug!(dropped = graph.node_count() - builder.visited.len(), "nodes unreachable from root dropped");
    }

    repair_groups(&mut steps);
    renumber(&mut steps);
    steps
}

/// Position of a branch kind inside its group.
fn rank(kind: ConditionKind) -> u8 {
    match kind {
        ConditionKind::If => 0,
        ConditionKind::Elseif => 1,
        ConditionKind::Else => 2,
    }
}

/// Branch kind of a condition node: edge label first, then node data.
fn branch_kind(
    node: &FlowNode,
    via: Option<&FlowEdge>,
) -> ConditionKind {
    via.and_then(|e| e.label.as_deref()).and_then(ConditionKind::from_label).or(node.data.condition_type).unwrap_or_default()
}

/// Makes every condition group start with one `if` and end with at most one
/// `else`; surplus branches become `elseif`.
fn repair_groups(steps: &mut [ConditionalStep]) {
    for group in condition_groups(steps) {
        let last = group.end - 1;
        for i in group.clone() {
            let kind = steps[i].condition_kind().unwrap_or_default();
            let repaired = match kind {
                _ if i == group.start => ConditionKind::If,
                ConditionKind::If => ConditionKind::Elseif,
                ConditionKind::Else if i != last => ConditionKind::Elseif,
                kind => kind,
            };
            if repaired != kind {
                debug!(step_id = %steps[i].id, from = kind.as_ref(), to = repaired.as_ref(), "condition branch repaired");
                set_kind(&mut steps[i], repaired);
            }
        }
    }
    for step in steps {
        repair_groups(&mut step.children);
    }
}

fn set_kind(
    step: &mut ConditionalStep,
    kind: ConditionKind,
) {
    let previous = step.condition_kind().unwrap_or_default();
    if step.name == previous.display_name() {
        step.name = kind.display_name().to_string();
    }
    let expression = step.expression().map(str::to_string);
    step.conditions = Some(Conditions {
        kind,
        expression,
    });
}

struct TreeBuilder<'g, 'a> {
    graph: &'g FlowGraph<'a>,
    visited: HashSet<&'a str>,
}

impl<'a> TreeBuilder<'_, 'a> {
    /// Converts the chain starting at `start` into a run of siblings.
    fn sequence(
        &mut self,
        start: &'a FlowNode,
        via: Option<&'a FlowEdge>,
    ) -> Vec<ConditionalStep> {
        let mut out = Vec::new();

        if start.kind == NodeKind::Condition {
            out.extend(self.branch(start, via));
            return out;
        }

        let mut current = Some(start);
        while let Some(node) = current.take() {
            if !self.visited.insert(node.id.as_str()) {
                break;
            }

            let mut step = step_from_node(node);
            let (mut conditions, others): (Vec<_>, Vec<_>) = self.graph.successors(&node.id).into_iter().partition(|(target, _)| target.kind == NodeKind::Condition);
            conditions.sort_by_key(|(target, edge)| rank(branch_kind(target, Some(*edge))));

            if let Some(((next, _), forks)) = others.split_last() {
                for (target, edge) in forks {
                    let chain = self.sequence(*target, Some(*edge));
                    step.children.extend(chain);
                }
                current = Some(*next);
            }

            out.push(step);
            for (target, edge) in conditions {
                out.extend(self.branch(target, Some(edge)));
            }
        }

        out
    }

    /// Converts a condition node and the body hanging off it.
    fn branch(
        &mut self,
        node: &'a FlowNode,
        via: Option<&'a FlowEdge>,
    ) -> Option<ConditionalStep> {
        if !self.visited.insert(node.id.as_str()) {
            return None;
        }

        let kind = branch_kind(node, via.or_else(|| self.graph.incoming(&node.id)));

        let mut step = step_from_node(node);
        step.step_type = StepType::Condition;
        step.conditions = Some(Conditions {
            kind,
            expression: match kind {
                ConditionKind::Else => None,
                _ => node.data.expression.clone(),
            },
        });
        if step.name.is_empty() {
            step.name = kind.display_name().to_string();
        }

        let (mut conditions, others): (Vec<_>, Vec<_>) = self.graph.successors(&node.id).into_iter().partition(|(target, _)| target.kind == NodeKind::Condition);
        conditions.sort_by_key(|(target, edge)| rank(branch_kind(target, Some(*edge))));
        for (target, edge) in conditions {
            step.children.extend(self.branch(target, Some(edge)));
        }
        for (target, edge) in others {
            let chain = self.sequence(target, Some(edge));
            step.children.extend(chain);
        }

        Some(step)
    }
}

fn step_from_node(node: &FlowNode) -> ConditionalStep {
    let step_type = match node.data.step_type {
        Some(StepType::Sequence) => StepType::Sequence,
        _ => StepType::Instruction,
    };

    ConditionalStep {
        step_type,
        description: node.data.description.clone(),
        config: node.data.config.clone(),
        enabled: node.data.enabled,
        has_issues: node.data.has_issues.then_some(true),
        ..ConditionalStep::instruction(node.id.clone(), node.data.name.clone())
    }
}
