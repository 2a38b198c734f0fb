use std::collections::HashMap;

use tracing::{debug, info};

use crate::{
    FlowdeckError, LayoutConfig, Result,
    editor::{Autosave, EditCommand},
    graph::{graph_to_tree, layout_nodes, tree_to_graph},
    model::{ConditionalStep, FlowEdge, FlowNode, GraphModel, NodeId, Position, WorkflowDefinition, WorkflowModel, renumber, validate_steps},
    utils,
};

/// One open workflow in the visual builder.
///
/// The step tree is the only state that edits change. The canvas graph is
/// rendered from it after every structural edit and never written back.
/// Positions come from auto-layout, which runs when the session opens and
/// whenever the number of nodes changes; in between, nodes keep their
/// positions, including ones the user dragged.
pub struct BuilderSession {
    workflow: WorkflowModel,
    steps: Vec<ConditionalStep>,
    graph: GraphModel,
    positions: HashMap<NodeId, Position>,
    laid_out_count: Option<usize>,
    layout: LayoutConfig,
    autosave: Option<Autosave>,
}

impl BuilderSession {
    /// Opens a session on a step tree, rejecting malformed condition groups.
    pub fn new(
        workflow: WorkflowModel,
        steps: Vec<ConditionalStep>,
        layout: LayoutConfig,
    ) -> Result<Self> {
        validate_steps(&steps)?;
        let mut session = Self {
            workflow,
            steps,
            graph: GraphModel::default(),
            positions: HashMap::new(),
            laid_out_count: None,
            layout,
            autosave: None,
        };
        session.normalize();
        session.refresh();
        Ok(session)
    }

    /// Opens a stored workflow, recovering its tree from the saved graph.
    pub fn open(
        workflow: WorkflowModel,
        layout: LayoutConfig,
    ) -> Result<Self> {
        let steps = workflow.steps();
        Self::new(workflow, steps, layout)
    }

    pub fn with_autosave(
        mut self,
        autosave: Autosave,
    ) -> Self {
        self.autosave = Some(autosave);
        self
    }

    pub fn steps(&self) -> &[ConditionalStep] {
        &self.steps
    }

    pub fn graph(&self) -> &GraphModel {
        &self.graph
    }

    pub fn nodes(&self) -> &[FlowNode] {
        &self.graph.nodes
    }

    pub fn edges(&self) -> &[FlowEdge] {
        &self.graph.edges
    }

    /// Applies one edit. A rejected edit leaves the session untouched.
    pub fn apply(
        &mut self,
        command: EditCommand,
    ) -> Result<()> {
        if let EditCommand::MoveNode {
            id,
            position,
        } = &command
        {
            if self.graph.node(id).is_none() {
                return Err(FlowdeckError::Editor(format!("unknown node '{}'", id)));
            }
            self.positions.insert(id.clone(), *position);
            self.refresh();
            self.save();
            return Ok(());
        }

        let mut next = self.steps.clone();
        command.apply(&mut next)?;
        validate_steps(&next).map_err(|e| FlowdeckError::Editor(e.to_string()))?;

        self.steps = next;
        self.normalize();
        self.refresh();
        debug!(command = command.as_ref(), node_count = self.graph.nodes.len(), "edit applied");
        self.save();
        Ok(())
    }

    /// Replaces the tree with one recovered from an arbitrary graph.
    ///
    /// Conversion is lenient: unreachable nodes are dropped and a graph
    /// without a single root yields an empty tree.
    pub fn import_graph(
        &mut self,
        nodes: &[FlowNode],
        edges: &[FlowEdge],
    ) -> Result<()> {
        let steps = graph_to_tree(nodes, edges);
        validate_steps(&steps)?;
        info!(node_count = nodes.len(), step_count = steps.len(), "graph imported");

        self.steps = steps;
        // imported positions stand until the node count changes
        self.positions = nodes.iter().map(|n| (n.id.clone(), n.position)).collect();
        self.normalize();
        self.graph = tree_to_graph(&self.steps, &self.layout);
        self.laid_out_count = Some(self.graph.nodes.len());
        self.apply_positions();
        self.save();
        Ok(())
    }

    /// Re-runs auto-layout regardless of node count, dropping dragged positions.
    pub fn relayout(&mut self) {
        self.laid_out_count = None;
        self.refresh();
    }

    /// Persistable definition: the rendered graph plus workflow variables.
    pub fn definition(&self) -> WorkflowDefinition {
        WorkflowDefinition {
            nodes: self.graph.nodes.clone(),
            edges: self.graph.edges.clone(),
            variables: self.workflow.definition.variables.clone(),
        }
    }

    pub fn workflow(&self) -> WorkflowModel {
        WorkflowModel {
            definition: self.definition(),
            ..self.workflow.clone()
        }
    }

    fn normalize(&mut self) {
        fn assign_ids(steps: &mut [ConditionalStep]) {
            for step in steps {
                if step.id.is_empty() {
                    step.id = utils::step_id();
                }
                assign_ids(&mut step.children);
            }
        }
        assign_ids(&mut self.steps);
        renumber(&mut self.steps);
    }

    fn refresh(&mut self) {
        self.graph = tree_to_graph(&self.steps, &self.layout);

        let count = self.graph.nodes.len();
        if self.laid_out_count != Some(count) {
            debug!(node_count = count, "auto layout");
            self.graph.nodes = layout_nodes(&self.graph.nodes, &self.graph.edges, &self.layout);
            self.positions = self.graph.nodes.iter().map(|n| (n.id.clone(), n.position)).collect();
            self.laid_out_count = Some(count);
            return;
        }
        self.apply_positions();
    }

    fn apply_positions(&mut self) {
        for node in &mut self.graph.nodes {
            if let Some(position) = self.positions.get(&node.id) {
                node.position = *position;
            }
        }
    }

    fn save(&self) {
        if let Some(autosave) = &self.autosave {
            autosave.schedule(self.workflow());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        editor::StepPatch,
        model::{ConditionKind, NodeData, NodeKind},
    };

    fn session() -> BuilderSession {
        let steps = vec![ConditionalStep::instruction("a", "A"), ConditionalStep::instruction("b", "B")];
        let workflow = WorkflowModel {
            id: "w1".to_string(),
            name: "Flow".to_string(),
            ..Default::default()
        };
        BuilderSession::new(workflow, steps, LayoutConfig::default()).unwrap()
    }

    fn position(
        session: &BuilderSession,
        id: &str,
    ) -> Position {
        session.graph().node(id).map(|n| n.position).unwrap()
    }

    #[test]
    fn test_graph_follows_tree() {
        let mut session = session();
        assert_eq!(session.nodes().len(), 2);

        session
            .apply(EditCommand::InsertConditional {
                after: "a".to_string(),
                expression: Some("ok".to_string()),
            })
            .unwrap();
        assert_eq!(session.nodes().len(), 4);
        assert_eq!(session.nodes().iter().filter(|n| n.kind == NodeKind::Condition).count(), 2);
        assert_eq!(session.steps().iter().map(|s| s.order).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_drag_survives_non_structural_count() {
        let mut session = session();
        session
            .apply(EditCommand::MoveNode {
                id: "b".to_string(),
                position: Position::new(40.0, 500.0),
            })
            .unwrap();
        assert_eq!(position(&session, "b"), Position::new(40.0, 500.0));

        // renaming keeps the node count, so no relayout
        session
            .apply(EditCommand::UpdateStep {
                id: "a".to_string(),
                patch: StepPatch {
                    name: Some("Start".to_string()),
                    ..Default::default()
                },
            })
            .unwrap();
        assert_eq!(position(&session, "b"), Position::new(40.0, 500.0));
        assert_eq!(session.graph().node("a").map(|n| n.data.name.as_str()), Some("Start"));

        // adding a node triggers auto-layout again
        session
            .apply(EditCommand::AddStep {
                parent: None,
                index: None,
                step: ConditionalStep::instruction("c", "C"),
            })
            .unwrap();
        assert_eq!(position(&session, "b"), Position::new(0.0, 120.0));
    }

    #[test]
    fn test_rejected_edit_leaves_state() {
        let mut session = session();
        let before = session.steps().to_vec();
        let err = session
            .apply(EditCommand::AddStep {
                parent: None,
                index: Some(0),
                step: ConditionalStep::condition("c", ConditionKind::Else, None),
            })
            .unwrap_err();
        assert!(matches!(err, FlowdeckError::Editor(_)));
        assert_eq!(session.steps(), before.as_slice());
        assert!(session.apply(EditCommand::MoveNode { id: "zz".to_string(), position: Position::default() }).is_err());
    }

    #[test]
    fn test_import_graph_keeps_positions() {
        let mut session = session();
        let nodes = vec![
            FlowNode {
                id: "p".to_string(),
                kind: NodeKind::Step,
                position: Position::new(10.0, 10.0),
                data: NodeData {
                    name: "P".to_string(),
                    ..Default::default()
                },
            },
            FlowNode {
                id: "q".to_string(),
                kind: NodeKind::Step,
                position: Position::new(10.0, 200.0),
                data: NodeData {
                    name: "Q".to_string(),
                    ..Default::default()
                },
            },
        ];
        session.import_graph(&nodes, &[FlowEdge::new("p", "q")]).unwrap();

        assert_eq!(session.steps().iter().map(|s| s.name.as_str()).collect::<Vec<_>>(), vec!["P", "Q"]);
        assert_eq!(position(&session, "q"), Position::new(10.0, 200.0));

        session.relayout();
        assert_eq!(position(&session, "q"), Position::new(0.0, 120.0));
    }

    fn hand_wired() -> (Vec<FlowNode>, Vec<FlowEdge>) {
        let node = |id: &str, kind: NodeKind| FlowNode {
            id: id.to_string(),
            kind,
            data: NodeData {
                name: id.to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let nodes = vec![node("a", NodeKind::Step), node("cif", NodeKind::Condition), node("celse", NodeKind::Condition)];
        // else drawn before if
        let edges = vec![FlowEdge::new("a", "celse").with_label("else"), FlowEdge::new("a", "cif").with_label("if")];
        (nodes, edges)
    }

    #[test]
    fn test_hand_wired_graph_imports_and_opens() {
        let (nodes, edges) = hand_wired();
        let mut session = session();
        session.import_graph(&nodes, &edges).unwrap();
        assert_eq!(
            session.steps().iter().map(|s| s.condition_kind()).collect::<Vec<_>>(),
            vec![None, Some(ConditionKind::If), Some(ConditionKind::Else)]
        );

        let stored = WorkflowModel {
            id: "w2".to_string(),
            name: "Wired".to_string(),
            definition: WorkflowDefinition {
                nodes,
                edges,
                ..Default::default()
            },
            ..Default::default()
        };
        let opened = BuilderSession::open(stored, LayoutConfig::default()).unwrap();
        assert_eq!(opened.steps()[1].id, "cif");
    }

    #[test]
    fn test_open_round_trips_stored_workflow() {
        let steps = vec![
            ConditionalStep::instruction("a", "A"),
            ConditionalStep::condition("c1", ConditionKind::If, Some("x")),
            ConditionalStep::condition("c2", ConditionKind::Else, None),
        ];
        let stored = WorkflowModel::from_steps("w1", "Flow", &steps, &LayoutConfig::default());
        let session = BuilderSession::open(stored.clone(), LayoutConfig::default()).unwrap();

        assert_eq!(session.steps().len(), 3);
        let saved = session.workflow();
        assert_eq!(saved.id, "w1");
        assert_eq!(saved.definition.nodes.len(), 3);
        assert_eq!(saved.definition.edges.len(), 2);
    }
}
