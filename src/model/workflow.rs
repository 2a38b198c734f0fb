use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    FlowdeckError, LayoutConfig, Result, graph,
    model::{ConditionalStep, FlowEdge, FlowNode, GraphModel},
};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Active,
    Paused,
    Disabled,
    Archived,
}

/// Persisted graph of a workflow.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct WorkflowDefinition {
    #[serde(default)]
    pub nodes: Vec<FlowNode>,
    #[serde(default)]
    pub edges: Vec<FlowEdge>,
    #[serde(default)]
    pub variables: HashMap<String, serde_json::Value>,
}

impl WorkflowDefinition {
    pub fn graph(&self) -> GraphModel {
        GraphModel {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }
}

impl From<GraphModel> for WorkflowDefinition {
    fn from(graph: GraphModel) -> Self {
        Self {
            nodes: graph.nodes,
            edges: graph.edges,
            variables: HashMap::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct WorkflowModel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: WorkflowStatus,
    #[serde(default)]
    pub definition: WorkflowDefinition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl WorkflowModel {
    /// Parses a workflow, checking the document shape first.
    pub fn from_json(s: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(s).map_err(|e| FlowdeckError::Workflow(format!("{}", e)))?;
        jsonschema::validate(&Self::schema(), &value)?;
        let workflow = serde_json::from_value::<WorkflowModel>(value);
        match workflow {
            Ok(v) => Ok(v),
            Err(e) => Err(FlowdeckError::Workflow(format!("{}", e))),
        }
    }

    /// Builds a workflow whose definition is rendered from a step tree.
    pub fn from_steps(
        id: impl Into<String>,
        name: impl Into<String>,
        steps: &[ConditionalStep],
        layout: &LayoutConfig,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            definition: graph::tree_to_graph(steps, layout).into(),
            ..Default::default()
        }
    }

    /// Step tree recovered from the stored graph.
    pub fn steps(&self) -> Vec<ConditionalStep> {
        graph::graph_to_tree(&self.definition.nodes, &self.definition.edges)
    }

    fn schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "required": ["id", "name"],
            "properties": {
                "id": { "type": "string", "minLength": 1 },
                "name": { "type": "string" },
                "description": { "type": "string" },
                "status": {
                    "type": "string",
                    "enum": ["draft", "active", "paused", "disabled", "archived"]
                },
                "definition": {
                    "type": "object",
                    "properties": {
                        "nodes": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["id"],
                                "properties": {
                                    "id": { "type": "string" },
                                    "type": { "type": "string", "enum": ["step", "condition"] }
                                }
                            }
                        },
                        "edges": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["id", "source", "target"],
                                "properties": {
                                    "source": { "type": "string" },
                                    "target": { "type": "string" },
                                    "label": { "type": ["string", "null"] }
                                }
                            }
                        },
                        "variables": { "type": "object" }
                    }
                }
            }
        })
    }
}
