mod graph;
mod run;
mod step;
mod workflow;

pub use graph::{FlowEdge, FlowNode, GraphModel, NodeData, NodeId, NodeKind, Position};
pub use run::{AgentRun, AgentRunStatus, RunId};
pub use step::{ConditionKind, ConditionalStep, Conditions, StepConfig, StepId, StepType, ToolConfig, condition_groups, find_step, renumber, validate_steps};
pub use workflow::{WorkflowDefinition, WorkflowModel, WorkflowStatus};
