//! Tree form of a workflow: ordered steps with nested conditional branches.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::{FlowdeckError, Result};

/// step id
pub type StepId = String;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StepType {
    #[default]
    Instruction,
    Condition,
    Sequence,
}

/// Branch kind of a condition step.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash, strum::AsRefStr, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConditionKind {
    #[default]
    If,
    Elseif,
    Else,
}

impl ConditionKind {
    /// Label drawn on the edge leading into a branch.
    pub fn label(&self) -> &'static str {
        match self {
            ConditionKind::If => "if",
            ConditionKind::Elseif => "else if",
            ConditionKind::Else => "else",
        }
    }

    /// Parses an edge label, accepting both `else if` and `elseif`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "if" => Some(ConditionKind::If),
            "else if" | "elseif" | "else_if" => Some(ConditionKind::Elseif),
            "else" => Some(ConditionKind::Else),
            _ => None,
        }
    }

    /// Default display name of a branch step.
    pub fn display_name(&self) -> &'static str {
        match self {
            ConditionKind::If => "If",
            ConditionKind::Elseif => "Else If",
            ConditionKind::Else => "Else",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    #[serde(rename = "type")]
    pub kind: ConditionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
}

/// Typed tool reference of a step, keyed by `tool_type`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "tool_type", rename_all = "snake_case")]
pub enum ToolConfig {
    Builtin {
        tool_name: String,
    },
    Mcp {
        tool_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        server_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        qualified_name: Option<String>,
    },
    Custom {
        tool_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
    },
}

impl ToolConfig {
    pub fn tool_name(&self) -> &str {
        match self {
            ToolConfig::Builtin {
                tool_name,
            }
            | ToolConfig::Mcp {
                tool_name,
                ..
            }
            | ToolConfig::Custom {
                tool_name,
                ..
            } => tool_name,
        }
    }
}

/// Step configuration. Known tool shapes are typed, anything else is kept verbatim.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum StepConfig {
    Tool(ToolConfig),
    Opaque(serde_json::Value),
}

impl Default for StepConfig {
    fn default() -> Self {
        StepConfig::Opaque(serde_json::Value::Object(serde_json::Map::new()))
    }
}

impl StepConfig {
    pub fn tool(&self) -> Option<&ToolConfig> {
        match self {
            StepConfig::Tool(tool) => Some(tool),
            StepConfig::Opaque(_) => None,
        }
    }

    pub fn tool_name(&self) -> Option<&str> {
        match self {
            StepConfig::Tool(tool) => Some(tool.tool_name()),
            StepConfig::Opaque(value) => value.get("tool_name").and_then(|v| v.as_str()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            StepConfig::Tool(_) => false,
            StepConfig::Opaque(serde_json::Value::Object(map)) => map.is_empty(),
            StepConfig::Opaque(serde_json::Value::Null) => true,
            StepConfig::Opaque(_) => false,
        }
    }
}

fn default_enabled() -> bool {
    true
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalStep {
    pub id: StepId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    #[serde(default)]
    pub config: StepConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Conditions>,
    #[serde(default)]
    pub order: usize,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_issues: Option<bool>,
    #[serde(default)]
    pub children: Vec<ConditionalStep>,
}

impl ConditionalStep {
    /// Creates an instruction step.
    pub fn instruction(
        id: impl Into<StepId>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            step_type: StepType::Instruction,
            config: StepConfig::default(),
            conditions: None,
            order: 0,
            enabled: true,
            has_issues: None,
            children: Vec::new(),
        }
    }

    /// Creates a condition branch step named after its kind.
    pub fn condition(
        id: impl Into<StepId>,
        kind: ConditionKind,
        expression: Option<&str>,
    ) -> Self {
        let expression = match kind {
            ConditionKind::Else => None,
            _ => expression.map(str::to_string),
        };
        Self {
            conditions: Some(Conditions {
                kind,
                expression,
            }),
            step_type: StepType::Condition,
            ..Self::instruction(id, kind.display_name())
        }
    }

    pub fn with_description(
        mut self,
        description: impl Into<String>,
    ) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_config(
        mut self,
        config: StepConfig,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn with_children(
        mut self,
        children: Vec<ConditionalStep>,
    ) -> Self {
        self.children = children;
        self
    }

    pub fn is_condition(&self) -> bool {
        self.step_type == StepType::Condition
    }

    /// Branch kind, `if` when a condition step carries no `conditions` record.
    pub fn condition_kind(&self) -> Option<ConditionKind> {
        if !self.is_condition() {
            return None;
        }
        Some(self.conditions.as_ref().map(|c| c.kind).unwrap_or_default())
    }

    pub fn expression(&self) -> Option<&str> {
        self.conditions.as_ref().and_then(|c| c.expression.as_deref())
    }

    /// Number of steps in this subtree, including itself.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(ConditionalStep::size).sum::<usize>()
    }
}

/// Maximal runs of sibling condition steps, as index ranges into `steps`.
pub fn condition_groups(steps: &[ConditionalStep]) -> Vec<Range<usize>> {
    let mut groups = Vec::new();
    let mut i = 0;
    while i < steps.len() {
        if steps[i].is_condition() {
            let start = i;
            while i < steps.len() && steps[i].is_condition() {
                i += 1;
            }
            groups.push(start..i);
        } else {
            i += 1;
        }
    }
    groups
}

/// Checks the condition-group invariant on the whole tree: each group starts
/// with `if`, holds at most one `else`, and `else` comes last.
pub fn validate_steps(steps: &[ConditionalStep]) -> Result<()> {
    for group in condition_groups(steps) {
        let branches = &steps[group];
        if branches[0].condition_kind() != Some(ConditionKind::If) {
            return Err(FlowdeckError::Step(format!("condition group starting at '{}' must begin with 'if'", branches[0].id)));
        }
        for (i, branch) in branches.iter().enumerate() {
            match branch.condition_kind() {
                Some(ConditionKind::If) if i > 0 => {
                    return Err(FlowdeckError::Step(format!("'{}' is a second 'if' in the same condition group", branch.id)));
                }
                Some(ConditionKind::Else) if i + 1 != branches.len() => {
                    return Err(FlowdeckError::Step(format!("'else' branch '{}' must be the last branch of its group", branch.id)));
                }
                _ => {}
            }
        }
    }
    for step in steps {
        validate_steps(&step.children)?;
    }
    Ok(())
}

/// Rewrites `order` to the position of every step among its siblings.
pub fn renumber(steps: &mut [ConditionalStep]) {
    for (i, step) in steps.iter_mut().enumerate() {
        step.order = i;
        renumber(&mut step.children);
    }
}

/// Depth-first search for a step by id.
pub fn find_step<'a>(
    steps: &'a [ConditionalStep],
    id: &str,
) -> Option<&'a ConditionalStep> {
    for step in steps {
        if step.id == id {
            return Some(step);
        }
        if let Some(found) = find_step(&step.children, id) {
            return Some(found);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_step_deserialize_camel_case() {
        let value = json!({
            "id": "s1",
            "name": "Search",
            "type": "instruction",
            "config": { "tool_type": "mcp", "tool_name": "web_search", "server_name": "exa" },
            "hasIssues": true,
            "children": []
        });
        let step: ConditionalStep = serde_json::from_value(value).unwrap();
        assert_eq!(step.step_type, StepType::Instruction);
        assert_eq!(step.has_issues, Some(true));
        assert!(step.enabled);
        assert_eq!(step.config.tool_name(), Some("web_search"));
        assert!(matches!(step.config.tool(), Some(ToolConfig::Mcp { .. })));
    }

    #[test]
    fn test_unknown_config_is_opaque() {
        let value = json!({
            "id": "s1",
            "name": "Legacy",
            "type": "instruction",
            "config": { "legacy_field": [1, 2, 3] }
        });
        let step: ConditionalStep = serde_json::from_value(value).unwrap();
        assert_eq!(step.config, StepConfig::Opaque(json!({ "legacy_field": [1, 2, 3] })));
        assert!(step.config.tool().is_none());
    }

    #[test]
    fn test_conditions_serialize() {
        let step = ConditionalStep::condition("c1", ConditionKind::Elseif, Some("x > 1"));
        let value = serde_json::to_value(&step).unwrap();
        assert_eq!(value["type"], "condition");
        assert_eq!(value["conditions"], json!({ "type": "elseif", "expression": "x > 1" }));
        assert_eq!(value["name"], "Else If");
    }

    #[test]
    fn test_else_drops_expression() {
        let step = ConditionalStep::condition("c1", ConditionKind::Else, Some("ignored"));
        assert_eq!(step.expression(), None);
    }

    #[test]
    fn test_condition_kind_labels() {
        assert_eq!(ConditionKind::from_label("else if"), Some(ConditionKind::Elseif));
        assert_eq!(ConditionKind::from_label("ElseIf"), Some(ConditionKind::Elseif));
        assert_eq!(ConditionKind::from_label(ConditionKind::Else.label()), Some(ConditionKind::Else));
        assert_eq!(ConditionKind::from_label("maybe"), None);
    }

    #[test]
    fn test_condition_groups() {
        let steps = vec![
            ConditionalStep::instruction("a", "A"),
            ConditionalStep::condition("c1", ConditionKind::If, Some("x")),
            ConditionalStep::condition("c2", ConditionKind::Else, None),
            ConditionalStep::instruction("b", "B"),
            ConditionalStep::condition("c3", ConditionKind::If, Some("y")),
        ];
        assert_eq!(condition_groups(&steps), vec![1..3, 4..5]);
    }

    #[test]
    fn test_validate_steps() {
        let ok = vec![
            ConditionalStep::instruction("a", "A"),
            ConditionalStep::condition("c1", ConditionKind::If, Some("x")),
            ConditionalStep::condition("c2", ConditionKind::Elseif, Some("y")),
            ConditionalStep::condition("c3", ConditionKind::Else, None),
        ];
        assert!(validate_steps(&ok).is_ok());

        let else_first = vec![
            ConditionalStep::instruction("a", "A"),
            ConditionalStep::condition("c1", ConditionKind::Else, None),
            ConditionalStep::condition("c2", ConditionKind::If, Some("y")),
        ];
        assert!(validate_steps(&else_first).is_err());

        let nested_bad = vec![ConditionalStep::instruction("a", "A").with_children(vec![
            ConditionalStep::condition("c1", ConditionKind::If, Some("x")),
            ConditionalStep::condition("c2", ConditionKind::Else, None),
            ConditionalStep::condition("c3", ConditionKind::Else, None),
        ])];
        assert!(validate_steps(&nested_bad).is_err());
    }

    #[test]
    fn test_find_and_renumber() {
        let mut steps = vec![
            ConditionalStep::instruction("a", "A"),
            ConditionalStep::condition("c1", ConditionKind::If, Some("x")).with_children(vec![
                ConditionalStep::instruction("x1", "X1"),
                ConditionalStep::instruction("x2", "X2"),
            ]),
        ];
        renumber(&mut steps);
        assert_eq!(find_step(&steps, "x2").map(|s| s.order), Some(1));
        assert_eq!(steps[1].size(), 3);
        assert!(find_step(&steps, "missing").is_none());
    }
}
