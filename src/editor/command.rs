//! Edits applied directly to the step tree.
//!
//! A step "owns" the condition group that directly follows it among its
//! siblings: the branches hang off that step on the canvas. Moving or
//! removing a step therefore takes its group along.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::{
    FlowdeckError, Result,
    model::{ConditionKind, ConditionalStep, Conditions, NodeId, Position, StepConfig, StepId, find_step},
    utils,
};

/// Partial update of a step. Unset fields are left alone.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct StepPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<StepConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// only meaningful on `if`/`elseif` branches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ConditionKind>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, strum::AsRefStr)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EditCommand {
    /// Adds a step under `parent` (top level when unset), at `index` or last.
    AddStep {
        parent: Option<StepId>,
        index: Option<usize>,
        step: ConditionalStep,
    },
    /// Adds an `if`/`else` pair branching off the step `after`.
    InsertConditional {
        after: StepId,
        expression: Option<String>,
    },
    /// Adds an `elseif` or `else` to the group containing `group_member`.
    AddBranch {
        group_member: StepId,
        kind: ConditionKind,
        expression: Option<String>,
    },
    UpdateStep {
        id: StepId,
        patch: StepPatch,
    },
    /// Removes a step with its subtree.
    RemoveStep {
        id: StepId,
    },
    /// Moves `target` to run directly after `source`.
    Connect {
        source: StepId,
        target: StepId,
    },
    /// Repositions a node on the canvas; the tree is untouched.
    MoveNode {
        id: NodeId,
        position: Position,
    },
}

impl EditCommand {
    /// Whether the command changes the tree.
    pub fn is_structural(&self) -> bool {
        !matches!(self, EditCommand::MoveNode { .. })
    }

    pub fn apply(
        &self,
        steps: &mut Vec<ConditionalStep>,
    ) -> Result<()> {
        trace!("editor::apply({})", self.as_ref());
        match self {
            EditCommand::AddStep {
                parent,
                index,
                step,
            } => add_step(steps, parent.as_deref(), *index, step.clone()),
            EditCommand::InsertConditional {
                after,
                expression,
            } => insert_conditional(steps, after, expression.as_deref()),
            EditCommand::AddBranch {
                group_member,
                kind,
                expression,
            } => add_branch(steps, group_member, *kind, expression.as_deref()),
            EditCommand::UpdateStep {
                id,
                patch,
            } => update_step(steps, id, patch),
            EditCommand::RemoveStep {
                id,
            } => remove_step(steps, id),
            EditCommand::Connect {
                source,
                target,
            } => connect(steps, source, target),
            EditCommand::MoveNode {
                id, ..
            } => match find_step(steps, id) {
                Some(_) => Ok(()),
                None => Err(unknown(id)),
            },
        }
    }
}

fn unknown(id: &str) -> FlowdeckError {
    FlowdeckError::Editor(format!("unknown step '{}'", id))
}

/// Index path from the top level down to the step.
fn find_path(
    steps: &[ConditionalStep],
    id: &str,
) -> Option<Vec<usize>> {
    for (i, step) in steps.iter().enumerate() {
        if step.id == id {
            return Some(vec![i]);
        }
        if let Some(mut path) = find_path(&step.children, id) {
            path.insert(0, i);
            return Some(path);
        }
    }
    None
}

/// Sibling list at the end of `path`.
fn container<'a>(
    steps: &'a [ConditionalStep],
    path: &[usize],
) -> &'a [ConditionalStep] {
    path.iter().fold(steps, |list, i| list[*i].children.as_slice())
}

fn container_mut<'a>(
    steps: &'a mut Vec<ConditionalStep>,
    path: &[usize],
) -> &'a mut Vec<ConditionalStep> {
    path.iter().fold(steps, |list, i| &mut list[*i].children)
}

/// Sibling list holding `id` and the step's index in it.
fn locate<'a>(
    steps: &'a mut Vec<ConditionalStep>,
    id: &str,
) -> Result<(&'a mut Vec<ConditionalStep>, usize)> {
    let path = find_path(steps, id).ok_or_else(|| unknown(id))?;
    let (index, parents) = path.split_last().ok_or_else(|| unknown(id))?;
    Ok((container_mut(steps, parents), *index))
}

/// Range of the condition group right after `index`, possibly empty.
fn owned_group(
    siblings: &[ConditionalStep],
    index: usize,
) -> Range<usize> {
    let start = index + 1;
    let len = siblings[start..].iter().take_while(|s| s.is_condition()).count();
    start..start + len
}

/// Range of the condition group containing `index`.
fn group_around(
    siblings: &[ConditionalStep],
    index: usize,
) -> Range<usize> {
    let mut start = index;
    while start > 0 && siblings[start - 1].is_condition() {
        start -= 1;
    }
    let mut end = index + 1;
    while end < siblings.len() && siblings[end].is_condition() {
        end += 1;
    }
    start..end
}

fn fresh_id(step: &mut ConditionalStep) {
    if step.id.is_empty() {
        step.id = utils::step_id();
    }
    for child in &mut step.children {
        fresh_id(child);
    }
}

fn add_step(
    steps: &mut Vec<ConditionalStep>,
    parent: Option<&str>,
    index: Option<usize>,
    mut step: ConditionalStep,
) -> Result<()> {
    fresh_id(&mut step);
    if find_step(steps, &step.id).is_some() {
        return Err(FlowdeckError::Editor(format!("step '{}' already exists", step.id)));
    }

    let siblings = match parent {
        Some(parent) => {
            let (list, i) = locate(steps, parent)?;
            &mut list[i].children
        }
        None => steps,
    };
    let index = index.unwrap_or(siblings.len()).min(siblings.len());
    siblings.insert(index, step);
    Ok(())
}

fn insert_conditional(
    steps: &mut Vec<ConditionalStep>,
    after: &str,
    expression: Option<&str>,
) -> Result<()> {
    let (siblings, index) = locate(steps, after)?;
    if siblings[index].is_condition() {
        return Err(FlowdeckError::Editor(format!("'{}' is a branch; add a branch to its group instead", after)));
    }
    if !owned_group(siblings, index).is_empty() {
        return Err(FlowdeckError::Editor(format!("'{}' already branches", after)));
    }

    let branches = [
        ConditionalStep::condition(utils::step_id(), ConditionKind::If, expression),
        ConditionalStep::condition(utils::step_id(), ConditionKind::Else, None),
    ];
    siblings.splice(index + 1..index + 1, branches);
    Ok(())
}

fn add_branch(
    steps: &mut Vec<ConditionalStep>,
    member: &str,
    kind: ConditionKind,
    expression: Option<&str>,
) -> Result<()> {
    let (siblings, index) = locate(steps, member)?;
    if !siblings[index].is_condition() {
        return Err(FlowdeckError::Editor(format!("'{}' is not part of a condition group", member)));
    }
    let group = group_around(siblings, index);
    let has_else = siblings[group.end - 1].condition_kind() == Some(ConditionKind::Else);

    let at = match kind {
        ConditionKind::If => return Err(FlowdeckError::Editor("a condition group has exactly one 'if'".to_string())),
        ConditionKind::Else if has_else => return Err(FlowdeckError::Editor("the condition group already has an 'else'".to_string())),
        ConditionKind::Else => group.end,
        // else-if goes before a trailing else
        ConditionKind::Elseif if has_else => group.end - 1,
        ConditionKind::Elseif => group.end,
    };
    siblings.insert(at, ConditionalStep::condition(utils::step_id(), kind, expression));
    Ok(())
}

fn update_step(
    steps: &mut Vec<ConditionalStep>,
    id: &str,
    patch: &StepPatch,
) -> Result<()> {
    let (siblings, index) = locate(steps, id)?;
    let step = &mut siblings[index];

    if let Some(name) = &patch.name {
        step.name = name.clone();
    }
    if let Some(description) = &patch.description {
        step.description = description.clone();
    }
    if let Some(config) = &patch.config {
        step.config = config.clone();
    }
    if let Some(enabled) = patch.enabled {
        step.enabled = enabled;
    }

    if patch.expression.is_none() && patch.kind.is_none() {
        return Ok(());
    }
    if !step.is_condition() {
        return Err(FlowdeckError::Editor(format!("'{}' is not a condition branch", id)));
    }
    let kind = patch.kind.or(step.condition_kind()).unwrap_or_default();
    let expression = match kind {
        ConditionKind::Else => None,
        _ => patch.expression.clone().or_else(|| step.expression().map(str::to_string)),
    };
    step.conditions = Some(Conditions {
        kind,
        expression,
    });
    Ok(())
}

fn remove_step(
    steps: &mut Vec<ConditionalStep>,
    id: &str,
) -> Result<()> {
    let (siblings, index) = locate(steps, id)?;

    if siblings[index].is_condition() {
        let was_if = siblings[index].condition_kind() == Some(ConditionKind::If);
        siblings.remove(index);
        // the next branch takes over the leading position
        if was_if && index < siblings.len() && siblings[index].is_condition() {
            let next = &mut siblings[index];
            let expression = next.expression().map(str::to_string);
            next.conditions = Some(Conditions {
                kind: ConditionKind::If,
                expression,
            });
            if next.name == ConditionKind::Elseif.display_name() || next.name == ConditionKind::Else.display_name() {
                next.name = ConditionKind::If.display_name().to_string();
            }
        }
        return Ok(());
    }

    let group = owned_group(siblings, index);
    siblings.drain(index..group.end);
    Ok(())
}

fn connect(
    steps: &mut Vec<ConditionalStep>,
    source: &str,
    target: &str,
) -> Result<()> {
    if source == target {
        return Err(FlowdeckError::Editor("a step cannot follow itself".to_string()));
    }
    let source_path = find_path(steps, source).ok_or_else(|| unknown(source))?;
    let target_path = find_path(steps, target).ok_or_else(|| unknown(target))?;
    let (index, parents) = target_path.split_last().ok_or_else(|| unknown(target))?;

    let siblings = container(steps, parents);
    if siblings[*index].is_condition() {
        return Err(FlowdeckError::Editor(format!("branch '{}' can only hang off the step it belongs to", target)));
    }
    let moved = *index..owned_group(siblings, *index).end;
    // source living inside what moves
    if source_path.len() > parents.len() && source_path.starts_with(parents) && moved.contains(&source_path[parents.len()]) {
        return Err(FlowdeckError::Editor(format!("connecting '{}' to '{}' would create a cycle", source, target)));
    }

    let moved: Vec<ConditionalStep> = container_mut(steps, parents).drain(moved).collect();
    let (siblings, index) = locate(steps, source)?;
    if siblings[index].is_condition() {
        siblings[index].children.splice(0..0, moved);
    } else {
        let at = owned_group(siblings, index).end;
        siblings.splice(at..at, moved);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::validate_steps;

    fn ids(steps: &[ConditionalStep]) -> Vec<&str> {
        steps.iter().map(|s| s.id.as_str()).collect()
    }

    fn kinds(steps: &[ConditionalStep]) -> Vec<Option<ConditionKind>> {
        steps.iter().map(|s| s.condition_kind()).collect()
    }

    fn tree() -> Vec<ConditionalStep> {
        vec![
            ConditionalStep::instruction("a", "A"),
            ConditionalStep::condition("c1", ConditionKind::If, Some("ok")).with_children(vec![ConditionalStep::instruction("x", "X")]),
            ConditionalStep::condition("c2", ConditionKind::Else, None),
            ConditionalStep::instruction("b", "B"),
        ]
    }

    #[test]
    fn test_add_step() {
        let mut steps = tree();
        EditCommand::AddStep {
            parent: Some("c2".to_string()),
            index: None,
            step: ConditionalStep::instruction("", "Fallback"),
        }
        .apply(&mut steps)
        .unwrap();
        assert_eq!(steps[2].children.len(), 1);
        assert!(!steps[2].children[0].id.is_empty());

        let duplicate = EditCommand::AddStep {
            parent: None,
            index: Some(0),
            step: ConditionalStep::instruction("x", "Again"),
        };
        assert!(matches!(duplicate.apply(&mut steps), Err(FlowdeckError::Editor(_))));
    }

    #[test]
    fn test_insert_conditional() {
        let mut steps = tree();
        EditCommand::InsertConditional {
            after: "b".to_string(),
            expression: Some("retry".to_string()),
        }
        .apply(&mut steps)
        .unwrap();
        assert_eq!(kinds(&steps[4..]), vec![Some(ConditionKind::If), Some(ConditionKind::Else)]);
        assert_eq!(steps[4].expression(), Some("retry"));
        validate_steps(&steps).unwrap();

        // a already branches
        let again = EditCommand::InsertConditional {
            after: "a".to_string(),
            expression: None,
        };
        assert!(again.apply(&mut steps).is_err());
    }

    #[test]
    fn test_add_branch_before_else() {
        let mut steps = tree();
        EditCommand::AddBranch {
            group_member: "c1".to_string(),
            kind: ConditionKind::Elseif,
            expression: Some("maybe".to_string()),
        }
        .apply(&mut steps)
        .unwrap();
        assert_eq!(kinds(&steps[1..4]), vec![Some(ConditionKind::If), Some(ConditionKind::Elseif), Some(ConditionKind::Else)]);
        validate_steps(&steps).unwrap();

        let second_else = EditCommand::AddBranch {
            group_member: "c1".to_string(),
            kind: ConditionKind::Else,
            expression: None,
        };
        assert!(second_else.apply(&mut steps).is_err());
    }

    #[test]
    fn test_update_step() {
        let mut steps = tree();
        EditCommand::UpdateStep {
            id: "c1".to_string(),
            patch: StepPatch {
                name: Some("Has results".to_string()),
                expression: Some("count > 0".to_string()),
                ..Default::default()
            },
        }
        .apply(&mut steps)
        .unwrap();
        assert_eq!(steps[1].name, "Has results");
        assert_eq!(steps[1].expression(), Some("count > 0"));

        let not_branch = EditCommand::UpdateStep {
            id: "a".to_string(),
            patch: StepPatch {
                expression: Some("x".to_string()),
                ..Default::default()
            },
        };
        assert!(not_branch.apply(&mut steps).is_err());
    }

    #[test]
    fn test_remove_if_promotes_next_branch() {
        let mut steps = tree();
        EditCommand::RemoveStep {
            id: "c1".to_string(),
        }
        .apply(&mut steps)
        .unwrap();
        assert_eq!(ids(&steps), vec!["a", "c2", "b"]);
        assert_eq!(steps[1].condition_kind(), Some(ConditionKind::If));
        assert_eq!(steps[1].name, "If");
        validate_steps(&steps).unwrap();
    }

    #[test]
    fn test_remove_step_takes_its_group() {
        let mut steps = tree();
        EditCommand::RemoveStep {
            id: "a".to_string(),
        }
        .apply(&mut steps)
        .unwrap();
        assert_eq!(ids(&steps), vec!["b"]);
        assert!(matches!(EditCommand::RemoveStep { id: "a".to_string() }.apply(&mut steps), Err(FlowdeckError::Editor(_))));
    }

    #[test]
    fn test_connect_moves_target_after_source_group() {
        let mut steps = tree();
        steps.push(ConditionalStep::instruction("d", "D"));
        EditCommand::Connect {
            source: "b".to_string(),
            target: "a".to_string(),
        }
        .apply(&mut steps)
        .unwrap();
        // a moves with the branches it owns
        assert_eq!(ids(&steps), vec!["b", "a", "c1", "c2", "d"]);
    }

    #[test]
    fn test_connect_into_branch() {
        let mut steps = tree();
        EditCommand::Connect {
            source: "c2".to_string(),
            target: "b".to_string(),
        }
        .apply(&mut steps)
        .unwrap();
        assert_eq!(ids(&steps), vec!["a", "c1", "c2"]);
        assert_eq!(ids(&steps[2].children), vec!["b"]);
    }

    #[test]
    fn test_connect_rejections() {
        let mut steps = tree();
        let to_branch = EditCommand::Connect {
            source: "b".to_string(),
            target: "c1".to_string(),
        };
        assert!(to_branch.apply(&mut steps).is_err());

        let cycle = EditCommand::Connect {
            source: "x".to_string(),
            target: "a".to_string(),
        };
        let before = steps.clone();
        assert!(cycle.apply(&mut steps).is_err());
        assert_eq!(steps, before);

        let to_self = EditCommand::Connect {
            source: "b".to_string(),
            target: "b".to_string(),
        };
        assert!(to_self.apply(&mut steps).is_err());
    }

    #[test]
    fn test_command_json() {
        let command: EditCommand = serde_json::from_str(r#"{"command": "remove_step", "id": "a"}"#).unwrap();
        assert_eq!(
            command,
            EditCommand::RemoveStep {
                id: "a".to_string()
            }
        );
        assert!(command.is_structural());
    }
}
