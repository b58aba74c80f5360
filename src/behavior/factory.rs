//! Declarative tree definitions and their construction
//!
//! Definitions are plain serde data (JSON in practice). Action and condition
//! names are resolved against a `BehaviorRegistry` at build time; unknown
//! names still build, and fail when ticked.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::behavior::blackboard::{Blackboard, BlackboardValue};
use crate::behavior::node::{
    Action, BoxedNode, Children, Condition, Inverter, Parallel, ParallelPolicy, PriorityChild, PrioritySelector,
    PrioritySource, Selector, Sequence,
};
use crate::behavior::registry::BehaviorRegistry;
use crate::behavior::BehaviorTree;

#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    #[error("invalid tree definition: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{kind} node '{name}' has no children")]
    EmptyComposite { kind: &'static str, name: String },
    #[error("{kind} leaf has an empty name")]
    EmptyLeafName { kind: &'static str },
}

fn default_true() -> bool {
    true
}

/// One node of a declarative tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeDefinition {
    Sequence {
        #[serde(default)]
        name: Option<String>,
        #[serde(default = "default_true")]
        process_multiple: bool,
        children: Vec<NodeDefinition>,
    },
    Selector {
        #[serde(default)]
        name: Option<String>,
        children: Vec<NodeDefinition>,
    },
    PrioritySelector {
        #[serde(default)]
        name: Option<String>,
        children: Vec<PriorityChildDefinition>,
    },
    Parallel {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        policy: ParallelPolicy,
        children: Vec<NodeDefinition>,
    },
    Inverter {
        #[serde(default)]
        name: Option<String>,
        child: Box<NodeDefinition>,
    },
    Action {
        name: String,
    },
    Condition {
        name: String,
    },
}

/// Priority selector child. `priority` is either a number or
/// `{ "key": ..., "default": ... }` read from the blackboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityChildDefinition {
    #[serde(default = "default_priority")]
    pub priority: PrioritySource,
    pub node: NodeDefinition,
}

fn default_priority() -> PrioritySource {
    PrioritySource::Static(0)
}

/// A complete tree: root node plus initial blackboard contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeDefinition {
    #[serde(default = "default_tree_name")]
    pub name: String,
    pub root: NodeDefinition,
    #[serde(default)]
    pub blackboard: HashMap<String, BlackboardValue>,
}

fn default_tree_name() -> String {
    "tree".to_string()
}

impl TreeDefinition {
    pub fn from_json(json: &str) -> Result<Self, TreeError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Builds trees from definitions against one registry
#[derive(Debug, Clone, Default)]
pub struct TreeFactory {
    registry: BehaviorRegistry,
}

impl TreeFactory {
    pub fn new(registry: BehaviorRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &BehaviorRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut BehaviorRegistry {
        &mut self.registry
    }

    pub fn build(&self, definition: &TreeDefinition) -> Result<BehaviorTree, TreeError> {
        let root = self.build_node(&definition.root)?;
        let blackboard = Blackboard::from_values(definition.blackboard.clone());
        Ok(BehaviorTree::new(definition.name.clone(), root, blackboard))
    }

    pub fn build_json(&self, json: &str) -> Result<BehaviorTree, TreeError> {
        self.build(&TreeDefinition::from_json(json)?)
    }

    fn build_children(&self, definitions: &[NodeDefinition]) -> Result<Children, TreeError> {
        definitions.iter().map(|child| self.build_node(child)).collect()
    }

    fn build_node(&self, definition: &NodeDefinition) -> Result<BoxedNode, TreeError> {
        let node: BoxedNode = match definition {
            NodeDefinition::Sequence {
                name,
                process_multiple,
                children,
            } => {
                let name = composite_name(name, "sequence", children.len())?;
                Box::new(Sequence::new(name, self.build_children(children)?).with_process_multiple(*process_multiple))
            }
            NodeDefinition::Selector { name, children } => {
                let name = composite_name(name, "selector", children.len())?;
                Box::new(Selector::new(name, self.build_children(children)?))
            }
            NodeDefinition::PrioritySelector { name, children } => {
                let name = composite_name(name, "priority_selector", children.len())?;
                let children = children
                    .iter()
                    .map(|child| {
                        Ok(PriorityChild {
                            priority: child.priority.clone(),
                            node: self.build_node(&child.node)?,
                        })
                    })
                    .collect::<Result<Vec<_>, TreeError>>()?;
                Box::new(PrioritySelector::new(name, children))
            }
            NodeDefinition::Parallel { name, policy, children } => {
                let name = composite_name(name, "parallel", children.len())?;
                Box::new(Parallel::new(name, *policy, self.build_children(children)?))
            }
            NodeDefinition::Inverter { name, child } => {
                let name = name.clone().unwrap_or_else(|| "inverter".to_string());
                Box::new(Inverter::new(name, self.build_node(child)?))
            }
            NodeDefinition::Action { name } => {
                leaf_name(name, "action")?;
                let action = self.registry.action(name);
                if action.is_none() {
                    tracing::debug!(name = %name, "tree references unregistered action");
                }
                Box::new(Action::new(name.clone(), action))
            }
            NodeDefinition::Condition { name } => {
                leaf_name(name, "condition")?;
                let condition = self.registry.condition(name);
                if condition.is_none() {
                    tracing::debug!(name = %name, "tree references unregistered condition");
                }
                Box::new(Condition::new(name.clone(), condition))
            }
        };
        Ok(node)
    }
}

fn composite_name(name: &Option<String>, kind: &'static str, child_count: usize) -> Result<String, TreeError> {
    let name = name.clone().unwrap_or_else(|| kind.to_string());
    if child_count == 0 {
        return Err(TreeError::EmptyComposite { kind, name });
    }
    Ok(name)
}

fn leaf_name(name: &str, kind: &'static str) -> Result<(), TreeError> {
    if name.trim().is_empty() {
        return Err(TreeError::EmptyLeafName { kind });
    }
    Ok(())
}

/// Names of every action and condition a definition references, for content
/// validation
pub fn referenced_leaves(definition: &NodeDefinition) -> (Vec<String>, Vec<String>) {
    fn walk(node: &NodeDefinition, actions: &mut Vec<String>, conditions: &mut Vec<String>) {
        match node {
            NodeDefinition::Sequence { children, .. }
            | NodeDefinition::Selector { children, .. }
            | NodeDefinition::Parallel { children, .. } => {
                children.iter().for_each(|child| walk(child, actions, conditions));
            }
            NodeDefinition::PrioritySelector { children, .. } => {
                children.iter().for_each(|child| walk(&child.node, actions, conditions));
            }
            NodeDefinition::Inverter { child, .. } => walk(child, actions, conditions),
            NodeDefinition::Action { name } => actions.push(name.clone()),
            NodeDefinition::Condition { name } => conditions.push(name.clone()),
        }
    }

    let mut actions = Vec::new();
    let mut conditions = Vec::new();
    walk(definition, &mut actions, &mut conditions);
    (actions, conditions)
}

/// Unregistered names referenced by a definition
pub fn missing_leaves(definition: &TreeDefinition, registry: &BehaviorRegistry) -> Vec<String> {
    let (actions, conditions) = referenced_leaves(&definition.root);
    let mut missing: Vec<String> = actions
        .into_iter()
        .filter(|name| !registry.has_action(name))
        .chain(conditions.into_iter().filter(|name| !registry.has_condition(name)))
        .collect();
    missing.sort();
    missing.dedup();
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::node::NodeStatus;

    fn registry() -> BehaviorRegistry {
        let mut registry = BehaviorRegistry::new();
        registry
            .register_condition("ready", |bb| bb.flag("ready"))
            .register_action("mark", |bb| {
                bb.set("marked", true);
                NodeStatus::Success
            });
        registry
    }

    const TREE: &str = r#"{
        "name": "test",
        "blackboard": { "ready": true, "speed": 2.5 },
        "root": {
            "type": "priority_selector",
            "children": [
                { "priority": 0, "node": { "type": "action", "name": "idle" } },
                { "priority": 10, "node": {
                    "type": "sequence",
                    "name": "work",
                    "children": [
                        { "type": "condition", "name": "ready" },
                        { "type": "action", "name": "mark" }
                    ]
                } }
            ]
        }
    }"#;

    #[test]
    fn test_build_from_json() {
        let factory = TreeFactory::new(registry());
        let mut tree = factory.build_json(TREE).unwrap();

        assert_eq!(tree.name(), "test");
        assert_eq!(tree.blackboard().get_float("speed"), Some(2.5));
        assert_eq!(tree.tick(), NodeStatus::Success);
        assert!(tree.blackboard().flag("marked"));
    }

    #[test]
    fn test_unknown_action_builds_and_fails() {
        let factory = TreeFactory::new(registry());
        let mut tree = factory.build_json(TREE).unwrap();
        tree.blackboard_mut().set("ready", false);

        // Falls through to "idle", which is not registered
        assert_eq!(tree.tick(), NodeStatus::Failure);
    }

    #[test]
    fn test_dynamic_priority_definition() {
        let json = r#"{
            "type": "priority_selector",
            "children": [
                { "priority": { "key": "p", "default": 3 }, "node": { "type": "action", "name": "mark" } }
            ]
        }"#;
        let node: NodeDefinition = serde_json::from_str(json).unwrap();
        let NodeDefinition::PrioritySelector { children, .. } = node else {
            panic!("wrong node type");
        };
        assert_eq!(
            children[0].priority,
            PrioritySource::Blackboard {
                key: "p".to_string(),
                default: 3
            }
        );
    }

    #[test]
    fn test_sequence_defaults_to_process_multiple() {
        let node: NodeDefinition =
            serde_json::from_str(r#"{ "type": "sequence", "children": [{ "type": "action", "name": "a" }] }"#).unwrap();
        assert!(matches!(
            node,
            NodeDefinition::Sequence {
                process_multiple: true,
                ..
            }
        ));
    }

    #[test]
    fn test_parse_errors() {
        let factory = TreeFactory::default();
        assert!(matches!(factory.build_json("{ not json"), Err(TreeError::Parse(_))));
        assert!(matches!(
            factory.build_json(r#"{ "root": { "type": "teleport" } }"#),
            Err(TreeError::Parse(_))
        ));
    }

    #[test]
    fn test_structure_errors() {
        let factory = TreeFactory::default();
        let empty = r#"{ "root": { "type": "selector", "name": "pick", "children": [] } }"#;
        match factory.build_json(empty) {
            Err(TreeError::EmptyComposite { kind, name }) => {
                assert_eq!(kind, "selector");
                assert_eq!(name, "pick");
            }
            other => panic!("unexpected {:?}", other.map(|t| t.name().to_string())),
        }

        let blank = r#"{ "root": { "type": "action", "name": "  " } }"#;
        assert!(matches!(factory.build_json(blank), Err(TreeError::EmptyLeafName { kind: "action" })));
    }

    #[test]
    fn test_missing_leaves() {
        let definition = TreeDefinition::from_json(TREE).unwrap();
        assert_eq!(missing_leaves(&definition, &registry()), vec!["idle".to_string()]);
    }
}
