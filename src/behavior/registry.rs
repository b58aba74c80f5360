use std::sync::Arc;

use hashbrown::HashMap;

use crate::behavior::blackboard::Blackboard;
use crate::behavior::node::{ActionFn, ConditionFn, NodeStatus};

/// Name-keyed tables of the actions and conditions trees may reference
#[derive(Clone, Default)]
pub struct BehaviorRegistry {
    actions: HashMap<String, ActionFn>,
    conditions: HashMap<String, ConditionFn>,
}

impl BehaviorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_action<F>(&mut self, name: &str, action: F) -> &mut Self
    where
        F: Fn(&mut Blackboard) -> NodeStatus + Send + Sync + 'static,
    {
        if self.actions.insert(name.to_string(), Arc::new(action)).is_some() {
            tracing::debug!(name, "action replaced");
        }
        self
    }

    pub fn register_condition<F>(&mut self, name: &str, condition: F) -> &mut Self
    where
        F: Fn(&Blackboard) -> bool + Send + Sync + 'static,
    {
        if self
            .conditions
            .insert(name.to_string(), Arc::new(condition))
            .is_some()
        {
            tracing::debug!(name, "condition replaced");
        }
        self
    }

    pub fn action(&self, name: &str) -> Option<ActionFn> {
        self.actions.get(name).cloned()
    }

    pub fn condition(&self, name: &str) -> Option<ConditionFn> {
        self.conditions.get(name).cloned()
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn has_condition(&self, name: &str) -> bool {
        self.conditions.contains_key(name)
    }
}

impl std::fmt::Debug for BehaviorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut actions: Vec<_> = self.actions.keys().collect();
        let mut conditions: Vec<_> = self.conditions.keys().collect();
        actions.sort();
        conditions.sort();
        f.debug_struct("BehaviorRegistry")
            .field("actions", &actions)
            .field("conditions", &conditions)
            .finish()
    }
}
