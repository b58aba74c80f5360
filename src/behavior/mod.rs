//! Generic behavior tree engine
//!
//! Content-agnostic: trees are built from declarative definitions and talk to
//! the outside world only through their blackboard.

pub mod blackboard;
pub mod factory;
pub mod node;
pub mod registry;

pub use blackboard::{Blackboard, BlackboardValue};
pub use factory::{NodeDefinition, TreeDefinition, TreeError, TreeFactory};
pub use node::{Node, NodeStatus};
pub use registry::BehaviorRegistry;

use node::BoxedNode;

/// A built tree and the blackboard it owns
pub struct BehaviorTree {
    name: String,
    root: BoxedNode,
    blackboard: Blackboard,
}

impl BehaviorTree {
    pub fn new(name: impl Into<String>, root: BoxedNode, blackboard: Blackboard) -> Self {
        Self {
            name: name.into(),
            root,
            blackboard,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate the tree once
    pub fn tick(&mut self) -> NodeStatus {
        self.root.tick(&mut self.blackboard)
    }

    /// Clear every cursor; the blackboard is left untouched
    pub fn reset(&mut self) {
        self.root.reset();
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    pub fn blackboard_mut(&mut self) -> &mut Blackboard {
        &mut self.blackboard
    }
}

impl std::fmt::Debug for BehaviorTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorTree")
            .field("name", &self.name)
            .field("root", &self.root.name())
            .field("blackboard", &self.blackboard)
            .finish()
    }
}
