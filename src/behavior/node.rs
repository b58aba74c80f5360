//! Behavior tree nodes
//!
//! Every node ticks against the tree's blackboard and reports a
//! `NodeStatus`. Composites keep a cursor so `Running` children resume on the
//! next tick; `reset` clears cursors recursively and never touches the
//! blackboard.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::behavior::blackboard::Blackboard;
use crate::util::log_once::warn_once;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Running,
    Success,
    Failure,
}

impl NodeStatus {
    pub fn from_bool(ok: bool) -> Self {
        if ok {
            NodeStatus::Success
        } else {
            NodeStatus::Failure
        }
    }
}

pub trait Node: Send {
    fn name(&self) -> &str;
    fn tick(&mut self, blackboard: &mut Blackboard) -> NodeStatus;
    fn reset(&mut self);
}

pub type BoxedNode = Box<dyn Node>;

/// Child list; most composites have a handful of children
pub type Children = SmallVec<[BoxedNode; 4]>;

/// Action callable: may read and write the blackboard
pub type ActionFn = Arc<dyn Fn(&mut Blackboard) -> NodeStatus + Send + Sync>;

/// Condition callable: reads the blackboard only
pub type ConditionFn = Arc<dyn Fn(&Blackboard) -> bool + Send + Sync>;

/// Runs children in order until one fails or all succeed
pub struct Sequence {
    name: String,
    children: Children,
    cursor: usize,
    /// Continue into the next child in the same tick after a success
    process_multiple: bool,
}

impl Sequence {
    pub fn new(name: impl Into<String>, children: Children) -> Self {
        Self {
            name: name.into(),
            children,
            cursor: 0,
            process_multiple: true,
        }
    }

    pub fn with_process_multiple(mut self, process_multiple: bool) -> Self {
        self.process_multiple = process_multiple;
        self
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl Node for Sequence {
    fn name(&self) -> &str {
        &self.name
    }

    fn tick(&mut self, blackboard: &mut Blackboard) -> NodeStatus {
        if self.children.is_empty() {
            return NodeStatus::Success;
        }

        loop {
            match self.children[self.cursor].tick(blackboard) {
                NodeStatus::Running => return NodeStatus::Running,
                NodeStatus::Failure => {
                    self.reset();
                    return NodeStatus::Failure;
                }
                NodeStatus::Success => {
                    self.cursor += 1;
                    if self.cursor >= self.children.len() {
                        self.reset();
                        return NodeStatus::Success;
                    }
                    if !self.process_multiple {
                        return NodeStatus::Running;
                    }
                }
            }
        }
    }

    fn reset(&mut self) {
        self.cursor = 0;
        for child in &mut self.children {
            child.reset();
        }
    }
}

/// Tries children in order until one does not fail
pub struct Selector {
    name: String,
    children: Children,
    cursor: usize,
}

impl Selector {
    pub fn new(name: impl Into<String>, children: Children) -> Self {
        Self {
            name: name.into(),
            children,
            cursor: 0,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl Node for Selector {
    fn name(&self) -> &str {
        &self.name
    }

    fn tick(&mut self, blackboard: &mut Blackboard) -> NodeStatus {
        while self.cursor < self.children.len() {
            match self.children[self.cursor].tick(blackboard) {
                NodeStatus::Failure => self.cursor += 1,
                NodeStatus::Running => return NodeStatus::Running,
                NodeStatus::Success => {
                    self.reset();
                    return NodeStatus::Success;
                }
            }
        }
        self.reset();
        NodeStatus::Failure
    }

    fn reset(&mut self) {
        self.cursor = 0;
        for child in &mut self.children {
            child.reset();
        }
    }
}

/// Where a priority selector child gets its priority from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrioritySource {
    Static(i32),
    /// Read from the blackboard whenever the selector re-sorts
    Blackboard { key: String, default: i32 },
}

impl PrioritySource {
    fn resolve(&self, blackboard: &Blackboard) -> i32 {
        match self {
            PrioritySource::Static(priority) => *priority,
            PrioritySource::Blackboard { key, default } => blackboard
                .get_int(key)
                .and_then(|value| i32::try_from(value).ok())
                .unwrap_or(*default),
        }
    }
}

pub struct PriorityChild {
    pub priority: PrioritySource,
    pub node: BoxedNode,
}

/// Selector over children ordered by descending priority, re-evaluated
/// from the top every tick so higher branches preempt lower ones
pub struct PrioritySelector {
    name: String,
    children: Vec<PriorityChild>,
    /// Child indices, highest priority first
    order: SmallVec<[usize; 4]>,
    needs_sort: bool,
    running: Option<usize>,
}

impl PrioritySelector {
    pub fn new(name: impl Into<String>, children: Vec<PriorityChild>) -> Self {
        Self {
            name: name.into(),
            order: (0..children.len()).collect(),
            children,
            needs_sort: true,
            running: None,
        }
    }

    /// Child names in evaluation order as of the last sort
    pub fn evaluation_order(&self) -> Vec<&str> {
        self.order
            .iter()
            .map(|&index| self.children[index].node.name())
            .collect()
    }

    fn sort(&mut self, blackboard: &Blackboard) {
        let priorities: SmallVec<[i32; 4]> = self
            .children
            .iter()
            .map(|child| child.priority.resolve(blackboard))
            .collect();
        self.order = (0..self.children.len()).collect();
        // Stable: equal priorities keep declaration order
        self.order.sort_by(|&a, &b| priorities[b].cmp(&priorities[a]));
        self.needs_sort = false;
    }

    fn switch_to(&mut self, index: Option<usize>) {
        if let Some(previous) = self.running {
            if Some(previous) != index {
                self.children[previous].node.reset();
            }
        }
        self.running = index;
    }
}

impl Node for PrioritySelector {
    fn name(&self) -> &str {
        &self.name
    }

    fn tick(&mut self, blackboard: &mut Blackboard) -> NodeStatus {
        if self.needs_sort {
            self.sort(blackboard);
        }

        for position in 0..self.order.len() {
            let index = self.order[position];
            match self.children[index].node.tick(blackboard) {
                NodeStatus::Failure => continue,
                NodeStatus::Running => {
                    self.switch_to(Some(index));
                    return NodeStatus::Running;
                }
                NodeStatus::Success => {
                    self.switch_to(Some(index));
                    self.running = None;
                    return NodeStatus::Success;
                }
            }
        }

        self.running = None;
        NodeStatus::Failure
    }

    fn reset(&mut self) {
        self.running = None;
        self.needs_sort = true;
        for child in &mut self.children {
            child.node.reset();
        }
    }
}

/// When a parallel node resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParallelPolicy {
    /// Success once every child succeeded; failure on the first failure
    #[default]
    SuccessOnAll,
    /// Success on the first success; failure once every child failed
    SuccessOnOne,
}

impl ParallelPolicy {
    fn resolve(&self, successes: usize, failures: usize, total: usize) -> Option<NodeStatus> {
        match self {
            ParallelPolicy::SuccessOnAll => {
                if failures > 0 {
                    Some(NodeStatus::Failure)
                } else if successes >= total {
                    Some(NodeStatus::Success)
                } else {
                    None
                }
            }
            ParallelPolicy::SuccessOnOne => {
                if successes > 0 {
                    Some(NodeStatus::Success)
                } else if failures >= total {
                    Some(NodeStatus::Failure)
                } else {
                    None
                }
            }
        }
    }
}

/// Ticks every unresolved child each tick
pub struct Parallel {
    name: String,
    children: Children,
    active: SmallVec<[bool; 4]>,
    successes: usize,
    failures: usize,
    policy: ParallelPolicy,
}

impl Parallel {
    pub fn new(name: impl Into<String>, policy: ParallelPolicy, children: Children) -> Self {
        Self {
            name: name.into(),
            active: SmallVec::from_elem(true, children.len()),
            children,
            successes: 0,
            failures: 0,
            policy,
        }
    }
}

impl Node for Parallel {
    fn name(&self) -> &str {
        &self.name
    }

    fn tick(&mut self, blackboard: &mut Blackboard) -> NodeStatus {
        if self.children.is_empty() {
            return NodeStatus::Success;
        }

        for (child, active) in self.children.iter_mut().zip(self.active.iter_mut()) {
            if !*active {
                continue;
            }
            match child.tick(blackboard) {
                NodeStatus::Running => {}
                NodeStatus::Success => {
                    self.successes += 1;
                    *active = false;
                }
                NodeStatus::Failure => {
                    self.failures += 1;
                    *active = false;
                }
            }
        }

        match self
            .policy
            .resolve(self.successes, self.failures, self.children.len())
        {
            Some(status) => {
                self.reset();
                status
            }
            None => NodeStatus::Running,
        }
    }

    fn reset(&mut self) {
        self.successes = 0;
        self.failures = 0;
        self.active.iter_mut().for_each(|active| *active = true);
        for child in &mut self.children {
            child.reset();
        }
    }
}

/// Swaps success and failure of its child
pub struct Inverter {
    name: String,
    child: BoxedNode,
}

impl Inverter {
    pub fn new(name: impl Into<String>, child: BoxedNode) -> Self {
        Self {
            name: name.into(),
            child,
        }
    }
}

impl Node for Inverter {
    fn name(&self) -> &str {
        &self.name
    }

    fn tick(&mut self, blackboard: &mut Blackboard) -> NodeStatus {
        match self.child.tick(blackboard) {
            NodeStatus::Success => NodeStatus::Failure,
            NodeStatus::Failure => NodeStatus::Success,
            NodeStatus::Running => NodeStatus::Running,
        }
    }

    fn reset(&mut self) {
        self.child.reset();
    }
}

/// Leaf dispatching to a named action. Unregistered names always fail.
pub struct Action {
    name: String,
    action: Option<ActionFn>,
}

impl Action {
    pub fn new(name: impl Into<String>, action: Option<ActionFn>) -> Self {
        Self {
            name: name.into(),
            action,
        }
    }
}

impl Node for Action {
    fn name(&self) -> &str {
        &self.name
    }

    fn tick(&mut self, blackboard: &mut Blackboard) -> NodeStatus {
        match &self.action {
            Some(action) => action(blackboard),
            None => {
                warn_once(
                    &format!("behavior.action.{}", self.name),
                    &format!("Unknown action '{}', treating as failure", self.name),
                );
                NodeStatus::Failure
            }
        }
    }

    fn reset(&mut self) {}
}

/// Leaf evaluating a named condition. Unregistered names always fail.
pub struct Condition {
    name: String,
    condition: Option<ConditionFn>,
}

impl Condition {
    pub fn new(name: impl Into<String>, condition: Option<ConditionFn>) -> Self {
        Self {
            name: name.into(),
            condition,
        }
    }
}

impl Node for Condition {
    fn name(&self) -> &str {
        &self.name
    }

    fn tick(&mut self, blackboard: &mut Blackboard) -> NodeStatus {
        match &self.condition {
            Some(condition) => NodeStatus::from_bool(condition(blackboard)),
            None => {
                warn_once(
                    &format!("behavior.condition.{}", self.name),
                    &format!("Unknown condition '{}', treating as failure", self.name),
                );
                NodeStatus::Failure
            }
        }
    }

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    /// Action that counts its ticks in the blackboard and returns `status`
    fn counting(name: &'static str, status: NodeStatus) -> BoxedNode {
        let key = format!("ticks.{}", name);
        Box::new(Action::new(
            name,
            Some(Arc::new(move |bb: &mut Blackboard| {
                let count = bb.get_int(&key).unwrap_or(0);
                bb.set(&key, count + 1);
                status
            })),
        ))
    }

    /// Action whose result is read from `result.<name>` (default Running)
    fn scripted(name: &'static str) -> BoxedNode {
        let tick_key = format!("ticks.{}", name);
        let result_key = format!("result.{}", name);
        Box::new(Action::new(
            name,
            Some(Arc::new(move |bb: &mut Blackboard| {
                let count = bb.get_int(&tick_key).unwrap_or(0);
                bb.set(&tick_key, count + 1);
                match bb.get_text(&result_key) {
                    Some("success") => NodeStatus::Success,
                    Some("failure") => NodeStatus::Failure,
                    _ => NodeStatus::Running,
                }
            })),
        ))
    }

    fn flag(key: &'static str) -> BoxedNode {
        Box::new(Condition::new(key, Some(Arc::new(move |bb: &Blackboard| bb.flag(key)))))
    }

    fn ticks(bb: &Blackboard, name: &str) -> i64 {
        bb.get_int(&format!("ticks.{}", name)).unwrap_or(0)
    }

    #[test]
    fn test_sequence_of_successes() {
        let mut bb = Blackboard::new();
        let mut seq = Sequence::new(
            "seq",
            smallvec![
                counting("a", NodeStatus::Success),
                counting("b", NodeStatus::Success),
                counting("c", NodeStatus::Success),
            ],
        );

        assert_eq!(seq.tick(&mut bb), NodeStatus::Success);
        assert_eq!(seq.cursor(), 0);
        assert_eq!((ticks(&bb, "a"), ticks(&bb, "b"), ticks(&bb, "c")), (1, 1, 1));

        assert_eq!(seq.tick(&mut bb), NodeStatus::Success);
        assert_eq!(ticks(&bb, "c"), 2);
    }

    #[test]
    fn test_sequence_one_child_per_tick() {
        let mut bb = Blackboard::new();
        let mut seq = Sequence::new(
            "seq",
            smallvec![
                counting("a", NodeStatus::Success),
                counting("b", NodeStatus::Success),
                counting("c", NodeStatus::Success),
            ],
        )
        .with_process_multiple(false);

        assert_eq!(seq.tick(&mut bb), NodeStatus::Running);
        assert_eq!(seq.cursor(), 1);
        assert_eq!(seq.tick(&mut bb), NodeStatus::Running);
        assert_eq!(seq.tick(&mut bb), NodeStatus::Success);
        assert_eq!(seq.cursor(), 0);
        assert_eq!((ticks(&bb, "a"), ticks(&bb, "b"), ticks(&bb, "c")), (1, 1, 1));
    }

    #[test]
    fn test_sequence_failure_resets_cursor() {
        let mut bb = Blackboard::new();
        let mut seq = Sequence::new(
            "seq",
            smallvec![counting("a", NodeStatus::Success), scripted("b"), counting("c", NodeStatus::Success)],
        );

        assert_eq!(seq.tick(&mut bb), NodeStatus::Running);
        assert_eq!(seq.cursor(), 1);
        // Running child resumes without re-ticking "a"
        assert_eq!(seq.tick(&mut bb), NodeStatus::Running);
        assert_eq!(ticks(&bb, "a"), 1);

        bb.set("result.b", "failure");
        assert_eq!(seq.tick(&mut bb), NodeStatus::Failure);
        assert_eq!(seq.cursor(), 0);
        assert_eq!(ticks(&bb, "c"), 0);
    }

    #[test]
    fn test_selector_short_circuits() {
        let mut bb = Blackboard::new();
        let mut sel = Selector::new(
            "sel",
            smallvec![
                counting("a", NodeStatus::Failure),
                counting("b", NodeStatus::Success),
                counting("c", NodeStatus::Failure),
            ],
        );

        assert_eq!(sel.tick(&mut bb), NodeStatus::Success);
        assert_eq!((ticks(&bb, "a"), ticks(&bb, "b"), ticks(&bb, "c")), (1, 1, 0));
        assert_eq!(sel.cursor(), 0);
    }

    #[test]
    fn test_selector_exhausted_fails() {
        let mut bb = Blackboard::new();
        let mut sel = Selector::new(
            "sel",
            smallvec![counting("a", NodeStatus::Failure), counting("b", NodeStatus::Failure)],
        );
        assert_eq!(sel.tick(&mut bb), NodeStatus::Failure);
        assert_eq!(sel.cursor(), 0);
        assert_eq!(Selector::new("empty", Children::new()).tick(&mut bb), NodeStatus::Failure);
    }

    fn preemption_tree() -> PrioritySelector {
        PrioritySelector::new(
            "root",
            vec![
                PriorityChild {
                    priority: PrioritySource::Static(0),
                    node: counting("idle", NodeStatus::Success),
                },
                PriorityChild {
                    priority: PrioritySource::Static(20),
                    node: Box::new(Sequence::new("flee", smallvec![flag("danger"), scripted("run")])),
                },
                PriorityChild {
                    priority: PrioritySource::Static(10),
                    node: Box::new(
                        Sequence::new(
                            "attack",
                            smallvec![counting("aim", NodeStatus::Success), scripted("shoot")],
                        )
                        .with_process_multiple(false),
                    ),
                },
            ],
        )
    }

    #[test]
    fn test_priority_order() {
        let mut bb = Blackboard::new();
        let mut tree = preemption_tree();
        tree.tick(&mut bb);
        assert_eq!(tree.evaluation_order(), vec!["flee", "attack", "idle"]);
    }

    #[test]
    fn test_priority_preemption() {
        let mut bb = Blackboard::new();
        let mut tree = preemption_tree();

        // Attack branch starts: aim succeeds, sequence yields Running
        assert_eq!(tree.tick(&mut bb), NodeStatus::Running);
        assert_eq!(ticks(&bb, "aim"), 1);
        // Mid-sequence: shoot is running
        assert_eq!(tree.tick(&mut bb), NodeStatus::Running);
        assert_eq!(ticks(&bb, "shoot"), 1);
        assert_eq!(ticks(&bb, "run"), 0);

        // Danger appears: flee takes over on the very next tick
        bb.set("danger", true);
        assert_eq!(tree.tick(&mut bb), NodeStatus::Running);
        assert_eq!(ticks(&bb, "run"), 1);
        assert_eq!(ticks(&bb, "shoot"), 1);

        // Flee completes; with danger gone, attack restarts from its first child
        bb.set("danger", false);
        bb.set("result.run", "success");
        assert_eq!(tree.tick(&mut bb), NodeStatus::Success);
        assert_eq!(tree.tick(&mut bb), NodeStatus::Running);
        assert_eq!(ticks(&bb, "aim"), 2);
        assert_eq!(ticks(&bb, "idle"), 0);
    }

    #[test]
    fn test_priority_falls_through_to_lowest() {
        let mut bb = Blackboard::new();
        bb.set("result.shoot", "failure");
        let mut tree = preemption_tree();

        // aim succeeds → Running; then shoot fails → idle runs
        assert_eq!(tree.tick(&mut bb), NodeStatus::Running);
        assert_eq!(tree.tick(&mut bb), NodeStatus::Success);
        assert_eq!(ticks(&bb, "idle"), 1);
    }

    #[test]
    fn test_priority_from_blackboard_resorts_after_reset() {
        let mut bb = Blackboard::new();
        bb.set("prio.a", 50i64);
        let mut tree = PrioritySelector::new(
            "root",
            vec![
                PriorityChild {
                    priority: PrioritySource::Blackboard {
                        key: "prio.a".to_string(),
                        default: 0,
                    },
                    node: counting("a", NodeStatus::Success),
                },
                PriorityChild {
                    priority: PrioritySource::Static(5),
                    node: counting("b", NodeStatus::Success),
                },
            ],
        );

        tree.tick(&mut bb);
        assert_eq!(tree.evaluation_order(), vec!["a", "b"]);

        // Not re-sorted until reset
        bb.set("prio.a", 1i64);
        tree.tick(&mut bb);
        assert_eq!(tree.evaluation_order(), vec!["a", "b"]);

        tree.reset();
        tree.tick(&mut bb);
        assert_eq!(tree.evaluation_order(), vec!["b", "a"]);
    }

    #[test]
    fn test_parallel_success_on_all() {
        let mut bb = Blackboard::new();
        let mut par = Parallel::new(
            "par",
            ParallelPolicy::SuccessOnAll,
            smallvec![counting("a", NodeStatus::Success), scripted("b")],
        );

        assert_eq!(par.tick(&mut bb), NodeStatus::Running);
        assert_eq!(par.tick(&mut bb), NodeStatus::Running);
        // Resolved children are not ticked again
        assert_eq!(ticks(&bb, "a"), 1);
        assert_eq!(ticks(&bb, "b"), 2);

        bb.set("result.b", "success");
        assert_eq!(par.tick(&mut bb), NodeStatus::Success);

        // Reset after resolving: "a" runs again
        bb.set("result.b", "running");
        assert_eq!(par.tick(&mut bb), NodeStatus::Running);
        assert_eq!(ticks(&bb, "a"), 2);
    }

    #[test]
    fn test_parallel_success_on_all_fails_fast() {
        let mut bb = Blackboard::new();
        let mut par = Parallel::new(
            "par",
            ParallelPolicy::SuccessOnAll,
            smallvec![counting("a", NodeStatus::Failure), scripted("b")],
        );
        assert_eq!(par.tick(&mut bb), NodeStatus::Failure);
    }

    #[test]
    fn test_parallel_success_on_one() {
        let mut bb = Blackboard::new();
        let mut par = Parallel::new(
            "par",
            ParallelPolicy::SuccessOnOne,
            smallvec![counting("a", NodeStatus::Failure), scripted("b")],
        );
        assert_eq!(par.tick(&mut bb), NodeStatus::Running);

        bb.set("result.b", "success");
        assert_eq!(par.tick(&mut bb), NodeStatus::Success);

        let mut all_fail = Parallel::new(
            "par",
            ParallelPolicy::SuccessOnOne,
            smallvec![counting("x", NodeStatus::Failure), counting("y", NodeStatus::Failure)],
        );
        assert_eq!(all_fail.tick(&mut bb), NodeStatus::Failure);
    }

    #[test]
    fn test_inverter() {
        let mut bb = Blackboard::new();
        let mut inv = Inverter::new("not_danger", flag("danger"));
        assert_eq!(inv.tick(&mut bb), NodeStatus::Success);
        bb.set("danger", true);
        assert_eq!(inv.tick(&mut bb), NodeStatus::Failure);

        let mut running = Inverter::new("inv", scripted("r"));
        assert_eq!(running.tick(&mut bb), NodeStatus::Running);
    }

    #[test]
    fn test_unknown_leaves_fail() {
        let mut bb = Blackboard::new();
        let mut action = Action::new("does_not_exist", None);
        let mut condition = Condition::new("nope", None);
        for _ in 0..3 {
            assert_eq!(action.tick(&mut bb), NodeStatus::Failure);
            assert_eq!(condition.tick(&mut bb), NodeStatus::Failure);
        }
        assert!(bb.is_empty());
    }
}
