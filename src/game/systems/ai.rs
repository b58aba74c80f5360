use rand::Rng;

use crate::behavior::{BehaviorRegistry, BehaviorTree, Blackboard, NodeStatus, TreeError, TreeFactory};
use crate::game::constants::ai::*;
use crate::game::entity::{EntityId, Team};
use crate::game::systems::detection::{
    find_priority_target, nearest_enemy_drone, DetectedEntity, DetectionSystem, ScanOptions,
};
use crate::game::systems::navigation::{NavigationMode, Navigator};
use crate::util::log_once::warn_once;
use crate::util::vec2::Vec2;

/// Blackboard keys shared between the sensor step, drone leaves and intents
pub mod keys {
    pub const SELF_POSITION: &str = "self.position";
    pub const SELF_HEALTH: &str = "self.health_pct";
    pub const AGGRESSION: &str = "self.aggression";
    pub const FLEE_THRESHOLD: &str = "self.flee_threshold";
    pub const FIRE_RANGE: &str = "self.fire_range";

    pub const TARGET_ID: &str = "target.id";
    pub const TARGET_POSITION: &str = "target.position";
    pub const TARGET_DISTANCE: &str = "target.distance";
    pub const THREAT_ID: &str = "threat.id";
    pub const THREAT_POSITION: &str = "threat.position";

    pub const NAV_MODE: &str = "nav.mode";
    pub const NAV_TARGET: &str = "nav.target";
    pub const WEAPON_FIRE: &str = "weapon.fire";
    pub const WEAPON_AIM: &str = "weapon.aim";
}

/// Stock drone brain: flee when hurt and threatened, otherwise hunt the
/// priority target, otherwise wander.
pub const DEFAULT_DRONE_TREE: &str = r#"{
    "name": "drone",
    "root": {
        "type": "priority_selector",
        "name": "root",
        "children": [
            { "priority": 20, "node": {
                "type": "sequence",
                "name": "flee",
                "children": [
                    { "type": "condition", "name": "is_low_health" },
                    { "type": "condition", "name": "has_threat" },
                    { "type": "action", "name": "hold_fire" },
                    { "type": "action", "name": "flee_threat" }
                ]
            } },
            { "priority": 10, "node": {
                "type": "sequence",
                "name": "attack",
                "children": [
                    { "type": "condition", "name": "has_target" },
                    { "type": "action", "name": "follow_target" },
                    { "type": "selector", "name": "weapon", "children": [
                        { "type": "sequence", "children": [
                            { "type": "condition", "name": "target_in_range" },
                            { "type": "action", "name": "fire_at_target" }
                        ] },
                        { "type": "action", "name": "hold_fire" }
                    ] }
                ]
            } },
            { "priority": 0, "node": {
                "type": "sequence",
                "name": "wander",
                "children": [
                    { "type": "action", "name": "hold_fire" },
                    { "type": "action", "name": "wander" }
                ]
            } }
        ]
    }
}"#;

fn set_mode(bb: &mut Blackboard, mode: NavigationMode) {
    bb.set(keys::NAV_MODE, mode.name());
}

impl BehaviorRegistry {
    /// Conditions and actions used by drone trees. Actions only record
    /// intent and finish in the same tick.
    pub fn drone_defaults() -> Self {
        let mut registry = Self::new();

        registry
            .register_condition("has_target", |bb| bb.contains(keys::TARGET_ID))
            .register_condition("has_threat", |bb| bb.contains(keys::THREAT_ID))
            .register_condition("is_low_health", |bb| {
                let health = bb.get_float(keys::SELF_HEALTH).unwrap_or(1.0);
                let threshold = bb.get_float(keys::FLEE_THRESHOLD).unwrap_or(FLEE_HEALTH_THRESHOLD);
                health < threshold
            })
            .register_condition("target_in_range", |bb| {
                let range = bb.get_float(keys::FIRE_RANGE).unwrap_or(FIRE_RANGE);
                bb.get_float(keys::TARGET_DISTANCE)
                    .map_or(false, |distance| distance <= range)
            });

        registry
            .register_action("wander", |bb| {
                set_mode(bb, NavigationMode::Wander);
                bb.remove(keys::NAV_TARGET);
                NodeStatus::Success
            })
            .register_action("follow_target", |bb| match bb.get_vec2(keys::TARGET_POSITION) {
                Some(target) => {
                    set_mode(bb, NavigationMode::Follow);
                    bb.set(keys::NAV_TARGET, target);
                    NodeStatus::Success
                }
                None => NodeStatus::Failure,
            })
            .register_action("flee_threat", |bb| match bb.get_vec2(keys::THREAT_POSITION) {
                Some(threat) => {
                    set_mode(bb, NavigationMode::Flee);
                    bb.set(keys::NAV_TARGET, threat);
                    NodeStatus::Success
                }
                None => NodeStatus::Failure,
            })
            .register_action("fire_at_target", |bb| {
                let (Some(target), Some(me)) = (bb.get_vec2(keys::TARGET_POSITION), bb.get_vec2(keys::SELF_POSITION))
                else {
                    return NodeStatus::Failure;
                };
                bb.set(keys::WEAPON_AIM, (target - me).normalize());
                bb.set(keys::WEAPON_FIRE, true);
                NodeStatus::Success
            })
            .register_action("hold_fire", |bb| {
                bb.set(keys::WEAPON_FIRE, false);
                NodeStatus::Success
            })
            .register_action("clear_target", |bb| {
                bb.remove(keys::TARGET_ID);
                bb.remove(keys::TARGET_POSITION);
                bb.remove(keys::TARGET_DISTANCE);
                NodeStatus::Success
            })
            .register_action("stop", |bb| {
                set_mode(bb, NavigationMode::None);
                bb.remove(keys::NAV_TARGET);
                NodeStatus::Success
            });

        registry
    }
}

/// AI personality traits
#[derive(Debug, Clone, Copy)]
pub struct AiPersonality {
    /// How readily the drone picks fights with other drones (0.0-1.0)
    pub aggression: f32,
    /// Health fraction below which a threatened drone runs
    pub flee_health_threshold: f32,
}

impl AiPersonality {
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            aggression: rng.gen_range(AGGRESSION_MIN..AGGRESSION_MAX),
            flee_health_threshold: FLEE_HEALTH_THRESHOLD,
        }
    }
}

impl Default for AiPersonality {
    fn default() -> Self {
        Self {
            aggression: 0.5,
            flee_health_threshold: FLEE_HEALTH_THRESHOLD,
        }
    }
}

/// What the owning drone looks like this tick
#[derive(Debug, Clone, Copy)]
pub struct AgentView {
    pub position: Vec2,
    pub team: Team,
    pub level: u32,
    pub health_pct: f32,
    pub detection_radius: f32,
}

/// Movement and weapon intent produced by one agent update
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AiDecision {
    pub direction: Vec2,
    pub aim: Vec2,
    pub fire: bool,
}

/// Result of the most recent perception scan, served stale between scans
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanSnapshot {
    pub target: Option<DetectedEntity>,
    pub threat: Option<DetectedEntity>,
}

/// Behavior tree, steering and perception state for one AI drone
pub struct AiAgent {
    tree: BehaviorTree,
    navigator: Navigator,
    personality: AiPersonality,
    scan_interval: f32,
    time_since_scan: f32,
    snapshot: ScanSnapshot,
}

impl AiAgent {
    pub fn new(mut tree: BehaviorTree, navigator: Navigator, personality: AiPersonality, scan_interval: f32) -> Self {
        let bb = tree.blackboard_mut();
        bb.set(keys::AGGRESSION, personality.aggression);
        bb.set(keys::FLEE_THRESHOLD, personality.flee_health_threshold);
        if !bb.contains(keys::FIRE_RANGE) {
            bb.set(keys::FIRE_RANGE, FIRE_RANGE);
        }

        Self {
            tree,
            navigator,
            personality,
            scan_interval,
            // First update scans immediately
            time_since_scan: scan_interval,
            snapshot: ScanSnapshot::default(),
        }
    }

    /// Agent running the stock drone tree
    pub fn with_default_tree(
        factory: &TreeFactory,
        navigator: Navigator,
        personality: AiPersonality,
        scan_interval: f32,
    ) -> Result<Self, TreeError> {
        let tree = factory.build_json(DEFAULT_DRONE_TREE)?;
        Ok(Self::new(tree, navigator, personality, scan_interval))
    }

    pub fn personality(&self) -> &AiPersonality {
        &self.personality
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn snapshot(&self) -> &ScanSnapshot {
        &self.snapshot
    }

    pub fn blackboard(&self) -> &Blackboard {
        self.tree.blackboard()
    }

    /// Sense, decide and steer for one tick
    pub fn update<R: Rng + ?Sized>(
        &mut self,
        id: EntityId,
        view: &AgentView,
        detection: &DetectionSystem,
        dt: f32,
        rng: &mut R,
    ) -> AiDecision {
        self.time_since_scan += dt;
        if self.time_since_scan >= self.scan_interval {
            self.time_since_scan = 0.0;
            self.scan(id, view, detection);
        }

        self.write_sensors(view);
        self.tree.tick();
        self.read_intents(view, dt, rng)
    }

    fn scan(&mut self, id: EntityId, view: &AgentView, detection: &DetectionSystem) {
        let detected = detection.scan_area(
            id,
            view.position,
            view.detection_radius,
            view.team,
            &ScanOptions::targets(),
        );
        self.snapshot = ScanSnapshot {
            target: find_priority_target(view.level, &detected, view.detection_radius, self.personality.aggression)
                .copied(),
            threat: nearest_enemy_drone(view.team, &detected).copied(),
        };

        #[cfg(feature = "trace_ticks")]
        tracing::trace!(
            agent = id,
            seen = detected.len(),
            target = ?self.snapshot.target.map(|t| t.id),
            threat = ?self.snapshot.threat.map(|t| t.id),
            "scan"
        );
    }

    fn write_sensors(&mut self, view: &AgentView) {
        let snapshot = self.snapshot;
        let bb = self.tree.blackboard_mut();
        bb.set(keys::SELF_POSITION, view.position);
        bb.set(keys::SELF_HEALTH, view.health_pct);

        match snapshot.target {
            Some(target) => {
                bb.set_entity(keys::TARGET_ID, target.id);
                bb.set(keys::TARGET_POSITION, target.position);
                bb.set(keys::TARGET_DISTANCE, view.position.distance_to(target.position));
            }
            None => {
                bb.remove(keys::TARGET_ID);
                bb.remove(keys::TARGET_POSITION);
                bb.remove(keys::TARGET_DISTANCE);
            }
        }

        match snapshot.threat {
            Some(threat) => {
                bb.set_entity(keys::THREAT_ID, threat.id);
                bb.set(keys::THREAT_POSITION, threat.position);
            }
            None => {
                bb.remove(keys::THREAT_ID);
                bb.remove(keys::THREAT_POSITION);
            }
        }
    }

    fn read_intents<R: Rng + ?Sized>(&mut self, view: &AgentView, dt: f32, rng: &mut R) -> AiDecision {
        let bb = self.tree.blackboard();
        let mode = match bb.get_text(keys::NAV_MODE) {
            Some(name) => NavigationMode::from_name(name).unwrap_or_else(|| {
                warn_once(
                    &format!("ai.nav_mode.{}", name),
                    &format!("Unknown navigation mode '{}', standing still", name),
                );
                NavigationMode::None
            }),
            None => NavigationMode::None,
        };
        let nav_target = bb.get_vec2(keys::NAV_TARGET);
        let fire = bb.flag(keys::WEAPON_FIRE);
        let aim = bb.get_vec2(keys::WEAPON_AIM).unwrap_or(Vec2::ZERO);

        self.navigator.set_mode(mode);
        let direction = self.navigator.compute_direction(view.position, nav_target, dt, rng);

        AiDecision { direction, aim, fire }
    }
}

impl std::fmt::Debug for AiAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AiAgent")
            .field("tree", &self.tree.name())
            .field("mode", &self.navigator.mode())
            .field("personality", &self.personality)
            .finish()
    }
}
