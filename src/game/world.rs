//! The simulation world: owns every entity and runs the fixed tick
//!
//! Tick order: AI decisions → weapons and movement forces → integration and
//! arena containment → collision detection, resolution and contact damage →
//! removal of everything marked this tick → perception snapshot rebuild.

use hashbrown::HashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use uuid::Uuid;

use crate::behavior::{BehaviorRegistry, TreeDefinition, TreeError, TreeFactory};
use crate::config::{ConfigError, SimConfig};
use crate::game::constants::entity::PROJECTILE_RADIUS;
use crate::game::entity::{
    ArenaObject, Controller, Damageable, Drone, DroneInput, Entity, EntityId, EntityKind, Health, Projectile, Team,
    Transform,
};
use crate::game::performance::{PerformanceMonitor, PerformanceStatus};
use crate::game::stats::{StatBlock, StatKind, UpgradeKind, UpgradeTable};
use crate::game::systems::ai::{AgentView, AiAgent, AiPersonality};
use crate::game::systems::collision::{
    dispatch_events, CollisionBodies, CollisionEvent, CollisionHandler, CollisionSystem, ContactPhase,
};
use crate::game::systems::detection::{DetectedKind, DetectionEntry, DetectionSystem};
use crate::game::systems::navigation::{NavigationSettings, Navigator};
use crate::game::systems::physics::{contain_in_arena, Rigidbody};
use crate::util::vec2::Vec2;

/// Spawn refused
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("world is full ({max} entities)")]
    CapacityReached { max: usize },
    #[error("projectile owner {0} does not exist")]
    UnknownOwner(EntityId),
    #[error("tick budget exhausted ({0:?}), spawn refused")]
    Overloaded(PerformanceStatus),
    #[error("object {field} must be positive and finite, got {value}")]
    InvalidObject { field: &'static str, value: f32 },
    #[error("object radius {radius} exceeds the arena radius {arena}")]
    ObjectTooLarge { radius: f32, arena: f32 },
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Everything needed to put a drone into the arena
#[derive(Debug, Clone)]
pub struct DroneSpawn {
    pub position: Vec2,
    pub team: Team,
    pub controller: Controller,
    pub stats: StatBlock,
    /// AI only; random when absent
    pub personality: Option<AiPersonality>,
    /// AI only; the stock drone tree when absent
    pub tree: Option<TreeDefinition>,
}

impl DroneSpawn {
    pub fn ai(position: Vec2, team: Team) -> Self {
        Self {
            position,
            team,
            controller: Controller::Ai,
            stats: StatBlock::drone_defaults(),
            personality: None,
            tree: None,
        }
    }

    pub fn player(position: Vec2, team: Team) -> Self {
        Self {
            controller: Controller::Player,
            ..Self::ai(position, team)
        }
    }

    pub fn with_stats(mut self, stats: StatBlock) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_personality(mut self, personality: AiPersonality) -> Self {
        self.personality = Some(personality);
        self
    }

    pub fn with_tree(mut self, tree: TreeDefinition) -> Self {
        self.tree = Some(tree);
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ProjectileSpawn {
    pub owner: EntityId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub damage: f32,
    pub lifetime: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct ObjectSpawn {
    pub position: Vec2,
    pub radius: f32,
    pub health: f32,
    pub experience: f32,
    pub body_damage: f32,
    /// Zero or negative for an immovable object
    pub mass: f32,
}

impl Default for ObjectSpawn {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            radius: 0.75,
            health: 30.0,
            experience: 10.0,
            body_damage: 5.0,
            mass: 4.0,
        }
    }
}

/// Contact transitions seen during the last tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContactCounts {
    pub enters: usize,
    pub stays: usize,
    pub exits: usize,
}

impl ContactCounts {
    fn record(&mut self, events: &[CollisionEvent]) {
        for event in events {
            match event.phase {
                ContactPhase::Enter => self.enters += 1,
                ContactPhase::Stay => self.stays += 1,
                ContactPhase::Exit => self.exits += 1,
            }
        }
    }
}

/// Snapshot of world counters for logging
#[derive(Debug, Clone, Copy, Serialize)]
pub struct WorldStats {
    pub tick: u64,
    pub entities: usize,
    pub drones: usize,
    pub ai_agents: usize,
    pub projectiles: usize,
    pub objects: usize,
    pub overlapping_pairs: usize,
    pub contacts: ContactCounts,
}

impl CollisionBodies for HashMap<EntityId, Entity> {
    fn body(&self, id: EntityId) -> Option<(&Transform, &Rigidbody)> {
        self.get(&id).map(|entity| (&entity.transform, &entity.body))
    }

    fn transform_mut(&mut self, id: EntityId) -> Option<&mut Transform> {
        self.get_mut(&id).map(|entity| &mut entity.transform)
    }
}

/// Applies contact damage and awards experience for kills
struct ContactResolver<'a> {
    entities: &'a mut HashMap<EntityId, Entity>,
}

impl ContactResolver<'_> {
    /// Damage `target`; on a kill, mark it and pay `attacker` its drop
    fn hit(&mut self, attacker: Option<EntityId>, target: EntityId, amount: f32) {
        let Some(entity) = self.entities.get_mut(&target) else {
            return;
        };
        let Some(damageable) = entity.damageable_mut() else {
            return;
        };
        if !damageable.take_damage(amount) {
            return;
        }

        let reward = damageable.experience_drop();
        entity.transform.mark_for_removal();
        tracing::debug!(id = target, ?attacker, reward, "entity destroyed");

        let Some(attacker) = attacker else {
            return;
        };
        if let Some(drone) = self.entities.get_mut(&attacker).and_then(Entity::as_drone_mut) {
            let gained = drone.progression.add_experience(reward);
            if gained > 0 {
                tracing::debug!(
                    drone = attacker,
                    level = drone.progression.level(),
                    points = drone.progression.upgrade_points(),
                    "level up"
                );
            }
        }
    }
}

impl CollisionHandler for ContactResolver<'_> {
    fn on_trigger_enter(&mut self, me: EntityId, other: EntityId) {
        // Handled from the projectile's side only
        let Some(entity) = self.entities.get(&me) else {
            return;
        };
        let EntityKind::Projectile(projectile) = &entity.kind else {
            return;
        };
        // Expired or despawned shots still land this tick; only a prior hit stops them
        if projectile.is_spent() {
            return;
        }
        let (owner, damage) = (projectile.owner, projectile.damage);

        let target_is_damageable = self
            .entities
            .get(&other)
            .map_or(false, |target| target.damageable().is_some());
        if !target_is_damageable {
            return;
        }

        if let Some(entity) = self.entities.get_mut(&me) {
            if let EntityKind::Projectile(projectile) = &mut entity.kind {
                projectile.spend();
            }
            entity.transform.mark_for_removal();
        }
        self.hit(Some(owner), other, damage);
    }

    fn on_collision_enter(&mut self, me: EntityId, other: EntityId) {
        // Each side deals its own body damage to the other
        let (Some(mine), Some(theirs)) = (self.entities.get(&me), self.entities.get(&other)) else {
            return;
        };
        let rams = match (&mine.kind, &theirs.kind) {
            (EntityKind::Drone(_), EntityKind::Drone(_)) => mine.transform.team.is_enemy_of(theirs.transform.team),
            (EntityKind::Drone(_), EntityKind::ArenaObject(_)) | (EntityKind::ArenaObject(_), EntityKind::Drone(_)) => {
                true
            }
            _ => false,
        };
        if !rams {
            return;
        }

        let damage = mine.body_damage();
        let attacker = mine.as_drone().map(|_| me);
        self.hit(attacker, other, damage);
    }
}

pub struct World {
    id: Uuid,
    config: SimConfig,
    entities: HashMap<EntityId, Entity>,
    collision: CollisionSystem,
    detection: DetectionSystem,
    agents: HashMap<EntityId, AiAgent>,
    trees: TreeFactory,
    upgrades: UpgradeTable,
    navigation: NavigationSettings,
    next_id: EntityId,
    tick: u64,
    rng: StdRng,
    monitor: PerformanceMonitor,
    contacts: ContactCounts,
    /// Sorted id scratch buffer, reused every tick
    order: Vec<EntityId>,
}

impl World {
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic world for tests and replays
    pub fn with_seed(config: SimConfig, seed: u64) -> Result<Self, ConfigError> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: SimConfig, rng: StdRng) -> Result<Self, ConfigError> {
        config.validate()?;

        let navigation = NavigationSettings {
            arena_radius: config.arena_radius,
            inner_radius: config.wander_inner_radius,
            ..NavigationSettings::default()
        };
        let world = Self {
            id: Uuid::new_v4(),
            collision: CollisionSystem::new(config.collision_cell_size),
            detection: DetectionSystem::new(config.detection_cell_size),
            entities: HashMap::with_capacity(config.max_entities),
            agents: HashMap::new(),
            trees: TreeFactory::new(BehaviorRegistry::drone_defaults()),
            upgrades: UpgradeTable::default_table(),
            navigation,
            next_id: 1,
            tick: 0,
            rng,
            monitor: PerformanceMonitor::new(config.tick_rate),
            contacts: ContactCounts::default(),
            order: Vec::new(),
            config,
        };

        tracing::info!(
            world = %world.id,
            arena_radius = world.config.arena_radius,
            tick_rate = world.config.tick_rate,
            "World created"
        );
        Ok(world)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn agent(&self, id: EntityId) -> Option<&AiAgent> {
        self.agents.get(&id)
    }

    pub fn collision(&self) -> &CollisionSystem {
        &self.collision
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    /// Feed external timings (e.g. network work done in the same tick)
    pub fn monitor_mut(&mut self) -> &mut PerformanceMonitor {
        &mut self.monitor
    }

    /// Replace the static upgrade content
    pub fn set_upgrade_table(&mut self, table: UpgradeTable) {
        self.upgrades = table;
    }

    /// Register extra actions/conditions for trees spawned from now on
    pub fn behavior_registry_mut(&mut self) -> &mut BehaviorRegistry {
        self.trees.registry_mut()
    }

    fn allocate_id(&mut self) -> Result<EntityId, SpawnError> {
        if self.entities.len() >= self.config.max_entities {
            return Err(SpawnError::CapacityReached {
                max: self.config.max_entities,
            });
        }
        let id = self.next_id;
        self.next_id += 1;
        Ok(id)
    }

    fn insert(&mut self, entity: Entity) -> EntityId {
        let id = entity.id;
        self.collision.register(id, entity.collider());
        self.entities.insert(id, entity);
        id
    }

    pub fn spawn_drone(&mut self, spawn: DroneSpawn) -> Result<EntityId, SpawnError> {
        let status = self.monitor.status();
        if !status.can_spawn_drones() {
            return Err(SpawnError::Overloaded(status));
        }

        let agent = match spawn.controller {
            Controller::Ai => {
                let personality = spawn
                    .personality
                    .unwrap_or_else(|| AiPersonality::random(&mut self.rng));
                let navigator = Navigator::new(self.navigation);
                let agent = match &spawn.tree {
                    Some(definition) => AiAgent::new(
                        self.trees.build(definition)?,
                        navigator,
                        personality,
                        self.config.scan_interval,
                    ),
                    None => AiAgent::with_default_tree(&self.trees, navigator, personality, self.config.scan_interval)?,
                };
                Some(agent)
            }
            Controller::Player => None,
        };

        let id = self.allocate_id()?;
        let drone = Drone::new(spawn.controller, spawn.stats);
        self.insert(Entity::new_drone(id, spawn.position, spawn.team, drone));
        if let Some(agent) = agent {
            self.agents.insert(id, agent);
        }

        tracing::debug!(id, team = ?spawn.team, controller = ?spawn.controller, "drone spawned");
        Ok(id)
    }

    pub fn spawn_projectile(&mut self, spawn: ProjectileSpawn) -> Result<EntityId, SpawnError> {
        let team = self
            .entities
            .get(&spawn.owner)
            .map(|owner| owner.transform.team)
            .ok_or(SpawnError::UnknownOwner(spawn.owner))?;
        let id = self.allocate_id()?;
        let projectile = Projectile::new(spawn.owner, spawn.damage, spawn.lifetime);
        self.insert(Entity::new_projectile(id, spawn.position, spawn.velocity, team, projectile));
        Ok(id)
    }

    pub fn spawn_object(&mut self, spawn: ObjectSpawn) -> Result<EntityId, SpawnError> {
        let status = self.monitor.status();
        if !status.can_spawn_objects() {
            return Err(SpawnError::Overloaded(status));
        }
        for (field, value) in [("radius", spawn.radius), ("health", spawn.health)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(SpawnError::InvalidObject { field, value });
            }
        }
        if spawn.radius > self.config.arena_radius {
            return Err(SpawnError::ObjectTooLarge {
                radius: spawn.radius,
                arena: self.config.arena_radius,
            });
        }

        let id = self.allocate_id()?;
        let body = if spawn.mass > 0.0 {
            Rigidbody::new(spawn.mass)
        } else {
            Rigidbody::kinematic()
        };
        let object = ArenaObject {
            health: Health::new(spawn.health),
            experience: spawn.experience,
            body_damage: spawn.body_damage,
        };
        self.insert(Entity::new_object(id, spawn.position, spawn.radius, body, object));
        tracing::debug!(id, "object spawned");
        Ok(id)
    }

    /// Mark for removal at the end of the next tick. Unknown ids return false.
    pub fn despawn(&mut self, id: EntityId) -> bool {
        match self.entities.get_mut(&id) {
            Some(entity) => {
                entity.transform.mark_for_removal();
                true
            }
            None => false,
        }
    }

    /// Feed player intent; false unless `id` is a player-controlled drone
    pub fn set_player_input(&mut self, id: EntityId, direction: Vec2, aim: Vec2, fire: bool) -> bool {
        match self.entities.get_mut(&id).and_then(Entity::as_drone_mut) {
            Some(drone) if drone.controller == Controller::Player => {
                drone.input = DroneInput { direction, aim, fire };
                true
            }
            _ => false,
        }
    }

    /// Spend one upgrade point of drone `id`
    pub fn apply_upgrade(&mut self, id: EntityId, kind: UpgradeKind) -> Option<u32> {
        let drone = self.entities.get_mut(&id).and_then(Entity::as_drone_mut)?;
        drone.apply_upgrade(kind, &self.upgrades)
    }

    /// Advance the simulation by `dt` seconds
    pub fn update(&mut self, dt: f32) {
        if !(dt > 0.0) {
            return;
        }
        self.monitor.tick_start();
        self.tick += 1;

        self.order.clear();
        self.order.extend(self.entities.keys().copied());
        self.order.sort_unstable();

        self.run_ai(dt);
        let shots = self.run_movement(dt);
        for shot in shots {
            if let Err(e) = self.spawn_projectile(shot) {
                tracing::debug!(owner = shot.owner, "shot dropped: {}", e);
            }
        }
        self.integrate(dt);

        let events = self.collision.process_collisions(&mut self.entities);
        self.contacts = ContactCounts::default();
        self.contacts.record(&events);
        dispatch_events(
            &events,
            &mut ContactResolver {
                entities: &mut self.entities,
            },
        );

        self.remove_marked();
        self.rebuild_detection();
        self.monitor.tick_end(self.entities.len());

        #[cfg(feature = "trace_ticks")]
        tracing::trace!(
            tick = self.tick,
            entities = self.entities.len(),
            enters = self.contacts.enters,
            exits = self.contacts.exits,
            "tick"
        );
    }

    fn run_ai(&mut self, dt: f32) {
        for &id in &self.order {
            let (Some(agent), Some(entity)) = (self.agents.get_mut(&id), self.entities.get_mut(&id)) else {
                continue;
            };
            let Entity { transform, kind, .. } = entity;
            let EntityKind::Drone(drone) = kind else {
                continue;
            };

            let view = AgentView {
                position: transform.position,
                team: transform.team,
                level: drone.level(),
                health_pct: drone.health.fraction(),
                detection_radius: drone.stats.value(StatKind::DetectionRadius),
            };
            let decision = agent.update(id, &view, &self.detection, dt, &mut self.rng);
            drone.input = DroneInput {
                direction: decision.direction,
                aim: decision.aim,
                fire: decision.fire,
            };
        }
    }

    /// Submit movement forces, tick weapons and projectile lifetimes.
    /// Returns the shots fired this tick.
    fn run_movement(&mut self, dt: f32) -> Vec<ProjectileSpawn> {
        let mut shots = Vec::new();
        for &id in &self.order {
            let Some(entity) = self.entities.get_mut(&id) else {
                continue;
            };
            let Entity {
                transform, body, kind, ..
            } = entity;

            match kind {
                EntityKind::Drone(drone) => {
                    drone.weapon.tick(dt);
                    let aim = drone.input.aim.normalize();
                    if drone.input.fire
                        && aim != Vec2::ZERO
                        && drone.weapon.try_fire(drone.stats.value(StatKind::FireRate))
                    {
                        shots.push(ProjectileSpawn {
                            owner: id,
                            position: transform.position + aim * (transform.radius + PROJECTILE_RADIUS),
                            velocity: aim * drone.stats.value(StatKind::ProjectileSpeed),
                            damage: drone.stats.value(StatKind::ProjectileDamage),
                            lifetime: drone.stats.value(StatKind::ProjectileLifetime),
                        });
                    }
                    drone
                        .movement
                        .move_in_direction(drone.input.direction, dt, &drone.stats, transform, body);
                }
                EntityKind::Projectile(projectile) => {
                    projectile.lifetime -= dt;
                    if projectile.is_expired() {
                        transform.mark_for_removal();
                    }
                }
                EntityKind::ArenaObject(_) => {}
            }
        }
        shots
    }

    fn integrate(&mut self, dt: f32) {
        let arena_radius = self.config.arena_radius;
        // Shots spawned this tick are not in `order`; integrate everything
        for entity in self.entities.values_mut() {
            entity.body.update(&mut entity.transform, dt);
            if contain_in_arena(&mut entity.transform, arena_radius) && matches!(entity.kind, EntityKind::Projectile(_))
            {
                entity.transform.mark_for_removal();
            }
        }
    }

    fn remove_marked(&mut self) {
        let mut marked: Vec<EntityId> = self
            .entities
            .values()
            .filter(|entity| entity.transform.is_marked_for_removal())
            .map(|entity| entity.id)
            .collect();
        marked.sort_unstable();

        for id in marked {
            let exits = self.collision.unregister(id);
            self.contacts.record(&exits);
            dispatch_events(
                &exits,
                &mut ContactResolver {
                    entities: &mut self.entities,
                },
            );
            self.agents.remove(&id);
            self.entities.remove(&id);
            tracing::debug!(id, tick = self.tick, "entity removed");
        }
    }

    fn rebuild_detection(&mut self) {
        let entries = self.entities.values().filter_map(|entity| {
            let (kind, level, experience) = match &entity.kind {
                EntityKind::Drone(drone) => (
                    DetectedKind::Drone,
                    Some(drone.level()),
                    drone.experience_drop(),
                ),
                EntityKind::ArenaObject(object) => (DetectedKind::ArenaObject, None, object.experience),
                EntityKind::Projectile(_) => return None,
            };
            Some(DetectionEntry {
                id: entity.id,
                kind,
                position: entity.transform.position,
                radius: entity.transform.radius,
                team: entity.transform.team,
                health_pct: entity.damageable().map(|d| d.health_fraction()),
                level,
                experience,
            })
        });
        self.detection.rebuild(entries);
    }

    /// Uniform random point inside the arena, kept `margin` from the edge
    pub fn random_position(&mut self, margin: f32) -> Vec2 {
        let radius = (self.config.arena_radius - margin).max(0.0);
        let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);
        let distance = radius * self.rng.gen::<f32>().sqrt();
        Vec2::from_angle(angle) * distance
    }

    pub fn stats(&self) -> WorldStats {
        let mut stats = WorldStats {
            tick: self.tick,
            entities: self.entities.len(),
            drones: 0,
            ai_agents: self.agents.len(),
            projectiles: 0,
            objects: 0,
            overlapping_pairs: self.collision.pair_count(),
            contacts: self.contacts,
        };
        for entity in self.entities.values() {
            match entity.kind {
                EntityKind::Drone(_) => stats.drones += 1,
                EntityKind::Projectile(_) => stats.projectiles += 1,
                EntityKind::ArenaObject(_) => stats.objects += 1,
            }
        }
        stats
    }
}
