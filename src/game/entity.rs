//! Simulation entities: drones, projectiles and arena objects
//!
//! Every entity embeds exactly one `Transform` and one `Rigidbody`. The
//! world owns entities; systems only borrow them by id.

use serde::{Deserialize, Serialize};

use crate::game::constants::entity::{DRONE_RADIUS, PROJECTILE_MASS, PROJECTILE_RADIUS};
use crate::game::progression::{drone_experience_drop, Progression};
use crate::game::stats::{StatBlock, StatKind, UpgradeKind, UpgradeTable};
use crate::game::systems::collision::{Collider, CollisionLayers};
use crate::game::systems::movement::MovementController;
use crate::game::systems::physics::Rigidbody;
use crate::util::vec2::Vec2;

/// Entity identifier, allocated by the world
pub type EntityId = u64;

/// Faction tag. Neutral entities are neither allies nor enemies of anyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Team {
    #[default]
    Neutral,
    Red,
    Blue,
}

/// How one team sees another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamRelation {
    Ally,
    Enemy,
    Neutral,
}

impl Team {
    pub fn relation_to(&self, other: Team) -> TeamRelation {
        match (self, other) {
            (Team::Neutral, _) | (_, Team::Neutral) => TeamRelation::Neutral,
            (a, b) if *a == b => TeamRelation::Ally,
            _ => TeamRelation::Enemy,
        }
    }

    pub fn is_enemy_of(&self, other: Team) -> bool {
        self.relation_to(other) == TeamRelation::Enemy
    }
}

/// Position, velocity and footprint of a simulated entity
#[derive(Debug, Clone)]
pub struct Transform {
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub team: Team,
    marked_for_removal: bool,
}

impl Transform {
    pub fn new(position: Vec2, radius: f32, team: Team) -> Self {
        Self {
            position,
            velocity: Vec2::ZERO,
            radius,
            team,
            marked_for_removal: false,
        }
    }

    /// Flag for removal at the end of the current tick
    pub fn mark_for_removal(&mut self) {
        self.marked_for_removal = true;
    }

    pub fn is_marked_for_removal(&self) -> bool {
        self.marked_for_removal
    }
}

/// Anything that can be hurt and pays out experience when destroyed
pub trait Damageable {
    /// Apply damage, returning true if this hit destroyed the entity
    fn take_damage(&mut self, amount: f32) -> bool;
    /// Experience awarded to whoever destroys this entity
    fn experience_drop(&self) -> f32;
    /// Remaining health in `[0, 1]`
    fn health_fraction(&self) -> f32;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Health {
    pub fn new(max: f32) -> Self {
        let max = max.max(0.0);
        Self { current: max, max }
    }

    pub fn is_depleted(&self) -> bool {
        self.current <= 0.0
    }

    pub fn fraction(&self) -> f32 {
        if self.max <= 0.0 {
            0.0
        } else {
            (self.current / self.max).clamp(0.0, 1.0)
        }
    }

    /// Returns true only on the hit that brings health to zero
    pub fn apply_damage(&mut self, amount: f32) -> bool {
        if self.is_depleted() || !(amount > 0.0) {
            return false;
        }
        self.current = (self.current - amount).max(0.0);
        self.is_depleted()
    }

    /// Change the maximum while keeping the current fraction
    pub fn rescale_max(&mut self, max: f32) {
        let fraction = self.fraction();
        self.max = max.max(0.0);
        self.current = self.max * fraction;
    }
}

/// Who produces a drone's movement intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Controller {
    Player,
    Ai,
}

/// Per-tick intent of a drone, written by player input or its AI agent
#[derive(Debug, Clone, Copy, Default)]
pub struct DroneInput {
    pub direction: Vec2,
    pub aim: Vec2,
    pub fire: bool,
}

/// Fire-rate gate for a drone's cannon
#[derive(Debug, Clone, Copy, Default)]
pub struct Weapon {
    cooldown: f32,
}

impl Weapon {
    pub fn tick(&mut self, dt: f32) {
        self.cooldown = (self.cooldown - dt).max(0.0);
    }

    pub fn is_ready(&self) -> bool {
        self.cooldown <= 0.0
    }

    /// Start the cooldown if ready; returns whether a shot may be fired
    pub fn try_fire(&mut self, fire_rate: f32) -> bool {
        if !self.is_ready() || fire_rate <= 0.0 {
            return false;
        }
        self.cooldown = 1.0 / fire_rate;
        true
    }
}

#[derive(Debug, Clone)]
pub struct Drone {
    pub controller: Controller,
    pub stats: StatBlock,
    pub health: Health,
    pub progression: Progression,
    pub movement: MovementController,
    pub weapon: Weapon,
    pub input: DroneInput,
}

impl Drone {
    pub fn new(controller: Controller, stats: StatBlock) -> Self {
        let health = Health::new(stats.value(StatKind::MaxHealth));
        Self {
            controller,
            stats,
            health,
            progression: Progression::new(),
            movement: MovementController::new(),
            weapon: Weapon::default(),
            input: DroneInput::default(),
        }
    }

    pub fn level(&self) -> u32 {
        self.progression.level()
    }

    /// Spend an upgrade point and refresh the affected stats
    pub fn apply_upgrade(&mut self, kind: UpgradeKind, table: &UpgradeTable) -> Option<u32> {
        let level = self.progression.spend_point(kind, table.max_level(kind))?;
        table.apply(&mut self.stats, kind, level);
        self.health.rescale_max(self.stats.value(StatKind::MaxHealth));
        tracing::debug!(?kind, level, "upgrade applied");
        Some(level)
    }
}

impl Damageable for Drone {
    fn take_damage(&mut self, amount: f32) -> bool {
        self.health.apply_damage(amount)
    }

    fn experience_drop(&self) -> f32 {
        drone_experience_drop(self.level())
    }

    fn health_fraction(&self) -> f32 {
        self.health.fraction()
    }
}

#[derive(Debug, Clone)]
pub struct Projectile {
    pub owner: EntityId,
    pub damage: f32,
    /// Seconds left before the projectile expires
    pub lifetime: f32,
    /// Already delivered its damage
    spent: bool,
}

impl Projectile {
    pub fn new(owner: EntityId, damage: f32, lifetime: f32) -> Self {
        Self {
            owner,
            damage,
            lifetime,
            spent: false,
        }
    }

    pub fn is_spent(&self) -> bool {
        self.spent
    }

    /// Consume the projectile's single hit; false if already used
    pub fn spend(&mut self) -> bool {
        !std::mem::replace(&mut self.spent, true)
    }

    pub fn is_expired(&self) -> bool {
        self.lifetime <= 0.0
    }
}

/// Neutral destructible pickup
#[derive(Debug, Clone)]
pub struct ArenaObject {
    pub health: Health,
    pub experience: f32,
    /// Damage dealt to drones that ram it
    pub body_damage: f32,
}

impl Damageable for ArenaObject {
    fn take_damage(&mut self, amount: f32) -> bool {
        self.health.apply_damage(amount)
    }

    fn experience_drop(&self) -> f32 {
        self.experience
    }

    fn health_fraction(&self) -> f32 {
        self.health.fraction()
    }
}

#[derive(Debug, Clone)]
pub enum EntityKind {
    Drone(Drone),
    Projectile(Projectile),
    ArenaObject(ArenaObject),
}

#[derive(Debug, Clone)]
pub struct Entity {
    pub id: EntityId,
    pub transform: Transform,
    pub body: Rigidbody,
    pub kind: EntityKind,
}

impl Entity {
    pub fn new_drone(id: EntityId, position: Vec2, team: Team, drone: Drone) -> Self {
        Self {
            id,
            transform: Transform::new(position, DRONE_RADIUS, team),
            body: Rigidbody::default(),
            kind: EntityKind::Drone(drone),
        }
    }

    pub fn new_projectile(
        id: EntityId,
        position: Vec2,
        velocity: Vec2,
        team: Team,
        projectile: Projectile,
    ) -> Self {
        let mut transform = Transform::new(position, PROJECTILE_RADIUS, team);
        transform.velocity = velocity;
        Self {
            id,
            transform,
            body: Rigidbody::new(PROJECTILE_MASS).with_drag(0.0),
            kind: EntityKind::Projectile(projectile),
        }
    }

    pub fn new_object(id: EntityId, position: Vec2, radius: f32, body: Rigidbody, object: ArenaObject) -> Self {
        Self {
            id,
            transform: Transform::new(position, radius, Team::Neutral),
            body,
            kind: EntityKind::ArenaObject(object),
        }
    }

    /// Collider record matching this entity's kind
    pub fn collider(&self) -> Collider {
        match &self.kind {
            EntityKind::Drone(_) => Collider::solid(
                CollisionLayers::DRONE,
                CollisionLayers::DRONE | CollisionLayers::PROJECTILE | CollisionLayers::ARENA_OBJECT,
            )
            .with_team(self.transform.team),
            EntityKind::Projectile(_) => Collider::trigger(
                CollisionLayers::PROJECTILE,
                CollisionLayers::DRONE | CollisionLayers::ARENA_OBJECT,
            )
            .with_team(self.transform.team),
            EntityKind::ArenaObject(_) => Collider::solid(
                CollisionLayers::ARENA_OBJECT,
                CollisionLayers::DRONE | CollisionLayers::PROJECTILE | CollisionLayers::ARENA_OBJECT,
            ),
        }
    }

    pub fn as_drone(&self) -> Option<&Drone> {
        match &self.kind {
            EntityKind::Drone(drone) => Some(drone),
            _ => None,
        }
    }

    pub fn as_drone_mut(&mut self) -> Option<&mut Drone> {
        match &mut self.kind {
            EntityKind::Drone(drone) => Some(drone),
            _ => None,
        }
    }

    /// The damageable facet, if this entity can be hurt
    pub fn damageable(&self) -> Option<&dyn Damageable> {
        match &self.kind {
            EntityKind::Drone(drone) => Some(drone),
            EntityKind::ArenaObject(object) => Some(object),
            EntityKind::Projectile(_) => None,
        }
    }

    pub fn damageable_mut(&mut self) -> Option<&mut dyn Damageable> {
        match &mut self.kind {
            EntityKind::Drone(drone) => Some(drone),
            EntityKind::ArenaObject(object) => Some(object),
            EntityKind::Projectile(_) => None,
        }
    }

    /// Damage this entity deals when it rams something
    pub fn body_damage(&self) -> f32 {
        match &self.kind {
            EntityKind::Drone(drone) => drone.stats.value(StatKind::BodyDamage),
            EntityKind::ArenaObject(object) => object.body_damage,
            EntityKind::Projectile(_) => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_relations() {
        assert_eq!(Team::Red.relation_to(Team::Red), TeamRelation::Ally);
        assert_eq!(Team::Red.relation_to(Team::Blue), TeamRelation::Enemy);
        assert_eq!(Team::Red.relation_to(Team::Neutral), TeamRelation::Neutral);
        assert_eq!(Team::Neutral.relation_to(Team::Neutral), TeamRelation::Neutral);
        assert!(Team::Blue.is_enemy_of(Team::Red));
        assert!(!Team::Blue.is_enemy_of(Team::Neutral));
    }

    #[test]
    fn test_health_damage_reports_destruction_once() {
        let mut health = Health::new(30.0);
        assert!(!health.apply_damage(10.0));
        assert!(health.apply_damage(25.0));
        assert_eq!(health.current, 0.0);
        assert!(!health.apply_damage(5.0));
    }

    #[test]
    fn test_health_ignores_non_positive_damage() {
        let mut health = Health::new(30.0);
        assert!(!health.apply_damage(-10.0));
        assert!(!health.apply_damage(f32::NAN));
        assert_eq!(health.current, 30.0);
    }

    #[test]
    fn test_health_rescale_keeps_fraction() {
        let mut health = Health::new(100.0);
        health.apply_damage(50.0);
        health.rescale_max(200.0);
        assert_eq!(health.current, 100.0);
        assert_eq!(health.fraction(), 0.5);
    }

    #[test]
    fn test_weapon_cooldown() {
        let mut weapon = Weapon::default();
        assert!(weapon.try_fire(2.0));
        assert!(!weapon.try_fire(2.0));
        weapon.tick(0.25);
        assert!(!weapon.is_ready());
        weapon.tick(0.25);
        assert!(weapon.try_fire(2.0));
        assert!(!Weapon::default().try_fire(0.0));
    }

    #[test]
    fn test_projectile_hits_once() {
        let mut projectile = Projectile::new(1, 5.0, 1.0);
        assert!(!projectile.is_spent());
        assert!(projectile.spend());
        assert!(projectile.is_spent());
        assert!(!projectile.spend());
    }

    #[test]
    fn test_drone_upgrade_raises_max_health() {
        let table = UpgradeTable::default_table();
        let mut drone = Drone::new(Controller::Ai, StatBlock::drone_defaults());
        assert_eq!(drone.apply_upgrade(UpgradeKind::Hull, &table), None);

        drone.progression.add_experience(1000.0);
        assert_eq!(drone.apply_upgrade(UpgradeKind::Hull, &table), Some(1));
        assert!(drone.health.max > 100.0);
        assert_eq!(drone.health.fraction(), 1.0);
    }

    #[test]
    fn test_damageable_facets() {
        let drone = Entity::new_drone(1, Vec2::ZERO, Team::Red, Drone::new(Controller::Ai, StatBlock::drone_defaults()));
        assert!(drone.damageable().is_some());

        let projectile = Entity::new_projectile(
            2,
            Vec2::ZERO,
            Vec2::RIGHT,
            Team::Red,
            Projectile::new(1, 5.0, 1.0),
        );
        assert!(projectile.damageable().is_none());
        assert!(projectile.collider().is_trigger);
        assert!(!drone.collider().is_trigger);
    }
}
