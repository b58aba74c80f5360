//! Collider registry, broad/narrow phase and contact resolution
//!
//! Pair state machine per unordered id pair:
//! `None → Enter → Stay (every further overlapping tick) → Exit → None`.
//! The grid is rebuilt from scratch on every `process_collisions` call.

use std::ops::BitOr;

use hashbrown::HashMap;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::game::constants::collision::{CELL_SIZE, COINCIDENT_EPSILON, INVERSE_MASS_EPSILON};
use crate::game::entity::{EntityId, Team, Transform};
use crate::game::spatial::{SpatialGrid, SpatialGridStats};
use crate::game::systems::physics::Rigidbody;
use crate::util::vec2::Vec2;

/// Collision layer bit flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CollisionLayers(pub u8);

impl CollisionLayers {
    pub const NONE: Self = Self(0);
    pub const DRONE: Self = Self(1 << 0);
    pub const PROJECTILE: Self = Self(1 << 1);
    pub const ARENA_OBJECT: Self = Self(1 << 2);
    pub const ALL: Self = Self(Self::DRONE.0 | Self::PROJECTILE.0 | Self::ARENA_OBJECT.0);

    #[inline]
    pub fn intersects(&self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for CollisionLayers {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Registration record binding an entity to collision filtering rules
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collider {
    pub layer: CollisionLayers,
    /// Layers this collider wants to be tested against
    pub mask: CollisionLayers,
    /// Triggers report contacts but are never pushed apart
    pub is_trigger: bool,
    pub team: Option<Team>,
}

impl Collider {
    pub fn solid(layer: CollisionLayers, mask: CollisionLayers) -> Self {
        Self {
            layer,
            mask,
            is_trigger: false,
            team: None,
        }
    }

    pub fn trigger(layer: CollisionLayers, mask: CollisionLayers) -> Self {
        Self {
            is_trigger: true,
            ..Self::solid(layer, mask)
        }
    }

    pub fn with_team(mut self, team: Team) -> Self {
        self.team = Some(team);
        self
    }
}

/// Layer/mask/team filter applied before the narrow phase.
///
/// Both masks must accept the other's layer. A projectile never touches a
/// drone of its own team, whatever the masks say.
pub fn can_interact(a: &Collider, b: &Collider) -> bool {
    if !a.mask.intersects(b.layer) || !b.mask.intersects(a.layer) {
        return false;
    }

    let projectile_vs_drone = (a.layer.intersects(CollisionLayers::PROJECTILE)
        && b.layer.intersects(CollisionLayers::DRONE))
        || (a.layer.intersects(CollisionLayers::DRONE)
            && b.layer.intersects(CollisionLayers::PROJECTILE));
    if projectile_vs_drone {
        if let (Some(team_a), Some(team_b)) = (a.team, b.team) {
            if team_a == team_b {
                return false;
            }
        }
    }
    true
}

/// Read/write access to the bodies the collision system resolves
pub trait CollisionBodies {
    fn body(&self, id: EntityId) -> Option<(&Transform, &Rigidbody)>;
    fn transform_mut(&mut self, id: EntityId) -> Option<&mut Transform>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactPhase {
    Enter,
    Stay,
    Exit,
}

/// One contact transition for an unordered pair (`a < b`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionEvent {
    pub phase: ContactPhase,
    pub is_trigger: bool,
    pub a: EntityId,
    pub b: EntityId,
}

/// Receiver of contact callbacks, invoked once per side of a pair
#[allow(unused_variables)]
pub trait CollisionHandler {
    fn on_collision_enter(&mut self, _me: EntityId, _other: EntityId) {}
    fn on_collision_stay(&mut self, _me: EntityId, _other: EntityId) {}
    fn on_collision_exit(&mut self, _me: EntityId, _other: EntityId) {}
    fn on_trigger_enter(&mut self, _me: EntityId, _other: EntityId) {}
    fn on_trigger_stay(&mut self, _me: EntityId, _other: EntityId) {}
    fn on_trigger_exit(&mut self, _me: EntityId, _other: EntityId) {}
}

/// Deliver events to both sides of each pair, in event order
pub fn dispatch_events<H: CollisionHandler + ?Sized>(events: &[CollisionEvent], handler: &mut H) {
    for event in events {
        for (me, other) in [(event.a, event.b), (event.b, event.a)] {
            match (event.phase, event.is_trigger) {
                (ContactPhase::Enter, false) => handler.on_collision_enter(me, other),
                (ContactPhase::Stay, false) => handler.on_collision_stay(me, other),
                (ContactPhase::Exit, false) => handler.on_collision_exit(me, other),
                (ContactPhase::Enter, true) => handler.on_trigger_enter(me, other),
                (ContactPhase::Stay, true) => handler.on_trigger_stay(me, other),
                (ContactPhase::Exit, true) => handler.on_trigger_exit(me, other),
            }
        }
    }
}

type PairKey = (EntityId, EntityId);

#[inline]
fn pair_key(a: EntityId, b: EntityId) -> PairKey {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Counters from the last `process_collisions` call
#[derive(Debug, Clone, Copy, Default)]
pub struct CollisionStats {
    pub colliders: usize,
    pub narrow_checks: usize,
    pub overlapping_pairs: usize,
    pub resolved_pairs: usize,
    pub grid: SpatialGridStats,
}

pub struct CollisionSystem {
    colliders: HashMap<EntityId, Collider>,
    grid: SpatialGrid<EntityId>,
    /// Overlapping pairs from the previous tick, with their trigger flag
    previous_pairs: FxHashMap<PairKey, bool>,
    current_pairs: FxHashMap<PairKey, bool>,
    /// Pairs already considered this tick
    checked: FxHashSet<PairKey>,
    order: Vec<EntityId>,
    stats: CollisionStats,
}

impl CollisionSystem {
    pub fn new(cell_size: f32) -> Self {
        Self {
            colliders: HashMap::new(),
            grid: SpatialGrid::new(cell_size),
            previous_pairs: FxHashMap::default(),
            current_pairs: FxHashMap::default(),
            checked: FxHashSet::default(),
            order: Vec::new(),
            stats: CollisionStats::default(),
        }
    }

    /// Register or replace the collider for `id`
    pub fn register(&mut self, id: EntityId, collider: Collider) {
        self.colliders.insert(id, collider);
    }

    /// Remove `id` and return exit events for every pair it was overlapping.
    ///
    /// Unknown ids are a no-op.
    pub fn unregister(&mut self, id: EntityId) -> Vec<CollisionEvent> {
        if self.colliders.remove(&id).is_none() {
            return Vec::new();
        }

        let mut exits: Vec<CollisionEvent> = self
            .previous_pairs
            .iter()
            .filter(|(key, _)| key.0 == id || key.1 == id)
            .map(|(&(a, b), &is_trigger)| CollisionEvent {
                phase: ContactPhase::Exit,
                is_trigger,
                a,
                b,
            })
            .collect();
        self.previous_pairs.retain(|key, _| key.0 != id && key.1 != id);
        exits.sort_by_key(|event| (event.a, event.b));
        exits
    }

    pub fn is_registered(&self, id: EntityId) -> bool {
        self.colliders.contains_key(&id)
    }

    pub fn collider(&self, id: EntityId) -> Option<&Collider> {
        self.colliders.get(&id)
    }

    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }

    /// Whether the pair overlapped on the last processed tick
    pub fn is_overlapping(&self, a: EntityId, b: EntityId) -> bool {
        self.previous_pairs.contains_key(&pair_key(a, b))
    }

    pub fn pair_count(&self) -> usize {
        self.previous_pairs.len()
    }

    pub fn stats(&self) -> CollisionStats {
        self.stats
    }

    /// Run broad phase, narrow phase, pair bookkeeping and resolution.
    ///
    /// Returns the tick's enter/stay events followed by its exit events.
    pub fn process_collisions<B: CollisionBodies + ?Sized>(&mut self, bodies: &mut B) -> Vec<CollisionEvent> {
        self.rebuild_grid(bodies);
        let overlapping = self.find_overlaps(bodies);

        let mut events = Vec::with_capacity(overlapping.len());
        for &((a, b), is_trigger) in &overlapping {
            let phase = if self.previous_pairs.contains_key(&(a, b)) {
                ContactPhase::Stay
            } else {
                ContactPhase::Enter
            };
            events.push(CollisionEvent { phase, is_trigger, a, b });
        }

        let mut exits: Vec<CollisionEvent> = self
            .previous_pairs
            .iter()
            .filter(|(key, _)| !self.current_pairs.contains_key(*key))
            .map(|(&(a, b), &is_trigger)| CollisionEvent {
                phase: ContactPhase::Exit,
                is_trigger,
                a,
                b,
            })
            .collect();
        exits.sort_by_key(|event| (event.a, event.b));
        events.extend(exits);

        let mut resolved = 0;
        for &((a, b), is_trigger) in &overlapping {
            if !is_trigger && resolve_pair(bodies, a, b) {
                resolved += 1;
            }
        }

        std::mem::swap(&mut self.previous_pairs, &mut self.current_pairs);
        self.current_pairs.clear();

        self.stats.overlapping_pairs = overlapping.len();
        self.stats.resolved_pairs = resolved;
        self.stats.grid = self.grid.stats();

        #[cfg(feature = "trace_ticks")]
        tracing::trace!(
            colliders = self.stats.colliders,
            checks = self.stats.narrow_checks,
            overlaps = overlapping.len(),
            resolved,
            "collision pass"
        );

        events
    }

    fn rebuild_grid<B: CollisionBodies + ?Sized>(&mut self, bodies: &B) {
        self.grid.clear();
        self.order.clear();
        self.order.extend(self.colliders.keys().copied());
        self.order.sort_unstable();

        // Colliders whose entity is gone are skipped without complaint
        self.order.retain(|id| bodies.body(*id).is_some());
        for &id in &self.order {
            if let Some((transform, _)) = bodies.body(id) {
                self.grid.insert_circle(transform.position, transform.radius, id);
            }
        }
        self.stats.colliders = self.order.len();
    }

    /// Overlapping pairs in deterministic discovery order
    fn find_overlaps<B: CollisionBodies + ?Sized>(&mut self, bodies: &B) -> Vec<(PairKey, bool)> {
        self.checked.clear();
        self.current_pairs.clear();
        let mut overlapping = Vec::new();
        let mut narrow_checks = 0;

        for &id in &self.order {
            let (Some(collider), Some((transform, _))) = (self.colliders.get(&id), bodies.body(id)) else {
                continue;
            };
            let range = self
                .grid
                .circle_range(transform.position, transform.radius)
                .expand(1);

            for &other in self.grid.query_range(range) {
                if other == id {
                    continue;
                }
                let key = pair_key(id, other);
                if !self.checked.insert(key) {
                    continue;
                }
                let Some(other_collider) = self.colliders.get(&other) else {
                    continue;
                };
                if !can_interact(collider, other_collider) {
                    continue;
                }
                let Some((other_transform, _)) = bodies.body(other) else {
                    continue;
                };

                narrow_checks += 1;
                let reach = transform.radius + other_transform.radius;
                if transform.position.distance_sq_to(other_transform.position) <= reach * reach {
                    let is_trigger = collider.is_trigger || other_collider.is_trigger;
                    self.current_pairs.insert(key, is_trigger);
                    overlapping.push((key, is_trigger));
                }
            }
        }

        self.stats.narrow_checks = narrow_checks;
        overlapping
    }
}

impl Default for CollisionSystem {
    fn default() -> Self {
        Self::new(CELL_SIZE)
    }
}

/// Push a solid pair apart and exchange a restitution impulse.
///
/// Returns false when the pair could not be resolved (both bodies immovable
/// or one of them missing).
fn resolve_pair<B: CollisionBodies + ?Sized>(bodies: &mut B, a: EntityId, b: EntityId) -> bool {
    let Some((ta, body_a)) = bodies.body(a) else {
        return false;
    };
    let (pos_a, vel_a, radius_a) = (ta.position, ta.velocity, ta.radius);
    let (inv_a, restitution_a) = (body_a.inverse_mass(), body_a.restitution());

    let Some((tb, body_b)) = bodies.body(b) else {
        return false;
    };
    let (pos_b, vel_b, radius_b) = (tb.position, tb.velocity, tb.radius);
    let (inv_b, restitution_b) = (body_b.inverse_mass(), body_b.restitution());

    let inv_sum = inv_a + inv_b;
    if inv_sum <= INVERSE_MASS_EPSILON {
        return false;
    }

    let (normal, distance) = {
        let (n, d) = (pos_b - pos_a).normalize_with_length();
        if d < COINCIDENT_EPSILON {
            (Vec2::RIGHT, 0.0)
        } else {
            (n, d)
        }
    };

    let mut new_pos_a = pos_a;
    let mut new_pos_b = pos_b;
    let penetration = radius_a + radius_b - distance;
    if penetration > 0.0 {
        let correction = normal * (penetration / inv_sum);
        new_pos_a -= correction * inv_a;
        new_pos_b += correction * inv_b;
    }

    let mut new_vel_a = vel_a;
    let mut new_vel_b = vel_b;
    let approach = (vel_b - vel_a).dot(normal);
    if approach < 0.0 {
        let restitution = restitution_a.max(restitution_b);
        let j = -(1.0 + restitution) * approach / inv_sum;
        let impulse = normal * j;
        new_vel_a -= impulse * inv_a;
        new_vel_b += impulse * inv_b;
    }

    if let Some(t) = bodies.transform_mut(a) {
        t.position = new_pos_a;
        t.velocity = new_vel_a;
    }
    if let Some(t) = bodies.transform_mut(b) {
        t.position = new_pos_b;
        t.velocity = new_vel_b;
    }
    true
}
