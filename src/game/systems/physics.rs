use crate::game::constants::physics::{DEFAULT_DRAG, DEFAULT_MASS, DEFAULT_RESTITUTION};
use crate::game::entity::Transform;
use crate::util::vec2::Vec2;

/// Force accumulator and semi-implicit Euler integrator, one per `Transform`
///
/// A body is treated as infinite mass when it is kinematic or its mass is not
/// positive. Infinite-mass bodies ignore forces and impulses and are pinned to
/// zero velocity every update.
#[derive(Debug, Clone)]
pub struct Rigidbody {
    pub mass: f32,
    /// Linear drag, applied as `v += -drag * v * dt`
    pub drag: f32,
    /// Elasticity in `[0, 1]`
    restitution: f32,
    pub kinematic: bool,
    force: Vec2,
}

impl Default for Rigidbody {
    fn default() -> Self {
        Self::new(DEFAULT_MASS)
    }
}

impl Rigidbody {
    pub fn new(mass: f32) -> Self {
        Self {
            mass,
            drag: DEFAULT_DRAG,
            restitution: DEFAULT_RESTITUTION,
            kinematic: false,
            force: Vec2::ZERO,
        }
    }

    /// Immovable body (walls, anchored objects)
    pub fn kinematic() -> Self {
        Self {
            kinematic: true,
            ..Self::new(0.0)
        }
    }

    pub fn with_drag(mut self, drag: f32) -> Self {
        self.drag = drag.max(0.0);
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.set_restitution(restitution);
        self
    }

    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    pub fn set_restitution(&mut self, restitution: f32) {
        self.restitution = restitution.clamp(0.0, 1.0);
    }

    #[inline]
    pub fn has_infinite_mass(&self) -> bool {
        self.kinematic || self.mass <= 0.0
    }

    #[inline]
    pub fn inverse_mass(&self) -> f32 {
        if self.has_infinite_mass() {
            0.0
        } else {
            1.0 / self.mass
        }
    }

    /// Force accumulated for the current tick
    pub fn accumulated_force(&self) -> Vec2 {
        self.force
    }

    /// Accumulate a continuous force for this tick
    pub fn apply_force(&mut self, force: Vec2) {
        self.force += force;
    }

    /// Instant velocity change of `impulse / mass`
    pub fn apply_impulse(&self, transform: &mut Transform, impulse: Vec2) {
        transform.velocity += impulse * self.inverse_mass();
    }

    /// Integrate one tick: force → velocity → drag → position, then clear force
    pub fn update(&mut self, transform: &mut Transform, dt: f32) {
        if self.has_infinite_mass() {
            transform.velocity = Vec2::ZERO;
            self.force = Vec2::ZERO;
            return;
        }

        let acceleration = self.force * self.inverse_mass();
        transform.velocity += acceleration * dt;
        transform.velocity += -self.drag * transform.velocity * dt;
        transform.position += transform.velocity * dt;

        self.force = Vec2::ZERO;
    }
}

/// Keep a transform inside the circular arena centred on the origin.
///
/// Returns true if the transform had left the arena. The position is pulled
/// back onto the boundary and the outward velocity component removed.
pub fn contain_in_arena(transform: &mut Transform, arena_radius: f32) -> bool {
    let limit = (arena_radius - transform.radius).max(0.0);
    let (outward, distance) = transform.position.normalize_with_length();
    if distance <= limit {
        return false;
    }

    transform.position = outward * limit;
    let outward_speed = transform.velocity.dot(outward);
    if outward_speed > 0.0 {
        transform.velocity -= outward * outward_speed;
    }
    true
}
