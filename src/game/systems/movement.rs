//! Desired direction → force request
//!
//! The controller never writes velocity. It submits the force that would
//! bring the body to the smoothed target velocity this tick, so collision
//! impulses applied later in the same tick survive.

use crate::game::constants::physics::DIRECTION_EPSILON_SQ;
use crate::game::entity::Transform;
use crate::game::stats::{StatBlock, StatKind};
use crate::game::systems::physics::Rigidbody;
use crate::util::vec2::Vec2;

#[derive(Debug, Clone, Copy, Default)]
pub struct MovementController {
    /// Velocity requested on the last `move_in_direction` call
    last_target: Vec2,
}

impl MovementController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Target velocity from the most recent move request
    pub fn last_target(&self) -> Vec2 {
        self.last_target
    }

    /// Target velocity for a raw (unnormalized) direction
    pub fn target_velocity(direction: Vec2, move_speed: f32) -> Vec2 {
        if direction.length_sq() < DIRECTION_EPSILON_SQ {
            Vec2::ZERO
        } else {
            direction.normalize() * move_speed
        }
    }

    /// Steer toward `direction` at the stat-driven speed.
    ///
    /// Returns the force submitted to the rigidbody.
    pub fn move_in_direction(
        &mut self,
        direction: Vec2,
        dt: f32,
        stats: &StatBlock,
        transform: &Transform,
        body: &mut Rigidbody,
    ) -> Vec2 {
        if dt <= 0.0 || body.has_infinite_mass() {
            return Vec2::ZERO;
        }

        let target = Self::target_velocity(direction, stats.value(StatKind::MoveSpeed));
        self.last_target = target;

        let current = transform.velocity;
        let rate = if current.length_sq() > target.length_sq() {
            stats.value(StatKind::MoveDeceleration)
        } else {
            stats.value(StatKind::MoveAcceleration)
        };

        let smoothed = current.move_towards(target, rate.max(0.0) * dt);
        let needed_acceleration = (smoothed - current) / dt;
        let force = needed_acceleration * body.mass;
        body.apply_force(force);
        force
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::entity::Team;

    fn stats(speed: f32, accel: f32, decel: f32) -> StatBlock {
        StatBlock::new()
            .with(StatKind::MoveSpeed, speed)
            .with(StatKind::MoveAcceleration, accel)
            .with(StatKind::MoveDeceleration, decel)
    }

    fn transform() -> Transform {
        Transform::new(Vec2::ZERO, 0.5, Team::Red)
    }

    #[test]
    fn test_negligible_direction_targets_zero() {
        assert_eq!(
            MovementController::target_velocity(Vec2::new(0.01, 0.01), 5.0),
            Vec2::ZERO
        );
        assert_eq!(
            MovementController::target_velocity(Vec2::new(10.0, 0.0), 5.0),
            Vec2::new(5.0, 0.0)
        );
    }

    #[test]
    fn test_first_tick_is_clamped() {
        let stats = stats(5.0, 8.0, 8.0);
        let mut controller = MovementController::new();
        let mut transform = transform();
        let mut body = Rigidbody::new(1.0).with_drag(0.0);
        let dt = 0.02;

        controller.move_in_direction(Vec2::new(1.0, 0.0), dt, &stats, &transform, &mut body);
        body.update(&mut transform, dt);

        assert!(transform.velocity.length() <= 8.0 * 0.02 + 1e-5);
        assert!((transform.velocity.x - 0.16).abs() < 1e-4);
    }

    #[test]
    fn test_monotonic_approach_without_overshoot() {
        let stats = stats(5.0, 8.0, 8.0);
        let mut controller = MovementController::new();
        let mut transform = transform();
        let mut body = Rigidbody::new(1.0).with_drag(0.0);
        let dt = 0.02;

        let mut previous = 0.0;
        for _ in 0..200 {
            controller.move_in_direction(Vec2::new(1.0, 0.0), dt, &stats, &transform, &mut body);
            body.update(&mut transform, dt);
            let speed = transform.velocity.length();
            assert!(speed + 1e-5 >= previous, "speed decreased: {} -> {}", previous, speed);
            assert!(speed <= 5.0 + 1e-4, "overshoot: {}", speed);
            previous = speed;
        }
        assert!((previous - 5.0).abs() < 1e-3);
    }

    #[test]
    fn test_drag_keeps_first_tick_under_clamp() {
        let stats = stats(5.0, 8.0, 8.0);
        let mut controller = MovementController::new();
        let mut transform = transform();
        let mut body = Rigidbody::new(1.0);
        let dt = 0.02;

        controller.move_in_direction(Vec2::new(1.0, 0.0), dt, &stats, &transform, &mut body);
        body.update(&mut transform, dt);
        assert!(transform.velocity.length() <= 0.16 + 1e-5);
    }

    #[test]
    fn test_deceleration_used_when_faster_than_target() {
        let stats = stats(5.0, 1.0, 50.0);
        let mut controller = MovementController::new();
        let mut transform = transform();
        transform.velocity = Vec2::new(5.0, 0.0);
        let mut body = Rigidbody::new(1.0).with_drag(0.0);

        controller.move_in_direction(Vec2::ZERO, 0.02, &stats, &transform, &mut body);
        body.update(&mut transform, 0.02);

        // decel 50 * 0.02 = 1.0 per tick
        assert!((transform.velocity.x - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_force_scales_with_mass() {
        let stats = stats(5.0, 8.0, 8.0);
        let mut controller = MovementController::new();
        let transform = transform();
        let mut light = Rigidbody::new(1.0);
        let mut heavy = Rigidbody::new(3.0);

        let f_light = controller.move_in_direction(Vec2::RIGHT, 0.02, &stats, &transform, &mut light);
        let f_heavy = controller.move_in_direction(Vec2::RIGHT, 0.02, &stats, &transform, &mut heavy);
        assert!((f_heavy.x - 3.0 * f_light.x).abs() < 1e-3);
    }

    #[test]
    fn test_kinematic_body_receives_no_force() {
        let stats = stats(5.0, 8.0, 8.0);
        let mut controller = MovementController::new();
        let mut body = Rigidbody::kinematic();
        let force = controller.move_in_direction(Vec2::RIGHT, 0.02, &stats, &transform(), &mut body);
        assert_eq!(force, Vec2::ZERO);
        assert_eq!(body.accumulated_force(), Vec2::ZERO);
    }
}
