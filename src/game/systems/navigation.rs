//! Mode-based steering for AI drones
//!
//! The decision layer picks the mode; the navigator only turns it into a
//! desired direction for the movement controller.

use rand::Rng;

use crate::game::constants::navigation::*;
use crate::game::constants::physics::ARENA_RADIUS;
use crate::util::vec2::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavigationMode {
    #[default]
    None,
    Wander,
    Follow,
    Flee,
}

impl NavigationMode {
    pub fn name(&self) -> &'static str {
        match self {
            NavigationMode::None => "none",
            NavigationMode::Wander => "wander",
            NavigationMode::Follow => "follow",
            NavigationMode::Flee => "flee",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(NavigationMode::None),
            "wander" => Some(NavigationMode::Wander),
            "follow" => Some(NavigationMode::Follow),
            "flee" => Some(NavigationMode::Flee),
            _ => None,
        }
    }
}

/// Arena geometry and follow band used by a navigator
#[derive(Debug, Clone, Copy)]
pub struct NavigationSettings {
    pub arena_radius: f32,
    /// Distance from centre past which wandering bends back inward
    pub inner_radius: f32,
    pub follow_min_distance: f32,
    pub follow_max_distance: f32,
}

impl Default for NavigationSettings {
    fn default() -> Self {
        Self {
            arena_radius: ARENA_RADIUS,
            inner_radius: WANDER_INNER_RADIUS,
            follow_min_distance: FOLLOW_MIN_DISTANCE,
            follow_max_distance: FOLLOW_MAX_DISTANCE,
        }
    }
}

impl NavigationSettings {
    /// Pull toward the centre: 0 inside the inner radius, 1 at the boundary
    pub fn center_weight(&self, position: Vec2) -> f32 {
        let span = self.arena_radius - self.inner_radius;
        if span <= 0.0 {
            return if position.length() > self.inner_radius { 1.0 } else { 0.0 };
        }
        ((position.length() - self.inner_radius) / span).clamp(0.0, 1.0)
    }
}

/// Seconds until the next wander heading: `2 + Exp(mean)` capped at 5
pub fn next_wander_interval<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    let u: f32 = rng.gen();
    let jitter = -WANDER_JITTER_MEAN * (1.0 - u).max(f32::MIN_POSITIVE).ln();
    (WANDER_MIN_INTERVAL + jitter).min(WANDER_MAX_INTERVAL)
}

/// Uniform random heading bent toward the arena centre by `center_weight`
pub fn center_weighted_direction<R: Rng + ?Sized>(
    position: Vec2,
    settings: &NavigationSettings,
    rng: &mut R,
) -> Vec2 {
    let random = Vec2::from_angle(rng.gen_range(0.0..std::f32::consts::TAU));
    let weight = settings.center_weight(position);
    let to_center = (-position).normalize();
    if weight <= 0.0 || to_center == Vec2::ZERO {
        random
    } else {
        random.slerp(to_center, weight)
    }
}

#[derive(Debug, Clone)]
pub struct Navigator {
    mode: NavigationMode,
    settings: NavigationSettings,
    wander_direction: Vec2,
    wander_timer: f32,
    /// Inside the follow band, waiting for the target to drift away
    holding: bool,
}

impl Navigator {
    pub fn new(settings: NavigationSettings) -> Self {
        Self {
            mode: NavigationMode::None,
            settings,
            wander_direction: Vec2::ZERO,
            wander_timer: 0.0,
            holding: false,
        }
    }

    pub fn mode(&self) -> NavigationMode {
        self.mode
    }

    pub fn settings(&self) -> &NavigationSettings {
        &self.settings
    }

    pub fn set_mode(&mut self, mode: NavigationMode) {
        if mode == self.mode {
            return;
        }
        self.mode = mode;
        self.holding = false;
        if mode == NavigationMode::Wander {
            // Pick a fresh heading on the next step
            self.wander_timer = 0.0;
        }
    }

    pub fn is_holding(&self) -> bool {
        self.holding
    }

    /// Desired direction for this tick. Follow and Flee without a target
    /// produce no movement.
    pub fn compute_direction<R: Rng + ?Sized>(
        &mut self,
        position: Vec2,
        target: Option<Vec2>,
        dt: f32,
        rng: &mut R,
    ) -> Vec2 {
        match self.mode {
            NavigationMode::None => Vec2::ZERO,
            NavigationMode::Wander => self.wander(position, dt, rng),
            NavigationMode::Follow => match target {
                Some(target) => self.follow(position, target),
                None => Vec2::ZERO,
            },
            NavigationMode::Flee => match target {
                Some(target) => Self::flee(position, target),
                None => Vec2::ZERO,
            },
        }
    }

    fn wander<R: Rng + ?Sized>(&mut self, position: Vec2, dt: f32, rng: &mut R) -> Vec2 {
        self.wander_timer -= dt;
        if self.wander_timer <= 0.0 || self.wander_direction == Vec2::ZERO {
            self.wander_direction = center_weighted_direction(position, &self.settings, rng);
            self.wander_timer = next_wander_interval(rng);
        }
        self.wander_direction
    }

    fn follow(&mut self, position: Vec2, target: Vec2) -> Vec2 {
        let (direction, distance) = (target - position).normalize_with_length();
        if self.holding {
            if distance <= self.settings.follow_max_distance {
                return Vec2::ZERO;
            }
            self.holding = false;
        }
        if distance <= self.settings.follow_min_distance {
            self.holding = true;
            return Vec2::ZERO;
        }
        direction
    }

    fn flee(position: Vec2, threat: Vec2) -> Vec2 {
        let away = (position - threat).normalize();
        if away == Vec2::ZERO {
            Vec2::RIGHT
        } else {
            away
        }
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(NavigationSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn test_mode_names_round_trip() {
        for mode in [
            NavigationMode::None,
            NavigationMode::Wander,
            NavigationMode::Follow,
            NavigationMode::Flee,
        ] {
            assert_eq!(NavigationMode::from_name(mode.name()), Some(mode));
        }
        assert_eq!(NavigationMode::from_name("orbit"), None);
    }

    #[test]
    fn test_wander_interval_bounds() {
        let mut rng = rng();
        for _ in 0..1000 {
            let interval = next_wander_interval(&mut rng);
            assert!((WANDER_MIN_INTERVAL..=WANDER_MAX_INTERVAL).contains(&interval));
        }
    }

    #[test]
    fn test_center_weight_ramp() {
        let settings = NavigationSettings {
            arena_radius: 50.0,
            inner_radius: 30.0,
            ..NavigationSettings::default()
        };
        assert_eq!(settings.center_weight(Vec2::new(10.0, 0.0)), 0.0);
        assert!((settings.center_weight(Vec2::new(40.0, 0.0)) - 0.5).abs() < 1e-5);
        assert_eq!(settings.center_weight(Vec2::new(0.0, 80.0)), 1.0);
    }

    #[test]
    fn test_wander_at_boundary_heads_to_center() {
        let settings = NavigationSettings::default();
        let mut rng = rng();
        for _ in 0..20 {
            let direction = center_weighted_direction(Vec2::new(50.0, 0.0), &settings, &mut rng);
            assert!(direction.approx_eq(Vec2::new(-1.0, 0.0), 1e-4), "{:?}", direction);
        }
    }

    #[test]
    fn test_wander_keeps_heading_until_timer_expires() {
        let mut navigator = Navigator::default();
        navigator.set_mode(NavigationMode::Wander);
        let mut rng = rng();

        let first = navigator.compute_direction(Vec2::ZERO, None, 0.02, &mut rng);
        assert!((first.length() - 1.0).abs() < 1e-4);
        // Well under the 2 s minimum interval
        for _ in 0..50 {
            assert_eq!(navigator.compute_direction(Vec2::ZERO, None, 0.02, &mut rng), first);
        }
    }

    #[test]
    fn test_follow_hysteresis() {
        let mut navigator = Navigator::default();
        navigator.set_mode(NavigationMode::Follow);
        let mut rng = rng();
        let me = Vec2::ZERO;

        // Far away: move toward
        let dir = navigator.compute_direction(me, Some(Vec2::new(10.0, 0.0)), 0.02, &mut rng);
        assert!(dir.approx_eq(Vec2::RIGHT, 1e-5));

        // Inside min distance: hold
        let dir = navigator.compute_direction(me, Some(Vec2::new(3.0, 0.0)), 0.02, &mut rng);
        assert_eq!(dir, Vec2::ZERO);
        assert!(navigator.is_holding());

        // Inside the band: keep holding
        let dir = navigator.compute_direction(me, Some(Vec2::new(6.0, 0.0)), 0.02, &mut rng);
        assert_eq!(dir, Vec2::ZERO);

        // Beyond max: resume
        let dir = navigator.compute_direction(me, Some(Vec2::new(7.5, 0.0)), 0.02, &mut rng);
        assert!(dir.approx_eq(Vec2::RIGHT, 1e-5));
        assert!(!navigator.is_holding());

        // Band reached from outside still moves until min distance
        let dir = navigator.compute_direction(me, Some(Vec2::new(6.0, 0.0)), 0.02, &mut rng);
        assert!(dir.approx_eq(Vec2::RIGHT, 1e-5));
    }

    #[test]
    fn test_flee_moves_away() {
        let mut navigator = Navigator::default();
        navigator.set_mode(NavigationMode::Flee);
        let mut rng = rng();

        let dir = navigator.compute_direction(Vec2::new(1.0, 1.0), Some(Vec2::new(1.0, 4.0)), 0.02, &mut rng);
        assert!(dir.approx_eq(Vec2::new(0.0, -1.0), 1e-5));

        let coincident = navigator.compute_direction(Vec2::ONE, Some(Vec2::ONE), 0.02, &mut rng);
        assert_eq!(coincident, Vec2::RIGHT);
    }

    #[test]
    fn test_targetless_modes_stand_still() {
        let mut navigator = Navigator::default();
        let mut rng = rng();
        assert_eq!(navigator.compute_direction(Vec2::ONE, None, 0.02, &mut rng), Vec2::ZERO);

        navigator.set_mode(NavigationMode::Follow);
        assert_eq!(navigator.compute_direction(Vec2::ONE, None, 0.02, &mut rng), Vec2::ZERO);
        navigator.set_mode(NavigationMode::Flee);
        assert_eq!(navigator.compute_direction(Vec2::ONE, None, 0.02, &mut rng), Vec2::ZERO);
    }

    #[test]
    fn test_mode_change_clears_hold() {
        let mut navigator = Navigator::default();
        navigator.set_mode(NavigationMode::Follow);
        let mut rng = rng();
        navigator.compute_direction(Vec2::ZERO, Some(Vec2::new(1.0, 0.0)), 0.02, &mut rng);
        assert!(navigator.is_holding());

        navigator.set_mode(NavigationMode::Flee);
        navigator.set_mode(NavigationMode::Follow);
        assert!(!navigator.is_holding());
    }
}
