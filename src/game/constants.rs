/// Physics constants
pub mod physics {
    /// Simulation tick rate in Hz
    pub const TICK_RATE: u32 = 50;
    /// Delta time per tick in seconds
    pub const DT: f32 = 1.0 / TICK_RATE as f32;
    /// Tick duration in milliseconds
    pub const TICK_DURATION_MS: u64 = 1000 / TICK_RATE as u64;
    /// Default mass for drones and objects
    pub const DEFAULT_MASS: f32 = 1.0;
    /// Default linear drag coefficient (applied as v += -drag * v * dt)
    pub const DEFAULT_DRAG: f32 = 0.5;
    /// Default restitution for solid bodies
    pub const DEFAULT_RESTITUTION: f32 = 0.2;
    /// Directions with a squared magnitude below this are treated as "no input"
    pub const DIRECTION_EPSILON_SQ: f32 = 1e-3;
    /// Radius of the circular arena
    pub const ARENA_RADIUS: f32 = 50.0;
}

/// Collision constants
pub mod collision {
    /// Default broad-phase cell size, roughly the largest entity diameter
    pub const CELL_SIZE: f32 = 2.0;
    /// Below this centre distance two circles are treated as coincident
    pub const COINCIDENT_EPSILON: f32 = 1e-6;
    /// Below this combined inverse mass a pair is treated as immovable
    pub const INVERSE_MASS_EPSILON: f32 = 1e-8;
}

/// Detection (AI perception) constants
pub mod detection {
    /// Detection grid cell size, larger than the collision grid
    pub const CELL_SIZE: f32 = 8.0;
    /// Seconds between perception scans per AI agent
    pub const SCAN_INTERVAL: f32 = 0.3;
    /// Health fraction floor used when computing target value
    pub const MIN_HEALTH_FRACTION: f32 = 0.1;
    /// Value at which the value term of a target score saturates
    pub const VALUE_NORMALIZER: f32 = 100.0;
}

/// Target scoring weights
pub mod scoring {
    pub const DRONE_HEALTH_WEIGHT: f32 = 1.0;
    pub const DRONE_PROXIMITY_WEIGHT: f32 = 1.5;
    pub const DRONE_VALUE_WEIGHT: f32 = 1.0;
    /// Penalty per level the target has over the scanner
    pub const DRONE_LEVEL_PENALTY: f32 = 0.25;

    pub const OBJECT_HEALTH_WEIGHT: f32 = 0.5;
    pub const OBJECT_PROXIMITY_WEIGHT: f32 = 1.5;
    pub const OBJECT_VALUE_WEIGHT: f32 = 0.75;
}

/// Navigation constants
pub mod navigation {
    /// Minimum seconds between wander direction changes
    pub const WANDER_MIN_INTERVAL: f32 = 2.0;
    /// Maximum seconds between wander direction changes
    pub const WANDER_MAX_INTERVAL: f32 = 5.0;
    /// Mean of the exponential jitter added to the minimum interval
    pub const WANDER_JITTER_MEAN: f32 = 1.0;
    /// Distance from centre beyond which wandering bends back toward it
    pub const WANDER_INNER_RADIUS: f32 = 30.0;
    /// Follow stops approaching inside this distance
    pub const FOLLOW_MIN_DISTANCE: f32 = 4.0;
    /// Follow resumes approaching beyond this distance
    pub const FOLLOW_MAX_DISTANCE: f32 = 7.0;
}

/// Default stat values for a freshly spawned drone
pub mod stats {
    pub const MOVE_SPEED: f32 = 5.0;
    pub const MOVE_ACCELERATION: f32 = 8.0;
    pub const MOVE_DECELERATION: f32 = 12.0;
    pub const MAX_HEALTH: f32 = 100.0;
    pub const BODY_DAMAGE: f32 = 10.0;
    /// Shots per second
    pub const FIRE_RATE: f32 = 2.0;
    pub const PROJECTILE_SPEED: f32 = 15.0;
    pub const PROJECTILE_DAMAGE: f32 = 10.0;
    /// Seconds
    pub const PROJECTILE_LIFETIME: f32 = 2.0;
    pub const DETECTION_RADIUS: f32 = 12.0;
}

/// Entity geometry
pub mod entity {
    pub const DRONE_RADIUS: f32 = 0.5;
    pub const PROJECTILE_RADIUS: f32 = 0.15;
    pub const PROJECTILE_MASS: f32 = 0.1;
}

/// Experience and levelling
pub mod progression {
    /// Experience needed to go from level 1 to level 2
    pub const BASE_THRESHOLD: f32 = 20.0;
    /// Threshold multiplier per level
    pub const THRESHOLD_GROWTH: f32 = 1.5;
    pub const MAX_LEVEL: u32 = 30;
    /// Experience dropped by a level-1 drone
    pub const DRONE_DROP_BASE: f32 = 10.0;
    /// Additional experience per drone level
    pub const DRONE_DROP_PER_LEVEL: f32 = 5.0;
}

/// AI personality and decision constants
pub mod ai {
    /// Aggression is sampled uniformly from this range
    pub const AGGRESSION_MIN: f32 = 0.2;
    pub const AGGRESSION_MAX: f32 = 0.8;
    /// Health fraction under which an agent considers fleeing
    pub const FLEE_HEALTH_THRESHOLD: f32 = 0.3;
    /// Distance within which an agent opens fire on its target
    pub const FIRE_RANGE: f32 = 10.0;
}
