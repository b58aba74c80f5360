use crate::game::constants::{collision, detection, navigation, physics};

/// Invalid simulation configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("tick_rate must be at least 1")]
    ZeroTickRate,
    #[error("{name} must be positive and finite, got {value}")]
    NonPositive { name: &'static str, value: f32 },
    #[error("wander_inner_radius ({inner}) must be smaller than arena_radius ({arena})")]
    InnerRadiusTooLarge { inner: f32, arena: f32 },
    #[error("max_entities must be at least 1")]
    ZeroMaxEntities,
}

/// Simulation configuration
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Fixed ticks per second
    pub tick_rate: u32,
    /// Broad-phase cell size of the collision grid
    pub collision_cell_size: f32,
    /// Cell size of the AI perception grid
    pub detection_cell_size: f32,
    /// Seconds between perception scans per AI agent
    pub scan_interval: f32,
    /// Radius of the circular arena
    pub arena_radius: f32,
    /// Distance from centre where wandering starts bending back inward
    pub wander_inner_radius: f32,
    /// Hard cap on live entities; spawns beyond it are refused
    pub max_entities: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: physics::TICK_RATE,
            collision_cell_size: collision::CELL_SIZE,
            detection_cell_size: detection::CELL_SIZE,
            scan_interval: detection::SCAN_INTERVAL,
            arena_radius: physics::ARENA_RADIUS,
            wander_inner_radius: navigation::WANDER_INNER_RADIUS,
            max_entities: 512,
        }
    }
}

fn env_f32(name: &str, target: &mut f32) {
    if let Ok(raw) = std::env::var(name) {
        match raw.parse::<f32>() {
            Ok(parsed) => *target = parsed,
            Err(_) => tracing::warn!("Invalid {} '{}', using default", name, raw),
        }
    }
}

impl SimConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(rate) = std::env::var("TICK_RATE") {
            match rate.parse::<u32>() {
                Ok(parsed) if parsed > 0 && parsed <= 240 => config.tick_rate = parsed,
                Ok(_) => tracing::warn!("TICK_RATE must be 1-240, using default"),
                Err(_) => tracing::warn!("Invalid TICK_RATE '{}', using default", rate),
            }
        }

        env_f32("COLLISION_CELL_SIZE", &mut config.collision_cell_size);
        env_f32("DETECTION_CELL_SIZE", &mut config.detection_cell_size);
        env_f32("SCAN_INTERVAL", &mut config.scan_interval);
        env_f32("ARENA_RADIUS", &mut config.arena_radius);
        env_f32("WANDER_INNER_RADIUS", &mut config.wander_inner_radius);

        if let Ok(max) = std::env::var("MAX_ENTITIES") {
            if let Ok(parsed) = max.parse::<usize>() {
                config.max_entities = parsed;
            } else {
                tracing::warn!("Invalid MAX_ENTITIES '{}', using default", max);
            }
        }

        config
    }

    /// Fixed time step derived from the tick rate
    pub fn dt(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        for (name, value) in [
            ("collision_cell_size", self.collision_cell_size),
            ("detection_cell_size", self.detection_cell_size),
            ("scan_interval", self.scan_interval),
            ("arena_radius", self.arena_radius),
            ("wander_inner_radius", self.wander_inner_radius),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositive { name, value });
            }
        }
        if self.wander_inner_radius >= self.arena_radius {
            return Err(ConfigError::InnerRadiusTooLarge {
                inner: self.wander_inner_radius,
                arena: self.arena_radius,
            });
        }
        if self.max_entities == 0 {
            return Err(ConfigError::ZeroMaxEntities);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.tick_rate, 50);
        assert!((config.dt() - 0.02).abs() < 1e-6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_or_default() {
        let config = SimConfig::load_or_default();
        assert!(config.tick_rate > 0);
    }

    #[test]
    fn test_validate_rejects_bad_cell_size() {
        let config = SimConfig {
            collision_cell_size: 0.0,
            ..SimConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonPositive {
                name: "collision_cell_size",
                value: 0.0
            })
        );
    }

    #[test]
    fn test_validate_rejects_inner_radius_past_arena() {
        let config = SimConfig {
            wander_inner_radius: 60.0,
            arena_radius: 50.0,
            ..SimConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InnerRadiusTooLarge { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_tick_rate() {
        let config = SimConfig {
            tick_rate: 0,
            ..SimConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroTickRate));
    }
}
