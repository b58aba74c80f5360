//! Experience, levels and upgrade points

use hashbrown::HashMap;

use crate::game::constants::progression::*;
use crate::game::stats::UpgradeKind;

/// Experience required to advance from `level` to `level + 1`
pub fn level_threshold(level: u32) -> f32 {
    BASE_THRESHOLD * THRESHOLD_GROWTH.powi(level.saturating_sub(1) as i32)
}

/// Experience a destroyed drone of `level` is worth
pub fn drone_experience_drop(level: u32) -> f32 {
    DRONE_DROP_BASE + DRONE_DROP_PER_LEVEL * level.saturating_sub(1) as f32
}

#[derive(Debug, Clone)]
pub struct Progression {
    level: u32,
    /// Experience accumulated toward the next level
    experience: f32,
    upgrade_points: u32,
    upgrade_levels: HashMap<UpgradeKind, u32>,
}

impl Default for Progression {
    fn default() -> Self {
        Self {
            level: 1,
            experience: 0.0,
            upgrade_points: 0,
            upgrade_levels: HashMap::new(),
        }
    }
}

impl Progression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn experience(&self) -> f32 {
        self.experience
    }

    pub fn upgrade_points(&self) -> u32 {
        self.upgrade_points
    }

    pub fn upgrade_level(&self, kind: UpgradeKind) -> u32 {
        self.upgrade_levels.get(&kind).copied().unwrap_or(0)
    }

    /// Add experience and return the number of levels gained
    pub fn add_experience(&mut self, amount: f32) -> u32 {
        if !(amount.is_finite() && amount > 0.0) {
            return 0;
        }
        self.experience += amount;

        let mut gained = 0;
        while self.level < MAX_LEVEL {
            let threshold = level_threshold(self.level);
            if self.experience < threshold {
                break;
            }
            self.experience -= threshold;
            self.level += 1;
            self.upgrade_points += 1;
            gained += 1;
        }
        if self.level >= MAX_LEVEL {
            self.experience = 0.0;
        }
        gained
    }

    /// Spend a point on `kind`, returning the new upgrade level.
    ///
    /// Returns `None` when no point is available or the upgrade is maxed.
    pub fn spend_point(&mut self, kind: UpgradeKind, max_level: u32) -> Option<u32> {
        if self.upgrade_points == 0 {
            return None;
        }
        let current = self.upgrade_level(kind);
        if current >= max_level {
            return None;
        }
        self.upgrade_points -= 1;
        self.upgrade_levels.insert(kind, current + 1);
        Some(current + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_growth() {
        assert_eq!(level_threshold(1), BASE_THRESHOLD);
        assert!((level_threshold(2) - BASE_THRESHOLD * THRESHOLD_GROWTH).abs() < 1e-4);
    }

    #[test]
    fn test_add_experience_levels_up() {
        let mut progression = Progression::new();
        let gained = progression.add_experience(BASE_THRESHOLD + 1.0);
        assert_eq!(gained, 1);
        assert_eq!(progression.level(), 2);
        assert_eq!(progression.upgrade_points(), 1);
        assert!((progression.experience() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_add_experience_multiple_levels() {
        let mut progression = Progression::new();
        let total = level_threshold(1) + level_threshold(2) + level_threshold(3);
        assert_eq!(progression.add_experience(total), 3);
        assert_eq!(progression.level(), 4);
    }

    #[test]
    fn test_add_experience_ignores_invalid() {
        let mut progression = Progression::new();
        assert_eq!(progression.add_experience(-5.0), 0);
        assert_eq!(progression.add_experience(f32::NAN), 0);
        assert_eq!(progression.experience(), 0.0);
    }

    #[test]
    fn test_level_cap() {
        let mut progression = Progression::new();
        progression.add_experience(1.0e12);
        assert_eq!(progression.level(), MAX_LEVEL);
        assert_eq!(progression.experience(), 0.0);
    }

    #[test]
    fn test_spend_point() {
        let mut progression = Progression::new();
        assert_eq!(progression.spend_point(UpgradeKind::Hull, 5), None);

        progression.add_experience(level_threshold(1) + level_threshold(2));
        assert_eq!(progression.spend_point(UpgradeKind::Hull, 1), Some(1));
        assert_eq!(progression.spend_point(UpgradeKind::Hull, 1), None);
        assert_eq!(progression.upgrade_points(), 1);
        assert_eq!(progression.upgrade_level(UpgradeKind::Hull), 1);
    }

    #[test]
    fn test_drone_experience_drop_scales_with_level() {
        assert_eq!(drone_experience_drop(1), DRONE_DROP_BASE);
        assert!(drone_experience_drop(4) > drone_experience_drop(1));
    }
}
