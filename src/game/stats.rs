//! Modifier-stacked numeric stats and the upgrade table that feeds them
//!
//! A stat resolves as `(base + Σflat) * (1 + Σpercent_add) * Π(1 + percent_mult)`.
//! The resolved value is cached until a modifier for that stat changes.

use std::cell::Cell;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::game::constants::stats as defaults;
use crate::util::log_once::warn_once;

/// Identifier of whatever granted a modifier (an upgrade, a pickup, ...)
pub type SourceId = u32;

/// Every stat the simulation reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatKind {
    MoveSpeed,
    MoveAcceleration,
    MoveDeceleration,
    MaxHealth,
    BodyDamage,
    FireRate,
    ProjectileSpeed,
    ProjectileDamage,
    ProjectileLifetime,
    DetectionRadius,
}

impl StatKind {
    pub const ALL: [StatKind; 10] = [
        StatKind::MoveSpeed,
        StatKind::MoveAcceleration,
        StatKind::MoveDeceleration,
        StatKind::MaxHealth,
        StatKind::BodyDamage,
        StatKind::FireRate,
        StatKind::ProjectileSpeed,
        StatKind::ProjectileDamage,
        StatKind::ProjectileLifetime,
        StatKind::DetectionRadius,
    ];

    /// Name used by content tables and `StatBlock::stat_value`
    pub fn name(&self) -> &'static str {
        match self {
            StatKind::MoveSpeed => "moveSpeed",
            StatKind::MoveAcceleration => "moveAcceleration",
            StatKind::MoveDeceleration => "moveDeceleration",
            StatKind::MaxHealth => "maxHealth",
            StatKind::BodyDamage => "bodyDamage",
            StatKind::FireRate => "fireRate",
            StatKind::ProjectileSpeed => "projectileSpeed",
            StatKind::ProjectileDamage => "projectileDamage",
            StatKind::ProjectileLifetime => "projectileLifetime",
            StatKind::DetectionRadius => "detectionRadius",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }

    fn default_base(&self) -> f32 {
        match self {
            StatKind::MoveSpeed => defaults::MOVE_SPEED,
            StatKind::MoveAcceleration => defaults::MOVE_ACCELERATION,
            StatKind::MoveDeceleration => defaults::MOVE_DECELERATION,
            StatKind::MaxHealth => defaults::MAX_HEALTH,
            StatKind::BodyDamage => defaults::BODY_DAMAGE,
            StatKind::FireRate => defaults::FIRE_RATE,
            StatKind::ProjectileSpeed => defaults::PROJECTILE_SPEED,
            StatKind::ProjectileDamage => defaults::PROJECTILE_DAMAGE,
            StatKind::ProjectileLifetime => defaults::PROJECTILE_LIFETIME,
            StatKind::DetectionRadius => defaults::DETECTION_RADIUS,
        }
    }
}

/// How a modifier combines with the base value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModifierKind {
    /// Added to the base value
    Flat,
    /// Summed with other percent-additive modifiers, then applied once
    PercentAdd,
    /// Each one multiplies the result independently
    PercentMult,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatModifier {
    pub kind: ModifierKind,
    pub value: f32,
    pub source: SourceId,
}

impl StatModifier {
    pub fn new(kind: ModifierKind, value: f32, source: SourceId) -> Self {
        Self { kind, value, source }
    }
}

/// A single stat: base value plus an ordered modifier stack
#[derive(Debug, Clone)]
pub struct Stat {
    base: f32,
    modifiers: SmallVec<[StatModifier; 4]>,
    cached: Cell<Option<f32>>,
}

impl Stat {
    pub fn new(base: f32) -> Self {
        Self {
            base,
            modifiers: SmallVec::new(),
            cached: Cell::new(None),
        }
    }

    pub fn base(&self) -> f32 {
        self.base
    }

    pub fn set_base(&mut self, base: f32) {
        self.base = base;
        self.cached.set(None);
    }

    pub fn modifiers(&self) -> &[StatModifier] {
        &self.modifiers
    }

    pub fn add_modifier(&mut self, modifier: StatModifier) {
        self.modifiers.push(modifier);
        self.cached.set(None);
    }

    /// Remove every modifier granted by `source`, returning how many were removed
    pub fn remove_modifiers_from_source(&mut self, source: SourceId) -> usize {
        let before = self.modifiers.len();
        self.modifiers.retain(|m| m.source != source);
        let removed = before - self.modifiers.len();
        if removed > 0 {
            self.cached.set(None);
        }
        removed
    }

    /// Resolved value, recomputed only after a change
    pub fn value(&self) -> f32 {
        if let Some(value) = self.cached.get() {
            return value;
        }
        let value = self.compute();
        self.cached.set(Some(value));
        value
    }

    fn compute(&self) -> f32 {
        let mut flat = 0.0;
        let mut percent_add = 0.0;
        let mut percent_mult = 1.0;
        for modifier in &self.modifiers {
            match modifier.kind {
                ModifierKind::Flat => flat += modifier.value,
                ModifierKind::PercentAdd => percent_add += modifier.value,
                ModifierKind::PercentMult => percent_mult *= 1.0 + modifier.value,
            }
        }
        (self.base + flat) * (1.0 + percent_add) * percent_mult
    }

    #[cfg(test)]
    fn is_cached(&self) -> bool {
        self.cached.get().is_some()
    }
}

/// The full stat sheet of one craft
#[derive(Debug, Clone, Default)]
pub struct StatBlock {
    stats: HashMap<StatKind, Stat>,
}

impl StatBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stat at its default drone value
    pub fn drone_defaults() -> Self {
        let mut block = Self::new();
        for kind in StatKind::ALL {
            block.set_base(kind, kind.default_base());
        }
        block
    }

    /// Builder-style base override
    pub fn with(mut self, kind: StatKind, base: f32) -> Self {
        self.set_base(kind, base);
        self
    }

    pub fn set_base(&mut self, kind: StatKind, base: f32) {
        match self.stats.get_mut(&kind) {
            Some(stat) => stat.set_base(base),
            None => {
                self.stats.insert(kind, Stat::new(base));
            }
        }
    }

    pub fn get(&self, kind: StatKind) -> Option<&Stat> {
        self.stats.get(&kind)
    }

    /// Resolved value; a missing stat is a content error and reads as zero
    pub fn value(&self, kind: StatKind) -> f32 {
        match self.stats.get(&kind) {
            Some(stat) => stat.value(),
            None => {
                warn_once(
                    &format!("stat-missing:{}", kind.name()),
                    &format!("stat '{}' is not defined, treating as 0", kind.name()),
                );
                0.0
            }
        }
    }

    /// String-keyed lookup for content-driven callers
    pub fn stat_value(&self, name: &str) -> f32 {
        match StatKind::from_name(name) {
            Some(kind) => self.value(kind),
            None => {
                warn_once(
                    &format!("stat-unknown:{}", name),
                    &format!("unknown stat name '{}', treating as 0", name),
                );
                0.0
            }
        }
    }

    /// Adding a modifier to an undefined stat defines it with a zero base
    pub fn add_modifier(&mut self, kind: StatKind, modifier: StatModifier) {
        self.stats
            .entry(kind)
            .or_insert_with(|| Stat::new(0.0))
            .add_modifier(modifier);
    }

    pub fn remove_modifiers_from_source(&mut self, source: SourceId) -> usize {
        self.stats
            .values_mut()
            .map(|stat| stat.remove_modifiers_from_source(source))
            .sum()
    }
}

/// Upgrade tracks a drone can invest points into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeKind {
    Engine,
    Hull,
    Cannon,
    Sensors,
    Ram,
}

impl UpgradeKind {
    /// Modifier source used for this upgrade's stat modifiers
    pub fn source_id(&self) -> SourceId {
        // Keep clear of small ids used by transient effects
        1000 + *self as SourceId
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeEffect {
    pub stat: StatKind,
    pub kind: ModifierKind,
    /// Modifier value granted per upgrade level
    pub per_level: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeSpec {
    pub max_level: u32,
    pub effects: Vec<UpgradeEffect>,
}

/// Static upgrade content, normally loaded from a content table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpgradeTable {
    upgrades: HashMap<UpgradeKind, UpgradeSpec>,
}

impl UpgradeTable {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn insert(&mut self, kind: UpgradeKind, spec: UpgradeSpec) {
        self.upgrades.insert(kind, spec);
    }

    pub fn get(&self, kind: UpgradeKind) -> Option<&UpgradeSpec> {
        self.upgrades.get(&kind)
    }

    pub fn max_level(&self, kind: UpgradeKind) -> u32 {
        self.upgrades.get(&kind).map_or(0, |spec| spec.max_level)
    }

    /// Replace `kind`'s modifiers on `stats` with the ones for `level`
    pub fn apply(&self, stats: &mut StatBlock, kind: UpgradeKind, level: u32) {
        let source = kind.source_id();
        stats.remove_modifiers_from_source(source);
        let Some(spec) = self.upgrades.get(&kind) else {
            warn_once(
                &format!("upgrade-missing:{:?}", kind),
                &format!("upgrade {:?} has no table entry, ignoring", kind),
            );
            return;
        };
        if level == 0 {
            return;
        }
        for effect in &spec.effects {
            stats.add_modifier(
                effect.stat,
                StatModifier::new(effect.kind, effect.per_level * level as f32, source),
            );
        }
    }

    /// Built-in table used when no content table is supplied
    pub fn default_table() -> Self {
        let mut table = Self::default();
        table.insert(
            UpgradeKind::Engine,
            UpgradeSpec {
                max_level: 5,
                effects: vec![
                    UpgradeEffect {
                        stat: StatKind::MoveSpeed,
                        kind: ModifierKind::PercentAdd,
                        per_level: 0.08,
                    },
                    UpgradeEffect {
                        stat: StatKind::MoveAcceleration,
                        kind: ModifierKind::PercentAdd,
                        per_level: 0.1,
                    },
                ],
            },
        );
        table.insert(
            UpgradeKind::Hull,
            UpgradeSpec {
                max_level: 5,
                effects: vec![UpgradeEffect {
                    stat: StatKind::MaxHealth,
                    kind: ModifierKind::Flat,
                    per_level: 20.0,
                }],
            },
        );
        table.insert(
            UpgradeKind::Cannon,
            UpgradeSpec {
                max_level: 5,
                effects: vec![
                    UpgradeEffect {
                        stat: StatKind::ProjectileDamage,
                        kind: ModifierKind::PercentAdd,
                        per_level: 0.15,
                    },
                    UpgradeEffect {
                        stat: StatKind::FireRate,
                        kind: ModifierKind::PercentMult,
                        per_level: 0.1,
                    },
                ],
            },
        );
        table.insert(
            UpgradeKind::Sensors,
            UpgradeSpec {
                max_level: 3,
                effects: vec![UpgradeEffect {
                    stat: StatKind::DetectionRadius,
                    kind: ModifierKind::Flat,
                    per_level: 2.0,
                }],
            },
        );
        table.insert(
            UpgradeKind::Ram,
            UpgradeSpec {
                max_level: 3,
                effects: vec![UpgradeEffect {
                    stat: StatKind::BodyDamage,
                    kind: ModifierKind::PercentAdd,
                    per_level: 0.25,
                }],
            },
        );
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_stat_without_modifiers() {
        let stat = Stat::new(5.0);
        assert_eq!(stat.value(), 5.0);
    }

    #[test]
    fn test_modifier_stacking_order() {
        let mut stat = Stat::new(10.0);
        stat.add_modifier(StatModifier::new(ModifierKind::Flat, 5.0, 1));
        stat.add_modifier(StatModifier::new(ModifierKind::PercentAdd, 0.2, 2));
        stat.add_modifier(StatModifier::new(ModifierKind::PercentAdd, 0.3, 3));
        stat.add_modifier(StatModifier::new(ModifierKind::PercentMult, 0.1, 4));
        stat.add_modifier(StatModifier::new(ModifierKind::PercentMult, 0.1, 5));

        // (10 + 5) * (1 + 0.5) * 1.1 * 1.1
        assert!(approx_eq(stat.value(), 15.0 * 1.5 * 1.21));
    }

    #[test]
    fn test_cache_invalidated_on_change() {
        let mut stat = Stat::new(10.0);
        assert_eq!(stat.value(), 10.0);
        assert!(stat.is_cached());

        stat.add_modifier(StatModifier::new(ModifierKind::Flat, 2.0, 7));
        assert!(!stat.is_cached());
        assert_eq!(stat.value(), 12.0);

        assert_eq!(stat.remove_modifiers_from_source(7), 1);
        assert!(!stat.is_cached());
        assert_eq!(stat.value(), 10.0);
    }

    #[test]
    fn test_remove_unknown_source_keeps_cache() {
        let mut stat = Stat::new(3.0);
        stat.value();
        assert_eq!(stat.remove_modifiers_from_source(99), 0);
        assert!(stat.is_cached());
    }

    #[test]
    fn test_stat_block_lookup_by_name() {
        let block = StatBlock::drone_defaults();
        assert_eq!(block.stat_value("moveSpeed"), defaults::MOVE_SPEED);
        assert_eq!(block.stat_value("moveAcceleration"), defaults::MOVE_ACCELERATION);
    }

    #[test]
    fn test_missing_stat_reads_zero() {
        let block = StatBlock::new();
        assert_eq!(block.value(StatKind::FireRate), 0.0);
        assert_eq!(block.stat_value("warpFactor"), 0.0);
    }

    #[test]
    fn test_stat_kind_names_round_trip() {
        for kind in StatKind::ALL {
            assert_eq!(StatKind::from_name(kind.name()), Some(kind));
        }
    }

    #[test]
    fn test_upgrade_apply_replaces_previous_level() {
        let table = UpgradeTable::default_table();
        let mut block = StatBlock::drone_defaults();

        table.apply(&mut block, UpgradeKind::Hull, 1);
        assert!(approx_eq(block.value(StatKind::MaxHealth), defaults::MAX_HEALTH + 20.0));

        table.apply(&mut block, UpgradeKind::Hull, 3);
        assert!(approx_eq(block.value(StatKind::MaxHealth), defaults::MAX_HEALTH + 60.0));
        assert_eq!(block.get(StatKind::MaxHealth).unwrap().modifiers().len(), 1);

        table.apply(&mut block, UpgradeKind::Hull, 0);
        assert!(approx_eq(block.value(StatKind::MaxHealth), defaults::MAX_HEALTH));
    }

    #[test]
    fn test_upgrade_table_from_json() {
        let json = r#"{
            "upgrades": {
                "engine": {
                    "max_level": 2,
                    "effects": [
                        { "stat": "moveSpeed", "kind": "flat", "per_level": 1.0 }
                    ]
                }
            }
        }"#;
        let table = UpgradeTable::from_json(json).unwrap();
        assert_eq!(table.max_level(UpgradeKind::Engine), 2);
        assert_eq!(table.max_level(UpgradeKind::Hull), 0);

        let mut block = StatBlock::drone_defaults();
        table.apply(&mut block, UpgradeKind::Engine, 2);
        assert!(approx_eq(block.value(StatKind::MoveSpeed), defaults::MOVE_SPEED + 2.0));
    }
}
