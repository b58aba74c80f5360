//! AI perception: a point grid of perceivable entities and target scoring
//!
//! Kept apart from the collision grid. Entries are inserted by centre point,
//! so queries widen their range by the largest radius seen this rebuild.

use crate::game::constants::detection::{CELL_SIZE, MIN_HEALTH_FRACTION, VALUE_NORMALIZER};
use crate::game::constants::scoring::*;
use crate::game::entity::{EntityId, Team, TeamRelation};
use crate::game::spatial::SpatialGrid;
use crate::util::vec2::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedKind {
    Drone,
    ArenaObject,
}

/// Snapshot of one perceivable entity, taken when the grid is rebuilt
#[derive(Debug, Clone, Copy)]
pub struct DetectionEntry {
    pub id: EntityId,
    pub kind: DetectedKind,
    pub position: Vec2,
    pub radius: f32,
    pub team: Team,
    pub health_pct: Option<f32>,
    pub level: Option<u32>,
    pub experience: f32,
}

/// Which relations and kinds a scan should report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    pub allies: bool,
    pub enemies: bool,
    pub neutrals: bool,
    pub drones: bool,
    pub objects: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            allies: true,
            enemies: true,
            neutrals: true,
            drones: true,
            objects: true,
        }
    }
}

impl ScanOptions {
    /// Everything a hunting drone cares about: enemies and neutral pickups
    pub fn targets() -> Self {
        Self {
            allies: false,
            ..Self::default()
        }
    }

    fn accepts(&self, relation: TeamRelation, kind: DetectedKind) -> bool {
        let relation_ok = match relation {
            TeamRelation::Ally => self.allies,
            TeamRelation::Enemy => self.enemies,
            TeamRelation::Neutral => self.neutrals,
        };
        let kind_ok = match kind {
            DetectedKind::Drone => self.drones,
            DetectedKind::ArenaObject => self.objects,
        };
        relation_ok && kind_ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedEntity {
    pub id: EntityId,
    pub kind: DetectedKind,
    pub team: Team,
    pub position: Vec2,
    pub distance: f32,
    pub health_pct: Option<f32>,
    pub level: Option<u32>,
    /// Experience yield scaled up as remaining health drops
    pub value: f32,
}

/// Experience yield weighted by how little health is left to chew through
pub fn target_value(experience: f32, health_pct: Option<f32>) -> f32 {
    let health = health_pct.unwrap_or(1.0).max(MIN_HEALTH_FRACTION);
    experience.max(0.0) / health
}

pub struct DetectionSystem {
    grid: SpatialGrid<DetectionEntry>,
    max_radius: f32,
}

impl DetectionSystem {
    pub fn new(cell_size: f32) -> Self {
        Self {
            grid: SpatialGrid::new(cell_size),
            max_radius: 0.0,
        }
    }

    /// Replace the perception snapshot wholesale
    pub fn rebuild<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = DetectionEntry>,
    {
        self.grid.clear();
        self.max_radius = 0.0;
        for entry in entries {
            self.max_radius = self.max_radius.max(entry.radius);
            self.grid.insert_point(entry.position, entry);
        }
    }

    pub fn len(&self) -> usize {
        self.grid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }

    /// Entities whose footprint reaches within `radius` of `center`,
    /// nearest first. The scanner itself is never reported.
    pub fn scan_area(
        &self,
        scanner_id: EntityId,
        center: Vec2,
        radius: f32,
        scanner_team: Team,
        options: &ScanOptions,
    ) -> Vec<DetectedEntity> {
        if radius <= 0.0 {
            return Vec::new();
        }

        let range = self.grid.circle_range(center, radius + self.max_radius);
        let mut detected: Vec<DetectedEntity> = self
            .grid
            .query_range(range)
            .filter(|entry| entry.id != scanner_id)
            .filter(|entry| options.accepts(scanner_team.relation_to(entry.team), entry.kind))
            .filter_map(|entry| {
                let distance = center.distance_to(entry.position);
                if distance > radius + entry.radius {
                    return None;
                }
                Some(DetectedEntity {
                    id: entry.id,
                    kind: entry.kind,
                    team: entry.team,
                    position: entry.position,
                    distance,
                    health_pct: entry.health_pct,
                    level: entry.level,
                    value: target_value(entry.experience, entry.health_pct),
                })
            })
            .collect();

        detected.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)));
        detected
    }
}

impl Default for DetectionSystem {
    fn default() -> Self {
        Self::new(CELL_SIZE)
    }
}

fn proximity(distance: f32, radius: f32) -> f32 {
    if radius <= 0.0 {
        0.0
    } else {
        (1.0 - distance / radius).clamp(0.0, 1.0)
    }
}

fn health_deficit(health_pct: Option<f32>) -> f32 {
    1.0 - health_pct.unwrap_or(1.0).clamp(0.0, 1.0)
}

/// Attractiveness of a drone target; stronger drones are penalised less by
/// aggressive scanners
pub fn score_drone(target: &DetectedEntity, scanner_level: u32, radius: f32, aggression: f32) -> f32 {
    let level_gap = target.level.unwrap_or(1).saturating_sub(scanner_level) as f32;
    let danger = DRONE_LEVEL_PENALTY * level_gap * (1.0 - aggression.clamp(0.0, 1.0));

    DRONE_HEALTH_WEIGHT * health_deficit(target.health_pct)
        + DRONE_PROXIMITY_WEIGHT * proximity(target.distance, radius)
        + DRONE_VALUE_WEIGHT * (target.value / VALUE_NORMALIZER)
        - danger
}

pub fn score_object(target: &DetectedEntity, radius: f32) -> f32 {
    OBJECT_HEALTH_WEIGHT * health_deficit(target.health_pct)
        + OBJECT_PROXIMITY_WEIGHT * proximity(target.distance, radius)
        + OBJECT_VALUE_WEIGHT * (target.value / VALUE_NORMALIZER)
}

/// Pick the best drone or object to pursue.
///
/// The best drone wins over the best object when
/// `drone_score * (1 + aggression) > object_score`.
pub fn find_priority_target<'a>(
    scanner_level: u32,
    detected: &'a [DetectedEntity],
    radius: f32,
    aggression: f32,
) -> Option<&'a DetectedEntity> {
    let mut best_drone: Option<(&DetectedEntity, f32)> = None;
    let mut best_object: Option<(&DetectedEntity, f32)> = None;

    for target in detected {
        let (slot, score) = match target.kind {
            DetectedKind::Drone => (
                &mut best_drone,
                score_drone(target, scanner_level, radius, aggression),
            ),
            DetectedKind::ArenaObject => (&mut best_object, score_object(target, radius)),
        };
        // Strictly greater keeps the nearest on ties
        if slot.map_or(true, |(_, best)| score > best) {
            *slot = Some((target, score));
        }
    }

    match (best_drone, best_object) {
        (Some((drone, drone_score)), Some((object, object_score))) => {
            if drone_score * (1.0 + aggression) > object_score {
                Some(drone)
            } else {
                Some(object)
            }
        }
        (Some((drone, _)), None) => Some(drone),
        (None, Some((object, _))) => Some(object),
        (None, None) => None,
    }
}

/// Nearest enemy drone in a scan, used as the flee threat
pub fn nearest_enemy_drone(scanner_team: Team, detected: &[DetectedEntity]) -> Option<&DetectedEntity> {
    detected
        .iter()
        .filter(|d| d.kind == DetectedKind::Drone && scanner_team.is_enemy_of(d.team))
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
}
