//! Tick budget monitoring
//!
//! Tracks how much of the fixed tick budget the simulation uses and turns
//! that into admission signals for whoever spawns entities into the world.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Samples kept in the rolling window (~2.4 s at 50 Hz)
const MAX_SAMPLES: usize = 120;

/// Samples needed before the status is trusted
const MIN_SAMPLES: usize = 10;

/// Budget usage classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceStatus {
    /// Plenty of headroom
    Excellent,
    Good,
    /// Close to budget; hold entity counts steady
    Warning,
    /// At or over budget; only essential spawns
    Critical,
    /// Sustained overload; the owner should shed entities
    Catastrophic,
}

impl PerformanceStatus {
    /// Any new entity, including AI drones
    pub fn can_spawn_drones(&self) -> bool {
        matches!(self, PerformanceStatus::Excellent | PerformanceStatus::Good)
    }

    /// Cheap neutral pickups keep flowing until things get critical
    pub fn can_spawn_objects(&self) -> bool {
        matches!(
            self,
            PerformanceStatus::Excellent | PerformanceStatus::Good | PerformanceStatus::Warning
        )
    }

    pub fn should_shed_load(&self) -> bool {
        matches!(self, PerformanceStatus::Catastrophic)
    }
}

pub struct PerformanceMonitor {
    tick_durations: VecDeque<Duration>,
    /// Tick budget at the configured rate
    target_tick_duration: Duration,
    /// Budget fractions separating the status levels
    excellent_threshold: f32,
    warning_threshold: f32,
    critical_threshold: f32,
    catastrophic_threshold: f32,
    status: PerformanceStatus,
    tick_start: Option<Instant>,
    last_entity_count: usize,
}

impl PerformanceMonitor {
    pub fn new(tick_rate: u32) -> Self {
        let target_tick_duration = Duration::from_secs_f32(1.0 / tick_rate.max(1) as f32);

        Self {
            tick_durations: VecDeque::with_capacity(MAX_SAMPLES),
            target_tick_duration,
            excellent_threshold: 0.3,
            warning_threshold: 0.7,
            critical_threshold: 0.9,
            catastrophic_threshold: 1.5,
            status: PerformanceStatus::Excellent,
            tick_start: None,
            last_entity_count: 0,
        }
    }

    pub fn tick_start(&mut self) {
        self.tick_start = Some(Instant::now());
    }

    /// Close the timing window opened by `tick_start`
    pub fn tick_end(&mut self, entity_count: usize) {
        if let Some(start) = self.tick_start.take() {
            self.record_tick(start.elapsed());
            self.last_entity_count = entity_count;
        }
    }

    pub fn record_tick(&mut self, duration: Duration) {
        self.tick_durations.push_back(duration);
        while self.tick_durations.len() > MAX_SAMPLES {
            self.tick_durations.pop_front();
        }
        self.update_status();
    }

    fn update_status(&mut self) {
        if self.tick_durations.len() < MIN_SAMPLES {
            return;
        }

        let ratio = self.budget_ratio();
        let previous = self.status;
        self.status = if ratio < self.excellent_threshold {
            PerformanceStatus::Excellent
        } else if ratio < self.warning_threshold {
            PerformanceStatus::Good
        } else if ratio < self.critical_threshold {
            PerformanceStatus::Warning
        } else if ratio < self.catastrophic_threshold {
            PerformanceStatus::Critical
        } else {
            PerformanceStatus::Catastrophic
        };

        if self.status != previous {
            tracing::info!(
                from = ?previous,
                to = ?self.status,
                budget = format!("{:.1}%", ratio * 100.0),
                "Performance status changed"
            );
        }
    }

    fn budget_ratio(&self) -> f32 {
        self.average_tick_duration().as_secs_f32() / self.target_tick_duration.as_secs_f32()
    }

    pub fn average_tick_duration(&self) -> Duration {
        if self.tick_durations.is_empty() {
            return Duration::ZERO;
        }
        let sum: Duration = self.tick_durations.iter().sum();
        sum / self.tick_durations.len() as u32
    }

    /// 95th percentile tick duration
    pub fn p95_tick_duration(&self) -> Duration {
        if self.tick_durations.is_empty() {
            return Duration::ZERO;
        }
        let mut sorted: Vec<_> = self.tick_durations.iter().copied().collect();
        sorted.sort();
        let idx = (sorted.len() as f32 * 0.95) as usize;
        sorted.get(idx.min(sorted.len() - 1)).copied().unwrap_or(Duration::ZERO)
    }

    pub fn status(&self) -> PerformanceStatus {
        self.status
    }

    /// Budget usage as percentage (0-100+)
    pub fn budget_usage_percent(&self) -> f32 {
        self.budget_ratio() * 100.0
    }

    pub fn sample_count(&self) -> usize {
        self.tick_durations.len()
    }

    pub fn last_entity_count(&self) -> usize {
        self.last_entity_count
    }

    pub fn status_message(&self) -> String {
        format!(
            "{:?} - {:.1}% budget (p95 {:.2}ms), {} entities",
            self.status,
            self.budget_usage_percent(),
            self.p95_tick_duration().as_secs_f64() * 1000.0,
            self.last_entity_count
        )
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(crate::game::constants::physics::TICK_RATE)
    }
}
