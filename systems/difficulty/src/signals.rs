//! Derived difficulty signals and the cached controller state.

use std::time::Duration;

use glam::Vec3;
use wave_director_core::{UnitTypeId, COMPOSED_UNIT_TYPES};
use wave_director_system_performance::PerformanceTracker;

/// Turn angle, in degrees, above which a path node counts as a corner.
const CORNER_ANGLE_DEGREES: f32 = 30.0;

/// Scores how demanding the path layout is, in `[0, 1]`.
///
/// Long paths and paths with many corners score higher. Paths with fewer than
/// three nodes report a neutral `0.5`.
#[must_use]
pub fn map_difficulty(nodes: &[[f32; 3]]) -> f32 {
    if nodes.len() < 3 {
        return 0.5;
    }
    let total = nodes.len() as f32;
    let length_factor = ((total - 8.0) / 20.0).clamp(0.0, 1.0);

    let corners = nodes
        .windows(3)
        .filter(|window| {
            let previous = (Vec3::from(window[1]) - Vec3::from(window[0])).normalize_or_zero();
            let next = (Vec3::from(window[2]) - Vec3::from(window[1])).normalize_or_zero();
            if previous == Vec3::ZERO || next == Vec3::ZERO {
                return false;
            }
            previous.dot(next).clamp(-1.0, 1.0).acos().to_degrees() > CORNER_ANGLE_DEGREES
        })
        .count();
    let complexity = (corners as f32 / (total - 2.0)).clamp(0.0, 1.0);

    length_factor * 0.6 + complexity * 0.4
}

/// Blends map difficulty with raw path length, clamped to `[0, 1]`.
#[must_use]
pub fn map_adaptation(map_difficulty: f32, last_node_index: usize) -> f32 {
    (map_difficulty * 0.6 + (last_node_index as f32 / 20.0) * 0.4).clamp(0.0, 1.0)
}

/// How depleted the player's lives and funds are, in `[0, 1]`.
#[must_use]
pub fn player_pressure(health_fraction: f32, funds_fraction: f32) -> f32 {
    let health = health_fraction.clamp(0.0, 1.0);
    let funds = funds_fraction.clamp(0.0, 1.0);
    (1.0 - health) * 0.7 + (1.0 - funds) * 0.3
}

/// Mean progress score over reliable unit types, `0.5` when none is reliable.
#[must_use]
pub fn progress_pressure(tracker: &PerformanceTracker) -> f32 {
    let floor = tracker.config().reliability_floor;
    let nodes = tracker.total_nodes();
    let (total, reliable) = tracker
        .records()
        .filter(|record| record.analysis_samples() >= floor)
        .fold((0.0f32, 0u32), |(total, reliable), record| {
            let score =
                record.weighted_progress(nodes) * 0.7 + record.recent_weighted_progress(nodes) * 0.3;
            (total + score, reliable + 1)
        });
    if reliable == 0 {
        return 0.5;
    }
    total / reliable as f32
}

/// Share of spawned units the player defeated, `0.5` before any spawn.
#[must_use]
pub fn kill_efficiency(tracker: &PerformanceTracker) -> f32 {
    let (spawned, reached) = tracker.records().fold((0u64, 0u64), |(spawned, reached), record| {
        (
            spawned + u64::from(record.times_spawned()),
            reached + u64::from(record.times_reached_end()),
        )
    });
    if spawned == 0 {
        return 0.5;
    }
    spawned.saturating_sub(reached) as f32 / spawned as f32
}

/// Controller-owned multiplier plus tracker-derived signals cached on a cadence.
///
/// The multiplier is written only by the controller; every other component
/// reads it. Cached signals may be up to one cadence stale.
#[derive(Clone, Debug, PartialEq)]
pub struct DifficultyState {
    health_multiplier: f32,
    map_difficulty: f32,
    progress_pressure: f32,
    kill_efficiency: f32,
    progressive: Vec<UnitTypeId>,
    fastest: Vec<UnitTypeId>,
    last_refresh: Option<Duration>,
}

impl DifficultyState {
    pub(crate) fn new(map_difficulty: f32) -> Self {
        Self {
            health_multiplier: 1.0,
            map_difficulty,
            progress_pressure: 0.5,
            kill_efficiency: 0.5,
            progressive: Vec::new(),
            fastest: Vec::new(),
            last_refresh: None,
        }
    }

    /// Current controller health multiplier.
    #[must_use]
    pub fn health_multiplier(&self) -> f32 {
        self.health_multiplier
    }

    /// Cached map difficulty score.
    #[must_use]
    pub fn map_difficulty(&self) -> f32 {
        self.map_difficulty
    }

    /// Cached progress pressure.
    #[must_use]
    pub fn progress_pressure(&self) -> f32 {
        self.progress_pressure
    }

    /// Cached kill efficiency.
    #[must_use]
    pub fn kill_efficiency(&self) -> f32 {
        self.kill_efficiency
    }

    /// Cached composed unit types ranked by progressiveness.
    #[must_use]
    pub fn progressive(&self) -> &[UnitTypeId] {
        &self.progressive
    }

    /// Cached composed unit types ranked by speed.
    #[must_use]
    pub fn fastest(&self) -> &[UnitTypeId] {
        &self.fastest
    }

    pub(crate) fn set_map_difficulty(&mut self, map_difficulty: f32) {
        self.map_difficulty = map_difficulty;
    }

    pub(crate) fn set_health_multiplier(&mut self, multiplier: f32) {
        self.health_multiplier = multiplier;
    }

    /// Re-reads tracker signals when the cadence elapsed. Returns whether it did.
    pub(crate) fn refresh_if_due(
        &mut self,
        now: Duration,
        cadence: Duration,
        tracker: &PerformanceTracker,
    ) -> bool {
        let due = self
            .last_refresh
            .map_or(true, |last| now.saturating_sub(last) >= cadence);
        if !due {
            return false;
        }
        self.last_refresh = Some(now);
        self.progress_pressure = progress_pressure(tracker);
        self.kill_efficiency = kill_efficiency(tracker);
        self.progressive = composed_ranking(tracker.most_progressive(usize::MAX));
        self.fastest = composed_ranking(tracker.fastest(usize::MAX));
        true
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new(self.map_difficulty);
    }
}

/// Restricts a ranking to the composed unit types, keeping at most three.
///
/// Falls back to `1, 2, 3` when no composed type remains.
pub(crate) fn composed_ranking(ranking: Vec<UnitTypeId>) -> Vec<UnitTypeId> {
    let ranked: Vec<UnitTypeId> = ranking
        .into_iter()
        .filter(|id| id.composed_slot().is_some())
        .take(COMPOSED_UNIT_TYPES)
        .collect();
    if ranked.is_empty() {
        (0..COMPOSED_UNIT_TYPES).map(UnitTypeId::from_composed_slot).collect()
    } else {
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_short_paths_are_easy() {
        let straight: Vec<[f32; 3]> = (0..8).map(|x| [x as f32, 0.0, 0.0]).collect();
        assert_eq!(map_difficulty(&straight), 0.0);
        assert_eq!(map_difficulty(&straight[..2]), 0.5);
    }

    #[test]
    fn zigzag_paths_score_complexity() {
        let zigzag: Vec<[f32; 3]> = (0..8)
            .map(|x| [x as f32, 0.0, if x % 2 == 0 { 0.0 } else { 1.0 }])
            .collect();
        // every interior node turns by 90 degrees
        assert!((map_difficulty(&zigzag) - 0.4).abs() < 1e-6);
    }

    #[test]
    fn pressure_grows_as_player_weakens() {
        assert_eq!(player_pressure(1.0, 1.0), 0.0);
        assert!((player_pressure(0.0, 0.0) - 1.0).abs() < 1e-6);
        assert!(player_pressure(0.2, 0.5) > player_pressure(0.8, 0.5));
    }

    #[test]
    fn empty_tracker_reports_neutral_signals() {
        let tracker = PerformanceTracker::default();
        assert_eq!(progress_pressure(&tracker), 0.5);
        assert_eq!(kill_efficiency(&tracker), 0.5);
    }

    #[test]
    fn boss_types_are_dropped_from_composed_rankings() {
        let ranking = vec![UnitTypeId::new(5), UnitTypeId::new(2), UnitTypeId::new(4)];
        assert_eq!(composed_ranking(ranking), vec![UnitTypeId::new(2)]);
        assert_eq!(
            composed_ranking(vec![UnitTypeId::new(6)]),
            vec![UnitTypeId::new(1), UnitTypeId::new(2), UnitTypeId::new(3)]
        );
    }
}
