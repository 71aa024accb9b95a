#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Online statistics describing how each unit type performs against the player.
//!
//! The tracker keeps two independent views: lifetime records per unit type and
//! per-round records scoped to a single round. Both are written only by the
//! scheduler's spawn and removal callbacks. Ranking queries ignore unit types
//! that have not yet produced enough samples and fall back to fixed default
//! rankings instead of returning an empty list.

mod record;

use std::{cmp::Ordering, collections::BTreeMap};

use serde::Deserialize;
use wave_director_core::{RoundIndex, UnitTypeId};

pub use record::{RoundPerformanceRecord, UnitPerformanceRecord};

/// Tunable parameters of the [`PerformanceTracker`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Minimum sample count before a unit type participates in rankings.
    pub reliability_floor: u32,
    /// Capacity of the recent-progress window.
    pub recent_window: usize,
    /// Speed that maps to a normalised speed of `1.0`.
    pub speed_normalizer: f32,
    /// Ranking returned when no unit type clears the floor.
    pub default_ranking: Vec<UnitTypeId>,
    /// Speed ranking returned when no unit type clears the floor.
    pub default_speed_ranking: Vec<UnitTypeId>,
    /// Effectiveness reported for unit types without enough samples.
    pub unreliable_effectiveness: f32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            reliability_floor: 2,
            recent_window: 7,
            speed_normalizer: 5.0,
            default_ranking: vec![UnitTypeId::new(1), UnitTypeId::new(2), UnitTypeId::new(3)],
            default_speed_ranking: vec![UnitTypeId::new(2), UnitTypeId::new(1), UnitTypeId::new(3)],
            unreliable_effectiveness: 0.5,
        }
    }
}

/// Aggregates spawn, speed and outcome statistics per unit type.
#[derive(Clone, Debug)]
pub struct PerformanceTracker {
    config: TrackerConfig,
    total_nodes: usize,
    global: BTreeMap<UnitTypeId, UnitPerformanceRecord>,
    rounds: BTreeMap<RoundIndex, RoundPerformanceRecord>,
}

impl PerformanceTracker {
    /// Creates an empty tracker for a path with `total_nodes` nodes.
    #[must_use]
    pub fn new(config: TrackerConfig, total_nodes: usize) -> Self {
        Self {
            config,
            total_nodes,
            global: BTreeMap::new(),
            rounds: BTreeMap::new(),
        }
    }

    /// Tunable parameters in use.
    #[must_use]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Updates the number of nodes on the path.
    pub fn set_total_nodes(&mut self, total_nodes: usize) {
        self.total_nodes = total_nodes;
    }

    /// Number of nodes on the path.
    #[must_use]
    pub const fn total_nodes(&self) -> usize {
        self.total_nodes
    }

    fn last_node_index(&self) -> u32 {
        u32::try_from(self.total_nodes.saturating_sub(1)).unwrap_or(u32::MAX)
    }

    fn global_mut(&mut self, unit_type: UnitTypeId) -> &mut UnitPerformanceRecord {
        let window = self.config.recent_window;
        self.global
            .entry(unit_type)
            .or_insert_with(|| UnitPerformanceRecord::new(unit_type, window))
    }

    fn round_mut(&mut self, round: RoundIndex) -> &mut RoundPerformanceRecord {
        self.rounds
            .entry(round)
            .or_insert_with(|| RoundPerformanceRecord::new(round))
    }

    /// Records that a unit of the provided type entered the field.
    pub fn record_spawn(&mut self, unit_type: UnitTypeId, round: RoundIndex) {
        self.round_mut(round).unit_mut(unit_type).note_spawn();
        self.global_mut(unit_type).note_spawn();
    }

    /// Records a speed observation for the provided type.
    pub fn record_speed(&mut self, unit_type: UnitTypeId, speed: f32) {
        self.global_mut(unit_type).note_speed(speed);
    }

    /// Records that a unit walked the whole path.
    pub fn record_reached_end(&mut self, unit_type: UnitTypeId, round: RoundIndex) {
        let last = self.last_node_index();
        self.round_mut(round).unit_mut(unit_type).note_outcome(last, true);
        let record = self.global_mut(unit_type);
        record.note_outcome(last, true);
        record.note_progress(last, last);
    }

    /// Records that a unit was defeated after reaching `furthest_node`.
    pub fn record_defeated(&mut self, unit_type: UnitTypeId, round: RoundIndex, furthest_node: u32) {
        let last = self.last_node_index();
        let furthest_node = furthest_node.min(last);
        self.round_mut(round)
            .unit_mut(unit_type)
            .note_outcome(furthest_node, false);
        let record = self.global_mut(unit_type);
        record.note_outcome(furthest_node, false);
        record.note_progress(furthest_node, last);
    }

    /// Lifetime record of a unit type.
    #[must_use]
    pub fn record(&self, unit_type: UnitTypeId) -> Option<&UnitPerformanceRecord> {
        self.global.get(&unit_type)
    }

    /// Every lifetime record in ascending type order.
    pub fn records(&self) -> impl Iterator<Item = &UnitPerformanceRecord> {
        self.global.values()
    }

    /// Record scoped to a single round.
    #[must_use]
    pub fn round_record(&self, round: RoundIndex) -> Option<&RoundPerformanceRecord> {
        self.rounds.get(&round)
    }

    /// Weighted progress rate of a unit type, `0.0` when unseen.
    #[must_use]
    pub fn weighted_progress(&self, unit_type: UnitTypeId) -> f32 {
        self.record(unit_type)
            .map_or(0.0, |record| record.weighted_progress(self.total_nodes))
    }

    /// Recent progress of a unit type, `0.0` when unseen.
    #[must_use]
    pub fn recent_weighted_progress(&self, unit_type: UnitTypeId) -> f32 {
        self.record(unit_type)
            .map_or(0.0, |record| record.recent_weighted_progress(self.total_nodes))
    }

    /// Reports whether the type has enough finished samples to be trusted.
    #[must_use]
    pub fn is_reliable(&self, unit_type: UnitTypeId) -> bool {
        self.record(unit_type)
            .is_some_and(|record| record.analysis_samples() >= self.config.reliability_floor)
    }

    /// Composite score in `[0, 1]` used to weight unit type proportions.
    ///
    /// Types without enough samples report the configured neutral value.
    #[must_use]
    pub fn effectiveness_for(&self, unit_type: UnitTypeId) -> f32 {
        let Some(record) = self
            .record(unit_type)
            .filter(|record| record.analysis_samples() >= self.config.reliability_floor)
        else {
            return self.config.unreliable_effectiveness;
        };
        record.effectiveness_score(self.total_nodes, self.config.speed_normalizer)
    }

    /// Fraction of every spawned unit that reached the end.
    #[must_use]
    pub fn global_success_rate(&self) -> f32 {
        let (spawned, reached) = self.global.values().fold((0u64, 0u64), |(spawned, reached), record| {
            (
                spawned + u64::from(record.times_spawned()),
                reached + u64::from(record.times_reached_end()),
            )
        });
        if spawned == 0 {
            return 0.0;
        }
        reached as f32 / spawned as f32
    }

    /// Unit types ranked by weighted progress and success rate.
    #[must_use]
    pub fn most_progressive(&self, count: usize) -> Vec<UnitTypeId> {
        self.ranked(
            count,
            |record| record.analysis_samples(),
            |record| {
                (
                    0.6 * record.weighted_progress(self.total_nodes) + 0.4 * record.success_rate(),
                    0.0,
                )
            },
            &self.config.default_ranking,
        )
    }

    /// Unit types ranked by success rate, ties broken by average furthest node.
    #[must_use]
    pub fn most_successful(&self, count: usize) -> Vec<UnitTypeId> {
        self.ranked(
            count,
            |record| record.times_spawned(),
            |record| (record.success_rate(), record.average_furthest_node()),
            &self.config.default_ranking,
        )
    }

    /// Unit types ranked by average speed, ties broken by success rate.
    #[must_use]
    pub fn fastest(&self, count: usize) -> Vec<UnitTypeId> {
        self.ranked(
            count,
            |record| record.speed_samples(),
            |record| (record.average_speed(), record.success_rate()),
            &self.config.default_speed_ranking,
        )
    }

    /// Unit types ranked by effectiveness score.
    #[must_use]
    pub fn most_effective(&self, count: usize) -> Vec<UnitTypeId> {
        self.ranked(
            count,
            |record| record.times_spawned(),
            |record| {
                (
                    record.effectiveness_score(self.total_nodes, self.config.speed_normalizer),
                    0.0,
                )
            },
            &self.config.default_ranking,
        )
    }

    fn ranked<S, K>(&self, count: usize, samples: S, key: K, fallback: &[UnitTypeId]) -> Vec<UnitTypeId>
    where
        S: Fn(&UnitPerformanceRecord) -> u32,
        K: Fn(&UnitPerformanceRecord) -> (f32, f32),
    {
        let mut scored: Vec<(UnitTypeId, (f32, f32))> = self
            .global
            .values()
            .filter(|record| samples(record) >= self.config.reliability_floor)
            .map(|record| (record.unit_type(), key(record)))
            .collect();

        if scored.is_empty() {
            log::debug!("no unit type clears the reliability floor, using default ranking");
            return fallback.iter().copied().take(count).collect();
        }

        scored.sort_by(|(_, left), (_, right)| descending(left, right));
        scored.into_iter().take(count).map(|(unit_type, _)| unit_type).collect()
    }

    /// Clears every record.
    pub fn reset(&mut self) {
        self.global.clear();
        self.rounds.clear();
    }
}

impl Default for PerformanceTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default(), 0)
    }
}

fn descending(left: &(f32, f32), right: &(f32, f32)) -> Ordering {
    right
        .0
        .total_cmp(&left.0)
        .then_with(|| right.1.total_cmp(&left.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ties_keep_ascending_type_order() {
        let mut tracker = PerformanceTracker::new(TrackerConfig::default(), 10);
        for id in [3, 1, 2] {
            for _ in 0..2 {
                tracker.record_spawn(UnitTypeId::new(id), RoundIndex::new(1));
                tracker.record_defeated(UnitTypeId::new(id), RoundIndex::new(1), 4);
            }
        }
        assert_eq!(
            tracker.most_progressive(3),
            vec![UnitTypeId::new(1), UnitTypeId::new(2), UnitTypeId::new(3)]
        );
    }

    #[test]
    fn defeated_nodes_are_clamped_to_path() {
        let mut tracker = PerformanceTracker::new(TrackerConfig::default(), 5);
        tracker.record_spawn(UnitTypeId::new(1), RoundIndex::new(0));
        tracker.record_defeated(UnitTypeId::new(1), RoundIndex::new(0), 99);
        let record = tracker.record(UnitTypeId::new(1)).expect("record");
        assert!((record.average_furthest_node() - 4.0).abs() < f32::EPSILON);
    }
}
