//! Per unit-type counters and the metrics derived from them.

use std::collections::{BTreeMap, VecDeque};

use wave_director_core::{RoundIndex, UnitTypeId};

/// Lifetime counters for one unit type.
///
/// Derived metrics are computed from the counters on every read so they can
/// never drift out of sync with them.
#[derive(Clone, Debug, PartialEq)]
pub struct UnitPerformanceRecord {
    unit_type: UnitTypeId,
    times_spawned: u32,
    times_reached_end: u32,
    times_defeated: u32,
    total_furthest_nodes: u64,
    analysis_samples: u32,
    total_speed: f32,
    speed_samples: u32,
    node_counts: BTreeMap<u32, u32>,
    recent_progress: VecDeque<f32>,
    recent_capacity: usize,
}

impl UnitPerformanceRecord {
    pub(crate) fn new(unit_type: UnitTypeId, recent_capacity: usize) -> Self {
        Self {
            unit_type,
            times_spawned: 0,
            times_reached_end: 0,
            times_defeated: 0,
            total_furthest_nodes: 0,
            analysis_samples: 0,
            total_speed: 0.0,
            speed_samples: 0,
            node_counts: BTreeMap::new(),
            recent_progress: VecDeque::with_capacity(recent_capacity),
            recent_capacity,
        }
    }

    pub(crate) fn note_spawn(&mut self) {
        self.times_spawned = self.times_spawned.saturating_add(1);
    }

    pub(crate) fn note_speed(&mut self, speed: f32) {
        if !speed.is_finite() {
            return;
        }
        self.total_speed += speed.max(0.0);
        self.speed_samples = self.speed_samples.saturating_add(1);
    }

    pub(crate) fn note_outcome(&mut self, furthest_node: u32, reached_end: bool) {
        if reached_end {
            self.times_reached_end = self.times_reached_end.saturating_add(1);
        } else {
            self.times_defeated = self.times_defeated.saturating_add(1);
        }
        self.total_furthest_nodes = self.total_furthest_nodes.saturating_add(u64::from(furthest_node));
        self.analysis_samples = self.analysis_samples.saturating_add(1);
    }

    pub(crate) fn note_progress(&mut self, furthest_node: u32, last_node_index: u32) {
        *self.node_counts.entry(furthest_node).or_insert(0) += 1;
        let progress = if last_node_index == 0 {
            0.0
        } else {
            (furthest_node as f32 / last_node_index as f32).clamp(0.0, 1.0)
        };
        if self.recent_capacity == 0 {
            return;
        }
        while self.recent_progress.len() >= self.recent_capacity {
            let _ = self.recent_progress.pop_front();
        }
        self.recent_progress.push_back(progress);
    }

    /// Unit type the record describes.
    #[must_use]
    pub const fn unit_type(&self) -> UnitTypeId {
        self.unit_type
    }

    /// Number of units spawned.
    #[must_use]
    pub const fn times_spawned(&self) -> u32 {
        self.times_spawned
    }

    /// Number of units that walked the whole path.
    #[must_use]
    pub const fn times_reached_end(&self) -> u32 {
        self.times_reached_end
    }

    /// Number of units defeated before reaching the end.
    #[must_use]
    pub const fn times_defeated(&self) -> u32 {
        self.times_defeated
    }

    /// Number of finished units whose furthest node was recorded.
    #[must_use]
    pub const fn analysis_samples(&self) -> u32 {
        self.analysis_samples
    }

    /// Number of recorded speed samples.
    #[must_use]
    pub const fn speed_samples(&self) -> u32 {
        self.speed_samples
    }

    /// Fraction of spawned units that reached the end.
    #[must_use]
    pub fn success_rate(&self) -> f32 {
        if self.times_spawned == 0 {
            return 0.0;
        }
        self.times_reached_end as f32 / self.times_spawned as f32
    }

    /// Mean furthest node reached by finished units.
    #[must_use]
    pub fn average_furthest_node(&self) -> f32 {
        if self.analysis_samples == 0 {
            return 0.0;
        }
        self.total_furthest_nodes as f32 / self.analysis_samples as f32
    }

    /// Mean recorded speed, `1.0` before any sample is known.
    #[must_use]
    pub fn average_speed(&self) -> f32 {
        if self.speed_samples == 0 {
            return 1.0;
        }
        self.total_speed / self.speed_samples as f32
    }

    /// Progress rate weighted towards near-completion nodes.
    ///
    /// Reaching node `i` of `total_nodes` contributes `((i + 1) / total_nodes)^3 * 8`;
    /// the mean contribution is clamped to `[0, 1]`.
    #[must_use]
    pub fn weighted_progress(&self, total_nodes: usize) -> f32 {
        if self.times_spawned == 0 || total_nodes <= 1 {
            return 0.0;
        }
        let total = total_nodes as f32;
        let mut weighted = 0.0;
        let mut samples = 0u32;
        for (&node, &count) in &self.node_counts {
            if node as usize >= total_nodes || count == 0 {
                continue;
            }
            let weight = ((node as f32 + 1.0) / total).powi(3) * 8.0;
            weighted += count as f32 * weight;
            samples = samples.saturating_add(count);
        }
        if samples == 0 {
            return 0.0;
        }
        (weighted / samples as f32).clamp(0.0, 1.0)
    }

    /// Mean of the recent progress window, falling back to the weighted rate when empty.
    #[must_use]
    pub fn recent_weighted_progress(&self, total_nodes: usize) -> f32 {
        if self.recent_progress.is_empty() {
            return self.weighted_progress(total_nodes);
        }
        self.recent_progress.iter().sum::<f32>() / self.recent_progress.len() as f32
    }

    /// Composite threat score used for ranking and proportion weights.
    #[must_use]
    pub fn effectiveness_score(&self, total_nodes: usize, speed_normalizer: f32) -> f32 {
        0.8 * self.weighted_progress(total_nodes)
            + 0.1 * self.success_rate()
            + 0.1 * normalized_speed(self.average_speed(), speed_normalizer)
    }
}

pub(crate) fn normalized_speed(speed: f32, normalizer: f32) -> f32 {
    if normalizer <= 0.0 {
        return 0.0;
    }
    (speed / normalizer).clamp(0.0, 1.0)
}

/// Unit records scoped to a single round.
#[derive(Clone, Debug, PartialEq)]
pub struct RoundPerformanceRecord {
    round: RoundIndex,
    units: BTreeMap<UnitTypeId, UnitPerformanceRecord>,
}

impl RoundPerformanceRecord {
    pub(crate) fn new(round: RoundIndex) -> Self {
        Self {
            round,
            units: BTreeMap::new(),
        }
    }

    pub(crate) fn unit_mut(&mut self, unit_type: UnitTypeId) -> &mut UnitPerformanceRecord {
        self.units
            .entry(unit_type)
            .or_insert_with(|| UnitPerformanceRecord::new(unit_type, 0))
    }

    /// Round the record belongs to.
    #[must_use]
    pub const fn round(&self) -> RoundIndex {
        self.round
    }

    /// Record of a unit type within the round.
    #[must_use]
    pub fn unit(&self, unit_type: UnitTypeId) -> Option<&UnitPerformanceRecord> {
        self.units.get(&unit_type)
    }

    /// Units spawned during the round.
    #[must_use]
    pub fn spawned(&self) -> u32 {
        self.units.values().map(UnitPerformanceRecord::times_spawned).sum()
    }

    /// Units that reached the end during the round.
    #[must_use]
    pub fn reached_end(&self) -> u32 {
        self.units.values().map(UnitPerformanceRecord::times_reached_end).sum()
    }

    /// Units defeated during the round.
    #[must_use]
    pub fn defeated(&self) -> u32 {
        self.units.values().map(UnitPerformanceRecord::times_defeated).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_progress_rewards_late_nodes() {
        let mut record = UnitPerformanceRecord::new(UnitTypeId::new(1), 7);
        record.note_spawn();
        record.note_outcome(1, false);
        record.note_progress(1, 9);
        let early = record.weighted_progress(10);

        let mut late = UnitPerformanceRecord::new(UnitTypeId::new(1), 7);
        late.note_spawn();
        late.note_outcome(8, false);
        late.note_progress(8, 9);

        assert!(late.weighted_progress(10) > early);
        // (2/10)^3 * 8
        assert!((early - 0.064).abs() < 1e-5);
    }

    #[test]
    fn full_path_progress_saturates_at_one() {
        let mut record = UnitPerformanceRecord::new(UnitTypeId::new(2), 7);
        record.note_spawn();
        record.note_outcome(9, true);
        record.note_progress(9, 9);
        assert!((record.weighted_progress(10) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn recent_window_evicts_oldest() {
        let mut record = UnitPerformanceRecord::new(UnitTypeId::new(3), 2);
        record.note_spawn();
        record.note_progress(0, 10);
        record.note_progress(10, 10);
        record.note_progress(10, 10);
        assert!((record.recent_weighted_progress(11) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn average_speed_defaults_to_one() {
        let record = UnitPerformanceRecord::new(UnitTypeId::new(1), 7);
        assert!((record.average_speed() - 1.0).abs() < f32::EPSILON);
        assert_eq!(normalized_speed(10.0, 5.0), 1.0);
        assert_eq!(normalized_speed(1.0, 0.0), 0.0);
    }
}
