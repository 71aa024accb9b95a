#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic conversion of controller actions into concrete round definitions.
//!
//! The composer turns the six-float [`ActionVector`] into per-type unit counts,
//! splits each type into small groups and interleaves the groups across types
//! so rounds arrive in mixed bursts instead of single-type blocks. The order in
//! which types appear within each burst is shuffled by a generator seeded from
//! the session seed and round index, so the same inputs always produce the same
//! definition.

pub mod seed;

use std::time::Duration;

use rand::seq::SliceRandom;
use serde::Deserialize;
use wave_director_core::{
    duration_from_secs, ActionVector, RoundDefinition, RoundIndex, SpawnGroup, UnitTypeId,
    COMPOSED_UNIT_TYPES,
};

/// Tuning knobs of the [`WaveComposer`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ComposerTuning {
    /// Base spawn interval at zero spawn speed.
    pub slowest_interval: f32,
    /// Interval removed at full spawn speed.
    pub interval_speed_range: f32,
    /// Share of the base interval removed per unit of spawn speed inside groups.
    pub group_speed_scale: f32,
    /// Per-type spawn interval factors for types one to three.
    pub type_spawn_factors: [f32; COMPOSED_UNIT_TYPES],
    /// Proportions at or below this value receive no direct allocation.
    pub proportion_threshold: f32,
    /// Units in a group before `small_groups_from`.
    pub early_group_size: u32,
    /// Units in a group from `small_groups_from` onwards.
    pub group_size: u32,
    /// First round using the smaller group size.
    pub small_groups_from: u32,
    /// Delay added per interleaved burst.
    pub burst_stagger: f32,
    /// Unit count budget.
    pub counts: CountTuning,
    /// Reward and time limit formulas.
    pub payout: PayoutTuning,
}

impl Default for ComposerTuning {
    fn default() -> Self {
        Self {
            slowest_interval: 1.6,
            interval_speed_range: 1.4,
            group_speed_scale: 0.6,
            type_spawn_factors: [1.0, 0.8, 1.3],
            proportion_threshold: 0.05,
            early_group_size: 3,
            group_size: 2,
            small_groups_from: 3,
            burst_stagger: 1.2,
            counts: CountTuning::default(),
            payout: PayoutTuning::default(),
        }
    }
}

/// Unit count budget parameters.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct CountTuning {
    /// Units at round zero before density scaling.
    pub base: u32,
    /// Units added per round.
    pub per_round: u32,
    /// Rounds strictly above this add `mid_extra` per round beyond it.
    pub mid_after: u32,
    /// Extra units per round past `mid_after`.
    pub mid_extra: u32,
    /// Rounds strictly above this add `late_extra` per round beyond it.
    pub late_after: u32,
    /// Extra units per round past `late_after`.
    pub late_extra: u32,
    /// Map adaptation above which counts shrink.
    pub hard_map_above: f32,
    /// Scale applied on hard maps.
    pub hard_map_scale: f32,
    /// Map adaptation below which counts grow.
    pub easy_map_below: f32,
    /// Scale applied on easy maps.
    pub easy_map_scale: f32,
    /// Density scale at zero density.
    pub density_floor: f32,
    /// Density scale added at full density.
    pub density_range: f32,
    /// Minimum units in a composed round.
    pub minimum: u32,
    /// Maximum units at round zero.
    pub cap_base: u32,
    /// Maximum units added per round.
    pub cap_per_round: u32,
    /// Absolute ceiling on units in a composed round.
    pub hard_cap: u32,
}

impl Default for CountTuning {
    fn default() -> Self {
        Self {
            base: 8,
            per_round: 3,
            mid_after: 5,
            mid_extra: 2,
            late_after: 10,
            late_extra: 4,
            hard_map_above: 0.7,
            hard_map_scale: 0.9,
            easy_map_below: 0.4,
            easy_map_scale: 1.1,
            density_floor: 0.7,
            density_range: 0.6,
            minimum: 8,
            cap_base: 25,
            cap_per_round: 2,
            hard_cap: 500,
        }
    }
}

/// Reward and time limit parameters.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PayoutTuning {
    /// Reward at round zero.
    pub reward_base: u32,
    /// Reward added per round.
    pub reward_per_round: u32,
    /// Bonus share granted once a progressive ranking is known.
    pub progressive_bonus: f32,
    /// Lowest reward.
    pub reward_min: u32,
    /// Highest reward.
    pub reward_max: u32,
    /// Time limit at round zero, in seconds.
    pub time_limit_base: f32,
    /// Time limit added per round, in seconds.
    pub time_limit_per_round: f32,
}

impl Default for PayoutTuning {
    fn default() -> Self {
        Self {
            reward_base: 90,
            reward_per_round: 20,
            progressive_bonus: 0.3,
            reward_min: 100,
            reward_max: 300,
            time_limit_base: 65.0,
            time_limit_per_round: 15.0,
        }
    }
}

/// Tracker-derived facts the composer needs besides the action itself.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompositionContext {
    /// Unit types ranked by progressiveness, best first.
    pub progressive: Vec<UnitTypeId>,
    /// Map adaptation factor in `[0, 1]`.
    pub map_adaptation: f32,
}

impl CompositionContext {
    fn best_slot(&self) -> usize {
        self.progressive
            .first()
            .and_then(UnitTypeId::composed_slot)
            .unwrap_or(0)
    }
}

/// Pure system converting actions into [`RoundDefinition`] values.
#[derive(Clone, Debug)]
pub struct WaveComposer {
    tuning: ComposerTuning,
    session_seed: u64,
}

impl WaveComposer {
    /// Creates a composer for the provided session seed.
    #[must_use]
    pub fn new(tuning: ComposerTuning, session_seed: u64) -> Self {
        Self {
            tuning,
            session_seed,
        }
    }

    /// Tuning in use.
    #[must_use]
    pub fn tuning(&self) -> &ComposerTuning {
        &self.tuning
    }

    /// Builds the definition of the provided round.
    #[must_use]
    pub fn compose(
        &self,
        action: &ActionVector,
        round: RoundIndex,
        context: &CompositionContext,
    ) -> RoundDefinition {
        let base_interval = self.base_interval(action.spawn_speed());
        let total = self.planned_total(action, round, context);
        let counts = self.unit_counts(action, total, context);
        let group_size = self.group_size(round);

        let mut per_type: Vec<Vec<SpawnGroup>> = Vec::with_capacity(COMPOSED_UNIT_TYPES);
        for (slot, &count) in counts.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let unit_type = UnitTypeId::from_composed_slot(slot);
            let interval = base_interval
                * (1.0 - action.spawn_speed() * self.tuning.group_speed_scale)
                * self.tuning.type_spawn_factors[slot];
            let mut remaining = count;
            let mut groups = Vec::new();
            while remaining > 0 {
                let size = remaining.min(group_size);
                groups.push(SpawnGroup::new(
                    unit_type,
                    size,
                    Duration::ZERO,
                    duration_from_secs(interval),
                ));
                remaining -= size;
            }
            per_type.push(groups);
        }

        let groups = self.interleave(per_type, round);
        log::debug!(
            "composed round {} with {} units in {} groups",
            round.get(),
            total,
            groups.len()
        );

        RoundDefinition::new(
            format!("Adaptive Round {}", round.get().saturating_add(1)),
            groups,
            duration_from_secs(base_interval),
            self.reward(round, context),
            duration_from_secs(
                self.tuning.payout.time_limit_base
                    + round.as_f32() * self.tuning.payout.time_limit_per_round,
            ),
            false,
        )
    }

    /// Number of units a composed round will contain.
    #[must_use]
    pub fn planned_total(
        &self,
        action: &ActionVector,
        round: RoundIndex,
        context: &CompositionContext,
    ) -> u32 {
        let counts = &self.tuning.counts;
        let r = round.get();
        let mut base = counts.base.saturating_add(r.saturating_mul(counts.per_round));
        if r > counts.late_after {
            base = base.saturating_add((r - counts.late_after).saturating_mul(counts.late_extra));
        } else if r > counts.mid_after {
            base = base.saturating_add((r - counts.mid_after).saturating_mul(counts.mid_extra));
        }
        if context.map_adaptation > counts.hard_map_above {
            base = round_u32(base as f32 * counts.hard_map_scale);
        } else if context.map_adaptation < counts.easy_map_below {
            base = round_u32(base as f32 * counts.easy_map_scale);
        }
        let base = base.max(counts.minimum);

        let scaled = round_u32(
            base as f32 * (counts.density_floor + action.density() * counts.density_range),
        );
        let cap = counts
            .cap_base
            .saturating_add(r.saturating_mul(counts.cap_per_round))
            .min(counts.hard_cap)
            .max(counts.minimum);
        scaled.clamp(counts.minimum, cap)
    }

    /// Splits the total into per-type counts that sum to it exactly.
    ///
    /// Units lost to rounding go to the most progressive type.
    #[must_use]
    pub fn unit_counts(
        &self,
        action: &ActionVector,
        total: u32,
        context: &CompositionContext,
    ) -> [u32; COMPOSED_UNIT_TYPES] {
        let mut counts = [0u32; COMPOSED_UNIT_TYPES];
        let mut remaining = total;
        for (slot, proportion) in action.proportions().into_iter().enumerate() {
            if proportion <= self.tuning.proportion_threshold {
                continue;
            }
            let share = round_u32(total as f32 * proportion).min(remaining);
            counts[slot] = share;
            remaining -= share;
        }
        counts[context.best_slot()] += remaining;
        counts
    }

    fn base_interval(&self, spawn_speed: f32) -> f32 {
        (self.tuning.slowest_interval - spawn_speed * self.tuning.interval_speed_range).max(0.0)
    }

    fn group_size(&self, round: RoundIndex) -> u32 {
        let size = if round.get() < self.tuning.small_groups_from {
            self.tuning.early_group_size
        } else {
            self.tuning.group_size
        };
        size.max(1)
    }

    fn reward(&self, round: RoundIndex, context: &CompositionContext) -> u32 {
        let payout = &self.tuning.payout;
        let base = payout
            .reward_base
            .saturating_add(round.get().saturating_mul(payout.reward_per_round)) as f32;
        let bonus = if context.progressive.is_empty() {
            0.0
        } else {
            payout.progressive_bonus
        };
        round_u32(base * (1.0 + bonus)).clamp(payout.reward_min, payout.reward_max.max(payout.reward_min))
    }

    fn interleave(&self, per_type: Vec<Vec<SpawnGroup>>, round: RoundIndex) -> Vec<SpawnGroup> {
        let bursts = per_type.iter().map(Vec::len).max().unwrap_or(0);
        let mut rng = seed::stream_rng(self.session_seed, round, seed::STREAM_INTERLEAVE);
        let mut order: Vec<usize> = (0..per_type.len()).collect();
        let mut ordered = Vec::with_capacity(per_type.iter().map(Vec::len).sum());

        for burst in 0..bursts {
            order.shuffle(&mut rng);
            for &index in &order {
                if let Some(group) = per_type[index].get(burst) {
                    let mut group = group.clone();
                    group.set_delay_before_group(duration_from_secs(
                        burst as f32 * self.tuning.burst_stagger,
                    ));
                    ordered.push(group);
                }
            }
        }
        ordered
    }
}

impl Default for WaveComposer {
    fn default() -> Self {
        Self::new(ComposerTuning::default(), 0)
    }
}

fn round_u32(value: f32) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round().min(u32::MAX as f32) as u32
    } else {
        0
    }
}
