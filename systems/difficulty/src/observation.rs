//! Fixed-length view of the session handed to difficulty policies.

use wave_director_core::{RoundIndex, UnitTypeId, COMPOSED_UNIT_TYPES};
use wave_director_system_performance::PerformanceTracker;

use crate::signals::{self, DifficultyState};
use crate::ControllerTuning;

/// Number of floats produced by [`Observation::to_vector`].
pub const OBSERVATION_LEN: usize = 29;

/// Per unit type statistics included in an observation.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UnitObservation {
    /// Weighted progress rate in `[0, 1]`.
    pub weighted_progress: f32,
    /// Average furthest node divided by the last node index.
    pub furthest_fraction: f32,
    /// Share of spawned units that reached the end.
    pub success_rate: f32,
    /// Average speed divided by the speed normaliser.
    pub speed_fraction: f32,
    /// Composite effectiveness used to weight proportions.
    pub effectiveness: f32,
}

/// Snapshot of everything a policy may base its decision on.
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    /// Round the decision is for.
    pub round: RoundIndex,
    /// Round index divided by the total round count.
    pub round_fraction: f32,
    /// Clamped round index divided by the phase span.
    pub phase: f32,
    /// Remaining lives as a fraction of the maximum.
    pub player_health: f32,
    /// Funds as a fraction of the configured maximum.
    pub funds_fraction: f32,
    /// Combined health and funds deficit.
    pub player_pressure: f32,
    /// Fraction of every spawned unit that reached the end.
    pub global_success_rate: f32,
    /// Statistics of unit types one to three.
    pub units: [UnitObservation; COMPOSED_UNIT_TYPES],
    /// Composed unit types ranked by progressiveness.
    pub progressive: Vec<UnitTypeId>,
    /// Composed unit types ranked by speed.
    pub fastest: Vec<UnitTypeId>,
    /// Path length and corner score.
    pub map_difficulty: f32,
    /// Map difficulty blended with path length.
    pub map_adaptation: f32,
    /// Controller health multiplier at observation time.
    pub health_multiplier: f32,
    /// Health multiplier divided by its ceiling.
    pub multiplier_fraction: f32,
    /// Mean progress of reliable unit types.
    pub progress_pressure: f32,
    /// Share of spawned units the player defeated.
    pub kill_efficiency: f32,
}

impl Observation {
    /// Flattens the observation into the fixed float layout policies consume.
    #[must_use]
    pub fn to_vector(&self) -> [f32; OBSERVATION_LEN] {
        let mut vector = [0.0; OBSERVATION_LEN];
        let mut cursor = 0;
        let mut push = |value: f32| {
            vector[cursor] = if value.is_finite() { value } else { 0.0 };
            cursor += 1;
        };

        push(self.round_fraction);
        push(self.player_health);
        push(self.funds_fraction);
        push(self.global_success_rate);
        for unit in &self.units {
            push(unit.weighted_progress);
            push(unit.furthest_fraction);
            push(unit.success_rate);
            push(unit.speed_fraction);
        }
        for rank in 0..COMPOSED_UNIT_TYPES {
            push(
                self.progressive
                    .get(rank)
                    .map_or(0.0, |id| id.get() as f32 / COMPOSED_UNIT_TYPES as f32),
            );
        }
        push(self.map_difficulty);
        push(self.multiplier_fraction);
        push(self.progress_pressure);
        push(self.kill_efficiency);
        for unit in &self.units {
            push(unit.weighted_progress);
            push(unit.furthest_fraction);
        }
        vector
    }

    /// Best ranked progressive type, if any.
    #[must_use]
    pub fn most_progressive(&self) -> Option<UnitTypeId> {
        self.progressive.first().copied()
    }
}

/// Session facts read from collaborators when building an observation.
pub(crate) struct SessionReadings {
    pub(crate) health_fraction: f32,
    pub(crate) funds: i64,
    pub(crate) last_node_index: usize,
}

pub(crate) fn build(
    round: RoundIndex,
    readings: &SessionReadings,
    tracker: &PerformanceTracker,
    state: &DifficultyState,
    tuning: &ControllerTuning,
) -> Observation {
    let last_node = readings.last_node_index as f32;
    let normalizer = tracker.config().speed_normalizer;
    let units = std::array::from_fn(|slot| {
        let unit_type = UnitTypeId::from_composed_slot(slot);
        let effectiveness = tracker.effectiveness_for(unit_type);
        tracker.record(unit_type).map_or(
            UnitObservation {
                effectiveness,
                ..UnitObservation::default()
            },
            |record| UnitObservation {
                weighted_progress: record.weighted_progress(tracker.total_nodes()),
                furthest_fraction: if last_node > 0.0 {
                    (record.average_furthest_node() / last_node).clamp(0.0, 1.0)
                } else {
                    0.0
                },
                success_rate: record.success_rate(),
                speed_fraction: if normalizer > 0.0 {
                    (record.average_speed() / normalizer).clamp(0.0, 1.0)
                } else {
                    0.0
                },
                effectiveness,
            },
        )
    });

    let health = readings.health_fraction.clamp(0.0, 1.0);
    let funds_fraction = if tuning.max_funds > 0.0 {
        (readings.funds as f32 / tuning.max_funds).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let multiplier = state.health_multiplier();

    Observation {
        round,
        round_fraction: round.as_f32() / tuning.max_rounds.max(1) as f32,
        phase: tuning.phase(round),
        player_health: health,
        funds_fraction,
        player_pressure: signals::player_pressure(health, funds_fraction),
        global_success_rate: tracker.global_success_rate(),
        units,
        progressive: state.progressive().to_vec(),
        fastest: state.fastest().to_vec(),
        map_difficulty: state.map_difficulty(),
        map_adaptation: signals::map_adaptation(state.map_difficulty(), readings.last_node_index),
        health_multiplier: multiplier,
        multiplier_fraction: multiplier / tuning.max_multiplier.max(f32::EPSILON),
        progress_pressure: state.progress_pressure(),
        kill_efficiency: state.kill_efficiency(),
    }
}
