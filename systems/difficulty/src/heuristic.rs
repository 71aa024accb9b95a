//! Rule-based policy used whenever no learned policy is attached.

use serde::Deserialize;
use wave_director_core::{ActionVector, COMPOSED_UNIT_TYPES};

use crate::{observation::Observation, DifficultyPolicy};

/// Health adjustment emitted for rounds below `below_round`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct HealthBand {
    /// First round no longer covered by this band.
    pub below_round: u32,
    /// Adjustment when progress pressure is above `high_pressure_above`.
    pub high: f32,
    /// Adjustment when progress pressure is above `mid_pressure_above`.
    pub mid: f32,
    /// Adjustment otherwise.
    pub low: f32,
}

/// Tuning knobs of the [`HeuristicPolicy`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct HeuristicTuning {
    /// Effectiveness floor applied before normalising proportions.
    pub proportion_floor: f32,
    /// Rounds strictly above this boost the most progressive type.
    pub boost_after: u32,
    /// Boost added per round.
    pub boost_per_round: f32,
    /// Highest boost factor.
    pub boost_cap: f32,
    /// Density at round zero.
    pub density_start: f32,
    /// Density at the end of the phase span.
    pub density_end: f32,
    /// Density added per unit of player pressure.
    pub density_pressure_weight: f32,
    /// Density removed per unit of map adaptation.
    pub density_map_weight: f32,
    /// Density clamp.
    pub density_range: (f32, f32),
    /// Spawn speed at round zero.
    pub speed_start: f32,
    /// Spawn speed at the end of the phase span.
    pub speed_end: f32,
    /// Map adaptation above which spawn speed is raised.
    pub hard_map_above: f32,
    /// Spawn speed added on hard maps.
    pub hard_map_speed: f32,
    /// Spawn speed clamp.
    pub speed_range: (f32, f32),
    /// Progress pressure selecting the `high` health adjustment.
    pub high_pressure_above: f32,
    /// Progress pressure selecting the `mid` health adjustment.
    pub mid_pressure_above: f32,
    /// Health adjustment bands, ordered by round. The last band covers every later round.
    pub health_bands: Vec<HealthBand>,
}

impl Default for HeuristicTuning {
    fn default() -> Self {
        Self {
            proportion_floor: 0.1,
            boost_after: 5,
            boost_per_round: 0.03,
            boost_cap: 1.5,
            density_start: 0.4,
            density_end: 0.7,
            density_pressure_weight: 0.2,
            density_map_weight: 0.1,
            density_range: (0.3, 0.8),
            speed_start: 0.4,
            speed_end: 0.7,
            hard_map_above: 0.6,
            hard_map_speed: 0.1,
            speed_range: (0.4, 0.8),
            high_pressure_above: 0.6,
            mid_pressure_above: 0.4,
            health_bands: vec![
                HealthBand { below_round: 3, high: 0.1, mid: 0.05, low: 0.05 },
                HealthBand { below_round: 6, high: 0.2, mid: 0.1, low: 0.05 },
                HealthBand { below_round: 9, high: 0.4, mid: 0.2, low: 0.1 },
                HealthBand { below_round: u32::MAX, high: 0.7, mid: 0.4, low: 0.2 },
            ],
        }
    }
}

/// Deterministic policy driven by tracker statistics and player pressure.
#[derive(Clone, Debug, Default)]
pub struct HeuristicPolicy {
    tuning: HeuristicTuning,
}

impl HeuristicPolicy {
    /// Creates a heuristic policy.
    #[must_use]
    pub fn new(tuning: HeuristicTuning) -> Self {
        Self { tuning }
    }

    /// Tuning in use.
    #[must_use]
    pub fn tuning(&self) -> &HeuristicTuning {
        &self.tuning
    }

    /// Proportions of unit types one to three, summing to one.
    #[must_use]
    pub fn proportions(&self, observation: &Observation) -> [f32; COMPOSED_UNIT_TYPES] {
        let mut proportions = observation
            .units
            .map(|unit| unit.effectiveness.max(self.tuning.proportion_floor));
        normalize(&mut proportions);

        let round = observation.round.get();
        if round > self.tuning.boost_after {
            if let Some(slot) = observation
                .most_progressive()
                .and_then(|id| id.composed_slot())
            {
                let boost = 1.0 + round as f32 * self.tuning.boost_per_round;
                proportions[slot] *= boost.min(self.tuning.boost_cap);
            }
        }
        normalize(&mut proportions);
        proportions
    }

    /// Spawn density in `[0, 1]`.
    #[must_use]
    pub fn density(&self, observation: &Observation) -> f32 {
        let tuning = &self.tuning;
        let base = lerp(tuning.density_start, tuning.density_end, observation.phase);
        let density = base + observation.player_pressure * tuning.density_pressure_weight
            - observation.map_adaptation * tuning.density_map_weight;
        density.clamp(tuning.density_range.0, tuning.density_range.1)
    }

    /// Spawn speed in `[0, 1]`.
    #[must_use]
    pub fn spawn_speed(&self, observation: &Observation) -> f32 {
        let tuning = &self.tuning;
        let mut speed = lerp(tuning.speed_start, tuning.speed_end, observation.phase);
        if observation.map_adaptation > tuning.hard_map_above {
            speed += tuning.hard_map_speed;
        }
        speed.clamp(tuning.speed_range.0, tuning.speed_range.1)
    }

    /// Health adjustment chosen from the round band and progress pressure.
    #[must_use]
    pub fn health_adjustment(&self, observation: &Observation) -> f32 {
        let round = observation.round.get();
        let Some(band) = self
            .tuning
            .health_bands
            .iter()
            .find(|band| round < band.below_round)
            .or_else(|| self.tuning.health_bands.last())
        else {
            return 0.0;
        };
        let pressure = observation.progress_pressure;
        if pressure > self.tuning.high_pressure_above {
            band.high
        } else if pressure > self.tuning.mid_pressure_above {
            band.mid
        } else {
            band.low
        }
    }
}

impl DifficultyPolicy for HeuristicPolicy {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn decide(&mut self, observation: &Observation) -> ActionVector {
        ActionVector::from_parts(
            self.proportions(observation),
            self.density(observation),
            self.spawn_speed(observation),
            self.health_adjustment(observation),
        )
    }
}

/// Scales proportions to sum to one, leaving an all-zero array untouched.
pub(crate) fn normalize(proportions: &mut [f32; COMPOSED_UNIT_TYPES]) {
    let total: f32 = proportions.iter().sum();
    if total > 0.0 && total.is_finite() {
        for proportion in proportions.iter_mut() {
            *proportion /= total;
        }
    }
}

pub(crate) fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t.clamp(0.0, 1.0)
}
