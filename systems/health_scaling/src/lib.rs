#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Round-based health multiplier for spawned units.
//!
//! The multiplier combines a per-round base curve, a phase multiplier, an
//! adaptive bonus driven by how well the player is doing, and an optional
//! controller-supplied multiplier. The controller value is read through a
//! snapshot refreshed on a fixed cadence rather than every tick.

use std::time::Duration;

use serde::Deserialize;
use wave_director_core::RoundIndex;

/// Aggregated tuning knobs controlling the health curve.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct HealthScalingTuning {
    /// Multiplier floor and the starting point of the base curve.
    pub base_multiplier: f32,
    /// Increase of the base curve per adjusted round.
    pub per_round_increase: f32,
    /// Hard ceiling of the final multiplier.
    pub max_multiplier: f32,
    /// Round bands and boosts applied to the round factor.
    pub round_factor: RoundFactorTuning,
    /// Multipliers applied per game phase.
    pub phase: PhaseTuning,
    /// Bonus table driven by player success.
    pub adaptive: AdaptiveTuning,
    /// Controller multiplier used when no controller is attached.
    pub controller_fallback: f32,
    /// Whether the controller multiplier participates at all.
    pub use_controller: bool,
    /// Minimum time between controller snapshot refreshes.
    #[serde(with = "wave_director_core::seconds")]
    pub refresh_cadence: Duration,
}

impl Default for HealthScalingTuning {
    fn default() -> Self {
        Self {
            base_multiplier: 1.0,
            per_round_increase: 0.15,
            max_multiplier: 12.0,
            round_factor: RoundFactorTuning::default(),
            phase: PhaseTuning::default(),
            adaptive: AdaptiveTuning::default(),
            controller_fallback: 1.0,
            use_controller: true,
            refresh_cadence: Duration::from_secs(3),
        }
    }
}

/// Boosts applied to the raw round index before it feeds the base curve.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct RoundFactorTuning {
    /// Rounds strictly above this index receive the mid boost.
    pub mid_after: u32,
    /// Boost applied to mid rounds.
    pub mid_boost: f32,
    /// Rounds strictly above this index receive the late boost.
    pub late_after: u32,
    /// Boost applied to late rounds.
    pub late_boost: f32,
}

impl Default for RoundFactorTuning {
    fn default() -> Self {
        Self {
            mid_after: 5,
            mid_boost: 1.2,
            late_after: 10,
            late_boost: 1.4,
        }
    }
}

/// Phase multipliers and the round indices at which phases begin.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PhaseTuning {
    /// First round of the mid phase.
    pub mid_from: u32,
    /// First round of the late phase.
    pub late_from: u32,
    /// Multiplier during the early phase.
    pub early: f32,
    /// Multiplier during the mid phase.
    pub mid: f32,
    /// Multiplier during the late phase.
    pub late: f32,
}

impl Default for PhaseTuning {
    fn default() -> Self {
        Self {
            mid_from: 5,
            late_from: 10,
            early: 1.0,
            mid: 1.2,
            late: 1.5,
        }
    }
}

/// Adaptive bonus table keyed by player success rate.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct AdaptiveTuning {
    /// Success rates below this value count as struggling.
    pub struggling_below: f32,
    /// Success rates above this value count as dominating.
    pub dominating_above: f32,
    /// Lower bound of the balanced band, exclusive.
    pub balanced_from: f32,
    /// Upper bound of the balanced band, exclusive.
    pub balanced_to: f32,
    /// Rounds strictly above this index use the late bonus values.
    pub late_after: u32,
    /// Bonus while struggling in early rounds.
    pub struggling_bonus: f32,
    /// Bonus while struggling in late rounds.
    pub struggling_late_bonus: f32,
    /// Bonus while dominating in early rounds.
    pub dominating_bonus: f32,
    /// Bonus while dominating in late rounds.
    pub dominating_late_bonus: f32,
    /// Constant part of the balanced bonus.
    pub balanced_bonus: f32,
    /// Per-round part of the balanced bonus.
    pub balanced_per_round: f32,
    /// Lower clamp of the bonus.
    pub min_bonus: f32,
    /// Upper clamp of the bonus.
    pub max_bonus: f32,
}

impl Default for AdaptiveTuning {
    fn default() -> Self {
        Self {
            struggling_below: 0.3,
            dominating_above: 0.7,
            balanced_from: 0.4,
            balanced_to: 0.6,
            late_after: 8,
            struggling_bonus: -0.15,
            struggling_late_bonus: -0.08,
            dominating_bonus: 0.2,
            dominating_late_bonus: 0.3,
            balanced_bonus: 0.05,
            balanced_per_round: 0.01,
            min_bonus: -0.2,
            max_bonus: 0.4,
        }
    }
}

/// Computes per-round health multipliers.
#[derive(Clone, Debug)]
pub struct HealthScaler {
    tuning: HealthScalingTuning,
    controller_snapshot: Option<f32>,
    last_refresh: Option<Duration>,
}

impl HealthScaler {
    /// Creates a scaler without any controller snapshot.
    #[must_use]
    pub fn new(tuning: HealthScalingTuning) -> Self {
        Self {
            tuning,
            controller_snapshot: None,
            last_refresh: None,
        }
    }

    /// Tuning in use.
    #[must_use]
    pub fn tuning(&self) -> &HealthScalingTuning {
        &self.tuning
    }

    /// Refreshes the controller snapshot when the cadence has elapsed.
    ///
    /// `read` is invoked at most once per call and only when a refresh is due;
    /// it returns `None` when no controller is available. Returns whether the
    /// snapshot was refreshed.
    pub fn refresh_controller_multiplier<F>(&mut self, now: Duration, read: F) -> bool
    where
        F: FnOnce() -> Option<f32>,
    {
        let due = self
            .last_refresh
            .map_or(true, |last| now.saturating_sub(last) >= self.tuning.refresh_cadence);
        if !due {
            return false;
        }
        self.last_refresh = Some(now);
        self.controller_snapshot = read().filter(|value| value.is_finite() && *value > 0.0);
        log::debug!("controller multiplier snapshot: {:?}", self.controller_snapshot);
        true
    }

    /// Controller multiplier currently applied.
    #[must_use]
    pub fn controller_multiplier(&self) -> f32 {
        if !self.tuning.use_controller {
            return self.tuning.controller_fallback;
        }
        self.controller_snapshot
            .unwrap_or(self.tuning.controller_fallback)
    }

    /// Health multiplier for the round given the player's success rate.
    ///
    /// Round zero always returns exactly `1.0`. Every other round is clamped
    /// to `[base_multiplier, max_multiplier]`.
    #[must_use]
    pub fn multiplier_for(&self, round: RoundIndex, player_success_rate: f32) -> f32 {
        if round.get() == 0 {
            return 1.0;
        }
        let tuning = &self.tuning;
        let base = self.base_curve(round) * self.phase_multiplier(round);
        let success = if player_success_rate.is_finite() {
            player_success_rate
        } else {
            0.5
        };
        let bonus = self.adaptive_bonus(round, success);
        let multiplier = base * (1.0 + bonus) * self.controller_multiplier();
        let floor = tuning.base_multiplier;
        let ceiling = tuning.max_multiplier.max(floor);
        if multiplier.is_finite() {
            multiplier.clamp(floor, ceiling)
        } else {
            ceiling
        }
    }

    fn base_curve(&self, round: RoundIndex) -> f32 {
        let factors = &self.tuning.round_factor;
        let index = round.get();
        let mut factor = round.as_f32();
        if index > factors.late_after {
            factor *= factors.late_boost;
        } else if index > factors.mid_after {
            factor *= factors.mid_boost;
        }
        self.tuning.base_multiplier + (factor - 1.0) * self.tuning.per_round_increase
    }

    fn phase_multiplier(&self, round: RoundIndex) -> f32 {
        let phase = &self.tuning.phase;
        let index = round.get();
        if index < phase.mid_from {
            phase.early
        } else if index < phase.late_from {
            phase.mid
        } else {
            phase.late
        }
    }

    fn adaptive_bonus(&self, round: RoundIndex, success: f32) -> f32 {
        let adaptive = &self.tuning.adaptive;
        let late = round.get() > adaptive.late_after;
        let bonus = if success < adaptive.struggling_below {
            if late {
                adaptive.struggling_late_bonus
            } else {
                adaptive.struggling_bonus
            }
        } else if success > adaptive.dominating_above {
            if late {
                adaptive.dominating_late_bonus
            } else {
                adaptive.dominating_bonus
            }
        } else if success > adaptive.balanced_from && success < adaptive.balanced_to {
            adaptive.balanced_bonus + round.as_f32() * adaptive.balanced_per_round
        } else {
            0.0
        };
        bonus.clamp(adaptive.min_bonus, adaptive.max_bonus)
    }

    /// Drops the controller snapshot.
    pub fn reset(&mut self) {
        self.controller_snapshot = None;
        self.last_refresh = None;
    }
}

impl Default for HealthScaler {
    fn default() -> Self {
        Self::new(HealthScalingTuning::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_one_at_neutral_success_matches_curve() {
        let scaler = HealthScaler::default();
        // base 1.0 * phase 1.0 * (1 + 0.0) * controller 1.0
        let value = scaler.multiplier_for(RoundIndex::new(1), 0.65);
        assert!((value - 1.0).abs() < 1e-6);
    }

    #[test]
    fn late_rounds_use_late_boost_and_phase() {
        let scaler = HealthScaler::default();
        // factor 11 * 1.4 = 15.4, base 1 + 14.4 * 0.15 = 3.16, phase 1.5, bonus 0.05 + 0.11
        let expected = 3.16 * 1.5 * 1.16;
        let value = scaler.multiplier_for(RoundIndex::new(11), 0.5);
        assert!((value - expected).abs() < 1e-3, "{value} vs {expected}");
    }

    #[test]
    fn snapshot_refreshes_only_on_cadence() {
        let mut scaler = HealthScaler::default();
        assert!(scaler.refresh_controller_multiplier(Duration::ZERO, || Some(2.0)));
        assert!(!scaler.refresh_controller_multiplier(Duration::from_secs(1), || Some(4.0)));
        assert!((scaler.controller_multiplier() - 2.0).abs() < f32::EPSILON);
        assert!(scaler.refresh_controller_multiplier(Duration::from_secs(3), || None));
        assert!((scaler.controller_multiplier() - 1.0).abs() < f32::EPSILON);
    }
}
