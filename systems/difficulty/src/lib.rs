#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Adaptive difficulty controller.
//!
//! The controller answers round requests filed on the
//! [`RoundInjectionBridge`]. For each request it observes the session, asks the
//! attached [`DifficultyPolicy`] for a raw [`ActionVector`], updates the health
//! multiplier it owns, shapes the action for the round band and hands it to the
//! [`WaveComposer`]. Answers are delivered after a configurable decision latency
//! so they arrive on a later tick than the request, mirroring an asynchronous
//! inference call.
//!
//! After a round completes the scheduler reports a [`RoundOutcome`]; the
//! controller scores it with [`shaped_reward`] and forwards the score to the
//! policy.

pub mod heuristic;
pub mod learned;
pub mod observation;
pub mod shaping;
pub mod signals;

use std::{collections::VecDeque, fmt, time::Duration};

use serde::Deserialize;
use wave_director_core::{
    ActionVector, Economy, PathTopology, PlayerState, RoundDefinition, RoundIndex,
};
use wave_director_system_performance::PerformanceTracker;
use wave_director_system_round_injection::{Delivery, RoundInjectionBridge};
use wave_director_system_wave_composer::{CompositionContext, WaveComposer};

pub use heuristic::{HealthBand, HeuristicPolicy, HeuristicTuning};
pub use learned::{LearnedPolicy, PolicyBackend, StrategyMemory};
pub use observation::{Observation, UnitObservation, OBSERVATION_LEN};
pub use signals::DifficultyState;

/// Strategy producing actions for the controller.
pub trait DifficultyPolicy: fmt::Debug {
    /// Short label used in logs.
    fn name(&self) -> &'static str;

    /// Chooses the raw action for the observed round.
    fn decide(&mut self, observation: &Observation) -> ActionVector;

    /// Receives the outcome of a finished round and its shaped reward.
    fn evaluate(&mut self, _outcome: &RoundOutcome, _reward: f32) {}

    /// Called with every definition composed from this policy's action.
    fn on_round_composed(&mut self, _round: RoundIndex, _definition: &RoundDefinition) {}

    /// Drops per-session bookkeeping.
    fn reset(&mut self) {}
}

/// Result of a finished round as reported by the scheduler.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoundOutcome {
    /// Finished round.
    pub round: RoundIndex,
    /// Units that walked the whole path.
    pub reached_end: u32,
    /// Units the round contained.
    pub total_units: u32,
    /// Player lives as a fraction of the maximum.
    pub player_health: f32,
}

impl RoundOutcome {
    /// Share of units that reached the end, `0.0` for empty rounds.
    #[must_use]
    pub fn success_rate(&self) -> f32 {
        if self.total_units == 0 {
            return 0.0;
        }
        self.reached_end as f32 / self.total_units as f32
    }
}

/// Reward bands scoring a finished round.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct RewardTuning {
    /// Success rate band considered challenging but winnable.
    pub target_success: (f32, f32),
    /// Reward for landing in the success band.
    pub target_reward: f32,
    /// Player health band rewarded while in the success band.
    pub target_health: (f32, f32),
    /// Reward for landing in the health band.
    pub health_reward: f32,
    /// Rounds with more units than this earn `large_round_reward`.
    pub large_round_units: u32,
    /// Success rate a large round must exceed.
    pub large_round_success: f32,
    /// Bonus for large rounds.
    pub large_round_reward: f32,
    /// Rounds after this earn `late_round_reward`.
    pub late_round_after: u32,
    /// Success rate a late round must exceed.
    pub late_round_success: f32,
    /// Bonus for late rounds.
    pub late_round_reward: f32,
    /// Success rate below which the round was too easy.
    pub starved_below: f32,
    /// Penalty for too easy rounds.
    pub starved_penalty: f32,
    /// Success rate above which the round was overwhelming.
    pub overrun_above: f32,
    /// Penalty for overwhelming rounds.
    pub overrun_penalty: f32,
    /// Player health below which the player nearly lost.
    pub critical_health_below: f32,
    /// Penalty for nearly losing.
    pub critical_health_penalty: f32,
    /// Rounds with fewer units than this are trivially small.
    pub small_round_below: u32,
    /// Penalty for trivially small rounds.
    pub small_round_penalty: f32,
}

impl Default for RewardTuning {
    fn default() -> Self {
        Self {
            target_success: (0.25, 0.65),
            target_reward: 2.5,
            target_health: (0.25, 0.75),
            health_reward: 1.5,
            large_round_units: 20,
            large_round_success: 0.3,
            large_round_reward: 1.2,
            late_round_after: 5,
            late_round_success: 0.35,
            late_round_reward: 0.8,
            starved_below: 0.1,
            starved_penalty: 2.0,
            overrun_above: 0.9,
            overrun_penalty: 2.5,
            critical_health_below: 0.1,
            critical_health_penalty: 1.5,
            small_round_below: 8,
            small_round_penalty: 1.0,
        }
    }
}

/// Scores a round outcome; positive inside the target bands, negative at the extremes.
#[must_use]
pub fn shaped_reward(outcome: &RoundOutcome, tuning: &RewardTuning) -> f32 {
    let success = outcome.success_rate();
    let health = outcome.player_health;
    let mut reward = 0.0;

    if (tuning.target_success.0..=tuning.target_success.1).contains(&success) {
        reward += tuning.target_reward;
        if (tuning.target_health.0..=tuning.target_health.1).contains(&health) {
            reward += tuning.health_reward;
        }
        if outcome.total_units > tuning.large_round_units && success > tuning.large_round_success {
            reward += tuning.large_round_reward;
        }
        if outcome.round.get() > tuning.late_round_after && success > tuning.late_round_success {
            reward += tuning.late_round_reward;
        }
    }

    if success < tuning.starved_below {
        reward -= tuning.starved_penalty;
    }
    if success > tuning.overrun_above {
        reward -= tuning.overrun_penalty;
    }
    if health < tuning.critical_health_below {
        reward -= tuning.critical_health_penalty;
    }
    if outcome.total_units < tuning.small_round_below {
        reward -= tuning.small_round_penalty;
    }
    reward
}

/// Multiplier ceiling and aggressiveness for rounds below `below_round`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct MultiplierBand {
    /// First round no longer covered by this band.
    pub below_round: u32,
    /// Highest multiplier reachable in the band.
    pub ceiling: f32,
    /// Scale applied to every multiplier step in the band.
    pub aggressiveness: f32,
}

/// Tuning knobs of the [`DifficultyController`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ControllerTuning {
    /// Rounds in a session.
    pub max_rounds: u32,
    /// Round index at which the game phase reaches one.
    pub phase_span: f32,
    /// Funds mapping to a funds fraction of one.
    pub max_funds: f32,
    /// First round the controller composes.
    pub tunable_from: u32,
    /// First round past the controller's range.
    pub tunable_until: u32,
    /// Lowest health multiplier.
    pub min_multiplier: f32,
    /// Multiplier normaliser used in observations.
    pub max_multiplier: f32,
    /// Scale applied to the policy's health adjustment.
    pub sensitivity: f32,
    /// Ceilings and aggressiveness by round. The last band covers every later round.
    pub multiplier_bands: Vec<MultiplierBand>,
    /// Progress pressure above which the multiplier gets `high_pressure_step`.
    pub high_pressure_above: f32,
    /// Step added under high progress pressure.
    pub high_pressure_step: f32,
    /// Progress pressure above which the multiplier gets `mid_pressure_step`.
    pub mid_pressure_above: f32,
    /// Step added under moderate progress pressure.
    pub mid_pressure_step: f32,
    /// Kill efficiency above which the multiplier gets `efficient_kills_step`.
    pub efficient_kills_above: f32,
    /// Step added when the player defeats nearly everything.
    pub efficient_kills_step: f32,
    /// Minimum time between refreshes of cached tracker signals.
    #[serde(with = "wave_director_core::seconds")]
    pub cache_cadence: Duration,
    /// Time between a request and its delivery.
    #[serde(with = "wave_director_core::seconds")]
    pub decision_latency: Duration,
    /// Reward shaping bands.
    pub reward: RewardTuning,
}

impl Default for ControllerTuning {
    fn default() -> Self {
        Self {
            max_rounds: 15,
            phase_span: 14.0,
            max_funds: 1000.0,
            tunable_from: 1,
            tunable_until: 14,
            min_multiplier: 0.4,
            max_multiplier: 16.0,
            sensitivity: 0.3,
            multiplier_bands: vec![
                MultiplierBand { below_round: 3, ceiling: 2.0, aggressiveness: 0.1 },
                MultiplierBand { below_round: 6, ceiling: 3.0, aggressiveness: 0.3 },
                MultiplierBand { below_round: 9, ceiling: 6.0, aggressiveness: 0.5 },
                MultiplierBand { below_round: 12, ceiling: 12.0, aggressiveness: 1.0 },
                MultiplierBand { below_round: u32::MAX, ceiling: 15.0, aggressiveness: 1.8 },
            ],
            high_pressure_above: 0.7,
            high_pressure_step: 0.05,
            mid_pressure_above: 0.5,
            mid_pressure_step: 0.02,
            efficient_kills_above: 0.8,
            efficient_kills_step: 0.03,
            cache_cadence: Duration::from_secs(3),
            decision_latency: Duration::from_millis(500),
            reward: RewardTuning::default(),
        }
    }
}

impl ControllerTuning {
    /// Game phase of a round in `[0, 1]`.
    #[must_use]
    pub fn phase(&self, round: RoundIndex) -> f32 {
        if self.phase_span <= 0.0 {
            return 1.0;
        }
        (round.as_f32() / self.phase_span).clamp(0.0, 1.0)
    }

    /// Reports whether the controller composes and evaluates the round.
    #[must_use]
    pub fn is_tunable(&self, round: RoundIndex) -> bool {
        (self.tunable_from..self.tunable_until).contains(&round.get())
    }

    fn band(&self, round: RoundIndex) -> Option<&MultiplierBand> {
        self.multiplier_bands
            .iter()
            .find(|band| round.get() < band.below_round)
            .or_else(|| self.multiplier_bands.last())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct PendingDecision {
    round: RoundIndex,
    due: Duration,
}

/// Owns the health multiplier and answers round requests.
#[derive(Debug)]
pub struct DifficultyController {
    tuning: ControllerTuning,
    policy: Box<dyn DifficultyPolicy>,
    composer: WaveComposer,
    state: DifficultyState,
    pending: VecDeque<PendingDecision>,
}

impl DifficultyController {
    /// Creates a controller around a policy.
    #[must_use]
    pub fn new(
        tuning: ControllerTuning,
        policy: Box<dyn DifficultyPolicy>,
        composer: WaveComposer,
    ) -> Self {
        Self {
            tuning,
            policy,
            composer,
            state: DifficultyState::new(0.5),
            pending: VecDeque::new(),
        }
    }

    /// Creates a controller using the default [`HeuristicPolicy`].
    #[must_use]
    pub fn heuristic(tuning: ControllerTuning, composer: WaveComposer) -> Self {
        Self::new(tuning, Box::new(HeuristicPolicy::default()), composer)
    }

    /// Tuning in use.
    #[must_use]
    pub fn tuning(&self) -> &ControllerTuning {
        &self.tuning
    }

    /// Cached signals and the owned multiplier.
    #[must_use]
    pub fn state(&self) -> &DifficultyState {
        &self.state
    }

    /// Attached policy.
    #[must_use]
    pub fn policy(&self) -> &dyn DifficultyPolicy {
        self.policy.as_ref()
    }

    /// Current health multiplier.
    #[must_use]
    pub fn health_multiplier(&self) -> f32 {
        self.state.health_multiplier()
    }

    /// Rounds waiting for their decision.
    pub fn pending_rounds(&self) -> impl Iterator<Item = RoundIndex> + '_ {
        self.pending.iter().map(|pending| pending.round)
    }

    fn refresh<S>(&mut self, now: Duration, tracker: &PerformanceTracker, session: &S)
    where
        S: PathTopology + ?Sized,
    {
        if self
            .state
            .refresh_if_due(now, self.tuning.cache_cadence, tracker)
        {
            self.state
                .set_map_difficulty(signals::map_difficulty(session.node_positions()));
        }
    }

    /// Builds the observation of the provided round.
    pub fn observe<S>(
        &mut self,
        now: Duration,
        round: RoundIndex,
        tracker: &PerformanceTracker,
        session: &S,
    ) -> Observation
    where
        S: PlayerState + Economy + PathTopology + ?Sized,
    {
        self.refresh(now, tracker, session);
        let readings = observation::SessionReadings {
            health_fraction: session.health_fraction(),
            funds: session.current_funds(),
            last_node_index: session.last_node_index(),
        };
        observation::build(round, &readings, tracker, &self.state, &self.tuning)
    }

    /// Decides and composes the definition of a round.
    pub fn decide_round<S>(
        &mut self,
        now: Duration,
        round: RoundIndex,
        tracker: &PerformanceTracker,
        session: &S,
    ) -> RoundDefinition
    where
        S: PlayerState + Economy + PathTopology + ?Sized,
    {
        let observation = self.observe(now, round, tracker, session);
        let raw = self.policy.decide(&observation);
        if self.tuning.is_tunable(round) {
            self.update_multiplier(raw.health_adjustment(), round);
        }
        let action = shaping::shape(&raw, &observation);
        let context = CompositionContext {
            progressive: observation.progressive.clone(),
            map_adaptation: observation.map_adaptation,
        };
        let definition = self.composer.compose(&action, round, &context);
        self.policy.on_round_composed(round, &definition);
        log::debug!(
            "{} policy decided round {}: {:?}, multiplier {:.2}",
            self.policy.name(),
            round.get(),
            action.as_array(),
            self.state.health_multiplier()
        );
        definition
    }

    /// Applies a health adjustment to the owned multiplier.
    pub fn update_multiplier(&mut self, adjustment: f32, round: RoundIndex) {
        let tuning = &self.tuning;
        let (ceiling, aggressiveness) = tuning
            .band(round)
            .map_or((tuning.max_multiplier, 1.0), |band| (band.ceiling, band.aggressiveness));

        let mut multiplier = self.state.health_multiplier()
            + adjustment.clamp(-1.0, 1.0) * tuning.sensitivity * aggressiveness;
        let pressure = self.state.progress_pressure();
        if pressure > tuning.high_pressure_above {
            multiplier += tuning.high_pressure_step * aggressiveness;
        } else if pressure > tuning.mid_pressure_above {
            multiplier += tuning.mid_pressure_step * aggressiveness;
        }
        if self.state.kill_efficiency() > tuning.efficient_kills_above {
            multiplier += tuning.efficient_kills_step * aggressiveness;
        }

        let floor = tuning.min_multiplier;
        let multiplier = if multiplier.is_finite() {
            multiplier.clamp(floor, ceiling.max(floor))
        } else {
            floor
        };
        self.state.set_health_multiplier(multiplier);
    }

    /// Takes new requests from the bridge and delivers every decision that is due.
    ///
    /// Requests for rounds outside the controller's range are ignored so the
    /// scheduler falls back to its own definition.
    pub fn poll<S>(
        &mut self,
        now: Duration,
        bridge: &mut RoundInjectionBridge,
        tracker: &PerformanceTracker,
        session: &S,
    ) -> Vec<(RoundIndex, Delivery)>
    where
        S: PlayerState + Economy + PathTopology + ?Sized,
    {
        for round in bridge.take_requests() {
            if !self.tuning.is_tunable(round) {
                log::warn!("ignoring controller request for fixed round {}", round.get());
                continue;
            }
            self.pending.push_back(PendingDecision {
                round,
                due: now + self.tuning.decision_latency,
            });
        }

        let mut deliveries = Vec::new();
        while let Some(pending) = self.pending.front().copied() {
            if pending.due > now {
                break;
            }
            let _ = self.pending.pop_front();
            let definition = self.decide_round(now, pending.round, tracker, session);
            let delivery = bridge.deliver(pending.round, definition);
            log::debug!("delivered round {}: {:?}", pending.round.get(), delivery);
            deliveries.push((pending.round, delivery));
        }
        deliveries
    }

    /// Scores a finished round and forwards the score to the policy.
    pub fn evaluate(&mut self, outcome: RoundOutcome) -> f32 {
        let reward = shaped_reward(&outcome, &self.tuning.reward);
        self.policy.evaluate(&outcome, reward);
        log::info!(
            "round {} evaluated: success {:.2}, health {:.2}, reward {:.2}",
            outcome.round.get(),
            outcome.success_rate(),
            outcome.player_health,
            reward
        );
        reward
    }

    /// Restores the neutral multiplier and forgets pending decisions.
    pub fn reset(&mut self) {
        self.state.reset();
        self.pending.clear();
        self.policy.reset();
    }
}

impl Default for DifficultyController {
    fn default() -> Self {
        Self::heuristic(ControllerTuning::default(), WaveComposer::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(round: u32, reached_end: u32, total_units: u32, player_health: f32) -> RoundOutcome {
        RoundOutcome {
            round: RoundIndex::new(round),
            reached_end,
            total_units,
            player_health,
        }
    }

    #[test]
    fn balanced_rounds_are_rewarded() {
        let reward = shaped_reward(&outcome(8, 10, 25, 0.5), &RewardTuning::default());
        assert!((reward - 6.0).abs() < 1e-5);
    }

    #[test]
    fn overwhelming_rounds_are_penalised() {
        assert!(shaped_reward(&outcome(8, 24, 25, 0.5), &RewardTuning::default()) < 0.0);
        assert!(shaped_reward(&outcome(8, 0, 25, 0.5), &RewardTuning::default()) < 0.0);
        assert!(shaped_reward(&outcome(2, 0, 5, 0.05), &RewardTuning::default()) < 0.0);
    }

    #[test]
    fn empty_rounds_have_zero_success() {
        assert_eq!(outcome(3, 0, 0, 1.0).success_rate(), 0.0);
    }

    #[test]
    fn multiplier_respects_band_ceiling_and_floor() {
        let mut controller = DifficultyController::default();
        for _ in 0..200 {
            controller.update_multiplier(1.0, RoundIndex::new(2));
        }
        assert!((controller.health_multiplier() - 2.0).abs() < 1e-5);
        for _ in 0..200 {
            controller.update_multiplier(-1.0, RoundIndex::new(13));
        }
        assert!((controller.health_multiplier() - 0.4).abs() < 1e-5);
        controller.reset();
        assert_eq!(controller.health_multiplier(), 1.0);
    }

    #[test]
    fn tunable_range_excludes_tutorial_and_boss() {
        let tuning = ControllerTuning::default();
        assert!(!tuning.is_tunable(RoundIndex::new(0)));
        assert!(tuning.is_tunable(RoundIndex::new(1)));
        assert!(tuning.is_tunable(RoundIndex::new(13)));
        assert!(!tuning.is_tunable(RoundIndex::new(14)));
    }
}
