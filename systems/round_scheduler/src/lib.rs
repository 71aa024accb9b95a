#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Round lifecycle state machine of the Wave Director engine.
//!
//! The scheduler is the only caller of the other systems. It walks every round
//! through `Preparing → Spawning → Active → BetweenRounds` and finally
//! `Victory` or `Defeat`. Every timed wait (preparation countdown, group
//! delays, per-unit intervals, passive income, the consistency sweep and the
//! victory grace period) is an entry in a deadline queue driven by [`tick`],
//! so nothing ever blocks the update loop.
//!
//! Round 0 and the final round come from the fixed [`table`]. Rounds in
//! between are requested from the controller partway through the preparation
//! countdown and replaced by [`table::fallback`] when no valid definition has
//! arrived by the time the round starts.
//!
//! [`tick`]: RoundScheduler::tick

pub mod table;
mod timer;

use std::{collections::BTreeMap, time::Duration};

use serde::Deserialize;
use thiserror::Error;
use wave_director_core::{
    Event, FallbackReason, RemovalCause, RoundDefinition, RoundIndex, RoundPhase, SessionContext,
    SpawnGroup, SpawnRequest, TransactionKind, UnitHandle, UnitSnapshot, UnitTypeId,
};
use wave_director_system_difficulty::{DifficultyController, RoundOutcome};
use wave_director_system_health_scaling::HealthScaler;
use wave_director_system_performance::{PerformanceTracker, RoundPerformanceRecord};
use wave_director_system_round_injection::{Delivery, RoundInjectionBridge};

use crate::timer::TimerQueue;

const MAX_HEALTH_TOLERANCE: f32 = 1e-3;

/// Timing and economy knobs of the scheduler.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of rounds in a session, including the tutorial and the boss round.
    pub total_rounds: u32,
    /// Length of the countdown between rounds.
    #[serde(with = "wave_director_core::seconds")]
    pub preparation: Duration,
    /// Share of the countdown that elapses before the controller is asked for a definition.
    pub request_fraction: f32,
    /// Base passive income per payment.
    pub passive_income_rate: f32,
    /// Time between passive income payments while a round runs.
    #[serde(with = "wave_director_core::seconds")]
    pub passive_income_period: Duration,
    /// Flat passive income granted on round completion.
    pub completion_bonus: i64,
    /// Wait between the final round completing and victory.
    #[serde(with = "wave_director_core::seconds")]
    pub victory_grace: Duration,
    /// Cadence of the completion poll and health consistency sweep.
    #[serde(with = "wave_director_core::seconds")]
    pub sweep_interval: Duration,
    /// Session seed used by the scripted boss round.
    pub seed: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            total_rounds: 15,
            preparation: Duration::from_secs(10),
            request_fraction: 0.25,
            passive_income_rate: 0.5,
            passive_income_period: Duration::from_secs(1),
            completion_bonus: 8,
            victory_grace: Duration::from_secs(3),
            sweep_interval: Duration::from_secs(2),
            seed: 0,
        }
    }
}

/// Requests the scheduler refuses.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    /// A round is still spawning or has live units.
    #[error("round {} is still running", .round.get())]
    RoundInProgress {
        /// Running round.
        round: RoundIndex,
    },
    /// The session already ended in victory or defeat.
    #[error("the session is over")]
    SessionOver,
    /// Every round of the session has been played.
    #[error("all {total} rounds have been played")]
    NoRoundsLeft {
        /// Configured number of rounds.
        total: u32,
    },
}

/// Passive income paid for one period of a running round.
///
/// Payments grow with time spent in the round and with the lives the player
/// has lost, and never drop below one.
#[must_use]
pub fn passive_income(rate: f32, elapsed: Duration, health_fraction: f32) -> i64 {
    let time_factor = (elapsed.as_secs_f32() / 60.0).clamp(0.5, 2.0);
    let health_factor = 1.0 + (1.0 - health_fraction.clamp(0.0, 1.0)) * 0.5;
    let income = (rate * time_factor * health_factor).round();
    if income.is_finite() {
        (income as i64).max(1)
    } else {
        1
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Continuation {
    RequestDefinition { round: RoundIndex },
    PreparationElapsed { round: RoundIndex },
    Spawn { epoch: u64, group: usize, unit: u32 },
    PassiveIncome { epoch: u64 },
    Sweep { epoch: u64 },
    Victory { epoch: u64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Countdown {
    round: RoundIndex,
    ends_at: Duration,
}

/// Drives the round lifecycle of one session.
///
/// Continuations carry the epoch they were scheduled in. Starting a round,
/// resetting and ending the session bump the epoch, so anything queued for an
/// earlier round is dropped when it comes due.
#[derive(Debug)]
pub struct RoundScheduler {
    config: SchedulerConfig,
    tracker: PerformanceTracker,
    scaler: HealthScaler,
    bridge: RoundInjectionBridge,
    controller: Option<DifficultyController>,
    timers: TimerQueue<Continuation>,
    phase: RoundPhase,
    current: Option<RoundIndex>,
    definition: Option<RoundDefinition>,
    countdown: Option<Countdown>,
    round_multiplier: f32,
    round_started_at: Duration,
    all_spawned: bool,
    completion_latched: bool,
    live: BTreeMap<UnitHandle, RoundIndex>,
    epoch: u64,
    clock: Duration,
    last_now: Option<Duration>,
    paused: bool,
}

impl RoundScheduler {
    /// Creates a scheduler in the `Preparing` phase with no round started.
    ///
    /// Without a controller every adaptive round uses the fallback generator
    /// unless a definition is delivered through [`bridge_mut`].
    ///
    /// [`bridge_mut`]: Self::bridge_mut
    #[must_use]
    pub fn new(
        config: SchedulerConfig,
        tracker: PerformanceTracker,
        scaler: HealthScaler,
        controller: Option<DifficultyController>,
    ) -> Self {
        Self {
            config,
            tracker,
            scaler,
            bridge: RoundInjectionBridge::new(),
            controller,
            timers: TimerQueue::new(),
            phase: RoundPhase::Preparing,
            current: None,
            definition: None,
            countdown: None,
            round_multiplier: 1.0,
            round_started_at: Duration::ZERO,
            all_spawned: false,
            completion_latched: false,
            live: BTreeMap::new(),
            epoch: 0,
            clock: Duration::ZERO,
            last_now: None,
            paused: false,
        }
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// Most recently started round, `None` before the first round.
    #[must_use]
    pub fn current_round(&self) -> Option<RoundIndex> {
        self.current
    }

    /// Definition of the running round.
    #[must_use]
    pub fn definition(&self) -> Option<&RoundDefinition> {
        self.definition.as_ref()
    }

    /// Statistics gathered so far.
    #[must_use]
    pub fn tracker(&self) -> &PerformanceTracker {
        &self.tracker
    }

    /// Attached controller.
    #[must_use]
    pub fn controller(&self) -> Option<&DifficultyController> {
        self.controller.as_ref()
    }

    /// Bridge carrying controller definitions.
    #[must_use]
    pub fn bridge(&self) -> &RoundInjectionBridge {
        &self.bridge
    }

    /// Mutable bridge, for definitions produced outside the attached controller.
    pub fn bridge_mut(&mut self) -> &mut RoundInjectionBridge {
        &mut self.bridge
    }

    /// Health multiplier applied to units of the running round.
    #[must_use]
    pub fn round_multiplier(&self) -> f32 {
        self.round_multiplier
    }

    /// Scheduler time accumulated from ticks.
    #[must_use]
    pub fn clock(&self) -> Duration {
        self.clock
    }

    /// Reports whether ticks are currently ignored.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Seconds left in the preparation countdown, if one is running.
    #[must_use]
    pub fn seconds_left(&self) -> Option<f32> {
        self.countdown
            .map(|countdown| countdown.ends_at.saturating_sub(self.clock).as_secs_f32())
    }

    /// Starts the countdown ahead of the next round.
    ///
    /// Calling it again while the countdown for the same round runs is a no-op.
    pub fn request_preparation_phase<C>(
        &mut self,
        session: &mut C,
    ) -> Result<RoundIndex, SchedulerError>
    where
        C: SessionContext + ?Sized,
    {
        let round = self.ensure_can_start()?;
        if self.countdown.map(|countdown| countdown.round) != Some(round) {
            self.begin_countdown(round, session);
        }
        Ok(round)
    }

    /// Starts the next round immediately, cutting any countdown short.
    pub fn start_next_round<C>(&mut self, session: &mut C) -> Result<RoundIndex, SchedulerError>
    where
        C: SessionContext + ?Sized,
    {
        let round = self.ensure_can_start()?;
        self.countdown = None;
        self.epoch += 1;

        let definition = self.resolve_definition(round, session);
        self.tracker.set_total_nodes(session.total_nodes());
        self.refresh_scaler();
        self.round_multiplier = self
            .scaler
            .multiplier_for(round, session.health_fraction());

        self.phase = RoundPhase::Spawning;
        self.current = Some(round);
        self.round_started_at = self.clock;
        self.all_spawned = false;
        self.completion_latched = false;

        let epoch = self.epoch;
        let first_delay = definition
            .groups()
            .first()
            .map_or(Duration::ZERO, SpawnGroup::delay_before_group);
        self.timers.schedule(
            self.clock + first_delay,
            Continuation::Spawn {
                epoch,
                group: 0,
                unit: 0,
            },
        );
        if !self.config.passive_income_period.is_zero() {
            self.timers.schedule(
                self.clock + self.config.passive_income_period,
                Continuation::PassiveIncome { epoch },
            );
        }
        if !self.config.sweep_interval.is_zero() {
            self.timers.schedule(
                self.clock + self.config.sweep_interval,
                Continuation::Sweep { epoch },
            );
        }

        log::info!(
            "round {} started: {} ({} units, multiplier {:.2})",
            round.get(),
            definition.name(),
            definition.total_units(),
            self.round_multiplier
        );
        self.definition = Some(definition);
        session.publish(Event::RoundStarted { round });
        Ok(round)
    }

    /// Reports a unit that died or walked the whole path.
    ///
    /// Handles the scheduler did not spawn, or already saw removed, are ignored.
    pub fn notify_unit_removed<C>(&mut self, handle: UnitHandle, cause: RemovalCause, session: &mut C)
    where
        C: SessionContext + ?Sized,
    {
        let Some(round) = self.live.remove(&handle) else {
            log::debug!("ignored removal of untracked unit {handle:?}");
            return;
        };
        let unit_type = handle.unit_type();
        match cause {
            RemovalCause::Defeated { furthest_node } => {
                let bounty = session.unit_bounty(handle).unwrap_or(0);
                if bounty > 0 {
                    grant(session, TransactionKind::UnitKill, i64::from(bounty), "unit defeated");
                }
                self.tracker.record_defeated(unit_type, round, furthest_node);
            }
            RemovalCause::ReachedEnd => self.tracker.record_reached_end(unit_type, round),
        }
        session.return_unit(handle);
        session.publish(Event::UnitRemoved { handle, cause });

        if session.current_lives() == 0 {
            self.declare_defeat(session);
        } else {
            self.check_completion(session);
        }
    }

    /// Stops every timer and returns to `Preparing` with no round started.
    ///
    /// Recalls live units and drops buffered controller deliveries along with
    /// all collected statistics.
    pub fn reset<C>(&mut self, session: &mut C)
    where
        C: SessionContext + ?Sized,
    {
        self.timers.clear();
        self.epoch += 1;
        self.countdown = None;
        session.recall_all();
        self.live.clear();
        self.bridge.clear();
        self.tracker.reset();
        self.scaler.reset();
        if let Some(controller) = self.controller.as_mut() {
            controller.reset();
        }
        self.phase = RoundPhase::Preparing;
        self.current = None;
        self.definition = None;
        self.round_multiplier = 1.0;
        self.round_started_at = Duration::ZERO;
        self.all_spawned = false;
        self.completion_latched = false;
        self.clock = Duration::ZERO;
        self.last_now = None;
        self.paused = false;
        log::info!("scheduler reset");
    }

    /// Ignores ticks until [`resume`](Self::resume) is called.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Accepts ticks again; time spent paused is not counted.
    pub fn resume(&mut self) {
        self.paused = false;
        self.last_now = None;
    }

    /// Advances by the wall-clock time elapsed since the previous tick.
    ///
    /// The first tick, and the first tick after [`resume`](Self::resume), only
    /// establishes the reference point.
    pub fn tick<C>(&mut self, now: Duration, session: &mut C)
    where
        C: SessionContext + ?Sized,
    {
        let previous = self.last_now.replace(now);
        if self.paused {
            return;
        }
        let delta = previous.map_or(Duration::ZERO, |previous| now.saturating_sub(previous));
        self.advance(delta, session);
    }

    /// Advances scheduler time by `delta`, firing every continuation that comes due.
    pub fn advance<C>(&mut self, delta: Duration, session: &mut C)
    where
        C: SessionContext + ?Sized,
    {
        if self.paused || self.phase.is_terminal() {
            return;
        }
        let target = self.clock + delta;
        while let Some((deadline, continuation)) = self.timers.pop_due(target) {
            self.clock = self.clock.max(deadline);
            self.fire(continuation, session);
        }
        self.clock = target;

        if let Some(controller) = self.controller.as_mut() {
            for (round, delivery) in
                controller.poll(self.clock, &mut self.bridge, &self.tracker, &*session)
            {
                let error = match delivery {
                    Delivery::Installed | Delivery::Buffered => continue,
                    Delivery::Stale => None,
                    Delivery::Rejected(error) => Some(error),
                };
                session.publish(Event::DefinitionDropped { round, error });
            }
        }
        self.refresh_scaler();

        if !delta.is_zero() {
            if let Some(seconds_left) = self.seconds_left() {
                session.publish(Event::PreparationTimeUpdated { seconds_left });
            }
        }
    }

    fn next_round(&self) -> RoundIndex {
        self.current.map_or(RoundIndex::new(0), |round| round.next())
    }

    fn ensure_can_start(&self) -> Result<RoundIndex, SchedulerError> {
        if self.phase.is_terminal() {
            return Err(SchedulerError::SessionOver);
        }
        if let (true, Some(round)) = (self.phase.is_round_running(), self.current) {
            return Err(SchedulerError::RoundInProgress { round });
        }
        let round = self.next_round();
        if round.get() >= self.config.total_rounds {
            return Err(SchedulerError::NoRoundsLeft {
                total: self.config.total_rounds,
            });
        }
        Ok(round)
    }

    fn is_adaptive(&self, round: RoundIndex) -> bool {
        round.get() > 0 && round.get().saturating_add(1) < self.config.total_rounds
    }

    fn resolve_definition<C>(&mut self, round: RoundIndex, session: &mut C) -> RoundDefinition
    where
        C: SessionContext + ?Sized,
    {
        let delivered = self.bridge.consume_if_pending(round);
        let adaptive = self.is_adaptive(round);
        let candidate = if round.get() == 0 {
            Ok(table::tutorial())
        } else if !adaptive {
            Ok(table::boss(round, self.config.seed))
        } else {
            delivered.ok_or(FallbackReason::NotDelivered)
        };

        let checked = candidate.and_then(|definition| {
            definition
                .validate()
                .map(|()| definition)
                .map_err(FallbackReason::Malformed)
        });
        match checked {
            Ok(definition) => {
                if adaptive {
                    session.publish(Event::DefinitionInstalled { round });
                }
                definition
            }
            Err(reason) => {
                log::warn!("round {} uses the fallback generator: {reason:?}", round.get());
                session.publish(Event::FallbackRoundUsed { round, reason });
                table::fallback(round)
            }
        }
    }

    fn begin_countdown<C>(&mut self, round: RoundIndex, session: &mut C)
    where
        C: SessionContext + ?Sized,
    {
        self.bridge.begin_preparation(round);
        let preparation = self.config.preparation;
        let ends_at = self.clock + preparation;
        self.countdown = Some(Countdown { round, ends_at });

        if self.is_adaptive(round) {
            let fraction = self.config.request_fraction;
            let fraction = if fraction.is_finite() {
                fraction.clamp(0.0, 1.0)
            } else {
                0.0
            };
            self.timers.schedule(
                self.clock + preparation.mul_f32(fraction),
                Continuation::RequestDefinition { round },
            );
        }
        self.timers
            .schedule(ends_at, Continuation::PreparationElapsed { round });

        log::info!(
            "preparing round {} for {:.1}s",
            round.get(),
            preparation.as_secs_f32()
        );
        session.publish(Event::PreparationStarted { round });
        session.publish(Event::PreparationTimeUpdated {
            seconds_left: preparation.as_secs_f32(),
        });
    }

    fn fire<C>(&mut self, continuation: Continuation, session: &mut C)
    where
        C: SessionContext + ?Sized,
    {
        let countdown_round = self.countdown.map(|countdown| countdown.round);
        match continuation {
            Continuation::RequestDefinition { round } if countdown_round == Some(round) => {
                let _ = self.bridge.request_for_round(round);
            }
            Continuation::PreparationElapsed { round } if countdown_round == Some(round) => {
                self.countdown = None;
                if let Err(error) = self.start_next_round(session) {
                    log::warn!("countdown for round {} elapsed: {error}", round.get());
                }
            }
            Continuation::Spawn { epoch, group, unit } if epoch == self.epoch => {
                self.spawn_step(group, unit, session);
            }
            Continuation::PassiveIncome { epoch } if epoch == self.epoch => {
                self.pay_passive_income(session);
            }
            Continuation::Sweep { epoch } if epoch == self.epoch => self.sweep(session),
            Continuation::Victory { epoch } if epoch == self.epoch => self.declare_victory(session),
            stale => log::debug!("dropped stale continuation {stale:?}"),
        }
    }

    fn spawn_step<C>(&mut self, group: usize, unit: u32, session: &mut C)
    where
        C: SessionContext + ?Sized,
    {
        let (Some(round), Some(definition)) = (self.current, self.definition.as_ref()) else {
            return;
        };
        let Some(spawn_group) = definition.groups().get(group) else {
            return;
        };
        let unit_type = spawn_group.unit_type();
        let count = spawn_group.count();
        let interval = definition.interval_for(spawn_group);
        let next_delay = definition
            .groups()
            .get(group + 1)
            .map(SpawnGroup::delay_before_group);

        let next_unit = if unit < count {
            self.spawn_unit(round, unit_type, session);
            unit + 1
        } else {
            unit
        };

        let epoch = self.epoch;
        if next_unit < count {
            self.timers.schedule(
                self.clock + interval,
                Continuation::Spawn {
                    epoch,
                    group,
                    unit: next_unit,
                },
            );
        } else if let Some(delay) = next_delay {
            let tail = if count > 0 { interval } else { Duration::ZERO };
            self.timers.schedule(
                self.clock + tail + delay,
                Continuation::Spawn {
                    epoch,
                    group: group + 1,
                    unit: 0,
                },
            );
        } else {
            self.all_spawned = true;
            self.phase = RoundPhase::Active;
            log::debug!("round {} finished spawning", round.get());
            self.check_completion(session);
        }
    }

    fn spawn_unit<C>(&mut self, round: RoundIndex, unit_type: UnitTypeId, session: &mut C)
    where
        C: SessionContext + ?Sized,
    {
        let health_multiplier = self.round_multiplier;
        let request = SpawnRequest {
            unit_type,
            round,
            health_multiplier,
        };
        match session.spawn_unit(request) {
            Some(handle) => {
                let _ = self.live.insert(handle, round);
                self.tracker.record_spawn(unit_type, round);
                if let Some(speed) = session.unit_speed(handle) {
                    self.tracker.record_speed(unit_type, speed);
                }
                session.publish(Event::UnitSpawned {
                    handle,
                    health_multiplier,
                });
            }
            None => {
                log::warn!(
                    "pool refused unit type {} in round {}, skipping",
                    unit_type.get(),
                    round.get()
                );
                session.publish(Event::SpawnSkipped { round, unit_type });
            }
        }
    }

    fn pay_passive_income<C>(&mut self, session: &mut C)
    where
        C: SessionContext + ?Sized,
    {
        if !self.phase.is_round_running() || self.completion_latched {
            return;
        }
        let elapsed = self.clock.saturating_sub(self.round_started_at);
        let amount = passive_income(
            self.config.passive_income_rate,
            elapsed,
            session.health_fraction(),
        );
        grant(session, TransactionKind::PassiveIncome, amount, "passive income");
        self.timers.schedule(
            self.clock + self.config.passive_income_period,
            Continuation::PassiveIncome { epoch: self.epoch },
        );
    }

    fn sweep<C>(&mut self, session: &mut C)
    where
        C: SessionContext + ?Sized,
    {
        self.check_completion(session);
        if !self.phase.is_round_running() || self.completion_latched {
            return;
        }
        self.repair_inconsistent_health(session);
        self.timers.schedule(
            self.clock + self.config.sweep_interval,
            Continuation::Sweep { epoch: self.epoch },
        );
    }

    fn repair_inconsistent_health<C>(&mut self, session: &mut C)
    where
        C: SessionContext + ?Sized,
    {
        let mut by_type: BTreeMap<UnitTypeId, Vec<UnitSnapshot>> = BTreeMap::new();
        for snapshot in session.live_units() {
            if self.live.contains_key(&snapshot.handle) {
                by_type
                    .entry(snapshot.handle.unit_type())
                    .or_default()
                    .push(snapshot);
            }
        }

        for (unit_type, snapshots) in by_type {
            let consistent = snapshots
                .windows(2)
                .all(|pair| (pair[0].max_health - pair[1].max_health).abs() <= MAX_HEALTH_TOLERANCE);
            if consistent {
                continue;
            }
            let mut repaired = 0;
            for snapshot in &snapshots {
                if session.reinitialize_unit(snapshot.handle, self.round_multiplier) {
                    repaired += 1;
                }
            }
            log::warn!(
                "unit type {} had diverging max health, re-initialised {repaired} units",
                unit_type.get()
            );
            session.publish(Event::ConsistencyRepaired {
                unit_type,
                units: repaired,
            });
        }
    }

    fn check_completion<C>(&mut self, session: &mut C)
    where
        C: SessionContext + ?Sized,
    {
        if !self.phase.is_round_running()
            || self.completion_latched
            || !self.all_spawned
            || session.live_unit_count() > 0
        {
            return;
        }
        self.complete_round(session);
    }

    fn complete_round<C>(&mut self, session: &mut C)
    where
        C: SessionContext + ?Sized,
    {
        self.completion_latched = true;
        let (Some(round), Some(definition)) = (self.current, self.definition.take()) else {
            return;
        };

        grant(
            session,
            TransactionKind::RoundComplete,
            i64::from(definition.reward()),
            "round complete",
        );
        grant(
            session,
            TransactionKind::PassiveIncome,
            self.config.completion_bonus,
            "round complete bonus",
        );
        log::info!("round {} completed", round.get());
        session.publish(Event::RoundCompleted { round });

        if self.is_adaptive(round) {
            if let Some(controller) = self.controller.as_mut() {
                let reached_end = self
                    .tracker
                    .round_record(round)
                    .map_or(0, RoundPerformanceRecord::reached_end);
                let reward = controller.evaluate(RoundOutcome {
                    round,
                    reached_end,
                    total_units: definition.total_units(),
                    player_health: session.health_fraction(),
                });
                session.publish(Event::ControllerEvaluated { round, reward });
            }
        }

        self.phase = RoundPhase::BetweenRounds;
        let next = round.next();
        if next.get() < self.config.total_rounds {
            self.begin_countdown(next, session);
        } else {
            self.timers.schedule(
                self.clock + self.config.victory_grace,
                Continuation::Victory { epoch: self.epoch },
            );
        }
    }

    fn declare_victory<C>(&mut self, session: &mut C)
    where
        C: SessionContext + ?Sized,
    {
        if self.phase.is_terminal() {
            return;
        }
        self.end_session(RoundPhase::Victory);
        log::info!("victory after {} rounds", self.config.total_rounds);
        session.publish(Event::Victory);
    }

    fn declare_defeat<C>(&mut self, session: &mut C)
    where
        C: SessionContext + ?Sized,
    {
        if self.phase.is_terminal() {
            return;
        }
        self.end_session(RoundPhase::Defeat);
        session.recall_all();
        self.live.clear();
        self.bridge.clear();
        self.definition = None;
        log::info!(
            "defeat in round {}",
            self.current.map_or(0, |round| round.get())
        );
        session.publish(Event::Defeat);
    }

    fn end_session(&mut self, phase: RoundPhase) {
        self.phase = phase;
        self.epoch += 1;
        self.timers.clear();
        self.countdown = None;
    }

    fn refresh_scaler(&mut self) {
        let controller = self.controller.as_ref();
        let _ = self
            .scaler
            .refresh_controller_multiplier(self.clock, || {
                controller.map(DifficultyController::health_multiplier)
            });
    }
}

impl Default for RoundScheduler {
    fn default() -> Self {
        Self::new(
            SchedulerConfig::default(),
            PerformanceTracker::default(),
            HealthScaler::default(),
            Some(DifficultyController::default()),
        )
    }
}

fn grant<C>(session: &mut C, kind: TransactionKind, amount: i64, reason: &str)
where
    C: SessionContext + ?Sized,
{
    match session.grant(kind, amount, reason) {
        Ok(balance) => {
            log::debug!("granted {amount} ({reason}), balance {balance}");
            session.publish(Event::FundsGranted { kind, amount });
        }
        Err(error) => {
            log::warn!("transaction {kind:?} of {amount} failed: {error}");
            session.publish(Event::TransactionFailed {
                kind,
                amount,
                error,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passive_income_never_drops_below_one() {
        assert_eq!(passive_income(0.5, Duration::ZERO, 1.0), 1);
        assert_eq!(passive_income(0.0, Duration::from_secs(30), 0.0), 1);
        assert_eq!(passive_income(f32::NAN, Duration::ZERO, 1.0), 1);
    }

    #[test]
    fn passive_income_grows_with_time_and_lost_lives() {
        // 4.0 * 2.0 * 1.5
        assert_eq!(passive_income(4.0, Duration::from_secs(300), 0.0), 12);
        // 4.0 * 1.0 * 1.0
        assert_eq!(passive_income(4.0, Duration::from_secs(60), 1.0), 4);
    }

    #[test]
    fn adaptive_range_excludes_tutorial_and_boss() {
        let scheduler = RoundScheduler::default();
        assert!(!scheduler.is_adaptive(RoundIndex::new(0)));
        assert!(scheduler.is_adaptive(RoundIndex::new(1)));
        assert!(scheduler.is_adaptive(RoundIndex::new(13)));
        assert!(!scheduler.is_adaptive(RoundIndex::new(14)));
    }
}
