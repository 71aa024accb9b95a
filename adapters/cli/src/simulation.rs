//! Headless session driven by the world's simple unit advancement.

use std::time::Duration;

use anyhow::{Context, Result};
use wave_director_core::{
    Economy, Event, PathTopology, PlayerState, RemovalCause, RoundIndex, RoundPhase,
};
use wave_director_system_difficulty::{DifficultyController, HeuristicPolicy};
use wave_director_system_health_scaling::HealthScaler;
use wave_director_system_performance::PerformanceTracker;
use wave_director_system_round_scheduler::RoundScheduler;
use wave_director_system_wave_composer::WaveComposer;
use wave_director_world::Session;

use crate::config::DirectorConfig;

/// Knobs of one simulation run that are not part of the engine tuning.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SimulationOptions {
    pub(crate) step: Duration,
    pub(crate) defense_dps: f32,
    pub(crate) max_time: Duration,
    pub(crate) use_controller: bool,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            step: Duration::from_millis(100),
            defense_dps: 12.0,
            max_time: Duration::from_secs(3600),
            use_controller: true,
        }
    }
}

/// What happened in one round.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct RoundSummary {
    pub(crate) round: RoundIndex,
    pub(crate) name: String,
    pub(crate) units: u32,
    pub(crate) reached_end: u32,
    pub(crate) reward: u32,
    pub(crate) multiplier: f32,
    pub(crate) lives: u32,
    pub(crate) funds: i64,
    pub(crate) completed: bool,
}

/// Result of a simulation run.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SimulationReport {
    pub(crate) rounds: Vec<RoundSummary>,
    pub(crate) outcome: RoundPhase,
    pub(crate) elapsed: Duration,
}

/// Plays a session until victory, defeat or the time limit.
pub(crate) fn run(config: &DirectorConfig, options: &SimulationOptions) -> Result<SimulationReport> {
    let mut session = Session::new(&config.session);
    let events = session.subscribe();

    let controller = options.use_controller.then(|| {
        DifficultyController::new(
            config.controller.clone(),
            Box::new(HeuristicPolicy::new(config.heuristic.clone())),
            WaveComposer::new(config.composer.clone(), config.scheduler.seed),
        )
    });
    let mut scheduler = RoundScheduler::new(
        config.scheduler.clone(),
        PerformanceTracker::new(config.tracker.clone(), session.total_nodes()),
        HealthScaler::new(config.health.clone()),
        controller,
    );
    let _ = scheduler
        .request_preparation_phase(&mut session)
        .context("failed to prepare the first round")?;

    let step = options.step.max(Duration::from_millis(1));
    let mut elapsed = Duration::ZERO;
    let mut rounds = Vec::new();
    let mut running: Option<RoundSummary> = None;

    while elapsed < options.max_time && !scheduler.phase().is_terminal() {
        scheduler.advance(step, &mut session);
        for (handle, cause) in session.advance_units(step, options.defense_dps) {
            scheduler.notify_unit_removed(handle, cause, &mut session);
        }
        elapsed += step;

        for event in session.drain_events(events) {
            match event {
                Event::RoundStarted { round } => {
                    let Some(definition) = scheduler.definition() else {
                        continue;
                    };
                    running = Some(RoundSummary {
                        round,
                        name: definition.name().to_owned(),
                        units: definition.total_units(),
                        reached_end: 0,
                        reward: definition.reward(),
                        multiplier: scheduler.round_multiplier(),
                        lives: 0,
                        funds: 0,
                        completed: false,
                    });
                }
                Event::UnitRemoved {
                    cause: RemovalCause::ReachedEnd,
                    ..
                } => {
                    if let Some(summary) = running.as_mut() {
                        summary.reached_end += 1;
                    }
                }
                Event::RoundCompleted { .. } => {
                    if let Some(mut summary) = running.take() {
                        summary.completed = true;
                        summary.lives = session.current_lives();
                        summary.funds = session.current_funds();
                        log::info!(
                            "{}: {}/{} units reached the end",
                            summary.name,
                            summary.reached_end,
                            summary.units
                        );
                        rounds.push(summary);
                    }
                }
                _ => {}
            }
        }
    }

    if let Some(mut summary) = running.take() {
        summary.lives = session.current_lives();
        summary.funds = session.current_funds();
        rounds.push(summary);
    }
    if !scheduler.phase().is_terminal() {
        log::warn!(
            "simulation stopped after {:.0}s in {:?}",
            elapsed.as_secs_f32(),
            scheduler.phase()
        );
    }

    Ok(SimulationReport {
        rounds,
        outcome: scheduler.phase(),
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_session(rounds: u32) -> DirectorConfig {
        let mut config = DirectorConfig::default();
        config.scheduler.total_rounds = rounds;
        config
    }

    fn strong_defense() -> SimulationOptions {
        SimulationOptions {
            defense_dps: 40.0,
            ..SimulationOptions::default()
        }
    }

    #[test]
    fn tutorial_is_cleared_by_a_strong_defense() {
        let report = run(&short_session(3), &strong_defense()).expect("simulation");
        let tutorial = report.rounds.first().expect("tutorial summary");
        assert_eq!(tutorial.name, "Round 1 - Tutorial");
        assert_eq!(tutorial.units, 9);
        assert_eq!(tutorial.reward, 100);
        assert_eq!(tutorial.multiplier, 1.0);
        assert_eq!(tutorial.reached_end, 0);
        assert!(tutorial.completed);
        assert!(report.outcome.is_terminal());
    }

    #[test]
    fn runs_with_the_same_seed_are_identical() {
        let config = short_session(4);
        let options = strong_defense();
        let first = run(&config, &options).expect("first run");
        assert_eq!(first, run(&config, &options).expect("second run"));
    }

    #[test]
    fn without_controller_adaptive_rounds_use_the_fallback() {
        let options = SimulationOptions {
            use_controller: false,
            ..strong_defense()
        };
        let report = run(&short_session(3), &options).expect("simulation");
        let second = report.rounds.get(1).expect("second round summary");
        assert_eq!(second.name, "Round 2 (Fallback)");
        assert_eq!(second.units, 14);
    }

    #[test]
    fn time_limit_stops_an_unfinished_session() {
        let options = SimulationOptions {
            max_time: Duration::from_secs(5),
            ..SimulationOptions::default()
        };
        let report = run(&DirectorConfig::default(), &options).expect("simulation");
        assert!(report.rounds.is_empty(), "first round starts after the countdown");
        assert_eq!(report.outcome, RoundPhase::Preparing);
        assert_eq!(report.elapsed, Duration::from_secs(5));
    }
}
