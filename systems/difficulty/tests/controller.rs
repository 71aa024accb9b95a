use std::time::Duration;

use wave_director_core::{RoundIndex, UnitTypeId};
use wave_director_system_difficulty::{
    heuristic::HeuristicPolicy, ControllerTuning, DifficultyController, DifficultyPolicy,
    LearnedPolicy, Observation, PolicyBackend, RoundOutcome, OBSERVATION_LEN,
};
use wave_director_system_performance::{PerformanceTracker, TrackerConfig};
use wave_director_system_round_injection::{Delivery, RoundInjectionBridge};
use wave_director_system_wave_composer::WaveComposer;
use wave_director_world::Session;

#[derive(Debug, Default)]
struct ScriptedBackend {
    action: Option<[f32; 6]>,
    observations: Vec<[f32; OBSERVATION_LEN]>,
    rewards: Vec<f32>,
}

impl PolicyBackend for ScriptedBackend {
    fn act(&mut self, observation: &[f32; OBSERVATION_LEN]) -> Option<[f32; 6]> {
        self.observations.push(*observation);
        self.action
    }

    fn reward(&mut self, reward: f32) {
        self.rewards.push(reward);
    }
}

fn tracker_with_history(session: &Session) -> PerformanceTracker {
    use wave_director_core::PathTopology;

    let mut tracker = PerformanceTracker::new(TrackerConfig::default(), session.total_nodes());
    let round = RoundIndex::new(1);
    for _ in 0..4 {
        tracker.record_spawn(UnitTypeId::new(2), round);
        tracker.record_speed(UnitTypeId::new(2), 2.0);
        tracker.record_reached_end(UnitTypeId::new(2), round);
        tracker.record_spawn(UnitTypeId::new(1), round);
        tracker.record_defeated(UnitTypeId::new(1), round, 3);
    }
    tracker
}

#[test]
fn evaluate_rewards_balanced_rounds_and_penalises_overruns() {
    let mut controller = DifficultyController::default();
    let balanced = controller.evaluate(RoundOutcome {
        round: RoundIndex::new(8),
        reached_end: 10,
        total_units: 25,
        player_health: 0.5,
    });
    assert!(balanced > 0.0);

    let overrun = controller.evaluate(RoundOutcome {
        round: RoundIndex::new(8),
        reached_end: 24,
        total_units: 25,
        player_health: 0.5,
    });
    assert!(overrun < 0.0, "success rate 0.96 must be penalised, got {overrun}");
}

#[test]
fn observation_has_fixed_length_and_bounded_fractions() {
    let session = Session::default();
    let tracker = tracker_with_history(&session);
    let mut controller = DifficultyController::default();

    let observation = controller.observe(Duration::ZERO, RoundIndex::new(5), &tracker, &session);
    let vector = observation.to_vector();
    assert_eq!(vector.len(), OBSERVATION_LEN);
    assert!((vector[0] - 5.0 / 15.0).abs() < 1e-6);
    assert!((vector[1] - 1.0).abs() < 1e-6, "full lives");
    assert!((vector[2] - 0.3).abs() < 1e-6, "300 of 1000 funds");
    assert!(vector.iter().all(|value| value.is_finite()));
    assert_eq!(observation.most_progressive(), Some(UnitTypeId::new(2)));
    assert!((vector[16] - 2.0 / 3.0).abs() < 1e-6);
}

#[test]
fn heuristic_decision_is_a_valid_action() {
    let session = Session::default();
    let tracker = tracker_with_history(&session);
    let mut controller = DifficultyController::default();
    let observation = controller.observe(Duration::ZERO, RoundIndex::new(7), &tracker, &session);

    let mut policy = HeuristicPolicy::default();
    let action = policy.decide(&observation);
    let sum: f32 = action.proportions().iter().sum();
    assert!((sum - 1.0).abs() < 1e-5);
    assert!(action.proportions()[1] > action.proportions()[0]);
    assert!((0.0..=1.0).contains(&action.density()));
    assert!((-1.0..=1.0).contains(&action.health_adjustment()));
}

#[test]
fn requests_are_answered_after_the_decision_latency() {
    let session = Session::default();
    let tracker = PerformanceTracker::new(TrackerConfig::default(), 12);
    let mut controller = DifficultyController::default();
    let mut bridge = RoundInjectionBridge::new();
    let round = RoundIndex::new(3);

    bridge.begin_preparation(round);
    assert!(bridge.request_for_round(round));
    let start = Duration::from_secs(10);
    assert!(controller.poll(start, &mut bridge, &tracker, &session).is_empty());
    assert_eq!(controller.pending_rounds().collect::<Vec<_>>(), vec![round]);

    let later = start + Duration::from_millis(500);
    assert_eq!(
        controller.poll(later, &mut bridge, &tracker, &session),
        vec![(round, Delivery::Installed)]
    );
    let definition = bridge.consume_if_pending(round).expect("installed definition");
    assert_eq!(definition.name(), "Adaptive Round 4");
    assert!(definition.validate().is_ok());
}

#[test]
fn fixed_rounds_are_never_composed() {
    let session = Session::default();
    let tracker = PerformanceTracker::default();
    let mut controller = DifficultyController::default();
    let mut bridge = RoundInjectionBridge::new();
    assert!(bridge.request_for_round(RoundIndex::new(0)));
    assert!(bridge.request_for_round(RoundIndex::new(14)));

    let deliveries = controller.poll(Duration::from_secs(60), &mut bridge, &tracker, &session);
    assert!(deliveries.is_empty());
    assert_eq!(controller.pending_rounds().count(), 0);
    assert!(!bridge.has_pending(RoundIndex::new(0)));
}

#[test]
fn multiplier_stays_within_bounds_across_decisions() {
    let session = Session::default();
    let tracker = tracker_with_history(&session);
    let backend = ScriptedBackend {
        action: Some([0.2, 0.5, 0.3, 1.0, 1.0, 1.0]),
        ..ScriptedBackend::default()
    };
    let mut controller = DifficultyController::new(
        ControllerTuning::default(),
        Box::new(LearnedPolicy::new(backend, HeuristicPolicy::default())),
        WaveComposer::default(),
    );

    let mut now = Duration::ZERO;
    for round in 1..14 {
        for _ in 0..10 {
            now += Duration::from_secs(1);
            let _ = controller.decide_round(now, RoundIndex::new(round), &tracker, &session);
            let multiplier = controller.health_multiplier();
            assert!((0.4..=16.0).contains(&multiplier), "round {round}: {multiplier}");
        }
    }
    assert!(controller.health_multiplier() > 1.0);

    controller.reset();
    assert_eq!(controller.health_multiplier(), 1.0);
}

#[test]
fn learned_policy_falls_back_to_heuristic_and_remembers_strategies() {
    let session = Session::default();
    let tracker = tracker_with_history(&session);
    let mut controller = DifficultyController::default();
    let observation: Observation =
        controller.observe(Duration::ZERO, RoundIndex::new(4), &tracker, &session);

    let mut silent = LearnedPolicy::new(ScriptedBackend::default(), HeuristicPolicy::default());
    let expected = HeuristicPolicy::default().decide(&observation);
    assert_eq!(silent.decide(&observation), expected);
    assert_eq!(silent.fallbacks(), 1);
    assert_eq!(silent.backend().observations.len(), 1);

    let nan = ScriptedBackend {
        action: Some([f32::NAN; 6]),
        ..ScriptedBackend::default()
    };
    let mut broken = LearnedPolicy::new(nan, HeuristicPolicy::default());
    assert_eq!(broken.decide(&observation), expected);
    assert_eq!(broken.fallbacks(), 1);

    let mut with_memory = DifficultyController::new(
        ControllerTuning::default(),
        Box::new(LearnedPolicy::new(
            ScriptedBackend::default(),
            HeuristicPolicy::default(),
        )),
        WaveComposer::default(),
    );
    let round = RoundIndex::new(4);
    let _ = with_memory.decide_round(Duration::ZERO, round, &tracker, &session);
    let reward = with_memory.evaluate(RoundOutcome {
        round,
        reached_end: 5,
        total_units: 12,
        player_health: 0.6,
    });
    assert!(reward > 0.0);
    assert_eq!(with_memory.policy().name(), "learned");
}
