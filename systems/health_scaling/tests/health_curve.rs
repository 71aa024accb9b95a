use std::time::Duration;

use wave_director_core::RoundIndex;
use wave_director_system_health_scaling::{HealthScaler, HealthScalingTuning};

const SUCCESS_RATES: [f32; 9] = [0.0, 0.1, 0.29, 0.35, 0.5, 0.65, 0.71, 0.95, 1.0];

#[test]
fn tutorial_round_is_exactly_one() {
    let mut scaler = HealthScaler::default();
    for success in SUCCESS_RATES {
        assert_eq!(scaler.multiplier_for(RoundIndex::new(0), success), 1.0);
    }

    let _ = scaler.refresh_controller_multiplier(Duration::ZERO, || Some(16.0));
    assert_eq!(
        scaler.multiplier_for(RoundIndex::new(0), 0.9),
        1.0,
        "controller multiplier must not touch the tutorial round"
    );
}

#[test]
fn multiplier_stays_within_floor_and_ceiling() {
    for controller in [None, Some(0.4), Some(1.0), Some(16.0)] {
        let mut scaler = HealthScaler::default();
        let _ = scaler.refresh_controller_multiplier(Duration::ZERO, || controller);
        for round in 0..40 {
            for success in SUCCESS_RATES {
                let value = scaler.multiplier_for(RoundIndex::new(round), success);
                assert!(
                    (1.0..=12.0).contains(&value),
                    "round {round}, success {success}, controller {controller:?}: {value}"
                );
            }
        }
    }
}

#[test]
fn multiplier_is_monotonic_in_round_at_mid_success() {
    let scaler = HealthScaler::default();
    let mut previous = scaler.multiplier_for(RoundIndex::new(0), 0.5);
    for round in 1..30 {
        let value = scaler.multiplier_for(RoundIndex::new(round), 0.5);
        assert!(
            value >= previous,
            "round {round} dropped from {previous} to {value}"
        );
        previous = value;
    }
}

#[test]
fn struggling_players_face_weaker_units() {
    let scaler = HealthScaler::default();
    let round = RoundIndex::new(6);
    let struggling = scaler.multiplier_for(round, 0.1);
    let dominating = scaler.multiplier_for(round, 0.9);
    assert!(struggling < dominating);
}

#[test]
fn disabled_controller_uses_fallback() {
    let tuning = HealthScalingTuning {
        use_controller: false,
        ..HealthScalingTuning::default()
    };
    let mut scaler = HealthScaler::new(tuning);
    let _ = scaler.refresh_controller_multiplier(Duration::ZERO, || Some(5.0));
    assert!((scaler.controller_multiplier() - 1.0).abs() < f32::EPSILON);
}

#[test]
fn reset_forces_next_refresh() {
    let mut scaler = HealthScaler::default();
    assert!(scaler.refresh_controller_multiplier(Duration::from_secs(10), || Some(3.0)));
    scaler.reset();
    assert!((scaler.controller_multiplier() - 1.0).abs() < f32::EPSILON);
    assert!(scaler.refresh_controller_multiplier(Duration::from_secs(11), || Some(2.0)));
}
