use wave_director_core::{RoundIndex, UnitTypeId};
use wave_director_system_performance::{PerformanceTracker, TrackerConfig};

const PATH_NODES: usize = 12;

fn unit(id: u32) -> UnitTypeId {
    UnitTypeId::new(id)
}

fn tracker() -> PerformanceTracker {
    PerformanceTracker::new(TrackerConfig::default(), PATH_NODES)
}

fn defeat(tracker: &mut PerformanceTracker, id: u32, round: u32, node: u32) {
    tracker.record_spawn(unit(id), RoundIndex::new(round));
    tracker.record_defeated(unit(id), RoundIndex::new(round), node);
}

fn leak(tracker: &mut PerformanceTracker, id: u32, round: u32) {
    tracker.record_spawn(unit(id), RoundIndex::new(round));
    tracker.record_reached_end(unit(id), RoundIndex::new(round));
}

#[test]
fn unseen_types_report_zero_progress() {
    let tracker = tracker();
    assert_eq!(tracker.weighted_progress(unit(1)), 0.0);
    assert_eq!(tracker.global_success_rate(), 0.0);
}

#[test]
fn spawned_but_unfinished_types_report_zero_progress() {
    let mut tracker = tracker();
    tracker.record_spawn(unit(1), RoundIndex::new(0));
    assert_eq!(tracker.weighted_progress(unit(1)), 0.0);
}

#[test]
fn weighted_progress_stays_within_unit_interval() {
    let mut tracker = tracker();
    for node in 0..PATH_NODES as u32 {
        defeat(&mut tracker, 1, 2, node);
    }
    for _ in 0..20 {
        leak(&mut tracker, 2, 2);
    }

    for id in [1, 2] {
        let progress = tracker.weighted_progress(unit(id));
        assert!(
            (0.0..=1.0).contains(&progress),
            "progress {progress} for type {id} escaped [0, 1]"
        );
    }
    assert!((tracker.weighted_progress(unit(2)) - 1.0).abs() < f32::EPSILON);
}

#[test]
fn rankings_fall_back_to_defaults_below_reliability_floor() {
    let mut tracker = tracker();
    defeat(&mut tracker, 3, 1, 11);

    let defaults = vec![unit(1), unit(2), unit(3)];
    assert_eq!(tracker.most_progressive(3), defaults);
    assert_eq!(tracker.most_successful(3), defaults);
    assert_eq!(tracker.most_effective(3), defaults);
    assert_eq!(tracker.fastest(3), vec![unit(2), unit(1), unit(3)]);
    assert_eq!(tracker.most_progressive(1), vec![unit(1)]);
}

#[test]
fn progressive_ranking_prefers_units_that_get_further() {
    let mut tracker = tracker();
    for _ in 0..3 {
        defeat(&mut tracker, 1, 4, 2);
        defeat(&mut tracker, 3, 4, 10);
        leak(&mut tracker, 2, 4);
    }

    assert_eq!(tracker.most_progressive(3), vec![unit(2), unit(3), unit(1)]);
    assert_eq!(tracker.most_successful(1), vec![unit(2)]);
}

#[test]
fn fastest_ranking_uses_speed_samples() {
    let mut tracker = tracker();
    for _ in 0..2 {
        tracker.record_speed(unit(1), 1.0);
        tracker.record_speed(unit(3), 0.6);
        tracker.record_speed(unit(2), 2.0);
    }
    assert_eq!(tracker.fastest(2), vec![unit(2), unit(1)]);
}

#[test]
fn per_round_records_are_independent_of_lifetime_records() {
    let mut tracker = tracker();
    leak(&mut tracker, 1, 3);
    defeat(&mut tracker, 1, 3, 5);
    defeat(&mut tracker, 2, 4, 5);

    let round = tracker.round_record(RoundIndex::new(3)).expect("round 3 record");
    assert_eq!(round.spawned(), 2);
    assert_eq!(round.reached_end(), 1);
    assert_eq!(round.defeated(), 1);
    assert!(round.unit(unit(2)).is_none());

    assert_eq!(tracker.record(unit(1)).map(|record| record.times_spawned()), Some(2));
    assert!((tracker.global_success_rate() - 1.0 / 3.0).abs() < 1e-6);
}

#[test]
fn effectiveness_is_neutral_until_reliable() {
    let mut tracker = tracker();
    defeat(&mut tracker, 1, 1, 3);
    assert!((tracker.effectiveness_for(unit(1)) - 0.5).abs() < f32::EPSILON);
    assert!(!tracker.is_reliable(unit(1)));

    leak(&mut tracker, 1, 1);
    assert!(tracker.is_reliable(unit(1)));
    let effectiveness = tracker.effectiveness_for(unit(1));
    assert!((0.0..=1.0).contains(&effectiveness));
}

#[test]
fn proportion_weights_use_the_ranking_score() {
    let mut tracker = tracker();
    for _ in 0..4 {
        defeat(&mut tracker, 1, 3, 2);
    }
    assert!(tracker.is_reliable(unit(1)));

    let record = tracker.record(unit(1)).expect("record");
    let score = record.effectiveness_score(PATH_NODES, TrackerConfig::default().speed_normalizer);
    assert!((tracker.effectiveness_for(unit(1)) - score).abs() < 1e-6);
    // 0.8 of the weighted progress; nothing leaked and no speed was sampled
    assert!((score - 0.8 * tracker.weighted_progress(unit(1))).abs() < 1e-6);
}

#[test]
fn reset_clears_every_record() {
    let mut tracker = tracker();
    leak(&mut tracker, 2, 0);
    tracker.reset();
    assert!(tracker.record(unit(2)).is_none());
    assert!(tracker.round_record(RoundIndex::new(0)).is_none());
    assert_eq!(tracker.records().count(), 0);
}
