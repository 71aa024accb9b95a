//! Round-band strategy applied on top of every policy's raw action.
//!
//! Shaping replaces the policy's density and spawn speed with band-specific
//! values driven by the round phase and player pressure, then boosts the unit
//! types that have been getting furthest along the path. The health adjustment
//! is left untouched.

use wave_director_core::{ActionVector, UnitTypeId, COMPOSED_UNIT_TYPES};

use crate::{
    heuristic::{lerp, normalize},
    observation::Observation,
};

const EARLY_UNTIL: u32 = 4;
const MID_UNTIL: u32 = 9;

/// Shapes a raw policy action for the observed round.
#[must_use]
pub fn shape(action: &ActionVector, observation: &Observation) -> ActionVector {
    let mut proportions = action.proportions();
    let round = observation.round.get();
    let phase = observation.phase;
    let pressure = observation.player_pressure;
    let map = observation.map_adaptation;

    let (density, speed) = if round < EARLY_UNTIL {
        if map > 0.6 {
            boost(&mut proportions, observation.progressive.first(), 1.4 + pressure * 0.3);
        }
        (
            (0.5 + phase * 0.3 + pressure * 0.2).clamp(0.4, 0.7),
            (0.5 + pressure * 0.3).clamp(0.4, 0.7),
        )
    } else if round < MID_UNTIL {
        for id in observation.progressive.iter().take(2) {
            boost(&mut proportions, Some(id), 1.6 + pressure * 0.4);
        }
        if map > 0.7 {
            boost(&mut proportions, observation.fastest.first(), 1.3);
        }
        (
            (0.7 + phase * 0.4 + pressure * 0.3).clamp(0.6, 0.9),
            (0.6 + pressure * 0.4).clamp(0.5, 0.8),
        )
    } else {
        for id in observation.progressive.iter().take(3) {
            boost(&mut proportions, Some(id), 1.8 + pressure * 0.5 + map * 0.3);
        }
        if map > 0.8 {
            proportions[2] *= 1.4;
        }
        (
            (0.8 + phase * 0.5 + pressure * 0.4).clamp(0.7, 1.0),
            (0.7 + pressure * 0.5).clamp(0.6, 0.9),
        )
    };

    apply_synergies(&mut proportions, round, map, &observation.progressive);
    normalize(&mut proportions);

    ActionVector::from_parts(proportions, density, speed, action.health_adjustment())
}

fn apply_synergies(
    proportions: &mut [f32; COMPOSED_UNIT_TYPES],
    round: u32,
    map: f32,
    progressive: &[UnitTypeId],
) {
    // fast units pair with long paths, tanks carry late rounds
    if round > 3 && map > 0.6 && progressive.contains(&UnitTypeId::new(2)) {
        proportions[1] *= 1.0 + lerp(0.1, 0.4, map);
    }
    if round > 7 && progressive.contains(&UnitTypeId::new(3)) {
        proportions[2] *= 1.3;
    }
}

fn boost(proportions: &mut [f32; COMPOSED_UNIT_TYPES], id: Option<&UnitTypeId>, factor: f32) {
    if let Some(slot) = id.and_then(UnitTypeId::composed_slot) {
        proportions[slot] *= factor;
    }
}

#[cfg(test)]
mod tests {
    use wave_director_core::RoundIndex;

    use super::*;
    use crate::observation::UnitObservation;

    fn observation(round: u32, map_adaptation: f32, player_pressure: f32) -> Observation {
        Observation {
            round: RoundIndex::new(round),
            round_fraction: round as f32 / 15.0,
            phase: (round as f32 / 14.0).clamp(0.0, 1.0),
            player_health: 0.5,
            funds_fraction: 0.5,
            player_pressure,
            global_success_rate: 0.3,
            units: [UnitObservation::default(); 3],
            progressive: vec![UnitTypeId::new(2), UnitTypeId::new(1), UnitTypeId::new(3)],
            fastest: vec![UnitTypeId::new(2), UnitTypeId::new(1), UnitTypeId::new(3)],
            map_difficulty: 0.5,
            map_adaptation,
            health_multiplier: 1.0,
            multiplier_fraction: 1.0 / 16.0,
            progress_pressure: 0.5,
            kill_efficiency: 0.5,
        }
    }

    #[test]
    fn early_band_overrides_density_and_speed() {
        let raw = ActionVector::from_parts([0.33, 0.33, 0.34], 1.0, 1.0, 0.3);
        let shaped = shape(&raw, &observation(1, 0.5, 0.0));
        assert!((shaped.density() - (0.5 + 0.3 / 14.0)).abs() < 1e-5);
        assert!((shaped.spawn_speed() - 0.5).abs() < 1e-5);
        assert_eq!(shaped.health_adjustment(), 0.3);
        assert!((shaped.proportions()[0] - 0.33).abs() < 1e-5);
    }

    #[test]
    fn mid_band_boosts_top_progressive_types() {
        let raw = ActionVector::from_parts([0.33, 0.33, 0.34], 0.5, 0.5, 0.0);
        let shaped = shape(&raw, &observation(6, 0.5, 0.5)).proportions();
        assert!(shaped[1] > shaped[2]);
        assert!(shaped[0] > shaped[2]);
        assert!((shaped.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn late_band_stays_within_clamps() {
        let raw = ActionVector::from_parts([0.2, 0.2, 0.6], 0.0, 0.0, -0.4);
        for pressure in [0.0, 0.5, 1.0] {
            let shaped = shape(&raw, &observation(12, 0.9, pressure));
            assert!((0.7..=1.0).contains(&shaped.density()));
            assert!((0.6..=0.9).contains(&shaped.spawn_speed()));
            assert!((shaped.proportions().iter().sum::<f32>() - 1.0).abs() < 1e-5);
        }
    }
}
