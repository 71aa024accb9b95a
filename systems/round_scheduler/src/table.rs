//! Scripted rounds and the deterministic fallback generator.

use std::time::Duration;

use rand::Rng;
use wave_director_core::{duration_from_secs, RoundDefinition, RoundIndex, SpawnGroup, UnitTypeId};
use wave_director_system_wave_composer::seed;

/// Reward of the tutorial round.
pub const TUTORIAL_REWARD: u32 = 100;

/// Boss unit types the final round picks from.
pub const BOSS_TYPES: std::ops::RangeInclusive<u32> = 4..=6;

fn group(unit_type: u32, count: u32, delay: f32, interval: f32) -> SpawnGroup {
    SpawnGroup::new(
        UnitTypeId::new(unit_type),
        count,
        duration_from_secs(delay),
        duration_from_secs(interval),
    )
}

/// Fixed first round: three units of each basic type.
#[must_use]
pub fn tutorial() -> RoundDefinition {
    let groups = (0..3u8)
        .map(|index| group(u32::from(index) + 1, 3, f32::from(index) * 1.5, 1.0))
        .collect();
    RoundDefinition::new(
        "Round 1 - Tutorial",
        groups,
        duration_from_secs(1.2),
        TUTORIAL_REWARD,
        Duration::from_secs(60),
        false,
    )
}

/// Scripted final round ending with a single boss unit.
///
/// The boss type is drawn from the session's boss stream, so a given seed
/// always produces the same boss.
#[must_use]
pub fn boss(round: RoundIndex, session_seed: u64) -> RoundDefinition {
    let mut rng = seed::stream_rng(session_seed, round, seed::STREAM_BOSS);
    let boss_type = rng.gen_range(BOSS_TYPES);
    RoundDefinition::new(
        format!("Round {} - Boss", round.get().saturating_add(1)),
        vec![
            group(2, 8, 0.0, 0.1),
            group(3, 6, 1.0, 0.2),
            group(1, 10, 2.0, 0.1),
            group(boss_type, 1, 3.0, 0.0),
        ],
        duration_from_secs(0.2),
        600,
        Duration::from_secs(150),
        true,
    )
}

/// Planned unit count of a fallback round.
#[must_use]
pub fn fallback_total(round: RoundIndex) -> u32 {
    round.get().saturating_mul(4).saturating_add(10).clamp(10, 45)
}

/// Round generated from the round index alone.
///
/// Used whenever no controller definition is available or a definition fails
/// validation. Group counts always sum to [`fallback_total`].
#[must_use]
pub fn fallback(round: RoundIndex) -> RoundDefinition {
    let r = round.get();
    let interval = (1.2 - 0.05 * round.as_f32()).max(0.8);
    let total = fallback_total(round);
    let share = |fraction: f32| (total as f32 * fraction).round() as u32;

    let mut groups = if r < 5 {
        (0..3u8)
            .map(|index| group(u32::from(index) + 1, total / 3, f32::from(index) * 2.0, interval))
            .collect::<Vec<_>>()
    } else if r < 10 {
        let first = share(0.4);
        let second = share(0.35);
        vec![
            group(1, first, 0.0, interval),
            group(2, second, 3.0, interval * 0.8),
            group(3, total.saturating_sub(first + second), 6.0, interval * 1.2),
        ]
    } else {
        let first = share(0.5);
        let second = share(0.3);
        vec![
            group(2, first, 0.0, interval * 0.7),
            group(3, second, 4.0, interval * 1.1),
            group(1, total.saturating_sub(first + second), 8.0, interval),
        ]
    };

    let planned: u32 = groups.iter().map(SpawnGroup::count).sum();
    if planned < total {
        groups[0].add_units(total - planned);
    }

    RoundDefinition::new(
        format!("Round {} (Fallback)", r.saturating_add(1)),
        groups,
        duration_from_secs(interval),
        r.saturating_mul(15).saturating_add(80).min(200),
        duration_from_secs(60.0 + 12.0 * round.as_f32()),
        false,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tutorial_matches_fixed_layout() {
        let tutorial = tutorial();
        assert_eq!(tutorial.total_units(), 9);
        assert_eq!(tutorial.reward(), 100);
        assert_eq!(tutorial.groups().len(), 3);
        assert_eq!(tutorial.groups()[2].delay_before_group(), Duration::from_secs(3));
        assert!(tutorial.validate().is_ok());
    }

    #[test]
    fn fallback_counts_are_exact() {
        for r in 0..40 {
            let round = RoundIndex::new(r);
            let definition = fallback(round);
            assert_eq!(definition.total_units(), fallback_total(round), "round {r}");
            assert!(definition.validate().is_ok());
        }
    }

    #[test]
    fn fallback_scales_with_round() {
        let early = fallback(RoundIndex::new(1));
        assert_eq!(early.total_units(), 14);
        assert_eq!(early.reward(), 95);
        // 14 / 3 leaves two units for the first group
        assert_eq!(early.groups()[0].count(), 6);

        let late = fallback(RoundIndex::new(12));
        assert_eq!(late.total_units(), 45);
        assert_eq!(late.reward(), 200);
        assert_eq!(late.groups()[0].unit_type(), UnitTypeId::new(2));
        assert_eq!(late.base_spawn_interval(), duration_from_secs(0.8));
    }

    #[test]
    fn boss_is_seeded() {
        let round = RoundIndex::new(14);
        let first = boss(round, 11);
        assert_eq!(first, boss(round, 11));
        assert!(first.is_boss());
        let boss_group = first.groups().last().expect("boss group");
        assert!(BOSS_TYPES.contains(&boss_group.unit_type().get()));
        assert_eq!(first.total_units(), 25);
    }
}
