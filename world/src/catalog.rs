//! Static archetype table describing every unit type the session can spawn.

use serde::Deserialize;
use wave_director_core::UnitTypeId;

/// Baseline attributes of a unit type before round scaling is applied.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct Archetype {
    /// Identifier of the unit type.
    pub unit_type: UnitTypeId,
    /// Health before the round multiplier is applied.
    pub base_health: f32,
    /// Distance travelled along the path per second.
    pub speed: f32,
    /// Gold granted for a kill before round scaling.
    pub gold: u32,
}

impl Archetype {
    /// Bounty for a kill once the round's scaling has been applied.
    ///
    /// The value grows with the health multiplier and the round index but never
    /// drops below the base gold nor exceeds three times it.
    #[must_use]
    pub fn scaled_bounty(&self, health_multiplier: f32, round: u32) -> u32 {
        let base = self.gold as f32;
        let scaled = base * health_multiplier.max(0.0) * (1.0 + 0.02 * round as f32);
        let clamped = scaled.clamp(base, base * 3.0);
        if clamped.is_finite() {
            clamped.round() as u32
        } else {
            self.gold
        }
    }
}

/// Lookup table of unit archetypes.
#[derive(Clone, Debug)]
pub struct UnitCatalog {
    archetypes: Vec<Archetype>,
}

impl UnitCatalog {
    /// Creates a catalog from the provided archetypes.
    #[must_use]
    pub fn new(mut archetypes: Vec<Archetype>) -> Self {
        archetypes.sort_by_key(|archetype| archetype.unit_type);
        archetypes.dedup_by_key(|archetype| archetype.unit_type);
        Self { archetypes }
    }

    /// Retrieves the archetype for the provided type.
    #[must_use]
    pub fn get(&self, unit_type: UnitTypeId) -> Option<&Archetype> {
        self.archetypes
            .binary_search_by_key(&unit_type, |archetype| archetype.unit_type)
            .ok()
            .and_then(|index| self.archetypes.get(index))
    }

    /// Iterates over every archetype in ascending type order.
    pub fn iter(&self) -> impl Iterator<Item = &Archetype> {
        self.archetypes.iter()
    }
}

impl Default for UnitCatalog {
    fn default() -> Self {
        let archetype = |id, base_health, speed, gold| Archetype {
            unit_type: UnitTypeId::new(id),
            base_health,
            speed,
            gold,
        };
        Self::new(vec![
            archetype(1, 10.0, 1.0, 10),
            archetype(2, 6.0, 2.0, 8),
            archetype(3, 25.0, 0.6, 15),
            archetype(4, 200.0, 0.5, 100),
            archetype(5, 150.0, 0.8, 120),
            archetype(6, 300.0, 0.4, 150),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_covers_boss_types() {
        let catalog = UnitCatalog::default();
        for id in 1..=6 {
            assert!(catalog.get(UnitTypeId::new(id)).is_some(), "type {id} missing");
        }
        assert!(catalog.get(UnitTypeId::new(7)).is_none());
    }

    #[test]
    fn bounty_is_clamped_between_base_and_triple() {
        let catalog = UnitCatalog::default();
        let basic = catalog.get(UnitTypeId::new(1)).copied().expect("basic archetype");
        assert_eq!(basic.scaled_bounty(0.5, 0), 10);
        assert_eq!(basic.scaled_bounty(1.5, 0), 15);
        assert_eq!(basic.scaled_bounty(12.0, 14), 30);
    }
}
