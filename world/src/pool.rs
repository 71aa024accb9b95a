//! Arena-style unit store: a dense slot vector per unit type plus a free list.

use std::collections::BTreeMap;

use wave_director_core::{RoundIndex, SpawnRequest, UnitHandle, UnitSnapshot, UnitTypeId};

use crate::catalog::{Archetype, UnitCatalog};

/// Mutable state of a unit currently occupying an arena slot.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct LiveUnit {
    pub(crate) round: RoundIndex,
    pub(crate) health: f32,
    pub(crate) max_health: f32,
    pub(crate) speed: f32,
    pub(crate) bounty: u32,
    pub(crate) distance: f32,
    pub(crate) furthest_node: u32,
    pub(crate) retired: bool,
}

impl LiveUnit {
    fn from_archetype(archetype: &Archetype, round: RoundIndex, health_multiplier: f32) -> Self {
        let max_health = archetype.base_health * health_multiplier.max(0.0);
        Self {
            round,
            health: max_health,
            max_health,
            speed: archetype.speed,
            bounty: archetype.scaled_bounty(health_multiplier, round.get()),
            distance: 0.0,
            furthest_node: 0,
            retired: false,
        }
    }
}

#[derive(Clone, Debug, Default)]
struct Slot {
    generation: u32,
    unit: Option<LiveUnit>,
}

#[derive(Clone, Debug, Default)]
struct TypeArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl TypeArena {
    fn acquire(&mut self, capacity: usize) -> Option<u32> {
        if let Some(slot) = self.free.pop() {
            return Some(slot);
        }
        if self.slots.len() >= capacity {
            return None;
        }
        let slot = u32::try_from(self.slots.len()).ok()?;
        self.slots.push(Slot::default());
        Some(slot)
    }
}

/// Dense per-type unit storage with generation-checked handles.
#[derive(Clone, Debug)]
pub struct UnitArena {
    catalog: UnitCatalog,
    capacity_per_type: usize,
    arenas: BTreeMap<UnitTypeId, TypeArena>,
}

impl UnitArena {
    /// Creates an empty arena that lends at most `capacity_per_type` units of each type.
    #[must_use]
    pub fn new(catalog: UnitCatalog, capacity_per_type: usize) -> Self {
        Self {
            catalog,
            capacity_per_type,
            arenas: BTreeMap::new(),
        }
    }

    /// Archetype table backing the arena.
    #[must_use]
    pub fn catalog(&self) -> &UnitCatalog {
        &self.catalog
    }

    /// Places a new unit, returning `None` when the type is unknown or its arena is full.
    pub fn spawn(&mut self, request: SpawnRequest) -> Option<UnitHandle> {
        let archetype = *self.catalog.get(request.unit_type)?;
        let arena = self.arenas.entry(request.unit_type).or_default();
        let slot = arena.acquire(self.capacity_per_type)?;
        let entry = arena.slots.get_mut(slot as usize)?;
        entry.unit = Some(LiveUnit::from_archetype(
            &archetype,
            request.round,
            request.health_multiplier,
        ));
        arena.live += 1;
        Some(UnitHandle::new(request.unit_type, slot, entry.generation))
    }

    /// Releases the slot referenced by the handle. Stale handles are ignored.
    pub fn release(&mut self, handle: UnitHandle) -> bool {
        let Some(arena) = self.arenas.get_mut(&handle.unit_type()) else {
            return false;
        };
        let Some(entry) = arena.slots.get_mut(handle.slot() as usize) else {
            return false;
        };
        if entry.generation != handle.generation() || entry.unit.is_none() {
            return false;
        }
        entry.unit = None;
        entry.generation = entry.generation.wrapping_add(1);
        arena.free.push(handle.slot());
        arena.live = arena.live.saturating_sub(1);
        true
    }

    /// Releases every occupied slot.
    pub fn release_all(&mut self) {
        for handle in self.handles() {
            let _ = self.release(handle);
        }
    }

    /// Number of occupied slots across all types.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.arenas.values().map(|arena| arena.live).sum()
    }

    /// Handles of every occupied slot in type then slot order.
    #[must_use]
    pub fn handles(&self) -> Vec<UnitHandle> {
        self.arenas
            .iter()
            .flat_map(|(unit_type, arena)| {
                arena.slots.iter().enumerate().filter_map(|(slot, entry)| {
                    let _ = entry.unit.as_ref()?;
                    let slot = u32::try_from(slot).ok()?;
                    Some(UnitHandle::new(*unit_type, slot, entry.generation))
                })
            })
            .collect()
    }

    pub(crate) fn get(&self, handle: UnitHandle) -> Option<&LiveUnit> {
        let entry = self
            .arenas
            .get(&handle.unit_type())?
            .slots
            .get(handle.slot() as usize)?;
        if entry.generation != handle.generation() {
            return None;
        }
        entry.unit.as_ref()
    }

    pub(crate) fn get_mut(&mut self, handle: UnitHandle) -> Option<&mut LiveUnit> {
        let entry = self
            .arenas
            .get_mut(&handle.unit_type())?
            .slots
            .get_mut(handle.slot() as usize)?;
        if entry.generation != handle.generation() {
            return None;
        }
        entry.unit.as_mut()
    }

    /// Snapshots of every occupied slot.
    #[must_use]
    pub fn snapshots(&self) -> Vec<UnitSnapshot> {
        self.handles()
            .into_iter()
            .filter_map(|handle| {
                let unit = self.get(handle)?;
                Some(UnitSnapshot {
                    handle,
                    max_health: unit.max_health,
                    furthest_node: unit.furthest_node,
                })
            })
            .collect()
    }

    /// Restores a unit to full health using a fresh multiplier.
    pub fn reinitialize(&mut self, handle: UnitHandle, health_multiplier: f32) -> bool {
        let Some(archetype) = self.catalog.get(handle.unit_type()).copied() else {
            return false;
        };
        let Some(unit) = self.get_mut(handle) else {
            return false;
        };
        let distance = unit.distance;
        let furthest_node = unit.furthest_node;
        let retired = unit.retired;
        *unit = LiveUnit::from_archetype(&archetype, unit.round, health_multiplier);
        unit.distance = distance;
        unit.furthest_node = furthest_node;
        unit.retired = retired;
        true
    }

    /// Overrides the max health of a unit, used to simulate scaling faults.
    pub fn force_max_health(&mut self, handle: UnitHandle, max_health: f32) -> bool {
        match self.get_mut(handle) {
            Some(unit) => {
                unit.max_health = max_health;
                unit.health = unit.health.min(max_health);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: u32, multiplier: f32) -> SpawnRequest {
        SpawnRequest {
            unit_type: UnitTypeId::new(id),
            round: RoundIndex::new(0),
            health_multiplier: multiplier,
        }
    }

    #[test]
    fn exhausted_arena_returns_none() {
        let mut arena = UnitArena::new(UnitCatalog::default(), 2);
        assert!(arena.spawn(request(1, 1.0)).is_some());
        assert!(arena.spawn(request(1, 1.0)).is_some());
        assert!(arena.spawn(request(1, 1.0)).is_none());
        assert!(arena.spawn(request(2, 1.0)).is_some(), "other types keep capacity");
        assert!(arena.spawn(request(42, 1.0)).is_none(), "unknown types are rejected");
        assert_eq!(arena.live_count(), 3);
    }

    #[test]
    fn released_slots_are_recycled_with_new_generation() {
        let mut arena = UnitArena::new(UnitCatalog::default(), 1);
        let first = arena.spawn(request(3, 1.0)).expect("first spawn");
        assert!(arena.release(first));
        assert!(!arena.release(first), "double release must be ignored");

        let second = arena.spawn(request(3, 1.0)).expect("recycled spawn");
        assert_eq!(second.slot(), first.slot());
        assert_ne!(second.generation(), first.generation());
        assert!(arena.get(first).is_none(), "stale handle must not resolve");
    }

    #[test]
    fn reinitialize_restores_uniform_health() {
        let mut arena = UnitArena::new(UnitCatalog::default(), 4);
        let handle = arena.spawn(request(1, 2.0)).expect("spawn");
        assert!(arena.force_max_health(handle, 3.0));
        assert!(arena.reinitialize(handle, 2.0));
        let snapshot = arena.snapshots()[0];
        assert!((snapshot.max_health - 20.0).abs() < f32::EPSILON);
    }
}
