#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Explicitly-owned session context for the Wave Director engine.
//!
//! A [`Session`] bundles every collaborator the round scheduler consumes: the
//! unit arena, the player's lives, the treasury, the path topology and the
//! event channel. Nothing here is global, so several sessions can run side by
//! side in one process.

pub mod catalog;
pub mod events;
pub mod ledger;
pub mod path;
pub mod pool;

use std::time::Duration;

use serde::Deserialize;
use wave_director_core::{
    Economy, Event, EventSink, PathTopology, PlayerState, RemovalCause, SpawnRequest,
    TransactionError, TransactionKind, UnitHandle, UnitPool, UnitSnapshot,
};

use crate::{
    catalog::UnitCatalog,
    events::{EventBus, SubscriberId},
    ledger::{PlayerLedger, Treasury},
    path::PathGraph,
    pool::UnitArena,
};

/// Parameters used to build a [`Session`].
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Lives granted at the start of the session.
    pub starting_lives: u32,
    /// Funds granted at the start of the session.
    pub starting_funds: i64,
    /// Upper bound on the player's balance.
    pub max_funds: i64,
    /// Maximum number of simultaneously live units per type.
    pub unit_capacity_per_type: usize,
    /// Path node positions; the default serpentine is used when empty.
    pub path: Vec<[f32; 3]>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            starting_lives: 5,
            starting_funds: 300,
            max_funds: 99_999,
            unit_capacity_per_type: 64,
            path: Vec::new(),
        }
    }
}

/// Session context implementing every collaborator trait of the scheduler.
#[derive(Debug)]
pub struct Session {
    units: UnitArena,
    player: PlayerLedger,
    treasury: Treasury,
    path: PathGraph,
    events: EventBus,
}

impl Session {
    /// Creates a session with the default catalog.
    #[must_use]
    pub fn new(config: &SessionConfig) -> Self {
        Self::with_catalog(config, UnitCatalog::default())
    }

    /// Creates a session spawning units from the provided catalog.
    #[must_use]
    pub fn with_catalog(config: &SessionConfig, catalog: UnitCatalog) -> Self {
        let path = if config.path.is_empty() {
            PathGraph::default()
        } else {
            PathGraph::new(config.path.clone())
        };
        Self {
            units: UnitArena::new(catalog, config.unit_capacity_per_type),
            player: PlayerLedger::new(config.starting_lives),
            treasury: Treasury::new(config.starting_funds, config.max_funds),
            path,
            events: EventBus::new(),
        }
    }

    /// Read access to the unit arena.
    #[must_use]
    pub fn units(&self) -> &UnitArena {
        &self.units
    }

    /// Mutable access to the unit arena.
    pub fn units_mut(&mut self) -> &mut UnitArena {
        &mut self.units
    }

    /// Read access to the player ledger.
    #[must_use]
    pub fn player(&self) -> &PlayerLedger {
        &self.player
    }

    /// Read access to the treasury.
    #[must_use]
    pub fn treasury(&self) -> &Treasury {
        &self.treasury
    }

    /// Read access to the path.
    #[must_use]
    pub fn path(&self) -> &PathGraph {
        &self.path
    }

    /// Registers a new event subscriber.
    pub fn subscribe(&mut self) -> SubscriberId {
        self.events.subscribe()
    }

    /// Removes an event subscriber.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Takes every event queued for the subscriber.
    pub fn drain_events(&mut self, id: SubscriberId) -> Vec<Event> {
        self.events.drain(id)
    }

    /// Restores lives and funds and recalls every unit.
    pub fn restart(&mut self) {
        self.units.release_all();
        self.player.restore();
        self.treasury.restore();
    }

    /// Walks every live unit along the path and applies defensive damage.
    ///
    /// Damage is focused on the leading unit. Units that die or walk the
    /// whole path are retired: they stay in the arena until the scheduler
    /// returns them, and they are reported exactly once. A unit reaching the
    /// end costs the player one life.
    pub fn advance_units(&mut self, dt: Duration, defense_dps: f32) -> Vec<(UnitHandle, RemovalCause)> {
        let seconds = dt.as_secs_f32();
        let length = self.path.length();
        let mut removals = Vec::new();
        let mut leader: Option<(UnitHandle, f32)> = None;

        for handle in self.units.handles() {
            let Some(unit) = self.units.get_mut(handle) else {
                continue;
            };
            if unit.retired {
                continue;
            }
            unit.distance += unit.speed * seconds;
            unit.furthest_node = unit.furthest_node.max(self.path.node_at_distance(unit.distance));
            if unit.distance >= length {
                unit.retired = true;
                let _ = self.player.lose_life();
                removals.push((handle, RemovalCause::ReachedEnd));
                continue;
            }
            if leader.map_or(true, |(_, distance)| unit.distance > distance) {
                leader = Some((handle, unit.distance));
            }
        }

        if let Some((handle, _)) = leader {
            if let Some(unit) = self.units.get_mut(handle) {
                unit.health -= defense_dps.max(0.0) * seconds;
                if unit.health <= 0.0 {
                    unit.retired = true;
                    removals.push((
                        handle,
                        RemovalCause::Defeated {
                            furthest_node: unit.furthest_node,
                        },
                    ));
                }
            }
        }

        removals
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(&SessionConfig::default())
    }
}

impl UnitPool for Session {
    fn spawn_unit(&mut self, request: SpawnRequest) -> Option<UnitHandle> {
        self.units.spawn(request)
    }

    fn return_unit(&mut self, handle: UnitHandle) {
        if !self.units.release(handle) {
            log::debug!("ignored return of stale handle {handle:?}");
        }
    }

    fn live_unit_count(&self) -> usize {
        self.units.live_count()
    }

    fn unit_speed(&self, handle: UnitHandle) -> Option<f32> {
        self.units.get(handle).map(|unit| unit.speed)
    }

    fn unit_bounty(&self, handle: UnitHandle) -> Option<u32> {
        self.units.get(handle).map(|unit| unit.bounty)
    }

    fn live_units(&self) -> Vec<UnitSnapshot> {
        self.units.snapshots()
    }

    fn reinitialize_unit(&mut self, handle: UnitHandle, health_multiplier: f32) -> bool {
        self.units.reinitialize(handle, health_multiplier)
    }

    fn recall_all(&mut self) {
        self.units.release_all();
    }
}

impl PlayerState for Session {
    fn current_lives(&self) -> u32 {
        self.player.lives()
    }

    fn max_lives(&self) -> u32 {
        self.player.max_lives()
    }
}

impl Economy for Session {
    fn current_funds(&self) -> i64 {
        self.treasury.funds()
    }

    fn grant(
        &mut self,
        kind: TransactionKind,
        amount: i64,
        reason: &str,
    ) -> Result<i64, TransactionError> {
        self.treasury.apply(kind, amount, reason)
    }
}

impl PathTopology for Session {
    fn node_positions(&self) -> &[[f32; 3]] {
        self.path.positions()
    }

    fn node_distances(&self) -> &[f32] {
        self.path.distances()
    }
}

impl EventSink for Session {
    fn publish(&mut self, event: Event) {
        self.events.publish(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wave_director_core::{RoundIndex, UnitTypeId};

    fn spawn(session: &mut Session, id: u32) -> UnitHandle {
        session
            .spawn_unit(SpawnRequest {
                unit_type: UnitTypeId::new(id),
                round: RoundIndex::new(0),
                health_multiplier: 1.0,
            })
            .expect("spawn")
    }

    #[test]
    fn fast_unit_reaches_end_and_costs_a_life() {
        let config = SessionConfig {
            path: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]],
            ..SessionConfig::default()
        };
        let mut session = Session::new(&config);
        let handle = spawn(&mut session, 2);

        let removals = session.advance_units(Duration::from_secs(1), 0.0);
        assert_eq!(removals, vec![(handle, RemovalCause::ReachedEnd)]);
        assert_eq!(session.current_lives(), 4);

        let again = session.advance_units(Duration::from_secs(1), 0.0);
        assert!(again.is_empty(), "retired units must be reported once");
        assert_eq!(session.live_unit_count(), 1, "retired units wait for return");

        session.return_unit(handle);
        assert_eq!(session.live_unit_count(), 0);
    }

    #[test]
    fn defense_kills_the_leading_unit() {
        let mut session = Session::default();
        let handle = spawn(&mut session, 1);
        let removals = session.advance_units(Duration::from_secs(1), 50.0);
        assert_eq!(
            removals,
            vec![(handle, RemovalCause::Defeated { furthest_node: 0 })]
        );
        assert_eq!(session.unit_bounty(handle), Some(10));
    }

    #[test]
    fn restart_restores_ledgers() {
        let mut session = Session::default();
        let _ = spawn(&mut session, 3);
        let _ = session.grant(TransactionKind::Purchase, -100, "tower");
        session.restart();
        assert_eq!(session.current_funds(), 300);
        assert_eq!(session.live_unit_count(), 0);
        assert!((session.health_fraction() - 1.0).abs() < f32::EPSILON);
    }
}
