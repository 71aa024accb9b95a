#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Wave Director engine.
//!
//! This crate defines the message surface that connects the session context,
//! the round scheduler, and the pure difficulty systems. Producers hand the
//! scheduler immutable [`RoundDefinition`] values, the scheduler spawns units
//! through the narrow collaborator traits declared here, and every observable
//! transition is broadcast as an [`Event`] for adapters to react to.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of floats carried by an [`ActionVector`].
pub const ACTION_DIMENSIONS: usize = 6;

/// Number of unit types the controller composes rounds from.
pub const COMPOSED_UNIT_TYPES: usize = 3;

/// Converts a possibly negative or non-finite number of seconds into a duration.
///
/// Negative and NaN inputs collapse to [`Duration::ZERO`] so that every timing
/// field of a [`RoundDefinition`] stays non-negative by construction.
#[must_use]
pub fn duration_from_secs(seconds: f32) -> Duration {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f32(seconds).unwrap_or(Duration::ZERO)
}

/// Serde adapter for durations written as fractional seconds in config files.
pub mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    /// Reads a number of seconds; negative and non-finite values become zero.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let seconds = f32::deserialize(deserializer)?;
        Ok(super::duration_from_secs(seconds))
    }
}

/// Identifier of a hostile unit archetype.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitTypeId(u32);

impl UnitTypeId {
    /// Creates a new unit type identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Zero-based slot of the type inside the composed type range, if it belongs to it.
    ///
    /// Composed types are numbered from one, so type `1` maps to slot `0`.
    #[must_use]
    pub fn composed_slot(&self) -> Option<usize> {
        let slot = usize::try_from(self.0.checked_sub(1)?).ok()?;
        (slot < COMPOSED_UNIT_TYPES).then_some(slot)
    }

    /// Unit type occupying the provided composed slot.
    #[must_use]
    pub fn from_composed_slot(slot: usize) -> Self {
        Self(u32::try_from(slot).map_or(u32::MAX, |value| value.saturating_add(1)))
    }
}

/// Zero-based index of a round within the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoundIndex(u32);

impl RoundIndex {
    /// Creates a new round index.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the zero-based numeric index.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Index of the round following this one.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Index as a float, convenient for scaling formulas.
    #[must_use]
    pub fn as_f32(&self) -> f32 {
        self.0 as f32
    }
}

/// Stable handle to a unit living in the session's arena.
///
/// The generation guards against stale handles after a slot is recycled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitHandle {
    unit_type: UnitTypeId,
    slot: u32,
    generation: u32,
}

impl UnitHandle {
    /// Creates a handle referencing the provided arena slot.
    #[must_use]
    pub const fn new(unit_type: UnitTypeId, slot: u32, generation: u32) -> Self {
        Self {
            unit_type,
            slot,
            generation,
        }
    }

    /// Type of the referenced unit.
    #[must_use]
    pub const fn unit_type(&self) -> UnitTypeId {
        self.unit_type
    }

    /// Dense slot inside the per-type arena.
    #[must_use]
    pub const fn slot(&self) -> u32 {
        self.slot
    }

    /// Generation of the slot when the handle was issued.
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

/// Sub-batch of same-typed units within a round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnGroup {
    unit_type: UnitTypeId,
    count: u32,
    delay_before_group: Duration,
    spawn_interval: Duration,
}

impl SpawnGroup {
    /// Creates a new spawn group.
    ///
    /// A zero `spawn_interval` defers to the owning round's base interval.
    #[must_use]
    pub const fn new(
        unit_type: UnitTypeId,
        count: u32,
        delay_before_group: Duration,
        spawn_interval: Duration,
    ) -> Self {
        Self {
            unit_type,
            count,
            delay_before_group,
            spawn_interval,
        }
    }

    /// Type of unit emitted by the group.
    #[must_use]
    pub const fn unit_type(&self) -> UnitTypeId {
        self.unit_type
    }

    /// Number of units emitted by the group.
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Delay observed before the first unit of the group is emitted.
    #[must_use]
    pub const fn delay_before_group(&self) -> Duration {
        self.delay_before_group
    }

    /// Interval between consecutive units of the group.
    #[must_use]
    pub const fn spawn_interval(&self) -> Duration {
        self.spawn_interval
    }

    /// Adds units to the group, used when reconciling rounding drift.
    pub fn add_units(&mut self, extra: u32) {
        self.count = self.count.saturating_add(extra);
    }

    /// Overrides the delay observed before the group starts.
    pub fn set_delay_before_group(&mut self, delay: Duration) {
        self.delay_before_group = delay;
    }
}

/// Immutable description of a single round handed to the scheduler.
///
/// This is the one transfer object of the engine: group order defines spawn
/// sequencing and every numeric field is non-negative.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundDefinition {
    name: String,
    #[serde(default)]
    groups: Vec<SpawnGroup>,
    base_spawn_interval: Duration,
    reward: u32,
    time_limit: Duration,
    boss: bool,
}

impl RoundDefinition {
    /// Creates a new round definition.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        groups: Vec<SpawnGroup>,
        base_spawn_interval: Duration,
        reward: u32,
        time_limit: Duration,
        boss: bool,
    ) -> Self {
        Self {
            name: name.into(),
            groups,
            base_spawn_interval,
            reward,
            time_limit,
            boss,
        }
    }

    /// Human readable name of the round.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordered spawn groups.
    #[must_use]
    pub fn groups(&self) -> &[SpawnGroup] {
        &self.groups
    }

    /// Interval used by groups that do not declare their own.
    #[must_use]
    pub const fn base_spawn_interval(&self) -> Duration {
        self.base_spawn_interval
    }

    /// Funds granted when the round completes.
    #[must_use]
    pub const fn reward(&self) -> u32 {
        self.reward
    }

    /// Soft time limit advertised for the round.
    #[must_use]
    pub const fn time_limit(&self) -> Duration {
        self.time_limit
    }

    /// Reports whether the round is a scripted boss round.
    #[must_use]
    pub const fn is_boss(&self) -> bool {
        self.boss
    }

    /// Total number of units declared across all groups.
    #[must_use]
    pub fn total_units(&self) -> u32 {
        self.groups
            .iter()
            .fold(0u32, |total, group| total.saturating_add(group.count()))
    }

    /// Effective interval for the provided group, falling back to the base interval.
    #[must_use]
    pub fn interval_for(&self, group: &SpawnGroup) -> Duration {
        if group.spawn_interval().is_zero() {
            self.base_spawn_interval
        } else {
            group.spawn_interval()
        }
    }

    /// Checks that the definition can be executed by the scheduler.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.groups.is_empty() {
            return Err(DefinitionError::NoGroups);
        }
        if self.total_units() == 0 {
            return Err(DefinitionError::NoUnits);
        }
        Ok(())
    }
}

/// Reasons a [`RoundDefinition`] cannot be executed.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DefinitionError {
    /// The definition carries no groups at all.
    #[error("round definition has no spawn groups")]
    NoGroups,
    /// Every group of the definition is empty.
    #[error("round definition spawns no units")]
    NoUnits,
}

/// Six-float decision produced by a difficulty policy.
///
/// Layout: `[type 1 share, type 2 share, type 3 share, density, spawn speed,
/// health adjustment]`. Every component is clamped to its natural range on
/// construction and non-finite inputs collapse to neutral defaults.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActionVector([f32; ACTION_DIMENSIONS]);

impl ActionVector {
    /// Neutral decision used when no policy output is available.
    pub const NEUTRAL: Self = Self([0.33, 0.33, 0.34, 0.6, 0.5, 0.0]);

    /// Creates a new action vector, clamping every component.
    #[must_use]
    pub fn new(raw: [f32; ACTION_DIMENSIONS]) -> Self {
        let mut values = raw;
        for (index, value) in values.iter_mut().enumerate() {
            let fallback = Self::NEUTRAL.0[index];
            let sanitized = if value.is_finite() { *value } else { fallback };
            *value = if index == ACTION_DIMENSIONS - 1 {
                sanitized.clamp(-1.0, 1.0)
            } else {
                sanitized.clamp(0.0, 1.0)
            };
        }
        Self(values)
    }

    /// Builds an action vector from the component parts.
    #[must_use]
    pub fn from_parts(
        proportions: [f32; COMPOSED_UNIT_TYPES],
        density: f32,
        spawn_speed: f32,
        health_adjustment: f32,
    ) -> Self {
        Self::new([
            proportions[0],
            proportions[1],
            proportions[2],
            density,
            spawn_speed,
            health_adjustment,
        ])
    }

    /// Share of each composed unit type.
    #[must_use]
    pub fn proportions(&self) -> [f32; COMPOSED_UNIT_TYPES] {
        [self.0[0], self.0[1], self.0[2]]
    }

    /// Requested spawn density in `[0, 1]`.
    #[must_use]
    pub fn density(&self) -> f32 {
        self.0[3]
    }

    /// Requested spawn speed in `[0, 1]`.
    #[must_use]
    pub fn spawn_speed(&self) -> f32 {
        self.0[4]
    }

    /// Requested health adjustment in `[-1, 1]`.
    #[must_use]
    pub fn health_adjustment(&self) -> f32 {
        self.0[5]
    }

    /// Raw component array.
    #[must_use]
    pub fn as_array(&self) -> [f32; ACTION_DIMENSIONS] {
        self.0
    }
}

impl Default for ActionVector {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// Lifecycle state of the round scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoundPhase {
    /// No round has started yet, or the session was reset.
    Preparing,
    /// The current round is still emitting groups.
    Spawning,
    /// Every group has been emitted but units remain alive.
    Active,
    /// The previous round completed and the next one has not started.
    BetweenRounds,
    /// The final round completed and the grace period elapsed.
    Victory,
    /// The player ran out of lives.
    Defeat,
}

impl RoundPhase {
    /// Reports whether a round definition is currently being executed.
    #[must_use]
    pub const fn is_round_running(&self) -> bool {
        matches!(self, Self::Spawning | Self::Active)
    }

    /// Reports whether the session has reached a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Victory | Self::Defeat)
    }
}

/// Reason a live unit left the field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RemovalCause {
    /// The unit was killed after reaching the provided furthest path node.
    Defeated {
        /// Furthest path node index reached before dying.
        furthest_node: u32,
    },
    /// The unit walked the whole path.
    ReachedEnd,
}

/// Categories of economic transactions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Reward for defeating a unit.
    UnitKill,
    /// Reward for completing a round.
    RoundComplete,
    /// Income trickled in while a round runs or on completion.
    PassiveIncome,
    /// Spending initiated by the player.
    Purchase,
    /// Funds returned to the player.
    Refund,
}

/// Failures reported by an [`Economy`].
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Hash)]
pub enum TransactionError {
    /// A negative transaction would overdraw the balance.
    #[error("insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        /// Absolute amount the transaction attempted to withdraw.
        requested: i64,
        /// Balance available when the transaction was attempted.
        available: i64,
    },
    /// The economy has not been initialised for the session.
    #[error("economy is not initialised")]
    Uninitialized,
}

/// Why the scheduler replaced a round with the deterministic fallback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FallbackReason {
    /// No controller definition was delivered before the round started.
    NotDelivered,
    /// The delivered or scripted definition failed validation.
    Malformed(DefinitionError),
}

/// Events broadcast by the scheduler and the session context.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A preparation countdown started ahead of the provided round.
    PreparationStarted {
        /// Round that will start when the countdown elapses.
        round: RoundIndex,
    },
    /// The preparation countdown advanced.
    PreparationTimeUpdated {
        /// Seconds remaining before the next round starts.
        seconds_left: f32,
    },
    /// A round started spawning.
    RoundStarted {
        /// Index of the round that started.
        round: RoundIndex,
    },
    /// A round completed.
    RoundCompleted {
        /// Index of the round that completed.
        round: RoundIndex,
    },
    /// A unit entered the field.
    UnitSpawned {
        /// Handle of the spawned unit.
        handle: UnitHandle,
        /// Health multiplier applied to the unit.
        health_multiplier: f32,
    },
    /// The pool could not provide a unit, so the group slot was skipped.
    SpawnSkipped {
        /// Round being spawned.
        round: RoundIndex,
        /// Requested unit type.
        unit_type: UnitTypeId,
    },
    /// A unit left the field.
    UnitRemoved {
        /// Handle of the removed unit.
        handle: UnitHandle,
        /// Reason for the removal.
        cause: RemovalCause,
    },
    /// A controller definition was installed for an upcoming round.
    DefinitionInstalled {
        /// Round the definition belongs to.
        round: RoundIndex,
    },
    /// A controller delivery was dropped before the round could use it.
    DefinitionDropped {
        /// Round the delivery targeted.
        round: RoundIndex,
        /// Validation failure, `None` when the round had already started.
        error: Option<DefinitionError>,
    },
    /// The deterministic fallback generator replaced a round.
    FallbackRoundUsed {
        /// Round that received the fallback definition.
        round: RoundIndex,
        /// Reason the fallback was required.
        reason: FallbackReason,
    },
    /// Funds were granted to the player.
    FundsGranted {
        /// Category of the transaction.
        kind: TransactionKind,
        /// Amount granted.
        amount: i64,
    },
    /// A transaction was rejected.
    TransactionFailed {
        /// Category of the rejected transaction.
        kind: TransactionKind,
        /// Amount requested.
        amount: i64,
        /// Reason the transaction failed.
        error: TransactionError,
    },
    /// Units of one type disagreed on max health and were re-initialised.
    ConsistencyRepaired {
        /// Type whose units were repaired.
        unit_type: UnitTypeId,
        /// Number of units re-initialised.
        units: u32,
    },
    /// The controller scored a completed round.
    ControllerEvaluated {
        /// Round that was evaluated.
        round: RoundIndex,
        /// Reward assigned to the round.
        reward: f32,
    },
    /// The final round completed.
    Victory,
    /// The player ran out of lives.
    Defeat,
}

/// Request handed to the unit pool when a group emits a unit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnRequest {
    /// Type of unit to spawn.
    pub unit_type: UnitTypeId,
    /// Round the unit belongs to.
    pub round: RoundIndex,
    /// Multiplier applied to the archetype's base health.
    pub health_multiplier: f32,
}

/// Immutable representation of a live unit used by consistency checks.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UnitSnapshot {
    /// Handle of the unit.
    pub handle: UnitHandle,
    /// Scaled maximum health assigned at spawn.
    pub max_health: f32,
    /// Furthest path node reached so far.
    pub furthest_node: u32,
}

/// Pool that lends units to the scheduler.
pub trait UnitPool {
    /// Spawns a unit, returning `None` when the pool is exhausted or the type is unknown.
    fn spawn_unit(&mut self, request: SpawnRequest) -> Option<UnitHandle>;

    /// Returns a unit to the pool. Stale handles are ignored.
    fn return_unit(&mut self, handle: UnitHandle);

    /// Number of units currently alive on the field.
    fn live_unit_count(&self) -> usize;

    /// Movement speed of a live unit.
    fn unit_speed(&self, handle: UnitHandle) -> Option<f32>;

    /// Gold granted when the unit is defeated.
    fn unit_bounty(&self, handle: UnitHandle) -> Option<u32>;

    /// Snapshots of every live unit in deterministic order.
    fn live_units(&self) -> Vec<UnitSnapshot>;

    /// Resets a live unit and re-applies the provided health multiplier.
    fn reinitialize_unit(&mut self, handle: UnitHandle, health_multiplier: f32) -> bool;

    /// Returns every live unit to the pool.
    fn recall_all(&mut self);
}

/// Read access to the player's remaining lives.
pub trait PlayerState {
    /// Lives remaining.
    fn current_lives(&self) -> u32;

    /// Lives at the start of the session.
    fn max_lives(&self) -> u32;

    /// Remaining lives as a fraction of the maximum, `0.5` when unknown.
    fn health_fraction(&self) -> f32 {
        let max = self.max_lives();
        if max == 0 {
            return 0.5;
        }
        (self.current_lives() as f32 / max as f32).clamp(0.0, 1.0)
    }
}

/// Access to the player's funds.
pub trait Economy {
    /// Current balance.
    fn current_funds(&self) -> i64;

    /// Applies a transaction, returning the new balance.
    ///
    /// Negative amounts that would overdraw the balance fail and leave the
    /// balance unchanged.
    fn grant(&mut self, kind: TransactionKind, amount: i64, reason: &str)
        -> Result<i64, TransactionError>;
}

/// Read access to the fixed path units walk along.
pub trait PathTopology {
    /// Ordered node positions.
    fn node_positions(&self) -> &[[f32; 3]];

    /// Distances between consecutive nodes.
    fn node_distances(&self) -> &[f32];

    /// Number of nodes on the path.
    fn total_nodes(&self) -> usize {
        self.node_positions().len()
    }

    /// Index of the final node, zero for an empty path.
    fn last_node_index(&self) -> usize {
        self.total_nodes().saturating_sub(1)
    }
}

/// Destination for broadcast events.
pub trait EventSink {
    /// Publishes an event to every subscriber.
    fn publish(&mut self, event: Event);
}

/// Every collaborator the scheduler consumes, bundled as one session context.
pub trait SessionContext: UnitPool + PlayerState + Economy + PathTopology + EventSink {}

impl<T> SessionContext for T where T: UnitPool + PlayerState + Economy + PathTopology + EventSink {}

#[cfg(test)]
mod tests {
    use super::*;

    fn tutorial_like() -> RoundDefinition {
        let groups = (0..3)
            .map(|index| {
                SpawnGroup::new(
                    UnitTypeId::new(index + 1),
                    3,
                    duration_from_secs(index as f32 * 1.5),
                    Duration::from_secs(1),
                )
            })
            .collect();
        RoundDefinition::new(
            "tutorial",
            groups,
            duration_from_secs(1.2),
            100,
            Duration::from_secs(60),
            false,
        )
    }

    #[test]
    fn round_definition_round_trips_through_bincode() {
        let definition = tutorial_like();
        let bytes = bincode::serialize(&definition).expect("serialize");
        let restored: RoundDefinition = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(restored, definition);
    }

    #[test]
    fn total_units_sums_groups() {
        assert_eq!(tutorial_like().total_units(), 9);
    }

    #[test]
    fn validation_rejects_empty_definitions() {
        let empty = RoundDefinition::new("empty", Vec::new(), Duration::ZERO, 0, Duration::ZERO, false);
        assert_eq!(empty.validate(), Err(DefinitionError::NoGroups));

        let zero = RoundDefinition::new(
            "zero",
            vec![SpawnGroup::new(UnitTypeId::new(1), 0, Duration::ZERO, Duration::ZERO)],
            Duration::ZERO,
            0,
            Duration::ZERO,
            false,
        );
        assert_eq!(zero.validate(), Err(DefinitionError::NoUnits));
        assert!(tutorial_like().validate().is_ok());
    }

    #[test]
    fn zero_group_interval_defers_to_base() {
        let definition = RoundDefinition::new(
            "base",
            vec![SpawnGroup::new(UnitTypeId::new(4), 1, Duration::ZERO, Duration::ZERO)],
            Duration::from_millis(200),
            0,
            Duration::ZERO,
            true,
        );
        assert_eq!(
            definition.interval_for(&definition.groups()[0]),
            Duration::from_millis(200)
        );
    }

    #[test]
    fn action_vector_clamps_components() {
        let action = ActionVector::new([1.5, -0.2, f32::NAN, 2.0, -1.0, -3.0]);
        assert_eq!(action.proportions(), [1.0, 0.0, 0.34]);
        assert!((action.density() - 1.0).abs() < f32::EPSILON);
        assert!(action.spawn_speed().abs() < f32::EPSILON);
        assert!((action.health_adjustment() + 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn negative_seconds_collapse_to_zero() {
        assert_eq!(duration_from_secs(-2.0), Duration::ZERO);
        assert_eq!(duration_from_secs(f32::NAN), Duration::ZERO);
        assert_eq!(duration_from_secs(1.5), Duration::from_millis(1_500));
    }

    #[test]
    fn composed_slots_are_one_based() {
        assert_eq!(UnitTypeId::new(1).composed_slot(), Some(0));
        assert_eq!(UnitTypeId::new(3).composed_slot(), Some(2));
        assert_eq!(UnitTypeId::new(4).composed_slot(), None);
        assert_eq!(UnitTypeId::new(0).composed_slot(), None);
        assert_eq!(UnitTypeId::from_composed_slot(1), UnitTypeId::new(2));
    }
}
