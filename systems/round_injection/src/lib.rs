#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Hand-off point between the difficulty controller and the round scheduler.
//!
//! The scheduler files requests while it prepares a round; the controller
//! drains them whenever it gets to run and answers with [`deliver`]. Answers
//! that arrive while the matching round is being prepared are installed on
//! the spot, earlier answers wait in a buffer keyed by round, and a round that
//! starts before its answer arrives simply finds nothing to consume.
//!
//! [`deliver`]: RoundInjectionBridge::deliver

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use wave_director_core::{DefinitionError, RoundDefinition, RoundIndex};

/// Outcome of a delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    /// The round is being prepared and now uses the definition.
    Installed,
    /// The definition waits until the round starts.
    Buffered,
    /// The round already started or finished; the definition was dropped.
    Stale,
    /// The definition cannot be executed and was dropped.
    Rejected(DefinitionError),
}

/// Buffers controller deliveries keyed by round index.
#[derive(Debug, Default)]
pub struct RoundInjectionBridge {
    requested: BTreeSet<RoundIndex>,
    outstanding: VecDeque<RoundIndex>,
    buffered: BTreeMap<RoundIndex, RoundDefinition>,
    installed: Option<(RoundIndex, RoundDefinition)>,
    preparing: Option<RoundIndex>,
    started_through: Option<RoundIndex>,
}

impl RoundInjectionBridge {
    /// Creates an empty bridge.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Files a request for the round, returning `false` when it was already requested.
    pub fn request_for_round(&mut self, round: RoundIndex) -> bool {
        if !self.requested.insert(round) {
            return false;
        }
        self.outstanding.push_back(round);
        log::debug!("requested controller definition for round {}", round.get());
        true
    }

    /// Reports whether a request was filed for the round.
    #[must_use]
    pub fn is_requested(&self, round: RoundIndex) -> bool {
        self.requested.contains(&round)
    }

    /// Takes every request the controller has not seen yet, oldest first.
    pub fn take_requests(&mut self) -> Vec<RoundIndex> {
        self.outstanding.drain(..).collect()
    }

    /// Marks the round as being prepared, installing any buffered delivery.
    pub fn begin_preparation(&mut self, round: RoundIndex) {
        self.preparing = Some(round);
        if let Some(definition) = self.buffered.remove(&round) {
            self.installed = Some((round, definition));
        }
    }

    /// Round currently being prepared.
    #[must_use]
    pub fn preparing(&self) -> Option<RoundIndex> {
        self.preparing
    }

    /// Accepts a definition produced by the controller.
    pub fn deliver(&mut self, round: RoundIndex, definition: RoundDefinition) -> Delivery {
        if let Err(error) = definition.validate() {
            log::warn!("rejected malformed definition for round {}: {error}", round.get());
            return Delivery::Rejected(error);
        }
        if self.started_through.is_some_and(|started| round <= started) {
            log::debug!("dropped late definition for round {}", round.get());
            return Delivery::Stale;
        }
        if self.preparing == Some(round) {
            self.installed = Some((round, definition));
            return Delivery::Installed;
        }
        let _ = self.buffered.insert(round, definition);
        Delivery::Buffered
    }

    /// Reports whether a definition is installed or buffered for the round.
    #[must_use]
    pub fn has_pending(&self, round: RoundIndex) -> bool {
        matches!(&self.installed, Some((installed, _)) if *installed == round)
            || self.buffered.contains_key(&round)
    }

    /// Takes the definition for a round that is starting now.
    ///
    /// Marks the round as started so later deliveries for it are dropped, and
    /// discards buffered definitions of earlier rounds.
    pub fn consume_if_pending(&mut self, round: RoundIndex) -> Option<RoundDefinition> {
        self.started_through = Some(self.started_through.map_or(round, |started| started.max(round)));
        if self.preparing == Some(round) {
            self.preparing = None;
        }
        self.buffered = self.buffered.split_off(&round);
        let buffered = self.buffered.remove(&round);
        match self.installed.take() {
            Some((installed, definition)) if installed == round => Some(definition),
            Some((installed, definition)) if installed > round => {
                self.installed = Some((installed, definition));
                buffered
            }
            _ => buffered,
        }
    }

    /// Drops every request, delivery and preparation marker.
    pub fn clear(&mut self) {
        self.requested.clear();
        self.outstanding.clear();
        self.buffered.clear();
        self.installed = None;
        self.preparing = None;
        self.started_through = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_requests_are_coalesced() {
        let mut bridge = RoundInjectionBridge::new();
        assert!(bridge.request_for_round(RoundIndex::new(2)));
        assert!(!bridge.request_for_round(RoundIndex::new(2)));
        assert!(bridge.request_for_round(RoundIndex::new(3)));
        assert_eq!(
            bridge.take_requests(),
            vec![RoundIndex::new(2), RoundIndex::new(3)]
        );
        assert!(bridge.take_requests().is_empty());
        assert!(bridge.is_requested(RoundIndex::new(2)));
    }
}
