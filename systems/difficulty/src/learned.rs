//! Adapter running an external policy behind the [`DifficultyPolicy`] seam.
//!
//! The external component only sees flat observation and action vectors. When
//! it has no answer, or answers with something that is not a finite action,
//! the adapter falls back to the [`HeuristicPolicy`] for that round.

use std::collections::{BTreeMap, VecDeque};

use wave_director_core::{ActionVector, RoundDefinition, RoundIndex, ACTION_DIMENSIONS};

use crate::{
    heuristic::HeuristicPolicy,
    observation::{Observation, OBSERVATION_LEN},
    DifficultyPolicy, RoundOutcome,
};

/// Inference surface of an externally trained policy.
pub trait PolicyBackend: std::fmt::Debug {
    /// Produces a raw action, or `None` when the backend is not ready.
    fn act(&mut self, observation: &[f32; OBSERVATION_LEN]) -> Option<[f32; ACTION_DIMENSIONS]>;

    /// Receives the shaped reward of an evaluated round.
    fn reward(&mut self, _reward: f32) {}
}

const MEMORY_CAPACITY: usize = 20;
const PERFORMANCE_WINDOW: usize = 10;

/// Rolling performance of one strategy signature.
#[derive(Clone, Debug, PartialEq)]
pub struct StrategyEntry {
    signature: String,
    window: [f32; PERFORMANCE_WINDOW],
    average: f32,
    uses: u32,
}

impl StrategyEntry {
    fn new(signature: String, score: f32) -> Self {
        let mut window = [0.0; PERFORMANCE_WINDOW];
        window[PERFORMANCE_WINDOW - 1] = score;
        Self {
            signature,
            window,
            average: score,
            uses: 1,
        }
    }

    fn push(&mut self, score: f32) {
        self.window.rotate_left(1);
        self.window[PERFORMANCE_WINDOW - 1] = score;
        let (sum, samples) = self
            .window
            .iter()
            .filter(|value| **value > 0.0)
            .fold((0.0, 0u32), |(sum, samples), value| (sum + value, samples + 1));
        self.average = if samples > 0 { sum / samples as f32 } else { 0.0 };
        self.uses += 1;
    }

    /// Signature of the composition.
    #[must_use]
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Mean of the positive scores in the window.
    #[must_use]
    pub fn average(&self) -> f32 {
        self.average
    }

    /// Number of rounds scored with this signature.
    #[must_use]
    pub fn uses(&self) -> u32 {
        self.uses
    }
}

/// Bounded memory of recently used compositions and how they scored.
#[derive(Clone, Debug, Default)]
pub struct StrategyMemory {
    entries: VecDeque<StrategyEntry>,
}

impl StrategyMemory {
    /// Scores a signature, evicting the oldest entry when full.
    pub fn record(&mut self, signature: &str, score: f32) {
        if let Some(entry) = self.entries.iter_mut().find(|entry| entry.signature == signature) {
            entry.push(score);
            return;
        }
        self.entries.push_back(StrategyEntry::new(signature.to_owned(), score));
        if self.entries.len() > MEMORY_CAPACITY {
            let _ = self.entries.pop_front();
        }
    }

    /// Entry of a signature.
    #[must_use]
    pub fn get(&self, signature: &str) -> Option<&StrategyEntry> {
        self.entries.iter().find(|entry| entry.signature == signature)
    }

    /// Entries from oldest to newest.
    pub fn entries(&self) -> impl Iterator<Item = &StrategyEntry> {
        self.entries.iter()
    }

    /// Number of remembered signatures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether nothing is remembered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Compact description of a round: `"<type>x<count>,...,D<interval>"`.
#[must_use]
pub fn strategy_signature(definition: &RoundDefinition) -> String {
    let mut groups: Vec<_> = definition.groups().iter().collect();
    groups.sort_by_key(|group| group.unit_type());
    let mut signature: String = groups
        .iter()
        .map(|group| format!("{}x{},", group.unit_type().get(), group.count()))
        .collect();
    signature.push_str(&format!(
        "D{:.1}",
        definition.base_spawn_interval().as_secs_f32()
    ));
    signature
}

/// Policy delegating to a [`PolicyBackend`] with a heuristic fallback.
#[derive(Debug)]
pub struct LearnedPolicy<B> {
    backend: B,
    fallback: HeuristicPolicy,
    memory: StrategyMemory,
    composed: BTreeMap<RoundIndex, String>,
    fallbacks: u32,
}

impl<B: PolicyBackend> LearnedPolicy<B> {
    /// Wraps a backend, using `fallback` whenever it has no usable answer.
    #[must_use]
    pub fn new(backend: B, fallback: HeuristicPolicy) -> Self {
        Self {
            backend,
            fallback,
            memory: StrategyMemory::default(),
            composed: BTreeMap::new(),
            fallbacks: 0,
        }
    }

    /// Wrapped backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Strategy memory filled by evaluated rounds.
    #[must_use]
    pub fn memory(&self) -> &StrategyMemory {
        &self.memory
    }

    /// Number of decisions answered by the heuristic.
    #[must_use]
    pub fn fallbacks(&self) -> u32 {
        self.fallbacks
    }
}

impl<B: PolicyBackend> DifficultyPolicy for LearnedPolicy<B> {
    fn name(&self) -> &'static str {
        "learned"
    }

    fn decide(&mut self, observation: &Observation) -> ActionVector {
        match self.backend.act(&observation.to_vector()) {
            Some(raw) if raw.iter().all(|value| value.is_finite()) => ActionVector::new(raw),
            _ => {
                self.fallbacks += 1;
                log::debug!(
                    "policy backend gave no usable action for round {}, using heuristic",
                    observation.round.get()
                );
                self.fallback.decide(observation)
            }
        }
    }

    fn evaluate(&mut self, outcome: &RoundOutcome, reward: f32) {
        self.backend.reward(reward);
        if let Some(signature) = self.composed.remove(&outcome.round) {
            self.memory.record(&signature, reward);
        }
    }

    fn on_round_composed(&mut self, round: RoundIndex, definition: &RoundDefinition) {
        let _ = self.composed.insert(round, strategy_signature(definition));
    }

    fn reset(&mut self) {
        self.composed.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wave_director_core::{SpawnGroup, UnitTypeId};

    use super::*;

    #[test]
    fn signature_sorts_groups_by_type() {
        let group = |id, count| {
            SpawnGroup::new(UnitTypeId::new(id), count, Duration::ZERO, Duration::ZERO)
        };
        let definition = RoundDefinition::new(
            "mixed",
            vec![group(3, 2), group(1, 3), group(2, 2), group(1, 1)],
            Duration::from_millis(1240),
            120,
            Duration::from_secs(90),
            false,
        );
        assert_eq!(strategy_signature(&definition), "1x3,1x1,2x2,3x2,D1.2");
    }

    #[test]
    fn memory_averages_positive_scores_and_evicts_oldest() {
        let mut memory = StrategyMemory::default();
        memory.record("a", 2.0);
        memory.record("a", -1.0);
        memory.record("a", 4.0);
        let entry = memory.get("a").expect("entry");
        assert_eq!(entry.uses(), 3);
        assert!((entry.average() - 3.0).abs() < 1e-6);

        for index in 0..MEMORY_CAPACITY {
            memory.record(&format!("s{index}"), 1.0);
        }
        assert_eq!(memory.len(), MEMORY_CAPACITY);
        assert!(memory.get("a").is_none());
    }
}
