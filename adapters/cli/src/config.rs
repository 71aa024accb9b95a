//! TOML configuration aggregating every tuning table of the engine.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;
use wave_director_system_difficulty::{ControllerTuning, HeuristicTuning};
use wave_director_system_health_scaling::HealthScalingTuning;
use wave_director_system_performance::TrackerConfig;
use wave_director_system_round_scheduler::SchedulerConfig;
use wave_director_system_wave_composer::ComposerTuning;
use wave_director_world::SessionConfig;

/// Every knob of a simulated session. Missing tables keep their defaults.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct DirectorConfig {
    pub(crate) session: SessionConfig,
    pub(crate) scheduler: SchedulerConfig,
    pub(crate) tracker: TrackerConfig,
    pub(crate) health: HealthScalingTuning,
    pub(crate) controller: ControllerTuning,
    pub(crate) heuristic: HeuristicTuning,
    pub(crate) composer: ComposerTuning,
}

/// Loads the configuration file, or the defaults when no path is given.
pub(crate) fn load(path: Option<&Path>) -> Result<DirectorConfig> {
    let Some(path) = path else {
        return Ok(DirectorConfig::default());
    };
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read director config at {}", path.display()))?;
    parse(&contents).with_context(|| format!("invalid director config at {}", path.display()))
}

pub(crate) fn parse(contents: &str) -> Result<DirectorConfig> {
    toml::from_str(contents).context("failed to parse director config toml contents")
}
