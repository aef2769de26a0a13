//! Scheduler configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::priority::PriorityWeights;

/// Tuning knobs for both schedulers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Edge length of a dirty-tracking chunk, in tiles.
    pub chunk_size: u32,

    /// Quiet period before a burst of edits triggers a cycle (ms).
    pub quiet_period_ms: u64,

    /// Wall-clock budget per executor pass (ms). A pass that runs longer
    /// defers the next pass to a later tick.
    pub pass_budget_ms: u64,

    /// How many trailing chunks the verify pass revisits.
    pub verify_tail: usize,

    /// Weights for selection priority scores.
    pub priority: PriorityWeights,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 16,
            quiet_period_ms: 150,
            pass_budget_ms: 8,
            verify_tail: 3,
            priority: PriorityWeights::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SchedulerConfig = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Clamp values that would make the scheduler misbehave.
    pub fn sanitized(mut self) -> Self {
        self.chunk_size = self.chunk_size.max(1);
        if !self.priority.level.is_finite() {
            self.priority.level = PriorityWeights::default().level;
        }
        if !self.priority.dependency.is_finite() {
            self.priority.dependency = PriorityWeights::default().dependency;
        }
        self
    }

    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    pub fn pass_budget(&self) -> Duration {
        Duration::from_millis(self.pass_budget_ms)
    }
}
