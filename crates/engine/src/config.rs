//! Tunables for incurrence runs.

use std::time::Duration;

use serde::Deserialize;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IncurrenceConfig {
    /// Upper bound of ledger rows a single `incur` call materializes. A longer
    /// backlog is worked off across calls.
    pub max_occurrences_per_call: usize,
    /// Per-record time box inside a batch run.
    pub timeout_secs: u64,
}

impl IncurrenceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for IncurrenceConfig {
    fn default() -> Self {
        Self {
            max_occurrences_per_call: 1000,
            timeout_secs: 30,
        }
    }
}
