use serde::Deserialize;

use crate::shared::ValidationError;

/// Retention and reporting windows of the per-table rolling statistics.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StatsConfig {
    /// Number of one second buckets kept per table.
    #[serde(default = "default_horizon_secs")]
    pub horizon_secs: u64,
    /// Trailing windows reported by snapshots, shortest first.
    #[serde(default = "default_windows_secs")]
    pub windows_secs: Vec<u64>,
}

fn default_horizon_secs() -> u64 {
    3600
}

fn default_windows_secs() -> Vec<u64> {
    vec![60, 300, 900, 3600]
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            horizon_secs: default_horizon_secs(),
            windows_secs: default_windows_secs(),
        }
    }
}

impl StatsConfig {
    /// Windows must be non-empty, strictly ascending, non-zero and fit in the horizon.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.horizon_secs == 0 {
            return Err(ValidationError::Zero("stats.horizon_secs"));
        }
        if self.windows_secs.is_empty() {
            return Err(ValidationError::Stats(
                "`windows_secs` must list at least one window".to_string(),
            ));
        }
        if self.windows_secs[0] == 0 {
            return Err(ValidationError::Zero("stats.windows_secs"));
        }
        if self.windows_secs.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(ValidationError::Stats(format!(
                "`windows_secs` must be strictly ascending, got {:?}",
                self.windows_secs
            )));
        }
        if let Some(&longest) = self.windows_secs.last()
            && longest > self.horizon_secs
        {
            return Err(ValidationError::Stats(format!(
                "window of {longest}s exceeds the {}s horizon",
                self.horizon_secs
            )));
        }

        Ok(())
    }
}
