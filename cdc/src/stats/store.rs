use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use cdc_config::shared::StatsConfig;
use serde::{Deserialize, Serialize};

use crate::stats::series::BucketSeries;

/// Rate and average payload size of one table over one trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub window_secs: u64,
    /// Requests per second.
    pub rate: f64,
    /// Average request payload in bytes, zero without requests.
    pub avg_bytes: f64,
}

/// Snapshot of one table's statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsRow {
    pub table: String,
    /// One entry per configured window, shortest first.
    pub windows: Vec<WindowStats>,
}

impl StatsRow {
    pub fn window(&self, window_secs: u64) -> Option<&WindowStats> {
        self.windows
            .iter()
            .find(|window| window.window_secs == window_secs)
    }
}

/// Registry of per-table bucket series.
///
/// Series are created on first use and live as long as the store.
#[derive(Debug)]
pub struct StatsStore {
    config: StatsConfig,
    series: RwLock<HashMap<String, Arc<BucketSeries>>>,
}

impl StatsStore {
    pub fn new(config: StatsConfig) -> Self {
        Self {
            config,
            series: RwLock::new(HashMap::new()),
        }
    }

    pub fn windows_secs(&self) -> &[u64] {
        &self.config.windows_secs
    }

    /// Returns the series of `table`, creating it if needed.
    pub fn ensure(&self, table: &str) -> Arc<BucketSeries> {
        {
            let series = self.series.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = series.get(table) {
                return existing.clone();
            }
        }

        let mut series = self.series.write().unwrap_or_else(PoisonError::into_inner);
        // Another writer may have created it between the two locks.
        series
            .entry(table.to_owned())
            .or_insert_with(|| Arc::new(BucketSeries::new(self.config.horizon_secs)))
            .clone()
    }

    /// Records one request of `bytes` bytes for `table` at second `now`.
    pub fn record(&self, table: &str, now: i64, bytes: u64) {
        self.ensure(table).record(now, bytes);
    }

    /// Aggregates every table over the configured windows as seen at second `now`.
    ///
    /// Rows come back in no particular order.
    pub fn snapshot(&self, now: i64) -> Vec<StatsRow> {
        let tables: Vec<(String, Arc<BucketSeries>)> = {
            let series = self.series.read().unwrap_or_else(PoisonError::into_inner);
            series
                .iter()
                .map(|(table, series)| (table.clone(), series.clone()))
                .collect()
        };

        tables
            .into_iter()
            .map(|(table, series)| {
                let totals = series.snapshot_windows(now, &self.config.windows_secs);
                let windows = self
                    .config
                    .windows_secs
                    .iter()
                    .zip(totals)
                    .map(|(&window_secs, total)| WindowStats {
                        window_secs,
                        rate: total.requests as f64 / window_secs as f64,
                        avg_bytes: if total.requests == 0 {
                            0.0
                        } else {
                            total.bytes as f64 / total.requests as f64
                        },
                    })
                    .collect();

                StatsRow { table, windows }
            })
            .collect()
    }

    pub fn table_count(&self) -> usize {
        self.series
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
