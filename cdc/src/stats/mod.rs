//! Rolling per-table request statistics.
//!
//! Each table owns a [`BucketSeries`], a fixed ring of one second buckets covering the
//! configured horizon. The [`StatsStore`] maps table names to their series and aggregates
//! snapshots over several trailing windows at once.

mod series;
mod store;

pub use series::{BucketSeries, StatsBucket, WindowTotals};
pub use store::{StatsRow, StatsStore, WindowStats};
