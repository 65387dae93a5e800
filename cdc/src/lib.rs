//! Replays changefeed row events against a Postgres-compatible target and keeps rolling
//! per-table throughput statistics.
//!
//! Events flow through the [`mutation`] builder into the transactional [`applier`], which
//! writes through a [`store::TargetStore`]. The [`sink`] drives whole webhook batches and
//! records one [`stats`] observation per touched table once a batch has committed.

pub mod applier;
pub mod error;
mod macros;
pub mod mutation;
pub mod sink;
pub mod stats;
pub mod store;
pub mod types;
#[cfg(feature = "test-utils")]
pub mod test_utils;
