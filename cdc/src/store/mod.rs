//! Target store abstractions.
//!
//! The applier only talks to a [`TargetStore`], which hands out one [`StoreTransaction`] per
//! attempt. [`postgres::PgTargetStore`] writes to a Postgres-compatible database through a
//! connection pool, [`memory::MemoryStore`] keeps rows in memory for tests and local runs.

mod base;
pub mod memory;
pub mod postgres;

pub use base::{StoreTransaction, TargetStore};
