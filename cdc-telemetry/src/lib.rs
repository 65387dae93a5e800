//! Logging setup shared by the sink binaries and their tests.

pub mod tracing;
