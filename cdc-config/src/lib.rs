//! Configuration for the changefeed webhook sink.
//!
//! Provides the hierarchical loader used by every binary in the workspace together with the
//! configuration types shared between the core library and the HTTP service.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
