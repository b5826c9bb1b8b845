//! # Meridian Runtime Configuration
//!
//! Loads the future-resolution runtime's tunables from a TOML file with
//! `MERIDIAN_*` environment-variable overrides, in that order. Every field
//! has a default, so an empty file (or no file at all) yields a working
//! configuration.

pub mod settings;

pub use settings::{
    FuturesConfig, DEFAULT_PROBE_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS, ENV_PREFIX,
};
