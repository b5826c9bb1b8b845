//! Future-runtime settings: continuation, fault tolerance, liveness probing,
//! and the default wait timeout.
//!
//! Precedence is file < environment. Environment variables use the
//! `MERIDIAN_` prefix with the field name upper-cased, e.g.
//! `MERIDIAN_PROBE_INTERVAL_MS=5000`.

use anyhow::{ensure, Context, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "MERIDIAN";

/// How often the liveness monitor probes producers of pending futures.
pub const DEFAULT_PROBE_INTERVAL_MS: u64 = 21_000;

/// Default bound on blocking waits; `0` means wait forever.
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 0;

/// Tunables consumed by the future-resolution runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuturesConfig {
    /// Forward resolved results to downstream holders automatically.
    pub continuation_enabled: bool,

    /// Initial state of the fault-tolerance flag. While active, the liveness
    /// monitor stands down (the FT layer owns failure detection).
    pub fault_tolerance_active: bool,

    /// Liveness probe interval in milliseconds. Must be non-zero.
    pub probe_interval_ms: u64,

    /// Process-wide bound applied when a wait gives no explicit timeout.
    /// `0` disables the bound (wait forever).
    pub default_wait_timeout_ms: u64,
}

impl Default for FuturesConfig {
    fn default() -> Self {
        Self {
            continuation_enabled: true,
            fault_tolerance_active: false,
            probe_interval_ms: DEFAULT_PROBE_INTERVAL_MS,
            default_wait_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
        }
    }
}

impl FuturesConfig {
    /// Load from a TOML file, then apply `MERIDIAN_*` environment overrides.
    /// Missing keys fall back to defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::from(path).required(true))
            .add_source(
                Environment::with_prefix(ENV_PREFIX).try_parsing(true),
            )
            .build()
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        let config: Self = settings
            .try_deserialize()
            .context("failed to deserialize futures configuration")?;
        config.validate()?;

        tracing::info!(
            continuation_enabled = config.continuation_enabled,
            probe_interval_ms = config.probe_interval_ms,
            "loaded futures configuration"
        );
        Ok(config)
    }

    /// Defaults plus `MERIDIAN_*` environment overrides, no file involved.
    pub fn from_env() -> Result<Self> {
        let settings = Config::builder()
            .add_source(
                Environment::with_prefix(ENV_PREFIX).try_parsing(true),
            )
            .build()
            .context("failed to read environment configuration")?;

        let config: Self = settings
            .try_deserialize()
            .context("failed to deserialize futures configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML, e.g. to generate a starter config file.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to render configuration as TOML")
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.probe_interval_ms > 0,
            "probe_interval_ms must be non-zero (got 0; disable monitoring via fault_tolerance_active instead)"
        );
        Ok(())
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    /// The default wait bound, `None` when waits should block forever.
    pub fn default_wait_timeout(&self) -> Option<Duration> {
        match self.default_wait_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}
