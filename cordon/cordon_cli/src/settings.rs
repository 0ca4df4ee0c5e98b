//! Simulation settings.
//!
//! Settings come from built-in defaults, optionally replaced by a TOML file,
//! then overridden by command-line flags.

use anyhow::{bail, Context, Result};
use cordon_sync::CoordinatorConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Shape and pacing of a simulation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Number of sampling workers
    pub workers: usize,

    /// Number of input channels on the shared device
    pub input_channels: usize,

    /// Samples each worker collects before transmitting over a link
    pub block_size: usize,

    /// Samples each worker takes in a plain device run
    pub samples_per_worker: usize,

    /// Put/get attempts per producer/consumer
    pub iterations: usize,

    /// Lower bound of the random pause between device uses (ms)
    pub delay_min_ms: u64,

    /// Upper bound of the random pause between device uses (ms)
    pub delay_max_ms: u64,

    /// Pause after each put attempt (ms)
    pub producer_delay_ms: u64,

    /// Pause after each get attempt (ms)
    pub consumer_delay_ms: u64,

    /// Capacities and populations of the coordination components
    pub coordinator: CoordinatorConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            workers: 6,
            input_channels: 6,
            block_size: 20,
            samples_per_worker: 50,
            iterations: 100,
            delay_min_ms: 100,
            delay_max_ms: 500,
            producer_delay_ms: 1,
            consumer_delay_ms: 1,
            coordinator: CoordinatorConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Load settings from a TOML file; missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Reject settings the simulation cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            bail!("workers must be at least 1");
        }
        if self.input_channels < self.workers {
            bail!(
                "every worker samples its own input channel: {} workers need at least {} channels (got {})",
                self.workers,
                self.workers,
                self.input_channels
            );
        }
        if self.delay_min_ms > self.delay_max_ms {
            bail!(
                "delay_min_ms ({}) exceeds delay_max_ms ({})",
                self.delay_min_ms,
                self.delay_max_ms
            );
        }
        self.coordinator
            .validate()
            .context("invalid coordinator settings")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.coordinator.pool_capacity, 3);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
workers = 2
delay_max_ms = 0
delay_min_ms = 0
consumer_delay_ms = 5

[coordinator]
pool_capacity = 1
"#
        )
        .unwrap();

        let config = SimulationConfig::load(file.path()).unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.block_size, 20);
        assert_eq!(config.producer_delay_ms, 1);
        assert_eq!(config.consumer_delay_ms, 5);
        assert_eq!(config.coordinator.pool_capacity, 1);
        assert_eq!(config.coordinator.buffer_capacity, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let config = SimulationConfig {
            workers: 8,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SimulationConfig {
            delay_min_ms: 10,
            delay_max_ms: 5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = SimulationConfig::load(Path::new("/nonexistent/cordon.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/cordon.toml"));
    }
}
