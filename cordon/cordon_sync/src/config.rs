//! Construction-time configuration.
//!
//! Capacities and role populations are fixed when the components are built
//! and never change afterwards. [`CoordinatorConfig`] gathers them in one
//! place so driver code can load them from a file.

use crate::channel::ChannelConfig;
use crate::error::{CoordinationError, Result};
use crate::sync::WakePolicy;
use serde::{Deserialize, Serialize};

/// Capacities and populations for a set of coordination components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Number of interchangeable slots in the resource pool
    pub pool_capacity: usize,

    /// Maximum number of buffered items in the bounded channel
    pub buffer_capacity: usize,

    /// Number of producers feeding the bounded channel
    pub producers: usize,

    /// Number of consumers draining the bounded channel
    pub consumers: usize,

    /// Wake policy applied when the exclusive device is released
    pub device_wake_policy: WakePolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        let channel = ChannelConfig::default();
        Self {
            pool_capacity: 3,
            buffer_capacity: channel.capacity,
            producers: channel.producers,
            consumers: channel.consumers,
            device_wake_policy: WakePolicy::All,
        }
    }
}

impl CoordinatorConfig {
    /// Reject capacities or populations the components cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.pool_capacity == 0 {
            return Err(CoordinationError::InvalidConfig(
                "pool_capacity must be at least 1".to_string(),
            ));
        }
        self.channel_config().validate()
    }

    /// The bounded channel part of this configuration.
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig::new(self.buffer_capacity, self.producers, self.consumers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CoordinatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pool_capacity, 3);
        assert_eq!(config.channel_config(), ChannelConfig::new(10, 3, 2));
    }

    #[test]
    fn test_zero_pool_capacity_rejected() {
        let config = CoordinatorConfig {
            pool_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(CoordinationError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: CoordinatorConfig = toml::from_str(
            r#"
            buffer_capacity = 1
            device_wake_policy = "one"
            "#,
        )
        .unwrap();

        assert_eq!(config.buffer_capacity, 1);
        assert_eq!(config.device_wake_policy, WakePolicy::One);
        assert_eq!(config.producers, 3);
        assert!(config.validate().is_ok());
    }
}
