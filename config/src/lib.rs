// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Configuration of the VTN controller core.
//!
//! A [`VtnConfig`] is either built with [`VtnConfigBuilder`] or loaded from YAML.
//! Both paths end in [`VtnConfig::validate`].

#![deny(clippy::all, clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod errors;

pub use errors::{ConfigError, ConfigResult};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tracectl::trace_target;
use tracing::debug;

trace_target!("config", tracectl::LevelFilter::INFO, &[]);

pub const DEFAULT_CONTAINER: &str = "default";
pub const DEFAULT_AGE_INTERVAL_SECS: u64 = 600;
pub const MIN_AGE_INTERVAL_SECS: u64 = 10;
pub const MAX_AGE_INTERVAL_SECS: u64 = 1_000_000;
pub const DEFAULT_FLOW_QUEUE_CAPACITY: usize = 4096;

/// Bounds the optimistic transaction retry loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_micros: u64,
}

impl RetryPolicy {
    const MAX_BACKOFF_SHIFT: u32 = 6;

    /// Delay before the given retry (1-based), doubling up to 64 times the base.
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(Self::MAX_BACKOFF_SHIFT);
        Duration::from_micros(self.backoff_micros.saturating_mul(1 << shift))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 100,
            backoff_micros: 50,
        }
    }
}

/// Controller-wide parameters
#[derive(Builder, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[builder(build_fn(private, name = "build_unchecked", error = "ConfigError"))]
#[serde(default)]
pub struct VtnConfig {
    #[builder(setter(into), default = DEFAULT_CONTAINER.to_string())]
    pub container: String,

    #[builder(default = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub controller_address: IpAddr,

    #[builder(default = DEFAULT_AGE_INTERVAL_SECS)]
    pub mac_age_interval_secs: u64,

    #[builder(default)]
    pub retry: RetryPolicy,

    #[builder(default = DEFAULT_FLOW_QUEUE_CAPACITY)]
    pub flow_queue_capacity: usize,
}

impl VtnConfigBuilder {
    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn build(&self) -> Result<VtnConfig, ConfigError> {
        let config = self.build_unchecked()?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for VtnConfig {
    fn default() -> Self {
        Self {
            container: DEFAULT_CONTAINER.to_string(),
            controller_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            mac_age_interval_secs: DEFAULT_AGE_INTERVAL_SECS,
            retry: RetryPolicy::default(),
            flow_queue_capacity: DEFAULT_FLOW_QUEUE_CAPACITY,
        }
    }
}

impl VtnConfig {
    /// # Errors
    ///
    /// Fails if any parameter is out of range.
    pub fn validate(&self) -> ConfigResult {
        validate_age_interval(self.mac_age_interval_secs)?;
        if self.container.is_empty() {
            return Err(ConfigError::EmptyContainer);
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::NoRetryAttempts);
        }
        if self.flow_queue_capacity == 0 {
            return Err(ConfigError::NoFlowQueue);
        }
        Ok(())
    }

    /// Load a configuration from YAML. Missing keys take their default value.
    ///
    /// # Errors
    ///
    /// Fails if the document does not parse or does not validate.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: VtnConfig =
            serde_yaml_ng::from_str(yaml).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        config.validate()?;
        debug!("Loaded configuration:\n{config}");
        Ok(config)
    }

    #[must_use]
    pub fn mac_age_interval(&self) -> Duration {
        Duration::from_secs(self.mac_age_interval_secs)
    }
}

/// # Errors
///
/// Fails if `secs` is not a legal MAC age interval.
pub fn validate_age_interval(secs: u64) -> ConfigResult {
    if (MIN_AGE_INTERVAL_SECS..=MAX_AGE_INTERVAL_SECS).contains(&secs) {
        Ok(())
    } else {
        Err(ConfigError::BadAgeInterval(secs))
    }
}

impl Display for VtnConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "VTN config")?;
        writeln!(f, "  container      : {}", self.container)?;
        writeln!(f, "  controller     : {}", self.controller_address)?;
        writeln!(f, "  MAC age (secs) : {}", self.mac_age_interval_secs)?;
        writeln!(
            f,
            "  retry          : {} attempts, {}us base backoff",
            self.retry.max_attempts, self.retry.backoff_micros
        )?;
        write!(f, "  flow queue     : {}", self.flow_queue_capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builder_defaults() {
        let config = VtnConfigBuilder::default().build().unwrap();
        assert_eq!(config, VtnConfig::default());
        assert_eq!(config.mac_age_interval(), Duration::from_secs(600));
    }

    #[test]
    fn builder_rejects_bad_values() {
        assert_eq!(
            VtnConfigBuilder::default()
                .mac_age_interval_secs(5)
                .build()
                .unwrap_err(),
            ConfigError::BadAgeInterval(5)
        );
        assert_eq!(
            VtnConfigBuilder::default()
                .retry(RetryPolicy {
                    max_attempts: 0,
                    backoff_micros: 0
                })
                .build()
                .unwrap_err(),
            ConfigError::NoRetryAttempts
        );
        assert_eq!(
            VtnConfigBuilder::default().container("").build().unwrap_err(),
            ConfigError::EmptyContainer
        );
    }

    #[test]
    fn yaml_with_partial_keys() {
        let yaml = "container: tenant-ctl\nmac_age_interval_secs: 30\nretry:\n  max_attempts: 5\n";
        let config = VtnConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.container, "tenant-ctl");
        assert_eq!(config.mac_age_interval_secs, 30);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.backoff_micros, 50);
        assert_eq!(config.flow_queue_capacity, DEFAULT_FLOW_QUEUE_CAPACITY);

        assert!(matches!(
            VtnConfig::from_yaml("mac_age_interval_secs: [1]"),
            Err(ConfigError::Malformed(_))
        ));
        assert_eq!(
            VtnConfig::from_yaml("mac_age_interval_secs: 2000000"),
            Err(ConfigError::BadAgeInterval(2_000_000))
        );
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_micros(50));
        assert_eq!(policy.backoff(2), Duration::from_micros(100));
        assert_eq!(policy.backoff(50), Duration::from_micros(50 * 64));
    }
}
