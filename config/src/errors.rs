// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! The reasons why a controller configuration may be rejected.

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("MAC age interval out of range [{min}, {max}]: {0}", min = crate::MIN_AGE_INTERVAL_SECS, max = crate::MAX_AGE_INTERVAL_SECS)]
    BadAgeInterval(u64),
    #[error("Retry policy needs at least one attempt")]
    NoRetryAttempts,
    #[error("Flow queue capacity must be non-zero")]
    NoFlowQueue,
    #[error("Container name must not be empty")]
    EmptyContainer,
    #[error("Missing mandatory parameter: {0}")]
    MissingParameter(String),
    #[error("Malformed configuration: {0}")]
    Malformed(String),
}

impl From<derive_builder::UninitializedFieldError> for ConfigError {
    fn from(e: derive_builder::UninitializedFieldError) -> Self {
        ConfigError::MissingParameter(e.field_name().to_string())
    }
}

/// Result-like type for configurations
pub type ConfigResult = Result<(), ConfigError>;
