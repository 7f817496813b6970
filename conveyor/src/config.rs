//! Configuration types for channels and worker pools.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when validating configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Channel capacity cannot be zero.
    #[error("`capacity` cannot be zero")]
    CapacityZero,
    /// Worker count cannot be zero.
    #[error("`workers` cannot be zero")]
    WorkersZero,
}

/// Bounded channel configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ChannelConfig {
    /// Maximum number of items the channel holds before producers block.
    #[serde(default = "default_channel_capacity")]
    pub capacity: usize,
}

impl ChannelConfig {
    /// Default channel capacity.
    pub const DEFAULT_CAPACITY: usize = 64;

    /// Validates channel configuration settings.
    ///
    /// Ensures capacity is non-zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.capacity == 0 {
            return Err(ValidationError::CapacityZero);
        }

        Ok(())
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            capacity: default_channel_capacity(),
        }
    }
}

fn default_channel_capacity() -> usize {
    ChannelConfig::DEFAULT_CAPACITY
}

/// Worker pool configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PoolConfig {
    /// Number of concurrent workers consuming from the bound channel.
    #[serde(default = "default_pool_workers")]
    pub workers: usize,
}

impl PoolConfig {
    /// Default number of pool workers.
    pub const DEFAULT_WORKERS: usize = 4;

    /// Validates pool configuration settings.
    ///
    /// Ensures the worker count is non-zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.workers == 0 {
            return Err(ValidationError::WorkersZero);
        }

        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: default_pool_workers(),
        }
    }
}

fn default_pool_workers() -> usize {
    PoolConfig::DEFAULT_WORKERS
}
