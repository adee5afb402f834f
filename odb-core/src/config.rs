//! Wait configuration
//!
//! Timeouts and polling settings applied by providers when they build the
//! wait for each lifecycle phase. Durations are written in seconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::wait::{DEFAULT_NOT_FOUND_TOLERANCE, DEFAULT_POLL_INTERVAL};

/// Invalid configuration
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{name} timeout ({timeout:?}) is shorter than the poll interval ({poll_interval:?})")]
    TimeoutTooShort {
        name: &'static str,
        timeout: Duration,
        poll_interval: Duration,
    },
}

/// Per-operation timeouts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    #[serde(with = "seconds")]
    pub create: Duration,
    #[serde(with = "seconds")]
    pub update: Duration,
    #[serde(with = "seconds")]
    pub delete: Duration,
}

/// Default for every operation
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: DEFAULT_TIMEOUT,
            update: DEFAULT_TIMEOUT,
            delete: DEFAULT_TIMEOUT,
        }
    }
}

/// Settings shared by every wait a provider runs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    pub timeouts: Timeouts,

    #[serde(with = "seconds")]
    pub poll_interval: Duration,

    /// "Not found" answers tolerated while a new or updated resource
    /// becomes visible
    pub not_found_tolerance: u32,

    /// "Not found" answers required before a deleted resource counts as gone
    pub delete_not_found_tolerance: u32,

    /// Consecutive settled observations required after a mutation
    pub continuous_target_occurrence: u32,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            timeouts: Timeouts::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            not_found_tolerance: DEFAULT_NOT_FOUND_TOLERANCE,
            delete_not_found_tolerance: 0,
            continuous_target_occurrence: 1,
        }
    }
}

impl WaitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Zero("poll_interval"));
        }
        if self.continuous_target_occurrence == 0 {
            return Err(ConfigError::Zero("continuous_target_occurrence"));
        }
        for (name, timeout) in [
            ("create", self.timeouts.create),
            ("update", self.timeouts.update),
            ("delete", self.timeouts.delete),
        ] {
            if timeout < self.poll_interval {
                return Err(ConfigError::TimeoutTooShort {
                    name,
                    timeout,
                    poll_interval: self.poll_interval,
                });
            }
        }
        Ok(())
    }
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
