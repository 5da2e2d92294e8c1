//! Process-level configuration for the background job subsystem.
//!
//! Values are read once at startup from the environment. Unset variables use
//! the defaults; malformed ones are logged and also fall back to the defaults,
//! so a typo never prevents a service from starting.

use std::time::Duration;

use thiserror::Error;
use tracing::warn;

pub const ENV_QUEUE_CAPACITY: &str = "BEDROCK_JOB_QUEUE_CAPACITY";
pub const ENV_POLL_INTERVAL_MS: &str = "BEDROCK_JOB_POLL_INTERVAL_MS";
pub const ENV_WORKER_NAME: &str = "BEDROCK_JOB_WORKER_NAME";

pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_WORKER_NAME: &str = "job-worker";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Job queue / worker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobQueueConfig {
    /// Maximum number of jobs waiting to run
    pub capacity: usize,
    /// Longest the worker blocks waiting for the next job
    pub poll_interval: Duration,
    /// Worker thread name, also used as the `worker` log field
    pub name: String,
}

impl Default for JobQueueConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            poll_interval: DEFAULT_POLL_INTERVAL,
            name: DEFAULT_WORKER_NAME.to_string(),
        }
    }
}

impl JobQueueConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let capacity = parse_or_default(&lookup, ENV_QUEUE_CAPACITY, defaults.capacity, |raw| {
            match raw.parse::<usize>() {
                Ok(0) => Err("must be at least 1".to_string()),
                Ok(n) => Ok(n),
                Err(e) => Err(e.to_string()),
            }
        });

        let poll_interval =
            parse_or_default(&lookup, ENV_POLL_INTERVAL_MS, defaults.poll_interval, |raw| {
                match raw.parse::<u64>() {
                    Ok(0) => Err("must be at least 1".to_string()),
                    Ok(ms) => Ok(Duration::from_millis(ms)),
                    Err(e) => Err(e.to_string()),
                }
            });

        let name = lookup(ENV_WORKER_NAME)
            .map(|raw| raw.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or(defaults.name);

        Self {
            capacity,
            poll_interval,
            name,
        }
    }

    /// Reject settings the worker cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Invalid {
                key: ENV_QUEUE_CAPACITY,
                reason: "must be at least 1".to_string(),
            });
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::Invalid {
                key: ENV_POLL_INTERVAL_MS,
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_or_default<T: core::fmt::Debug>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
    parse: impl FnOnce(&str) -> Result<T, String>,
) -> T {
    let Some(raw) = lookup(key) else {
        return default;
    };

    match parse(raw.trim()) {
        Ok(value) => value,
        Err(reason) => {
            warn!(key, value = %raw, reason = %reason, default = ?default, "invalid setting; using default");
            default
        }
    }
}
