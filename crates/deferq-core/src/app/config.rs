//! Queue configuration.
//!
//! One explicit struct, built at startup and shared by reference. Nothing in
//! the crate reads process-global toggles.

use std::time::Duration as StdDuration;

use chrono::Duration;

/// Default ceiling on failed attempts for payloads that declare none.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 25;

/// Default lease duration (and upper bound on a single run).
pub const DEFAULT_MAX_RUN_TIME_SECS: i64 = 4 * 60 * 60;

pub const DEFAULT_READ_AHEAD: usize = 5;

pub const DEFAULT_SLEEP_DELAY_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct QueueConfig {
    /// `false` runs jobs inline at enqueue time, bypassing the store.
    pub delay_jobs: bool,
    pub default_priority: i32,
    pub default_queue: Option<String>,
    /// Lease duration: a lease older than this may be taken over.
    pub max_run_time: Duration,
    pub max_attempts: u32,
    /// Candidates fetched per reservation attempt.
    pub read_ahead: usize,
    /// Idle time between polls that found no work.
    pub sleep_delay: StdDuration,
    /// Delete jobs on terminal failure instead of keeping them with `failed_at`.
    pub destroy_failed_jobs: bool,
    /// Queues a worker reserves from. Empty means all.
    pub queues: Vec<String>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            delay_jobs: true,
            default_priority: 0,
            default_queue: None,
            max_run_time: Duration::seconds(DEFAULT_MAX_RUN_TIME_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            read_ahead: DEFAULT_READ_AHEAD,
            sleep_delay: StdDuration::from_secs(DEFAULT_SLEEP_DELAY_SECS),
            destroy_failed_jobs: false,
            queues: Vec::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl QueueConfig {
    /// Read `DEFERQ_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("DEFERQ_DELAY_JOBS") {
            config.delay_jobs = parse_bool("DEFERQ_DELAY_JOBS", &v)?;
        }
        if let Some(v) = lookup("DEFERQ_DEFAULT_PRIORITY") {
            config.default_priority = parse("DEFERQ_DEFAULT_PRIORITY", &v)?;
        }
        if let Some(v) = lookup("DEFERQ_DEFAULT_QUEUE") {
            let v = v.trim();
            config.default_queue = (!v.is_empty()).then(|| v.to_string());
        }
        if let Some(v) = lookup("DEFERQ_MAX_RUN_TIME_SECS") {
            let secs: i64 = parse("DEFERQ_MAX_RUN_TIME_SECS", &v)?;
            config.max_run_time = Duration::try_seconds(secs)
                .filter(|d| *d > Duration::zero() && *d <= Duration::days(365))
                .ok_or_else(|| {
                    invalid("DEFERQ_MAX_RUN_TIME_SECS", &v, "must be between 1s and 365 days")
                })?;
        }
        if let Some(v) = lookup("DEFERQ_MAX_ATTEMPTS") {
            config.max_attempts = parse("DEFERQ_MAX_ATTEMPTS", &v)?;
            if config.max_attempts == 0 {
                return Err(invalid("DEFERQ_MAX_ATTEMPTS", &v, "must be at least 1"));
            }
        }
        if let Some(v) = lookup("DEFERQ_READ_AHEAD") {
            config.read_ahead = parse("DEFERQ_READ_AHEAD", &v)?;
            if config.read_ahead == 0 {
                return Err(invalid("DEFERQ_READ_AHEAD", &v, "must be at least 1"));
            }
        }
        if let Some(v) = lookup("DEFERQ_SLEEP_DELAY_SECS") {
            config.sleep_delay = StdDuration::from_secs(parse("DEFERQ_SLEEP_DELAY_SECS", &v)?);
        }
        if let Some(v) = lookup("DEFERQ_DESTROY_FAILED_JOBS") {
            config.destroy_failed_jobs = parse_bool("DEFERQ_DESTROY_FAILED_JOBS", &v)?;
        }
        if let Some(v) = lookup("DEFERQ_QUEUES") {
            config.queues = v
                .split(',')
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_string)
                .collect();
        }

        Ok(config)
    }
}

fn invalid(key: &'static str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| invalid(key, value, e.to_string()))
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value, "expected a boolean")),
    }
}
