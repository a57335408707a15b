// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::ops::RangeInclusive;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const WORKERS: RangeInclusive<u32> = 1..=10;
const ATTEMPTS: RangeInclusive<u32> = 0..=10;
const DELAY_SECS: RangeInclusive<u64> = 1..=300;
const THRESHOLD: RangeInclusive<u32> = 1..=10;

const DEFAULT_MAX_WORKERS: u32 = 2;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_DELAY_SECS: u64 = 30;
const DEFAULT_BREAKER_THRESHOLD: u32 = 3;

/// Raw, unvalidated run settings.
///
/// Settings are what configuration sources produce. They become a [`RunConfig`] only after
/// validation, which is the single place range checks happen.
///
/// # Examples
///
/// ```
/// use timecard::{ExecutionMode, RunConfig, RunSettings};
///
/// let settings = RunSettings {
///     parallel: true,
///     max_workers: 4,
///     ..RunSettings::default()
/// };
///
/// let config = RunConfig::try_from(settings)?;
/// assert_eq!(config.mode(), ExecutionMode::Parallel { max_workers: 4 });
/// # Ok::<(), timecard::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Process identifiers concurrently.
    pub parallel: bool,
    /// Worker count used in parallel mode, `1..=10`.
    pub max_workers: u32,
    /// Total attempts per identifier, `0..=10`. Zero behaves as one.
    pub max_attempts: u32,
    /// Fixed wait between attempts in seconds, `1..=300`.
    pub retry_delay_secs: u64,
    /// Consecutive failed attempts that open the circuit, `1..=10`.
    pub circuit_breaker_threshold: u32,
    /// Emit OpenTelemetry counters for the run.
    pub enable_metrics: bool,
    /// Wait a random 1 to 20 minutes before each identifier's first attempt.
    pub stagger: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            parallel: false,
            max_workers: DEFAULT_MAX_WORKERS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            circuit_breaker_threshold: DEFAULT_BREAKER_THRESHOLD,
            enable_metrics: true,
            stagger: false,
        }
    }
}

impl RunSettings {
    /// Validates the settings into an immutable [`RunConfig`].
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first setting outside its permitted range.
    pub fn validate(self) -> Result<RunConfig, ConfigError> {
        RunConfig::try_from(self)
    }
}

/// How identifiers of a run are dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// One identifier at a time, in input order.
    Sequential,
    /// Up to `max_workers` identifiers at a time.
    Parallel {
        /// Number of concurrent workers.
        max_workers: u32,
    },
}

/// Validated, immutable configuration for a [`Runner`][crate::Runner].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    mode: ExecutionMode,
    max_attempts: u32,
    retry_delay: Duration,
    breaker_threshold: u32,
    metrics_enabled: bool,
    stagger: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Sequential,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            breaker_threshold: DEFAULT_BREAKER_THRESHOLD,
            metrics_enabled: true,
            stagger: false,
        }
    }
}

impl RunConfig {
    /// Returns the dispatch mode.
    #[must_use]
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Returns the total number of attempts per identifier, never less than one.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Returns the fixed wait between attempts.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Returns the consecutive-failure threshold of the circuit breaker.
    #[must_use]
    pub fn breaker_threshold(&self) -> u32 {
        self.breaker_threshold
    }

    /// Returns whether OpenTelemetry counters are emitted.
    #[must_use]
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_enabled
    }

    /// Returns whether first attempts are preceded by a random stagger delay.
    #[must_use]
    pub fn stagger(&self) -> bool {
        self.stagger
    }

    /// Returns this configuration with the stagger delay turned off, as for dry runs.
    #[must_use]
    pub fn without_stagger(self) -> Self {
        Self { stagger: false, ..self }
    }
}

impl TryFrom<RunSettings> for RunConfig {
    type Error = ConfigError;

    fn try_from(settings: RunSettings) -> Result<Self, Self::Error> {
        check("max_workers", settings.max_workers, &WORKERS)?;
        check("max_attempts", settings.max_attempts, &ATTEMPTS)?;
        check("retry_delay_secs", settings.retry_delay_secs, &DELAY_SECS)?;
        check("circuit_breaker_threshold", settings.circuit_breaker_threshold, &THRESHOLD)?;

        let mode = if settings.parallel {
            ExecutionMode::Parallel {
                max_workers: settings.max_workers,
            }
        } else {
            ExecutionMode::Sequential
        };

        Ok(Self {
            mode,
            max_attempts: settings.max_attempts,
            retry_delay: Duration::from_secs(settings.retry_delay_secs),
            breaker_threshold: settings.circuit_breaker_threshold,
            metrics_enabled: settings.enable_metrics,
            stagger: settings.stagger,
        })
    }
}

fn check<T>(setting: &'static str, value: T, range: &RangeInclusive<T>) -> Result<(), ConfigError>
where
    T: PartialOrd + Copy + Into<u64>,
{
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::new(setting, value, *range.start(), *range.end()))
    }
}

/// A run setting is outside its permitted range.
#[ohno::error]
#[display("{setting} must be between {min} and {max}, got {value}")]
pub struct ConfigError {
    setting: &'static str,
    value: u64,
    min: u64,
    max: u64,
}

impl ConfigError {
    /// Returns the name of the offending setting.
    #[must_use]
    pub fn setting(&self) -> &'static str {
        self.setting
    }

    /// Returns the rejected value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.value
    }
}
