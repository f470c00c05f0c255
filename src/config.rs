//! Configuration and tuning for the runtime.
//!
//! This module provides:
//! - Hierarchical configuration types with sensible defaults
//! - Validation for guardrail invariants
//! - Layered loading (defaults + environment overrides)
//!
//! Environment variables use the `SPINDLE_` prefix and override the
//! defaults field by field; parsing is intentionally minimal and
//! deterministic.

use core::fmt;

/// Top-level configuration for the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Executor tuning.
    pub executor: ExecutorConfig,
    /// Shared queue tuning.
    pub queue: QueueConfig,
    /// Per-worker ring buffer tuning.
    pub ring: RingConfig,
}

impl RuntimeConfig {
    /// Validates the configuration for basic sanity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.ring.capacity.is_power_of_two() {
            return Err(ConfigError::RingCapacityNotPowerOfTwo);
        }
        if self.ring.capacity < 2 || self.ring.capacity > RingConfig::MAX_CAPACITY {
            return Err(ConfigError::RingCapacityOutOfRange);
        }
        if self.queue.backoff_spin_cap > QueueConfig::MAX_SPIN_CAP {
            return Err(ConfigError::BackoffSpinCapTooLarge);
        }
        Ok(())
    }

    /// Applies `SPINDLE_*` environment overrides on top of `self`.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = env_u64("SPINDLE_INITIAL_TASKS")? {
            self.executor.initial_task_capacity = value as usize;
        }
        if let Some(value) = env_u64("SPINDLE_BACKOFF_THRESHOLD")? {
            self.queue.backoff_threshold =
                u32::try_from(value).map_err(|_| ConfigError::InvalidEnvVar("SPINDLE_BACKOFF_THRESHOLD"))?;
        }
        if let Some(value) = env_u64("SPINDLE_RING_CAPACITY")? {
            self.ring.capacity =
                u32::try_from(value).map_err(|_| ConfigError::InvalidEnvVar("SPINDLE_RING_CAPACITY"))?;
        }
        Ok(())
    }

    /// Defaults, environment overrides, then validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }
}

fn env_u64(name: &'static str) -> Result<Option<u64>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnvVar(name)),
        Err(_) => Ok(None),
    }
}

/// Executor tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Initial capacity reserved for the task table and ready set.
    pub initial_task_capacity: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            initial_task_capacity: 64,
        }
    }
}

/// Shared queue tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// CAS retries tolerated before backoff engages.
    pub backoff_threshold: u32,
    /// Cap on the backoff spin exponent (spins grow as `1 << n`).
    pub backoff_spin_cap: u32,
}

impl QueueConfig {
    /// Largest permitted spin exponent.
    pub const MAX_SPIN_CAP: u32 = 16;
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backoff_threshold: 8,
            backoff_spin_cap: 6,
        }
    }
}

/// Per-worker ring buffer tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingConfig {
    /// Slot count; must be a power of two in `2..=MAX_CAPACITY`.
    pub capacity: u32,
}

impl RingConfig {
    /// Largest permitted ring capacity.
    pub const MAX_CAPACITY: u32 = 1 << 15;
}

impl Default for RingConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

/// Configuration validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Ring capacity must be a power of two.
    RingCapacityNotPowerOfTwo,
    /// Ring capacity outside the supported range.
    RingCapacityOutOfRange,
    /// Backoff spin cap would overflow the spin counter.
    BackoffSpinCapTooLarge,
    /// An environment variable was present but unparseable.
    InvalidEnvVar(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RingCapacityNotPowerOfTwo => write!(f, "ring capacity must be a power of two"),
            Self::RingCapacityOutOfRange => write!(
                f,
                "ring capacity must be within 2..={}",
                RingConfig::MAX_CAPACITY
            ),
            Self::BackoffSpinCapTooLarge => write!(
                f,
                "backoff spin cap must be at most {}",
                QueueConfig::MAX_SPIN_CAP
            ),
            Self::InvalidEnvVar(name) => write!(f, "invalid value for {name}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for crate::error::Error {
    fn from(_: ConfigError) -> Self {
        Self::new(crate::error::ErrorKind::Config)
    }
}
