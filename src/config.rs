//! Configuration types for reportfetch

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Rate window for one operation class
///
/// Each class (create, poll, fetch) allows `burst_capacity` requests with
/// at least `min_spacing` between consecutive requests; once a full burst
/// has been used, the class pays `cooldown` before the counter resets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateWindowConfig {
    /// Requests allowed in one burst (default: 15)
    #[serde(default = "default_burst_capacity")]
    pub burst_capacity: u32,

    /// Minimum spacing between consecutive requests
    #[serde(with = "duration_ms_serde")]
    pub min_spacing: Duration,

    /// Mandatory pause after a burst is exhausted
    #[serde(with = "duration_ms_serde")]
    pub cooldown: Duration,
}

impl RateWindowConfig {
    /// Construct a window from raw parts
    pub fn new(burst_capacity: u32, min_spacing: Duration, cooldown: Duration) -> Self {
        Self {
            burst_capacity,
            min_spacing,
            cooldown,
        }
    }
}

/// Rate limiter configuration: one window per operation class
///
/// Defaults match the vendor limits the engine was written against:
/// one CREATE per minute, two POLLs per second, one FETCH per minute,
/// each in bursts of 15 with a one-minute pause after a burst.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Whether rate limiting is applied at all (default: true)
    ///
    /// Disabled, every request is admitted immediately. Useful for
    /// low-volume or manual operation.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Window for CREATE requests
    #[serde(default = "default_create_window")]
    pub create: RateWindowConfig,

    /// Window for POLL requests
    #[serde(default = "default_poll_window")]
    pub poll: RateWindowConfig,

    /// Window for FETCH requests
    #[serde(default = "default_fetch_window")]
    pub fetch: RateWindowConfig,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            create: default_create_window(),
            poll: default_poll_window(),
            fetch: default_fetch_window(),
        }
    }
}

impl RateLimitConfig {
    /// A configuration with rate limiting switched off
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Retry configuration for the caller-side retry helper
///
/// The engine itself never retries; callers wrap `retrieve` with
/// [`retrieve_with_retry`](crate::retry::retrieve_with_retry) when they
/// want to.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_ms_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_ms_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_burst_capacity() -> u32 {
    15
}

fn default_create_window() -> RateWindowConfig {
    RateWindowConfig::new(15, Duration::from_secs(60), Duration::from_secs(60))
}

fn default_poll_window() -> RateWindowConfig {
    RateWindowConfig::new(15, Duration::from_millis(500), Duration::from_secs(60))
}

fn default_fetch_window() -> RateWindowConfig {
    RateWindowConfig::new(15, Duration::from_secs(60), Duration::from_secs(60))
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper (whole milliseconds)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
