// src/config.rs

use std::env;
use std::time::Duration;

use dotenvy::dotenv;

/// Number of violations that disqualifies a session.
pub const VIOLATION_THRESHOLD: u32 = 3;

/// Suffix appended to the stored student name on disqualification.
pub const DISQUALIFIED_TAG: &str = " [DISQUALIFIED]";

/// Runtime tuning for one exam session.
///
/// Loosening `heartbeat_interval` trades monitoring resolution for
/// write volume against the remote store; the timekeeper tick and the
/// autosave debounce are local-only and cheap.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Violations tolerated before forced disqualification.
    pub violation_threshold: u32,

    /// Timekeeper cadence. Remaining time is recomputed from the
    /// absolute deadline each tick, so this only bounds detection
    /// latency, not accuracy.
    pub tick_interval: Duration,

    /// Cadence of live-session pushes while ACTIVE.
    pub heartbeat_interval: Duration,

    /// Extra attempts after a failed heartbeat push, with a fixed
    /// backoff between them.
    pub heartbeat_retry_limit: u32,
    pub heartbeat_backoff: Duration,

    /// Quiet period after the last answer mutation before the draft
    /// is written to local storage.
    pub autosave_debounce: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            violation_threshold: VIOLATION_THRESHOLD,
            tick_interval: Duration::from_secs(1),
            heartbeat_interval: Duration::from_secs(2),
            heartbeat_retry_limit: 2,
            heartbeat_backoff: Duration::from_millis(500),
            autosave_debounce: Duration::from_secs(1),
        }
    }
}

impl SessionConfig {
    /// Loads configuration from the environment, falling back to the
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        dotenv().ok();

        let defaults = Self::default();

        Self {
            violation_threshold: env_u32("INVIGILATOR_VIOLATION_THRESHOLD")
                .unwrap_or(defaults.violation_threshold),
            tick_interval: env_millis("INVIGILATOR_TICK_INTERVAL_MS")
                .unwrap_or(defaults.tick_interval),
            heartbeat_interval: env_millis("INVIGILATOR_HEARTBEAT_INTERVAL_MS")
                .unwrap_or(defaults.heartbeat_interval),
            heartbeat_retry_limit: env_u32("INVIGILATOR_HEARTBEAT_RETRIES")
                .unwrap_or(defaults.heartbeat_retry_limit),
            heartbeat_backoff: env_millis("INVIGILATOR_HEARTBEAT_BACKOFF_MS")
                .unwrap_or(defaults.heartbeat_backoff),
            autosave_debounce: env_millis("INVIGILATOR_AUTOSAVE_DEBOUNCE_MS")
                .unwrap_or(defaults.autosave_debounce),
        }
    }
}

fn env_u32(key: &str) -> Option<u32> {
    env::var(key).ok()?.parse().ok()
}

fn env_millis(key: &str) -> Option<Duration> {
    let ms: u64 = env::var(key).ok()?.parse().ok()?;
    Some(Duration::from_millis(ms))
}
