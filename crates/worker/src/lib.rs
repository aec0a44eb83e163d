//! Standalone push worker.
//!
//! Runs a dispatch queue and the retry sweeper against the shared database,
//! so records created by any API instance are delivered even when that
//! instance's own queue dropped them or the process died mid-dispatch.

use std::time::Duration;

use beacon_events::sweeper::{DEFAULT_RETRY_MIN_AGE, DEFAULT_SWEEP_BATCH, DEFAULT_SWEEP_INTERVAL};
use beacon_events::PushConfig;

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Time between sweeps.
    pub sweep_interval: Duration,
    /// Idle time before a `NEW` record is retried.
    pub retry_min_age: Duration,
    /// Maximum records re-enqueued per sweep.
    pub sweep_batch: i64,
    /// Emit JSON log lines instead of human-readable ones.
    pub json_logs: bool,
    pub push: PushConfig,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var               | Default |
    /// |-----------------------|---------|
    /// | `SWEEP_INTERVAL_SECS` | `30`    |
    /// | `RETRY_MIN_AGE_SECS`  | `60`    |
    /// | `SWEEP_BATCH_SIZE`    | `200`   |
    /// | `LOG_FORMAT`          | `text`  |
    ///
    /// Push settings are read by [`PushConfig::from_env`].
    pub fn from_env() -> Self {
        Self {
            sweep_interval: env_secs("SWEEP_INTERVAL_SECS").unwrap_or(DEFAULT_SWEEP_INTERVAL),
            retry_min_age: env_secs("RETRY_MIN_AGE_SECS").unwrap_or(DEFAULT_RETRY_MIN_AGE),
            sweep_batch: std::env::var("SWEEP_BATCH_SIZE")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .filter(|n: &i64| *n > 0)
                .unwrap_or(DEFAULT_SWEEP_BATCH),
            json_logs: std::env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
            push: PushConfig::from_env(),
        }
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}
