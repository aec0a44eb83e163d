//! Push delivery configuration.

use std::time::Duration;

/// Default FCM HTTP v1 API base URL.
pub const DEFAULT_FCM_API_BASE: &str = "https://fcm.googleapis.com";

/// Default timeout for one provider request, in seconds.
const DEFAULT_FCM_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Default number of dispatch workers.
const DEFAULT_DISPATCH_WORKERS: usize = 4;

/// Default capacity of the dispatch queue.
const DEFAULT_DISPATCH_QUEUE_CAPACITY: usize = 1024;

/// Default number of attempts before a record is marked `FAILED`.
const DEFAULT_MAX_DELIVERY_ATTEMPTS: i32 = 5;

/// Configuration for credential exchange and dispatch.
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// Base URL of the provider API (overridable for tests and proxies).
    pub fcm_api_base: String,
    /// Timeout for each provider and token-exchange request.
    pub request_timeout: Duration,
    /// Path of a service-account JSON file copied into `push_settings` at
    /// startup.
    pub credentials_file: Option<String>,
    /// Number of dispatch worker tasks.
    pub dispatch_workers: usize,
    /// Capacity of the dispatch queue.
    pub queue_capacity: usize,
    /// Attempts after which the sweeper marks a record `FAILED`.
    pub max_delivery_attempts: i32,
    /// Document types whose recipients come from their `assigned_team` field.
    pub team_doctypes: Vec<String>,
}

impl PushConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable                   | Default                      |
    /// |----------------------------|------------------------------|
    /// | `FCM_API_BASE`             | `https://fcm.googleapis.com` |
    /// | `FCM_REQUEST_TIMEOUT_SECS` | `10`                         |
    /// | `FCM_CREDENTIALS_FILE`     | unset                        |
    /// | `DISPATCH_WORKERS`         | `4`                          |
    /// | `DISPATCH_QUEUE_CAPACITY`  | `1024`                       |
    /// | `MAX_DELIVERY_ATTEMPTS`    | `5`                          |
    /// | `TEAM_RECIPIENT_DOCTYPES`  | empty (comma-separated)      |
    pub fn from_env() -> Self {
        Self {
            fcm_api_base: std::env::var("FCM_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_FCM_API_BASE.to_string()),
            request_timeout: Duration::from_secs(
                env_parse("FCM_REQUEST_TIMEOUT_SECS").unwrap_or(DEFAULT_FCM_REQUEST_TIMEOUT_SECS),
            ),
            credentials_file: std::env::var("FCM_CREDENTIALS_FILE")
                .ok()
                .filter(|p| !p.trim().is_empty()),
            dispatch_workers: env_parse("DISPATCH_WORKERS")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(DEFAULT_DISPATCH_WORKERS),
            queue_capacity: env_parse("DISPATCH_QUEUE_CAPACITY")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(DEFAULT_DISPATCH_QUEUE_CAPACITY),
            max_delivery_attempts: env_parse("MAX_DELIVERY_ATTEMPTS")
                .filter(|n: &i32| *n > 0)
                .unwrap_or(DEFAULT_MAX_DELIVERY_ATTEMPTS),
            team_doctypes: std::env::var("TEAM_RECIPIENT_DOCTYPES")
                .map(|v| split_list(&v))
                .unwrap_or_default(),
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            fcm_api_base: DEFAULT_FCM_API_BASE.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_FCM_REQUEST_TIMEOUT_SECS),
            credentials_file: None,
            dispatch_workers: DEFAULT_DISPATCH_WORKERS,
            queue_capacity: DEFAULT_DISPATCH_QUEUE_CAPACITY,
            max_delivery_attempts: DEFAULT_MAX_DELIVERY_ATTEMPTS,
            team_doctypes: Vec::new(),
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
