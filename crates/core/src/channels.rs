//! Notification channel names.
//!
//! These must match the values stored in the `notification_rules.channel`
//! column. Only [`NotificationChannel::Push`] rules are handled by the push
//! fan-out pipeline; the other channels are delivered elsewhere.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Push notification delivered to registered mobile devices.
pub const CHANNEL_PUSH: &str = "push";

/// Email notification.
pub const CHANNEL_EMAIL: &str = "email";

/// Slack message.
pub const CHANNEL_SLACK: &str = "slack";

/// In-app system notification.
pub const CHANNEL_SYSTEM_NOTIFICATION: &str = "system_notification";

/// SMS text message.
pub const CHANNEL_SMS: &str = "sms";

/// Delivery channel configured on a notification rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Email,
    Slack,
    SystemNotification,
    Sms,
    Push,
}

impl NotificationChannel {
    /// Return the wire-format string for this variant.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => CHANNEL_EMAIL,
            Self::Slack => CHANNEL_SLACK,
            Self::SystemNotification => CHANNEL_SYSTEM_NOTIFICATION,
            Self::Sms => CHANNEL_SMS,
            Self::Push => CHANNEL_PUSH,
        }
    }

    /// Parse from a wire-format string.
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            CHANNEL_EMAIL => Ok(Self::Email),
            CHANNEL_SLACK => Ok(Self::Slack),
            CHANNEL_SYSTEM_NOTIFICATION => Ok(Self::SystemNotification),
            CHANNEL_SMS => Ok(Self::Sms),
            CHANNEL_PUSH => Ok(Self::Push),
            other => Err(CoreError::Validation(format!(
                "Unknown notification channel: '{other}'"
            ))),
        }
    }
}
