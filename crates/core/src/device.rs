//! Device registration types.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::UserId;

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

pub const PLATFORM_ANDROID: &str = "android";
pub const PLATFORM_IOS: &str = "ios";

/// Mobile platform of a registered device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Android => PLATFORM_ANDROID,
            Self::Ios => PLATFORM_IOS,
        }
    }

    /// Parse case-insensitively (`"Android"`, `"IOS"` are accepted).
    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s.trim().to_lowercase().as_str() {
            PLATFORM_ANDROID => Ok(Self::Android),
            PLATFORM_IOS => Ok(Self::Ios),
            _ => Err(CoreError::Validation(
                "Platform must be either 'android' or 'ios'".into(),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Registration request
// ---------------------------------------------------------------------------

/// Body of `POST /api/v1/devices/register`, as sent by the mobile app.
///
/// Every field is optional at the wire level so that missing values are
/// reported through [`DeviceRegistrationRequest::validate`] rather than as a
/// deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRegistrationRequest {
    pub device_id: Option<String>,
    pub fcm_token: Option<String>,
    pub platform: Option<String>,
    pub device_model: Option<String>,
    pub device_name: Option<String>,
    pub os_version: Option<String>,
}

/// A validated registration, ready to upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDeviceRegistration {
    pub user: UserId,
    pub device_id: String,
    pub push_token: String,
    pub platform: Platform,
    pub device_name: Option<String>,
    pub device_model: Option<String>,
    pub os_version: Option<String>,
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, CoreError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CoreError::Validation(format!("Missing required field: {field}")))
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl DeviceRegistrationRequest {
    /// Check required fields and the platform for the acting `user`.
    pub fn validate(&self, user: &str) -> Result<NewDeviceRegistration, CoreError> {
        let device_id = required(&self.device_id, "deviceId")?;
        let push_token = required(&self.fcm_token, "fcmToken")?;
        let platform = Platform::from_str(required(&self.platform, "platform")?)?;

        Ok(NewDeviceRegistration {
            user: user.to_string(),
            device_id: device_id.to_string(),
            push_token: push_token.to_string(),
            platform,
            device_name: optional(&self.device_name),
            device_model: optional(&self.device_model),
            os_version: optional(&self.os_version),
        })
    }
}
