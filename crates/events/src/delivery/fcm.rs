//! FCM HTTP v1 client.
//!
//! [`FcmClient`] sends one notification to one device token per request:
//! `POST {api_base}/v1/projects/{project_id}/messages:send` with a bearer
//! token. Only HTTP 200 counts as success.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::DEFAULT_FCM_API_BASE;
use crate::delivery::credential::AccessToken;

/// Longest response body kept in an error message.
const MAX_ERROR_BODY_LEN: usize = 512;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for a single provider send.
#[derive(Debug, thiserror::Error)]
pub enum FcmError {
    /// The HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered with something other than HTTP 200.
    #[error("FCM returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

impl FcmError {
    /// HTTP status of the provider response, when there was one.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            Self::Status { status, .. } => Some(*status),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    message: Message<'a>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    token: &'a str,
    notification: Notification<'a>,
}

#[derive(Debug, Serialize)]
struct Notification<'a> {
    title: &'a str,
    body: &'a str,
}

// ---------------------------------------------------------------------------
// PushTransport
// ---------------------------------------------------------------------------

/// Sends one notification to one device token.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Returns the provider's HTTP status on success.
    async fn send(
        &self,
        access: &AccessToken,
        device_token: &str,
        title: &str,
        body: &str,
    ) -> Result<u16, FcmError>;
}

/// The FCM HTTP v1 transport.
#[derive(Clone)]
pub struct FcmClient {
    client: reqwest::Client,
    api_base: String,
}

impl FcmClient {
    /// Create a client for `api_base` whose requests time out after `timeout`.
    pub fn new(api_base: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create a client for the public FCM endpoint.
    pub fn public(timeout: Duration) -> Result<Self, reqwest::Error> {
        Self::new(DEFAULT_FCM_API_BASE, timeout)
    }

    pub fn send_url(&self, project_id: &str) -> String {
        format!("{}/v1/projects/{project_id}/messages:send", self.api_base)
    }
}

#[async_trait]
impl PushTransport for FcmClient {
    async fn send(
        &self,
        access: &AccessToken,
        device_token: &str,
        title: &str,
        body: &str,
    ) -> Result<u16, FcmError> {
        let payload = SendRequest {
            message: Message {
                token: device_token,
                notification: Notification { title, body },
            },
        };

        let response = self
            .client
            .post(self.send_url(&access.project_id))
            .bearer_auth(&access.token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let mut text = response.text().await.unwrap_or_default();
            if text.len() > MAX_ERROR_BODY_LEN {
                let mut cut = MAX_ERROR_BODY_LEN;
                while !text.is_char_boundary(cut) {
                    cut -= 1;
                }
                text.truncate(cut);
            }
            return Err(FcmError::Status {
                status: status.as_u16(),
                body: text.trim().to_string(),
            });
        }

        Ok(status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use assert_matches::assert_matches;
    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::Value;

    type Seen = Arc<Mutex<Vec<(String, Option<String>, Value)>>>;

    fn access() -> AccessToken {
        AccessToken {
            token: "ya29.test".into(),
            project_id: "beacon-test".into(),
            expires_in: Some(3600),
        }
    }

    /// Mock provider: records requests and rejects the token `"gone"` with 404.
    async fn mock_provider() -> (String, Seen) {
        let seen: Seen = Arc::default();
        let router = Router::new()
            .route(
                "/v1/projects/{project}/messages:send",
                post(
                    |State(seen): State<Seen>,
                     Path(project): Path<String>,
                     headers: HeaderMap,
                     Json(body): Json<Value>| async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        let gone = body["message"]["token"] == "gone";
                        seen.lock().unwrap().push((project, auth, body));
                        if gone {
                            (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": "UNREGISTERED"})))
                        } else {
                            (StatusCode::OK, Json(serde_json::json!({"name": "projects/beacon-test/messages/1"})))
                        }
                    },
                ),
            )
            .with_state(seen.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{addr}"), seen)
    }

    #[tokio::test]
    async fn sends_notification_with_bearer_token() {
        let (base, seen) = mock_provider().await;
        let client = FcmClient::new(base, Duration::from_secs(5)).unwrap();

        let status = client
            .send(&access(), "device-1", "Task approved", "Replace pump")
            .await
            .unwrap();
        assert_eq!(status, 200);

        let seen = seen.lock().unwrap();
        let (project, auth, body) = &seen[0];
        assert_eq!(project, "beacon-test");
        assert_eq!(auth.as_deref(), Some("Bearer ya29.test"));
        assert_eq!(body["message"]["token"], "device-1");
        assert_eq!(body["message"]["notification"]["title"], "Task approved");
        assert_eq!(body["message"]["notification"]["body"], "Replace pump");
    }

    #[tokio::test]
    async fn non_200_is_a_status_error() {
        let (base, _seen) = mock_provider().await;
        let client = FcmClient::new(base, Duration::from_secs(5)).unwrap();

        let err = client.send(&access(), "gone", "t", "b").await.unwrap_err();
        assert_matches!(err, FcmError::Status { status: 404, ref body } if body.contains("UNREGISTERED"));
        assert_eq!(err.http_status(), Some(404));
    }

    #[tokio::test]
    async fn unreachable_provider_is_a_request_error() {
        let client = FcmClient::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = client.send(&access(), "device-1", "t", "b").await.unwrap_err();
        assert_matches!(err, FcmError::Request(_));
        assert_eq!(err.http_status(), None);
    }

    #[test]
    fn send_url_uses_project_id() {
        let client = FcmClient::public(Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.send_url("p1"),
            "https://fcm.googleapis.com/v1/projects/p1/messages:send"
        );
    }
}
