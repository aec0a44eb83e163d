//! Provider credential exchange.
//!
//! A stored service-account JSON blob is turned into a short-lived bearer
//! token: the account's RSA key signs an RS256 JWT assertion, which is
//! exchanged at the account's token endpoint using the OAuth2 JWT-bearer
//! grant. Tokens are acquired per dispatch and never cached.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::store::{SettingsStore, StoreError};

/// OAuth2 scope granting access to the FCM HTTP v1 API.
pub const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

/// Token endpoint used when the service account does not name one.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Grant type of the JWT-bearer token exchange.
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for the signed assertion, in seconds.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for credential failures. All of them abort the dispatch.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// No service account has been configured.
    #[error("Push provider credentials are not configured")]
    Missing,

    /// The blob is not JSON or lacks a required field.
    #[error("Malformed service account credentials: {0}")]
    Malformed(String),

    /// The private key is not a usable PEM RSA key.
    #[error("Invalid service account private key: {0}")]
    InvalidKey(#[from] jsonwebtoken::errors::Error),

    /// The token endpoint could not be reached or refused the assertion.
    #[error("Token exchange failed: {0}")]
    Exchange(String),

    /// The stored blob could not be read.
    #[error("Failed to load credentials: {0}")]
    Storage(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The fields of a service-account key file that the exchange needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub project_id: String,
    pub private_key: String,
    pub client_email: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccount {
    /// Parse and check a service-account JSON blob.
    pub fn parse(blob: &str) -> Result<Self, CredentialError> {
        let value: serde_json::Value = serde_json::from_str(blob)
            .map_err(|e| CredentialError::Malformed(format!("not valid JSON: {e}")))?;

        for field in ["project_id", "private_key", "client_email"] {
            let present = value
                .get(field)
                .and_then(serde_json::Value::as_str)
                .is_some_and(|v| !v.trim().is_empty());
            if !present {
                return Err(CredentialError::Malformed(format!(
                    "missing required field '{field}'"
                )));
            }
        }

        serde_json::from_value(value).map_err(|e| CredentialError::Malformed(e.to_string()))
    }

    pub fn token_uri(&self) -> &str {
        self.token_uri
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(DEFAULT_TOKEN_URI)
    }
}

/// A bearer token for the provider API plus the project it addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub project_id: String,
    pub expires_in: Option<u64>,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

// ---------------------------------------------------------------------------
// CredentialProvider
// ---------------------------------------------------------------------------

/// Exchanges service-account credentials for bearer tokens.
#[derive(Clone)]
pub struct CredentialProvider {
    client: reqwest::Client,
}

impl CredentialProvider {
    /// Create a provider whose exchange requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Build the signed RS256 assertion for `account`.
    pub fn sign_assertion(account: &ServiceAccount) -> Result<String, CredentialError> {
        let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())?;

        let iat = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &account.client_email,
            scope: FCM_SCOPE,
            aud: account.token_uri(),
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = account.private_key_id.clone();

        Ok(jsonwebtoken::encode(&header, &claims, &key)?)
    }

    /// Exchange a service-account blob for a bearer token.
    ///
    /// Parsing and signing happen before any network call, so a malformed
    /// blob or key never reaches the token endpoint.
    pub async fn acquire_token(&self, blob: &str) -> Result<AccessToken, CredentialError> {
        let account = ServiceAccount::parse(blob)?;
        let assertion = Self::sign_assertion(&account)?;

        let response = self
            .client
            .post(account.token_uri())
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| CredentialError::Exchange(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CredentialError::Exchange(format!(
                "token endpoint returned HTTP {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::Exchange(format!("unreadable token response: {e}")))?;

        tracing::debug!(
            project_id = %account.project_id,
            expires_in = ?token.expires_in,
            "Acquired push provider access token"
        );

        Ok(AccessToken {
            token: token.access_token,
            project_id: account.project_id,
            expires_in: token.expires_in,
        })
    }
}

// ---------------------------------------------------------------------------
// TokenSource
// ---------------------------------------------------------------------------

/// Supplies a bearer token for one dispatch.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<AccessToken, CredentialError>;
}

/// Reads the blob from settings storage and exchanges it on every call.
pub struct StoredCredentialSource {
    settings: Arc<dyn SettingsStore>,
    provider: CredentialProvider,
}

impl StoredCredentialSource {
    pub fn new(settings: Arc<dyn SettingsStore>, provider: CredentialProvider) -> Self {
        Self { settings, provider }
    }
}

#[async_trait]
impl TokenSource for StoredCredentialSource {
    async fn access_token(&self) -> Result<AccessToken, CredentialError> {
        let blob = self
            .settings
            .service_account_json()
            .await?
            .filter(|b| !b.trim().is_empty())
            .ok_or(CredentialError::Missing)?;
        self.provider.acquire_token(&blob).await
    }
}
