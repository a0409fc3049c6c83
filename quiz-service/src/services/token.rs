//! Bearer tokens for Vertex AI via the OAuth 2.0 JWT-bearer grant.
//!
//! A service-account key signs a short-lived RS256 assertion which is then
//! exchanged at the token endpoint for an access token. No caching: every
//! call performs a fresh exchange.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use service_core::retry::{retry_call, RetryConfig, Transient};
use thiserror::Error;
use tracing::instrument;

pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Invalid service account key: {0}")]
    InvalidKey(String),

    #[error("Failed to sign assertion: {0}")]
    Signing(String),

    #[error("Token endpoint unreachable: {0}")]
    Network(String),

    #[error("Token endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Token endpoint returned an unreadable response: {0}")]
    InvalidResponse(String),

    #[error("Token response did not contain an access_token")]
    MissingToken,
}

impl Transient for TokenError {
    fn is_transient(&self) -> bool {
        match self {
            TokenError::Network(_) => true,
            TokenError::Rejected { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// The parts of a Google service-account key file this service uses.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: Secret<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> Result<Self, TokenError> {
        let key: ServiceAccountKey =
            serde_json::from_str(json).map_err(|e| TokenError::InvalidKey(e.to_string()))?;

        if key.client_email.trim().is_empty() {
            return Err(TokenError::InvalidKey("client_email is empty".to_string()));
        }

        Ok(key)
    }

    pub fn encoding_key(&self) -> Result<EncodingKey, TokenError> {
        EncodingKey::from_rsa_pem(self.private_key.expose_secret().as_bytes())
            .map_err(|e| TokenError::InvalidKey(format!("private_key is not an RSA PEM key: {}", e)))
    }
}

/// Claims of the signed assertion sent to the token endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl AssertionClaims {
    pub fn new(client_email: &str, audience: &str, now: DateTime<Utc>) -> Self {
        Self {
            iss: client_email.to_string(),
            scope: CLOUD_PLATFORM_SCOPE.to_string(),
            aud: audience.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ASSERTION_LIFETIME_SECS)).timestamp(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// Source of bearer tokens for the AI endpoint.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, TokenError>;
}

/// Exchanges a signed service-account assertion for an access token.
pub struct ServiceAccountTokenProvider {
    client_email: String,
    encoding_key: EncodingKey,
    token_uri: String,
    client: Client,
    retry: RetryConfig,
}

impl ServiceAccountTokenProvider {
    pub fn new(
        key: &ServiceAccountKey,
        token_uri: impl Into<String>,
        client: Client,
        retry: RetryConfig,
    ) -> Result<Self, TokenError> {
        Ok(Self {
            client_email: key.client_email.clone(),
            encoding_key: key.encoding_key()?,
            token_uri: token_uri.into(),
            client,
            retry,
        })
    }

    fn sign_assertion(&self, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = AssertionClaims::new(&self.client_email, &self.token_uri, now);
        encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    async fn exchange(&self) -> Result<String, TokenError> {
        let assertion = self.sign_assertion(Utc::now())?;

        let response = self
            .client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| TokenError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TokenError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| {
                if e.is_decode() {
                    TokenError::InvalidResponse(e.to_string())
                } else {
                    TokenError::Network(format!("Failed to read token response: {}", e))
                }
            })?;

        token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(TokenError::MissingToken)
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountTokenProvider {
    #[instrument(skip(self), fields(client_email = %self.client_email))]
    async fn access_token(&self) -> Result<String, TokenError> {
        let token = retry_call(&self.retry, "token_exchange", || self.exchange()).await?;
        tracing::debug!("Obtained access token");
        Ok(token)
    }
}

/// Hands out a fixed token; for tests and local runs against a stub endpoint.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String, TokenError> {
        Ok(self.token.clone())
    }
}
