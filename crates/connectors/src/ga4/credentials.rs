//! Google service account credentials
//!
//! Access tokens come from the OAuth 2.0 JWT bearer grant: a short RS256
//! assertion signed with the service account key is exchanged at the key's
//! `token_uri`. Tokens are cached and refreshed shortly before they expire.
//!
//! The key file is read on first use, not at construction, so a missing or
//! broken file surfaces on the request that needs it.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::ConnectorError;

/// Read-only Analytics scope
pub const ANALYTICS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/analytics.readonly";

/// Grant type for the JWT bearer exchange
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Assertion lifetime; Google caps it at one hour
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Refresh cached tokens this long before they expire
pub const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The fields of a service account key file that the exchange needs
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccountKey {
    /// Parse a key from its JSON text
    pub fn from_json(json: &str) -> Result<Self, ConnectorError> {
        let key: ServiceAccountKey = serde_json::from_str(json)
            .map_err(|e| ConnectorError::Credentials(format!("invalid service account key: {}", e)))?;

        if key.client_email.is_empty() || key.private_key.is_empty() {
            return Err(ConnectorError::Credentials(
                "service account key lacks client_email or private_key".to_string(),
            ));
        }
        Ok(key)
    }

    /// Read and parse a key file
    pub async fn load(path: &Path) -> Result<Self, ConnectorError> {
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            ConnectorError::Credentials(format!(
                "cannot read credentials file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&contents)
    }
}

/// JWT claims of the bearer assertion
#[derive(Debug, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// Sign an RS256 assertion for `scope`, issued at `now` (unix seconds)
pub fn build_assertion(
    key: &ServiceAccountKey,
    scope: &str,
    now: i64,
) -> Result<String, ConnectorError> {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = key.private_key_id.clone();

    let claims = AssertionClaims {
        iss: key.client_email.clone(),
        scope: scope.to_string(),
        aud: key.token_uri.clone(),
        iat: now,
        exp: now + ASSERTION_LIFETIME_SECS,
    };

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
        .map_err(|e| ConnectorError::Credentials(format!("invalid private key: {}", e)))?;

    encode(&header, &claims, &encoding_key)
        .map_err(|e| ConnectorError::Credentials(format!("cannot sign assertion: {}", e)))
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now + TOKEN_REFRESH_MARGIN < self.expires_at
    }
}

enum TokenSource {
    Static(String),
    ServiceAccount {
        credentials_file: PathBuf,
        scope: String,
    },
}

/// Supplies bearer tokens for API calls
pub struct TokenProvider {
    source: TokenSource,
    http: reqwest::Client,
    cache: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    /// Always hand out `token`
    pub fn fixed(token: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            source: TokenSource::Static(token.into()),
            http,
            cache: Mutex::new(None),
        }
    }

    /// Exchange service account assertions from `credentials_file`
    pub fn service_account(
        credentials_file: impl Into<PathBuf>,
        scope: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            source: TokenSource::ServiceAccount {
                credentials_file: credentials_file.into(),
                scope: scope.into(),
            },
            http,
            cache: Mutex::new(None),
        }
    }

    /// Current access token, exchanging a new one when needed
    ///
    /// Concurrent callers wait on the same exchange.
    pub async fn access_token(&self) -> Result<String, ConnectorError> {
        let (credentials_file, scope) = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::ServiceAccount {
                credentials_file,
                scope,
            } => (credentials_file, scope),
        };

        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.as_ref()
            && token.is_fresh(Instant::now())
        {
            return Ok(token.value.clone());
        }

        let key = ServiceAccountKey::load(credentials_file).await?;
        let token = self.exchange(&key, scope).await?;
        let value = token.value.clone();
        *cache = Some(token);
        Ok(value)
    }

    async fn exchange(
        &self,
        key: &ServiceAccountKey,
        scope: &str,
    ) -> Result<CachedToken, ConnectorError> {
        let assertion = build_assertion(key, scope, Utc::now().timestamp())?;

        let response = self
            .http
            .post(&key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| ConnectorError::Token(format!("token endpoint unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConnectorError::Token(format!(
                "token endpoint returned {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ConnectorError::Token(format!("invalid token response: {}", e)))?;

        debug!(
            client_email = %key.client_email,
            expires_in = token.expires_in,
            "access token refreshed"
        );

        Ok(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }
}
