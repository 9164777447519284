//! OAuth access tokens for the warehouse and drive APIs.
//!
//! A [`TokenSource`] is either a pre-minted static token or a service
//! account key that signs an RS256 JWT assertion and exchanges it at the
//! key's `token_uri` (the JWT-bearer grant). Minted tokens are cached
//! until shortly before they expire.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::CredentialsConfig;

/// Run BigQuery jobs and read their results.
pub const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery";

/// Create files in Drive and manage the ones this app created.
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each assertion (Google caps this at one hour).
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Tokens are refreshed this long before their reported expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("failed to read credential file {path}: {source}")]
    ReadKey {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid service account key: {0}")]
    InvalidKey(String),

    #[error("no credentials configured")]
    NotConfigured,

    #[error("failed to sign token assertion: {0}")]
    Sign(#[from] jsonwebtoken::errors::Error),

    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("token endpoint returned {status}: {body}")]
    TokenEndpoint { status: u16, body: String },
}

// ---------------------------------------------------------------------------
// Service account key
// ---------------------------------------------------------------------------

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The fields of a Google service account JSON key that token minting needs.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type", default)]
    pub key_type: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub private_key: String,
    pub client_email: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key_id", &self.private_key_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self, AuthError> {
        let raw = std::fs::read_to_string(path).map_err(|source| AuthError::ReadKey {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, AuthError> {
        let key: Self =
            serde_json::from_str(raw).map_err(|e| AuthError::InvalidKey(e.to_string()))?;
        if let Some(kind) = key.key_type.as_deref() {
            if kind != "service_account" {
                return Err(AuthError::InvalidKey(format!(
                    "expected type \"service_account\", got \"{kind}\""
                )));
            }
        }
        Ok(key)
    }
}

// ---------------------------------------------------------------------------
// Service account token provider
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct AssertionClaims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Mints access tokens from a service account key for one OAuth scope.
pub struct ServiceAccountTokenProvider {
    key: ServiceAccountKey,
    scope: String,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenProvider {
    pub fn new(key: ServiceAccountKey, scope: &str) -> Self {
        Self {
            key,
            scope: scope.to_string(),
            http: reqwest::Client::new(),
            cached: Mutex::new(None),
        }
    }

    pub fn key(&self) -> &ServiceAccountKey {
        &self.key
    }

    /// Build and sign the JWT assertion presented to the token endpoint.
    pub fn assertion(&self, now: DateTime<Utc>) -> Result<String, AuthError> {
        let claims = AssertionClaims {
            iss: self.key.client_email.clone(),
            scope: self.scope.clone(),
            aud: self.key.token_uri.clone(),
            iat: now.timestamp(),
            exp: now.timestamp() + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key.private_key_id.clone();

        let encoding_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())?;
        Ok(jsonwebtoken::encode(&header, &claims, &encoding_key)?)
    }

    /// Return a cached token, or exchange a fresh assertion for one.
    pub async fn access_token(&self) -> Result<String, AuthError> {
        let mut cached = self.cached.lock().await;
        let now = Utc::now();

        if let Some(tok) = cached.as_ref() {
            if tok.expires_at > now {
                return Ok(tok.token.clone());
            }
        }

        let assertion = self.assertion(now)?;
        debug!(token_uri = %self.key.token_uri, scope = %self.scope, "Requesting access token");

        let resp = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::TokenEndpoint {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TokenResponse = resp.json().await?;
        let lifetime = parsed.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS);
        let expires_at = now + Duration::seconds((lifetime - EXPIRY_MARGIN_SECS).max(0));

        info!(
            client_email = %self.key.client_email,
            scope = %self.scope,
            expires_in = lifetime,
            "Access token minted"
        );

        *cached = Some(CachedToken {
            token: parsed.access_token.clone(),
            expires_at,
        });
        Ok(parsed.access_token)
    }
}

// ---------------------------------------------------------------------------
// Token source
// ---------------------------------------------------------------------------

/// Where an API client gets its bearer token from.
pub enum TokenSource {
    Static(String),
    ServiceAccount(ServiceAccountTokenProvider),
}

impl TokenSource {
    /// Resolve a token source: an explicit token wins, then the key file.
    pub fn resolve(
        credentials: &CredentialsConfig,
        static_token: Option<&str>,
        scope: &str,
    ) -> Result<Self, AuthError> {
        if let Some(token) = static_token {
            return Ok(Self::Static(token.to_string()));
        }
        match credentials.key_file.as_deref() {
            Some(path) => {
                let key = ServiceAccountKey::from_file(path)?;
                Ok(Self::ServiceAccount(ServiceAccountTokenProvider::new(key, scope)))
            }
            None => Err(AuthError::NotConfigured),
        }
    }

    pub async fn access_token(&self) -> Result<String, AuthError> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::ServiceAccount(provider) => provider.access_token().await,
        }
    }

    /// Project the key belongs to, if the source is a service account.
    pub fn project_id(&self) -> Option<&str> {
        match self {
            Self::Static(_) => None,
            Self::ServiceAccount(provider) => provider.key().project_id.as_deref(),
        }
    }
}

impl fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(_) => f.write_str("TokenSource::Static(<redacted>)"),
            Self::ServiceAccount(p) => write!(f, "TokenSource::ServiceAccount({})", p.key.client_email),
        }
    }
}
