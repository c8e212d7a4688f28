//! Service account authentication
//!
//! Exchanges a self-signed RS256 assertion for an OAuth access token
//! (JWT bearer grant) and keeps it cached until shortly before expiry.
//! The same private key signs V4 storage URLs.

use crate::api_contracts::{AssertionClaims, TokenResponse};
use crate::error::{CredentialError, GatewayError};
use crate::service_account::ServiceAccountKey;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Scopes needed for Firestore writes and Storage uploads
pub const SCOPES: &str =
    "https://www.googleapis.com/auth/datastore https://www.googleapis.com/auth/devstorage.read_write";

const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Tokens are refreshed this long before they expire
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

/// Issues access tokens for a service account
pub struct TokenProvider {
    client_email: String,
    private_key_id: String,
    token_uri: String,
    encoding_key: EncodingKey,
    client: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(key: &ServiceAccountKey, client: reqwest::Client) -> Result<Self, CredentialError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())
            .map_err(|e| CredentialError::InvalidKey(e.to_string()))?;

        Ok(Self {
            client_email: key.client_email.clone(),
            private_key_id: key.private_key_id.clone(),
            token_uri: key.token_uri.clone(),
            encoding_key,
            client,
            cached: Mutex::new(None),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }

    /// Build the signed assertion for the token endpoint
    fn assertion(&self) -> Result<String, GatewayError> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: self.client_email.clone(),
            scope: SCOPES.to_string(),
            aud: self.token_uri.clone(),
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.private_key_id.clone());

        jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| GatewayError::Signing(e.to_string()))
    }

    /// Return a valid access token, requesting a new one if needed
    pub async fn access_token(&self) -> Result<String, GatewayError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.access_token.clone());
            }
        }

        let token = self.request_token().await?;
        let lifetime = Duration::from_secs(token.expires_in);
        let refresh_at = Instant::now() + lifetime.saturating_sub(REFRESH_MARGIN);

        tracing::debug!(expires_in = token.expires_in, "Obtained access token");

        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            refresh_at,
        });
        Ok(token.access_token)
    }

    async fn request_token(&self) -> Result<TokenResponse, GatewayError> {
        let assertion = self.assertion()?;

        let response = self
            .client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| GatewayError::network("oauth", e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Auth { status, body });
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| GatewayError::InvalidResponse {
                service: "oauth",
                message: e.to_string(),
            })
    }

    /// RSA-SHA256 signature over `message`, raw bytes
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, GatewayError> {
        let encoded = jsonwebtoken::crypto::sign(message, &self.encoding_key, Algorithm::RS256)
            .map_err(|e| GatewayError::Signing(e.to_string()))?;

        base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| GatewayError::Signing(e.to_string()))
    }
}
