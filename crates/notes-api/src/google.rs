use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

const GOOGLE_JWKS_URI: &str = "https://www.googleapis.com/oauth2/v3/certs";
const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Identity asserted by an external provider's signed token.
#[derive(Debug, Clone)]
pub struct ExternalIdentity {
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Google sign-in is not configured")]
    NotConfigured,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Key not found for kid: {0}")]
    KeyNotFound(String),
    #[error("JWKS fetch error: {0}")]
    JwksFetch(String),
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<ExternalIdentity, IdentityError>;
}

#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    n: Option<String>,
    e: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

/// Verifies Google ID tokens against Google's published signing keys.
/// Keys are cached and refetched when a token names an unknown `kid`.
pub struct GoogleVerifier {
    http_client: Client,
    client_id: Option<String>,
    jwks_uri: String,
    keys: RwLock<HashMap<String, DecodingKey>>,
}

impl GoogleVerifier {
    pub fn new(client_id: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        Self::with_jwks_uri(client_id, GOOGLE_JWKS_URI, timeout)
    }

    /// `timeout` bounds each JWKS fetch.
    pub fn with_jwks_uri(client_id: Option<String>, jwks_uri: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create JWKS HTTP client")?;

        Ok(Self {
            http_client,
            client_id,
            jwks_uri: jwks_uri.to_string(),
            keys: RwLock::new(HashMap::new()),
        })
    }

    async fn refresh_keys(&self) -> Result<(), IdentityError> {
        info!("Fetching JWKS from {}", self.jwks_uri);

        let response: JwksResponse = self
            .http_client
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| IdentityError::JwksFetch(e.to_string()))?
            .json()
            .await
            .map_err(|e| IdentityError::JwksFetch(e.to_string()))?;

        let mut keys = self.keys.write().await;
        keys.clear();

        for jwk in response.keys {
            if jwk.kty != "RSA" {
                continue;
            }
            if let (Some(n), Some(e)) = (&jwk.n, &jwk.e) {
                match DecodingKey::from_rsa_components(n, e) {
                    Ok(key) => {
                        keys.insert(jwk.kid, key);
                    }
                    Err(e) => warn!("Failed to parse RSA key {}: {}", jwk.kid, e),
                }
            }
        }

        info!("Loaded {} JWKS keys", keys.len());
        Ok(())
    }

    async fn key_for(&self, kid: &str) -> Result<DecodingKey, IdentityError> {
        if let Some(key) = self.keys.read().await.get(kid) {
            return Ok(key.clone());
        }

        self.refresh_keys().await?;
        self.keys
            .read()
            .await
            .get(kid)
            .cloned()
            .ok_or_else(|| IdentityError::KeyNotFound(kid.to_string()))
    }
}

#[async_trait]
impl IdentityVerifier for GoogleVerifier {
    async fn verify(&self, id_token: &str) -> Result<ExternalIdentity, IdentityError> {
        let client_id = self.client_id.as_deref().ok_or(IdentityError::NotConfigured)?;

        let header = decode_header(id_token).map_err(|e| IdentityError::InvalidToken(e.to_string()))?;
        let kid = header
            .kid
            .ok_or_else(|| IdentityError::InvalidToken("Missing kid in token header".to_string()))?;
        let key = self.key_for(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&GOOGLE_ISSUERS);
        validation.set_audience(&[client_id]);

        let claims = decode::<GoogleClaims>(id_token, &key, &validation)
            .map_err(|e| IdentityError::InvalidToken(e.to_string()))?
            .claims;

        let email = claims
            .email
            .ok_or_else(|| IdentityError::InvalidToken("Token carries no email".to_string()))?;

        Ok(ExternalIdentity {
            subject: claims.sub,
            email,
            name: claims.name,
            picture: claims.picture,
        })
    }
}
