//! Sessions against the identity server and bearer token checks

use std::env;

use impactarea_core::error::{ImpactError, Result};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

/// Access token returned by the identity server
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionToken {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl SessionToken {
    /// Wrap a token handed over by a caller
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: default_token_type(),
            expires_in: None,
        }
    }

    /// Strip an optional `Bearer ` prefix from an `Authorization` value
    pub fn from_authorization(value: &str) -> Option<Self> {
        let value = value.trim();
        let token = value
            .strip_prefix("Bearer ")
            .or_else(|| value.strip_prefix("bearer "))
            .unwrap_or(value)
            .trim();
        (!token.is_empty()).then(|| Self::bearer(token))
    }
}

/// Geosys account used for the password grant
#[derive(Clone)]
pub struct GeosysCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for GeosysCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeosysCredentials")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl GeosysCredentials {
    /// Read `API_CLIENT_ID`, `API_CLIENT_SECRET`, `API_USERNAME` and `API_PASSWORD`
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            client_id: required_env("API_CLIENT_ID")?,
            client_secret: required_env("API_CLIENT_SECRET")?,
            username: required_env("API_USERNAME")?,
            password: required_env("API_PASSWORD")?,
        })
    }
}

fn required_env(key: &str) -> Result<String> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ImpactError::ConfigMissing { key: key.to_string() })
}

/// OAuth2 token endpoint client
pub struct IdentityClient {
    token_url: String,
    client: reqwest::Client,
}

impl IdentityClient {
    pub fn new(token_url: impl Into<String>) -> Self {
        Self {
            token_url: token_url.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Password grant for the geosys platform
    pub async fn password_grant(&self, credentials: &GeosysCredentials) -> Result<SessionToken> {
        tracing::debug!(url = %self.token_url, client_id = %credentials.client_id, "Requesting password grant");
        let form = [
            ("grant_type", "password"),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
            ("scope", "openid offline_access"),
        ];
        let request = self.client.post(&self.token_url).form(&form);
        self.send(request).await
    }

    /// Client credentials grant with HTTP basic auth, used by the STAC catalog
    pub async fn client_credentials(&self, client_id: &str, secret: &str) -> Result<SessionToken> {
        tracing::debug!(url = %self.token_url, client_id = %client_id, "Requesting client credentials grant");
        let request = self
            .client
            .post(&self.token_url)
            .basic_auth(client_id, Some(secret))
            .form(&[("grant_type", "client_credentials")]);
        self.send(request).await
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<SessionToken> {
        let response = request.send().await.map_err(|e| ImpactError::Authentication {
            reason: format!("Failed to reach identity server {}: {}", self.token_url, e),
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ImpactError::Authentication {
                reason: format!("Identity server error ({}): {}", status, error_text),
            });
        }

        response.json().await.map_err(|e| ImpactError::Authentication {
            reason: format!("Failed to parse token response: {}", e),
        })
    }
}

/// Checks bearer tokens presented to the API
#[derive(Clone)]
pub struct TokenValidator {
    key: Option<DecodingKey>,
}

impl TokenValidator {
    /// Accept any non-empty token
    pub fn permissive() -> Self {
        Self { key: None }
    }

    /// Verify RS256 signatures against a PEM public key
    pub fn with_public_key(pem: &str) -> Result<Self> {
        let pem = pem.replace("\\n", "\n");
        let key = DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| {
            ImpactError::ConfigInvalid {
                key: "CIPHER_CERTIFICATE_PUBLIC_KEY".to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self { key: Some(key) })
    }

    /// Uses `CIPHER_CERTIFICATE_PUBLIC_KEY` when set
    pub fn from_env() -> Result<Self> {
        match env::var("CIPHER_CERTIFICATE_PUBLIC_KEY") {
            Ok(pem) if !pem.trim().is_empty() => Self::with_public_key(&pem),
            _ => {
                tracing::warn!("CIPHER_CERTIFICATE_PUBLIC_KEY not set, token signatures are not verified");
                Ok(Self::permissive())
            }
        }
    }

    pub fn verifies_signatures(&self) -> bool {
        self.key.is_some()
    }

    pub fn check(&self, token: &str) -> Result<()> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ImpactError::NotAuthorized);
        }

        let Some(key) = &self.key else {
            return Ok(());
        };

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_aud = false;
        decode::<serde_json::Value>(token, key, &validation).map_err(|e| {
            tracing::debug!(error = %e, "Rejected bearer token");
            ImpactError::NotAuthorized
        })?;
        Ok(())
    }
}
