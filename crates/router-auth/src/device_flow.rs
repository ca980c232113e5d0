//! Interactive device-code grant with PKCE (spec.md §4.8 "Device flow").

use rand::Rng;
use reqwest::Client;
use secrecy::SecretString;
use serde::Deserialize;

use crate::error::AuthError;
use crate::token::TokenBundle;

/// Response from the device authorization endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub expires_in: u64,
    #[serde(default = "default_interval")]
    pub interval: u64,
}

const fn default_interval() -> u64 {
    5
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
    #[serde(default)]
    scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_owned()
}

const fn default_expires_in() -> u64 {
    3600
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
}

/// A PKCE code verifier / challenge pair.
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

impl Pkce {
    /// Generate a fresh random verifier and its S256 challenge.
    #[must_use]
    pub fn generate() -> Self {
        let verifier: String = rand::rng()
            .sample_iter(&rand::distr::Alphanumeric)
            .take(64)
            .map(char::from)
            .collect();

        use sha2::{Digest, Sha256};
        use base64::Engine;
        let digest = Sha256::digest(verifier.as_bytes());
        let challenge = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest);

        Self { verifier, challenge }
    }
}

/// Drives the device-code grant end to end: request a code, surface it to
/// the operator, then poll until the user completes login or the code
/// expires.
pub struct DeviceFlowClient {
    client: Client,
    client_id: String,
    device_auth_url: url::Url,
    token_url: url::Url,
    scopes: Vec<String>,
}

impl DeviceFlowClient {
    #[must_use]
    pub fn new(client_id: String, device_auth_url: url::Url, token_url: url::Url, scopes: Vec<String>) -> Self {
        Self {
            client: Client::new(),
            client_id,
            device_auth_url,
            token_url,
            scopes,
        }
    }

    /// Request a device code. The caller is responsible for surfacing
    /// `user_code`/`verification_uri` to the operator.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::DeviceAuthFailed`] if the endpoint is unreachable
    /// or returns a non-success response.
    pub async fn start(&self, pkce: &Pkce) -> Result<DeviceAuthorization, AuthError> {
        let response = self
            .client
            .post(self.device_auth_url.clone())
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("scope", &self.scopes.join(" ")),
                ("code_challenge", &pkce.challenge),
                ("code_challenge_method", "S256"),
            ])
            .send()
            .await
            .map_err(|e| AuthError::DeviceAuthFailed(self.device_auth_url.to_string(), e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AuthError::DeviceAuthFailed(
                self.device_auth_url.to_string(),
                format!("status {status}"),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::DeviceAuthFailed(self.device_auth_url.to_string(), e.to_string()))
    }

    /// Poll the token endpoint at `authorization.interval` until it returns
    /// tokens or `authorization.expires_in` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::DeviceCodeExpired`] if the code expires first, or
    /// [`AuthError::DeviceAuthFailed`] on an unexpected token-endpoint error.
    pub async fn poll(&self, authorization: &DeviceAuthorization, pkce: &Pkce) -> Result<TokenBundle, AuthError> {
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(authorization.expires_in);
        let mut interval = std::time::Duration::from_secs(authorization.interval);

        loop {
            if tokio::time::Instant::now() >= deadline {
                return Err(AuthError::DeviceCodeExpired);
            }

            tokio::time::sleep(interval).await;

            let response = self
                .client
                .post(self.token_url.clone())
                .form(&[
                    ("client_id", self.client_id.as_str()),
                    ("device_code", authorization.device_code.as_str()),
                    ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
                    ("code_verifier", pkce.verifier.as_str()),
                ])
                .send()
                .await
                .map_err(|e| AuthError::DeviceAuthFailed(self.token_url.to_string(), e.to_string()))?;

            if response.status().is_success() {
                let token: TokenResponse = response
                    .json()
                    .await
                    .map_err(|e| AuthError::DeviceAuthFailed(self.token_url.to_string(), e.to_string()))?;

                return Ok(TokenBundle::from_expires_in(
                    SecretString::from(token.access_token),
                    token.refresh_token.map(SecretString::from),
                    token.token_type,
                    token.expires_in,
                    token.scope.map(|s| s.split(' ').map(str::to_owned).collect()).unwrap_or_default(),
                ));
            }

            let body: Result<TokenErrorResponse, _> = response.json().await;
            match body.map(|b| b.error) {
                Ok(err) if err == "authorization_pending" => continue,
                Ok(err) if err == "slow_down" => {
                    interval += std::time::Duration::from_secs(5);
                    continue;
                }
                Ok(err) => return Err(AuthError::DeviceAuthFailed(self.token_url.to_string(), err)),
                Err(e) => return Err(AuthError::DeviceAuthFailed(self.token_url.to_string(), e.to_string())),
            }
        }
    }

    /// Exchange a refresh token for a new [`TokenBundle`].
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RefreshFailed`] if the token endpoint rejects
    /// the refresh token or is unreachable.
    pub async fn refresh(&self, refresh_token: &secrecy::SecretString) -> Result<TokenBundle, AuthError> {
        use secrecy::ExposeSecret;

        let response = self
            .client
            .post(self.token_url.clone())
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::RefreshFailed(self.token_url.to_string(), e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(AuthError::RefreshFailed(self.token_url.to_string(), format!("status {status}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::RefreshFailed(self.token_url.to_string(), e.to_string()))?;

        Ok(TokenBundle::from_expires_in(
            SecretString::from(token.access_token),
            token
                .refresh_token
                .map(SecretString::from)
                .or_else(|| Some(refresh_token.clone())),
            token.token_type,
            token.expires_in,
            token.scope.map(|s| s.split(' ').map(str::to_owned).collect()).unwrap_or_default(),
        ))
    }
}
