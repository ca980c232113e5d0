//! Auth Center: obtains, persists, refreshes, and supplies outbound
//! authentication credentials on a per-provider basis (spec.md §4.8).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use router_config::{AuthDescriptor, Provider};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Mutex;

use crate::device_flow::DeviceFlowClient;
use crate::error::AuthError;
use crate::token::{TokenBundle, TokenStore};

/// Per-provider auth state: the static descriptor plus any live token
/// material, guarded for single-flight refresh.
struct ProviderAuth {
    descriptor: AuthDescriptor,
    /// `None` for schemes with no token lifecycle (`none`, `api-key`, `bearer`)
    live: Option<Mutex<LiveTokenState>>,
}

struct LiveTokenState {
    bundle: Option<TokenBundle>,
    store: TokenStore,
    client: DeviceFlowClient,
    refresh_threshold: Duration,
    /// Set once a refresh attempt fails with no valid cached token left.
    maintenance: bool,
}

/// Obtains, persists, refreshes, and supplies outbound authentication
/// credentials for every provider in a configuration snapshot.
///
/// Owns one [`ProviderAuth`] per provider id; refresh is serialized per
/// provider via `tokio::sync::Mutex` — concurrent callers await the same
/// in-flight refresh rather than racing the token endpoint (spec.md §5
/// "Auth serialisation").
pub struct AuthCenter {
    providers: HashMap<String, Arc<ProviderAuth>>,
}

/// What to send on the wire for an authenticated request.
pub struct AuthHeader {
    pub name: String,
    pub value: SecretString,
}

impl AuthCenter {
    /// Build an Auth Center from the providers in a configuration snapshot,
    /// loading any already-persisted token bundles from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if a persisted token bundle exists but cannot be
    /// parsed.
    pub fn from_providers<'a>(providers: impl IntoIterator<Item = &'a Provider>) -> Result<Self, AuthError> {
        let mut map = HashMap::new();
        for provider in providers {
            let live = match &provider.auth {
                AuthDescriptor::OauthDeviceFlow(cfg) => {
                    let store = TokenStore::new(&cfg.token_state_dir, &provider.id);
                    let bundle = store.load()?;
                    let client = DeviceFlowClient::new(
                        cfg.client_id.clone(),
                        cfg.device_auth_url.clone(),
                        cfg.token_url.clone(),
                        cfg.scopes.clone(),
                    );
                    Some(Mutex::new(LiveTokenState {
                        bundle,
                        store,
                        client,
                        refresh_threshold: Duration::from_secs(cfg.refresh_threshold_secs),
                        maintenance: false,
                    }))
                }
                AuthDescriptor::None | AuthDescriptor::ApiKey { .. } | AuthDescriptor::Bearer { .. } => None,
            };
            map.insert(
                provider.id.clone(),
                Arc::new(ProviderAuth {
                    descriptor: provider.auth.clone(),
                    live,
                }),
            );
        }
        Ok(Self { providers: map })
    }

    /// Resolve the header to send for a provider's outbound call,
    /// proactively refreshing an OAuth token if it is near expiry.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MaintenanceMode`] if the provider's token
    /// refresh previously failed and no valid cached token remains, or
    /// [`AuthError::RefreshFailed`] if a refresh attempted now fails.
    pub async fn authorization_header(&self, provider_id: &str) -> Result<Option<AuthHeader>, AuthError> {
        let Some(auth) = self.providers.get(provider_id) else {
            return Err(AuthError::NotConfigured(provider_id.to_owned()));
        };

        match &auth.descriptor {
            AuthDescriptor::None => Ok(None),
            AuthDescriptor::ApiKey { key, header } => Ok(Some(AuthHeader {
                name: header.clone(),
                value: key.clone(),
            })),
            AuthDescriptor::Bearer { token } => Ok(Some(AuthHeader {
                name: "Authorization".to_owned(),
                value: SecretString::from(format!("Bearer {}", token.expose_secret())),
            })),
            AuthDescriptor::OauthDeviceFlow(_) => {
                let live = auth.live.as_ref().expect("oauth descriptor always has live state");
                let mut state = live.lock().await;

                if state.maintenance && !state.bundle.as_ref().is_some_and(|b| b.is_fresh(state.refresh_threshold)) {
                    return Err(AuthError::MaintenanceMode(provider_id.to_owned()));
                }

                let needs_refresh = match &state.bundle {
                    Some(b) => !b.is_fresh(state.refresh_threshold),
                    None => true,
                };

                if needs_refresh {
                    self.refresh_locked(provider_id, &mut state).await?;
                }

                let bundle = state.bundle.as_ref().expect("refresh populates a bundle or errors");
                Ok(Some(AuthHeader {
                    name: "Authorization".to_owned(),
                    value: SecretString::from(bundle.header_value()),
                }))
            }
        }
    }

    /// Register a freshly obtained token bundle after an out-of-band device
    /// login completes, clearing maintenance mode.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting the bundle to disk fails.
    pub async fn complete_login(&self, provider_id: &str, bundle: TokenBundle) -> Result<(), AuthError> {
        let Some(auth) = self.providers.get(provider_id) else {
            return Err(AuthError::NotConfigured(provider_id.to_owned()));
        };
        let live = auth.live.as_ref().ok_or_else(|| AuthError::NotConfigured(provider_id.to_owned()))?;
        let mut state = live.lock().await;
        state.store.save(&bundle)?;
        state.bundle = Some(bundle);
        state.maintenance = false;
        Ok(())
    }

    /// Whether a provider is currently in maintenance mode (reported
    /// through health, spec.md §4.8).
    #[must_use]
    pub async fn is_in_maintenance(&self, provider_id: &str) -> bool {
        let Some(auth) = self.providers.get(provider_id) else {
            return false;
        };
        let Some(live) = &auth.live else { return false };
        live.lock().await.maintenance
    }

    async fn refresh_locked(&self, provider_id: &str, state: &mut LiveTokenState) -> Result<(), AuthError> {
        let Some(refresh_token) = state.bundle.as_ref().and_then(|b| b.refresh_token.clone()) else {
            state.maintenance = true;
            return Err(AuthError::MaintenanceMode(provider_id.to_owned()));
        };

        match state.client.refresh(&refresh_token).await {
            Ok(bundle) => {
                state.store.save(&bundle)?;
                state.bundle = Some(bundle);
                state.maintenance = false;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(provider = provider_id, error = %e, "token refresh failed");
                // Keep using the cached token if it's still technically valid,
                // otherwise enter maintenance mode.
                let still_usable = state.bundle.as_ref().is_some_and(|b| b.is_fresh(Duration::ZERO));
                if !still_usable {
                    state.maintenance = true;
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn none_scheme_has_no_header() {
        let provider = Provider {
            id: "p1".into(),
            protocol: router_config::ProtocolFamily::Openai,
            base_url: url::Url::parse("https://example.com").unwrap(),
            auth: AuthDescriptor::None,
            streaming: true,
            max_tokens: None,
            request_timeout_secs: 30,
            stream_deadline_secs: 300,
            health_check_path: None,
        };
        let center = AuthCenter::from_providers([&provider]).unwrap();
        assert!(center.authorization_header("p1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bearer_scheme_produces_authorization_header() {
        let provider = Provider {
            id: "p1".into(),
            protocol: router_config::ProtocolFamily::Openai,
            base_url: url::Url::parse("https://example.com").unwrap(),
            auth: AuthDescriptor::Bearer {
                token: SecretString::from("sk-123".to_owned()),
            },
            streaming: true,
            max_tokens: None,
            request_timeout_secs: 30,
            stream_deadline_secs: 300,
            health_check_path: None,
        };
        let center = AuthCenter::from_providers([&provider]).unwrap();
        let header = center.authorization_header("p1").await.unwrap().unwrap();
        assert_eq!(header.name, "Authorization");
        assert_eq!(header.value.expose_secret(), "Bearer sk-123");
    }

    #[tokio::test]
    async fn unknown_provider_is_not_configured() {
        let center = AuthCenter::from_providers([]).unwrap();
        assert!(matches!(
            center.authorization_header("ghost").await,
            Err(AuthError::NotConfigured(_))
        ));
    }
}
