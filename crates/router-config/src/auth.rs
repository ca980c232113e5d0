use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Authentication descriptor for a provider (spec.md §4.8)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(tag = "scheme", rename_all = "kebab-case")]
pub enum AuthDescriptor {
    /// No authentication header
    #[default]
    None,
    /// Static API key forwarded via a provider-specific header
    ApiKey {
        key: SecretString,
        #[serde(default = "default_api_key_header")]
        header: String,
    },
    /// Static bearer token via `Authorization: Bearer <token>`
    Bearer { token: SecretString },
    /// Interactive device-code grant with PKCE
    OauthDeviceFlow(OauthDeviceFlowConfig),
}

fn default_api_key_header() -> String {
    "x-api-key".to_owned()
}

/// Device-flow OAuth configuration (spec.md §4.8)
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OauthDeviceFlowConfig {
    /// OAuth client id
    pub client_id: String,
    /// Device authorization endpoint
    pub device_auth_url: Url,
    /// Token endpoint
    pub token_url: Url,
    /// Requested scopes
    #[serde(default)]
    pub scopes: Vec<String>,
    /// How long before expiry a proactive refresh is attempted, in seconds
    #[serde(default = "default_refresh_threshold_secs")]
    pub refresh_threshold_secs: u64,
    /// Directory the persisted token bundle file lives under
    pub token_state_dir: std::path::PathBuf,
}

const fn default_refresh_threshold_secs() -> u64 {
    300
}
