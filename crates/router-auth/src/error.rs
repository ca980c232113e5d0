use thiserror::Error;

/// Errors surfaced by the Auth Center (spec.md §4.8).
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("provider {0} has no credential material configured")]
    NotConfigured(String),

    #[error("device authorization request to {0} failed: {1}")]
    DeviceAuthFailed(String, String),

    #[error("device code expired before the user completed login")]
    DeviceCodeExpired,

    #[error("token refresh failed for provider {0}: {1}")]
    RefreshFailed(String, String),

    #[error("provider {0} is in maintenance mode pending re-login")]
    MaintenanceMode(String),

    #[error("failed to persist token bundle for {0}: {1}")]
    PersistFailed(String, String),

    #[error("failed to load token bundle for {0}: {1}")]
    LoadFailed(String, String),
}
