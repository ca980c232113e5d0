//! Token Bundle: persisted OAuth credential material for a single provider
//! (spec.md §3 "Token Bundle", §4.8 "Token file format").

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Per-provider credential material, as persisted to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenBundle {
    pub access_token: SecretString,
    #[serde(default)]
    pub refresh_token: Option<SecretString>,
    pub token_type: String,
    /// Absolute expiry, seconds since the Unix epoch
    pub expires_at: u64,
    #[serde(default)]
    pub scope: Vec<String>,
    /// Seconds since the Unix epoch
    pub created_at: u64,
}

impl TokenBundle {
    /// Build a bundle from a token endpoint's `expires_in` (seconds from now).
    #[must_use]
    pub fn from_expires_in(
        access_token: SecretString,
        refresh_token: Option<SecretString>,
        token_type: String,
        expires_in: u64,
        scope: Vec<String>,
    ) -> Self {
        let now = now_unix();
        Self {
            access_token,
            refresh_token,
            token_type,
            expires_at: now.saturating_add(expires_in),
            scope,
            created_at: now,
        }
    }

    /// Whether this token may still be used without a proactive refresh.
    ///
    /// Invariant (spec.md §3): `expires_at > now + refresh_threshold` is
    /// required before use.
    #[must_use]
    pub fn is_fresh(&self, refresh_threshold: Duration) -> bool {
        let now = now_unix();
        self.expires_at > now.saturating_add(refresh_threshold.as_secs())
    }

    /// The bearer-style header value for this bundle, e.g. `Bearer sk-...`.
    #[must_use]
    pub fn header_value(&self) -> String {
        format!("{} {}", self.token_type, self.access_token.expose_secret())
    }
}

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

/// File-backed store for one provider's [`TokenBundle`], 0600 permissions,
/// atomic write-temp-then-rename replacement (spec.md §4.8).
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    #[must_use]
    pub fn new(state_dir: &Path, provider_id: &str) -> Self {
        Self {
            path: state_dir.join(format!("{provider_id}.token.json")),
        }
    }

    /// Load the persisted bundle, if any exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<Option<TokenBundle>, AuthError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| AuthError::LoadFailed(self.path.display().to_string(), e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AuthError::LoadFailed(self.path.display().to_string(), e.to_string())),
        }
    }

    /// Persist a bundle: write to a sibling temp file then rename over the
    /// target, so concurrent readers never observe a partial write.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, the temp file
    /// cannot be written, or the permissions/rename step fails.
    pub fn save(&self, bundle: &TokenBundle) -> Result<(), AuthError> {
        let provider = self.path.file_stem().map_or_else(|| "unknown".to_owned(), |s| s.to_string_lossy().into_owned());
        let err = |e: std::io::Error| AuthError::PersistFailed(provider.clone(), e.to_string());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(err)?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        let raw = serde_json::to_vec_pretty(bundle)
            .map_err(|e| AuthError::PersistFailed(provider.clone(), e.to_string()))?;

        {
            let mut file = std::fs::File::create(&tmp_path).map_err(err)?;
            file.write_all(&raw).map_err(err)?;
            file.sync_all().map_err(err)?;
        }

        set_owner_only_permissions(&tmp_path).map_err(err)?;
        std::fs::rename(&tmp_path, &self.path).map_err(err)?;
        Ok(())
    }
}

#[cfg(unix)]
fn set_owner_only_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_owner_only_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
