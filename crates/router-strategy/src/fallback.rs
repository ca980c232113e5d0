//! Fallback strategy (spec.md §4.7, priority 2): ordered actions tried when
//! a request has exhausted retries. Token refresh and alternative-provider
//! routing are authorized here but executed by the caller (Provider
//! Adapter / Scheduler); cached-response and graceful-degradation are
//! resolved entirely within this module.

use std::time::Duration;

use mini_moka::sync::Cache;
use router_config::{FallbackAction, FallbackConfig};
use router_core::CoreError;
use serde_json::Value;

use crate::Decision;

/// Request-keyed memoization of successful responses, consulted by the
/// `cached_response` fallback action.
pub struct ResponseCache {
    cache: Cache<String, Value>,
}

impl ResponseCache {
    #[must_use]
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        Self {
            cache: Cache::builder().time_to_live(ttl).max_capacity(max_capacity).build(),
        }
    }

    pub fn put(&self, key: &str, value: Value) {
        self.cache.insert(key.to_owned(), value);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.cache.get(key)
    }
}

fn can_handle(error: &CoreError) -> bool {
    matches!(error, CoreError::AuthFailed(..) | CoreError::ProviderUnavailable(..))
}

/// Walk `config.actions` in order and return the first applicable
/// decision, or `None` if no configured action applies to this error.
#[must_use]
pub fn decide(error: &CoreError, config: &FallbackConfig, cache: &ResponseCache, cache_key: &str) -> Option<Decision> {
    if !can_handle(error) {
        return None;
    }

    for action in &config.actions {
        match action {
            FallbackAction::TokenRefresh => {
                if matches!(error, CoreError::AuthFailed(..)) {
                    return Some(Decision::RetrySameTarget { after: Duration::ZERO });
                }
            }
            FallbackAction::AlternativeProvider => {
                if matches!(error, CoreError::ProviderUnavailable(..)) {
                    return Some(Decision::RetryNewTarget { after: Duration::ZERO });
                }
            }
            FallbackAction::CachedResponse => {
                if config.cached_response_enabled
                    && let Some(value) = cache.get(cache_key)
                {
                    return Some(Decision::FallbackResult(value));
                }
            }
            FallbackAction::GracefulDegradation => {
                return Some(Decision::FallbackResult(serde_json::json!({
                    "degraded": true,
                    "reason": error.kind(),
                })));
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> FallbackConfig {
        FallbackConfig {
            actions: vec![
                FallbackAction::TokenRefresh,
                FallbackAction::AlternativeProvider,
                FallbackAction::CachedResponse,
                FallbackAction::GracefulDegradation,
            ],
            cached_response_enabled: true,
            cached_response_ttl_secs: 300,
        }
    }

    #[test]
    fn auth_failed_triggers_token_refresh_retry() {
        let cache = ResponseCache::new(Duration::from_secs(300), 100);
        let decision = decide(&CoreError::AuthFailed("p1".into(), "expired".into()), &config(), &cache, "k1");
        assert!(matches!(decision, Some(Decision::RetrySameTarget { .. })));
    }

    #[test]
    fn provider_unavailable_triggers_alternative_provider() {
        let cache = ResponseCache::new(Duration::from_secs(300), 100);
        let decision = decide(
            &CoreError::ProviderUnavailable("p1".into(), "maintenance".into()),
            &config(),
            &cache,
            "k1",
        );
        assert!(matches!(decision, Some(Decision::RetryNewTarget { .. })));
    }

    #[test]
    fn unhandled_error_returns_none() {
        let cache = ResponseCache::new(Duration::from_secs(300), 100);
        let decision = decide(&CoreError::InvalidRequest("bad".into()), &config(), &cache, "k1");
        assert!(decision.is_none());
    }
}
