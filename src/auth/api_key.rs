//! Riot API key handling.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::warn;

use crate::error::HarvestError;

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "RIOT_API_KEY";

/// Prefix every issued Riot key starts with.
const KEY_PREFIX: &str = "RGAPI";

/// A Riot API key. Never printed.
#[derive(Clone)]
pub struct ApiKey {
    key: SecretString,
}

impl ApiKey {
    /// Wrap a key. Fails on an empty value.
    pub fn new(key: impl Into<String>) -> Result<Self, HarvestError> {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            return Err(HarvestError::MissingApiKey);
        }
        if !trimmed.starts_with(KEY_PREFIX) {
            warn!("API key does not start with {KEY_PREFIX}; requests will likely be rejected");
        }
        Ok(Self {
            key: SecretString::from(trimmed.to_string()),
        })
    }

    /// Read the key from `RIOT_API_KEY`.
    ///
    /// Loading a `.env` file is the caller's job.
    pub fn from_env() -> Result<Self, HarvestError> {
        Self::from_env_var(API_KEY_ENV)
    }

    pub fn from_env_var(var: &str) -> Result<Self, HarvestError> {
        let key = std::env::var(var).map_err(|_| HarvestError::MissingApiKey)?;
        Self::new(key)
    }

    /// The raw key, for the request header only.
    pub fn expose_secret(&self) -> &str {
        self.key.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKey").field("key", &"[REDACTED]").finish()
    }
}

/// Source of the API key used for each request.
///
/// Implement this to rotate keys without rebuilding the client.
pub trait ApiKeyProvider: Send + Sync {
    fn api_key(&self) -> &ApiKey;
}

impl ApiKeyProvider for ApiKey {
    fn api_key(&self) -> &ApiKey {
        self
    }
}

impl<P: ApiKeyProvider + ?Sized> ApiKeyProvider for Arc<P> {
    fn api_key(&self) -> &ApiKey {
        (**self).api_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacted() {
        let key = ApiKey::new("RGAPI-super-secret").unwrap();
        let debug_str = format!("{key:?}");
        assert!(!debug_str.contains("super-secret"));
        assert!(debug_str.contains("[REDACTED]"));
        assert_eq!(key.expose_secret(), "RGAPI-super-secret");
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(matches!(ApiKey::new("   "), Err(HarvestError::MissingApiKey)));
    }

    #[test]
    fn test_missing_env_var() {
        let result = ApiKey::from_env_var("LEAGUE_HARVESTER_TEST_UNSET_VARIABLE");
        assert!(matches!(result, Err(HarvestError::MissingApiKey)));
    }

    #[test]
    fn test_key_is_trimmed() {
        let key = ApiKey::new("  RGAPI-abc\n").unwrap();
        assert_eq!(key.expose_secret(), "RGAPI-abc");
    }
}
