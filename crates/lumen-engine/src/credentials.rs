use std::env;
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Serialize;

/// Whether the session may use the remote services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialState {
    Unknown,
    Absent,
    Present,
}

impl CredentialState {
    pub fn as_str(self) -> &'static str {
        match self {
            CredentialState::Unknown => "unknown",
            CredentialState::Absent => "absent",
            CredentialState::Present => "present",
        }
    }
}

/// The externally managed credential.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn has_credential(&self) -> bool;

    /// Asks the outside world for a credential (a picker, a prompt…).
    async fn request_credential(&self) -> Result<()>;

    /// The key to attach to remote requests, if one is available.
    fn api_key(&self) -> Option<String>;
}

/// Reads `GEMINI_API_KEY` / `GOOGLE_API_KEY`; a key supplied at runtime
/// through [`EnvCredentialProvider::set_api_key`] takes precedence.
#[derive(Debug, Default)]
pub struct EnvCredentialProvider {
    override_key: RwLock<Option<String>>,
}

impl EnvCredentialProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_api_key(&self, key: impl Into<String>) {
        let key = key.into().trim().to_string();
        if let Ok(mut guard) = self.override_key.write() {
            *guard = (!key.is_empty()).then_some(key);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.override_key.write() {
            *guard = None;
        }
    }

    fn env_key() -> Option<String> {
        non_empty_env("GEMINI_API_KEY").or_else(|| non_empty_env("GOOGLE_API_KEY"))
    }
}

#[async_trait]
impl CredentialProvider for EnvCredentialProvider {
    async fn has_credential(&self) -> bool {
        self.api_key().is_some()
    }

    async fn request_credential(&self) -> Result<()> {
        if self.api_key().is_none() {
            bail!("GEMINI_API_KEY or GOOGLE_API_KEY not set");
        }
        Ok(())
    }

    fn api_key(&self) -> Option<String> {
        let override_key = self
            .override_key
            .read()
            .ok()
            .and_then(|guard| guard.clone());
        override_key.or_else(Self::env_key)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{CredentialProvider, EnvCredentialProvider};

    #[tokio::test]
    async fn override_key_is_preferred_and_clearable() {
        let provider = EnvCredentialProvider::new();
        provider.set_api_key("  test-key  ");
        assert_eq!(provider.api_key().as_deref(), Some("test-key"));
        assert!(provider.has_credential().await);
        assert!(provider.request_credential().await.is_ok());

        provider.set_api_key("   ");
        provider.clear();
        assert_ne!(provider.api_key().as_deref(), Some("test-key"));
    }
}
