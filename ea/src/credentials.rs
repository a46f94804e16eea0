//! API credential lookup
//!
//! The key is read on every request and never cached, so a key added to the
//! environment or config takes effect on the next prompt.

use tracing::debug;

use crate::config::LlmConfig;

/// Read-only source of the completion service API key
pub trait CredentialStore: Send + Sync {
    /// The configured key, or `None` when nothing usable is set
    fn api_key(&self) -> Option<String>;

    /// Check if a key is configured
    fn has_api_key(&self) -> bool {
        self.api_key().is_some()
    }
}

/// Treat blank keys the same as missing ones
fn non_blank(key: String) -> Option<String> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Credentials from the LLM config: literal `api-key` first, then `api-key-env`
#[derive(Debug, Clone)]
pub struct ConfigCredentials {
    literal: Option<String>,
    env_var: String,
}

impl ConfigCredentials {
    pub fn from_config(config: &LlmConfig) -> Self {
        debug!(env_var = %config.api_key_env, has_literal = %config.api_key.is_some(), "ConfigCredentials::from_config: called");
        Self {
            literal: config.api_key.clone(),
            env_var: config.api_key_env.clone(),
        }
    }

    /// Name of the environment variable consulted when no literal key is set
    pub fn env_var(&self) -> &str {
        &self.env_var
    }
}

impl CredentialStore for ConfigCredentials {
    fn api_key(&self) -> Option<String> {
        if let Some(key) = self.literal.clone().and_then(non_blank) {
            debug!("ConfigCredentials::api_key: using configured key");
            return Some(key);
        }
        let key = std::env::var(&self.env_var).ok().and_then(non_blank);
        debug!(env_var = %self.env_var, found = %key.is_some(), "ConfigCredentials::api_key: checked environment");
        key
    }
}

/// Fixed credentials
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials(Option<String>);

impl StaticCredentials {
    pub fn new(key: impl Into<String>) -> Self {
        Self(Some(key.into()))
    }

    /// Credentials with no key at all
    pub fn none() -> Self {
        Self(None)
    }
}

impl CredentialStore for StaticCredentials {
    fn api_key(&self) -> Option<String> {
        self.0.clone().and_then(non_blank)
    }
}
