//! EventAssist configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{FixedOffset, Local, Offset, Utc};
use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};

/// Main EventAssist configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Completion service configuration
    pub llm: LlmConfig,

    /// Pipeline limits and defaults
    pub assistant: AssistantConfig,

    /// Local event store
    pub store: StoreConfig,
}

impl Config {
    /// Check the configuration and derive the pipeline limits
    ///
    /// Call this once at startup; the returned `Limits` are what the pipeline uses.
    pub fn validate(&self) -> Result<Limits> {
        if self.llm.provider != "openai" {
            return Err(eyre!(
                "Unknown LLM provider: '{}'. Supported: openai",
                self.llm.provider
            ));
        }
        if self.llm.timeout_ms == 0 {
            return Err(eyre!("llm.timeout-ms must be greater than zero"));
        }
        self.assistant.resolve(Duration::from_millis(self.llm.timeout_ms))
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .eventassist.yml
        let local_config = PathBuf::from(".eventassist.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/eventassist/eventassist.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("eventassist").join("eventassist.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Copy of this config that is safe to print
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        config.llm.api_key = config.llm.api_key.as_deref().map(mask_secret);
        config
    }
}

/// Keep the first few characters of a secret so it can be recognised
fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(6).collect();
    if secret.chars().count() <= 6 {
        "******".to_string()
    } else {
        format!("{}******", visible)
    }
}

/// Completion service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (currently only "openai" supported)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// Literal API key; takes precedence over the environment variable
    #[serde(rename = "api-key", skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
            base_url: "https://api.openai.com".to_string(),
            max_tokens: 4096,
            timeout_ms: 30_000,
        }
    }
}

/// Pipeline limits and defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// UTC offset used to resolve dates ("+02:00", "-05:00", "UTC" or "local")
    pub timezone: String,

    /// Most occurrences a single recurring event may expand to
    #[serde(rename = "max-occurrences")]
    pub max_occurrences: u32,

    /// Most operations accepted from one prompt
    #[serde(rename = "max-intents")]
    pub max_intents: usize,

    /// Event length when the prompt gives no end time
    #[serde(rename = "default-duration-minutes")]
    pub default_duration_minutes: u32,

    /// Timeout for each call to the event store in milliseconds
    #[serde(rename = "event-timeout-ms")]
    pub event_timeout_ms: u64,

    /// Retry the completion call once on a transient network failure
    #[serde(rename = "retry-transient")]
    pub retry_transient: bool,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            timezone: "local".to_string(),
            max_occurrences: 52,
            max_intents: 20,
            default_duration_minutes: 120,
            event_timeout_ms: 10_000,
            retry_transient: true,
        }
    }
}

impl AssistantConfig {
    /// Parse and check the assistant settings
    pub fn resolve(&self, completion_timeout: Duration) -> Result<Limits> {
        let timezone = parse_timezone(&self.timezone)
            .ok_or_else(|| eyre!("Invalid timezone '{}'. Use an offset like +02:00, UTC or local", self.timezone))?;
        if self.max_occurrences == 0 {
            return Err(eyre!("assistant.max-occurrences must be greater than zero"));
        }
        if self.max_intents == 0 {
            return Err(eyre!("assistant.max-intents must be greater than zero"));
        }
        if self.default_duration_minutes == 0 {
            return Err(eyre!("assistant.default-duration-minutes must be greater than zero"));
        }
        if self.event_timeout_ms == 0 {
            return Err(eyre!("assistant.event-timeout-ms must be greater than zero"));
        }

        Ok(Limits {
            timezone,
            max_occurrences: self.max_occurrences,
            max_intents: self.max_intents,
            default_duration: chrono::Duration::minutes(i64::from(self.default_duration_minutes)),
            completion_timeout,
            event_timeout: Duration::from_millis(self.event_timeout_ms),
            retry_transient: self.retry_transient,
        })
    }
}

/// Parse a UTC offset such as "+02:00", "-0530", "+9", "UTC" or "local"
pub fn parse_timezone(s: &str) -> Option<FixedOffset> {
    let s = s.trim();
    match s.to_ascii_lowercase().as_str() {
        "local" => return Some(*Local::now().offset()),
        "utc" | "z" | "gmt" => return Some(Utc.fix()),
        _ => {}
    }

    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 => rest.split_at(2),
        None => (rest, "0"),
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Local event store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file
    pub path: PathBuf,

    /// Refuse every write
    #[serde(rename = "read-only")]
    pub read_only: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/eventassist on Linux)
        let path = dirs::data_dir()
            .map(|d| d.join("eventassist"))
            .unwrap_or_else(|| PathBuf::from(".eventassist"))
            .join("events.db");

        Self { path, read_only: false }
    }
}

/// Validated pipeline settings, built once by `Config::validate`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Offset used to resolve dates in prompts and to display results
    pub timezone: FixedOffset,
    pub max_occurrences: u32,
    pub max_intents: usize,
    pub default_duration: chrono::Duration,
    pub completion_timeout: Duration,
    pub event_timeout: Duration,
    pub retry_transient: bool,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            timezone: Utc.fix(),
            max_occurrences: 52,
            max_intents: 20,
            default_duration: chrono::Duration::minutes(120),
            completion_timeout: Duration::from_secs(30),
            event_timeout: Duration::from_secs(10),
            retry_transient: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.assistant.max_occurrences, 52);
        assert!(!config.store.read_only);
        assert!(config.store.path.ends_with("events.db"));
    }

    #[test]
    fn test_llm_config_defaults() {
        let config = LlmConfig::default();

        assert_eq!(config.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.base_url, "https://api.openai.com");
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
llm:
  provider: openai
  model: gpt-4o
  api-key-env: MY_KEY
  base-url: https://llm.example.com
  max-tokens: 2048
  timeout-ms: 5000

assistant:
  timezone: "+02:00"
  max-occurrences: 12
  max-intents: 5
  default-duration-minutes: 60
  event-timeout-ms: 2000
  retry-transient: false

store:
  path: /tmp/events.db
  read-only: true
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.api_key_env, "MY_KEY");
        assert_eq!(config.llm.max_tokens, 2048);
        assert_eq!(config.assistant.max_occurrences, 12);
        assert!(config.store.read_only);

        let limits = config.validate().unwrap();
        assert_eq!(limits.timezone, FixedOffset::east_opt(2 * 3600).unwrap());
        assert_eq!(limits.max_intents, 5);
        assert_eq!(limits.completion_timeout, Duration::from_millis(5000));
        assert_eq!(limits.event_timeout, Duration::from_millis(2000));
        assert_eq!(limits.default_duration, chrono::Duration::minutes(60));
        assert!(!limits.retry_transient);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
llm:
  model: gpt-4.1
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.model, "gpt-4.1");
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.assistant.max_intents, 20);
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let mut config = Config::default();
        config.assistant.max_occurrences = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.assistant.event_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.llm.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_provider() {
        let mut config = Config::default();
        config.llm.provider = "anthropic".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("anthropic"));
    }

    #[test]
    fn test_parse_timezone() {
        assert_eq!(parse_timezone("+02:00"), FixedOffset::east_opt(7200));
        assert_eq!(parse_timezone("-0530"), FixedOffset::east_opt(-(5 * 3600 + 30 * 60)));
        assert_eq!(parse_timezone("+9"), FixedOffset::east_opt(9 * 3600));
        assert_eq!(parse_timezone("UTC"), FixedOffset::east_opt(0));
        assert!(parse_timezone("local").is_some());
        assert!(parse_timezone("Europe/Paris").is_none());
        assert!(parse_timezone("+25:00").is_none());
    }

    #[test]
    fn test_redacted_masks_api_key() {
        let mut config = Config::default();
        config.llm.api_key = Some("sk-proj-abcdef123456".to_string());
        let redacted = config.redacted();
        assert_eq!(redacted.llm.api_key.as_deref(), Some("sk-pro******"));
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-proj-abcdef123456"));
    }
}
