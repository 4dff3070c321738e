use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, TriageError};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    #[serde(default = "default_label")]
    pub label: String,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            label: default_label(),
            max_concurrent_requests: default_max_concurrent(),
        }
    }
}

/// Generative model settings
///
/// The API key itself never lives in the TOML file; it is read from the
/// environment variable named by `api_key_env`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_name")]
    pub name: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(skip)]
    pub api_key: Option<SecretString>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
            endpoint: default_endpoint(),
            api_key: None,
        }
    }
}

impl ModelConfig {
    /// Fill `api_key` from the environment unless one is already set
    pub fn resolve_api_key(&mut self) {
        if self.api_key.is_some() {
            return;
        }
        self.api_key = std::env::var(&self.api_key_env)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(SecretString::from);
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    /// The API key, or `ConfigError` when it is missing or blank
    pub fn require_api_key(&self) -> Result<&str> {
        match self.api_key.as_ref().map(|key| key.expose_secret()) {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(TriageError::ConfigError(format!(
                "Gemini API key is missing. Set {} in your environment or .env file",
                self.api_key_env
            ))),
        }
    }

    /// The model name, or `ConfigError` when it is blank
    pub fn require_model(&self) -> Result<&str> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(TriageError::ConfigError(
                "model.name cannot be empty".to_string(),
            ));
        }
        Ok(name)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
        }
    }
}

fn default_max_results() -> u32 {
    20
}

fn default_label() -> String {
    "INBOX".to_string()
}

fn default_max_concurrent() -> usize {
    10
}

fn default_model_name() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("summaries")
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| TriageError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| TriageError::ConfigError(format!("Failed to parse config file: {}", e)))?;

        config.validate()?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                TriageError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| TriageError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| TriageError::ConfigError(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.fetch.max_results == 0 {
            return Err(TriageError::ConfigError(
                "fetch.max_results must be at least 1".to_string(),
            ));
        }
        // Gmail caps messages.list page size at 500
        if self.fetch.max_results > 500 {
            return Err(TriageError::ConfigError(
                "fetch.max_results cannot exceed 500".to_string(),
            ));
        }
        if self.fetch.label.trim().is_empty() {
            return Err(TriageError::ConfigError(
                "fetch.label cannot be empty".to_string(),
            ));
        }

        if self.fetch.max_concurrent_requests == 0 {
            return Err(TriageError::ConfigError(
                "fetch.max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if self.fetch.max_concurrent_requests > 50 {
            return Err(TriageError::ConfigError(
                "fetch.max_concurrent_requests cannot exceed 50 (to stay under Gmail API rate limits)".to_string(),
            ));
        }

        self.model.require_model()?;
        if self.model.api_key_env.trim().is_empty() {
            return Err(TriageError::ConfigError(
                "model.api_key_env cannot be empty".to_string(),
            ));
        }
        if self.model.timeout_secs == 0 {
            return Err(TriageError::ConfigError(
                "model.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if !self.model.endpoint.starts_with("http://") && !self.model.endpoint.starts_with("https://") {
            return Err(TriageError::ConfigError(format!(
                "Invalid model.endpoint: '{}'. Must be an http(s) URL",
                self.model.endpoint
            )));
        }

        if self.output.directory.as_os_str().is_empty() {
            return Err(TriageError::ConfigError(
                "output.directory cannot be empty".to_string(),
            ));
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        let config = Self::default();
        config.save(path).await
    }
}
